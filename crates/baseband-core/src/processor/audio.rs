//! Narrowband AM/FM and wideband FM audio receivers
//!
//! ```text
//! I/Q ──► integrate & dump ──► channel ──► demod ──► (÷4 for WFM) ──► audio out
//!                                 │
//!                                 └──► channel statistics
//! ```

use serde::{Deserialize, Serialize};

use crate::message::Message;
use crate::stats::ChannelStatsCollector;
use crate::types::{IqF32, SampleBuffer};

use super::channel::{front_end_factor, Decimator, Discriminator};
use super::ProcessorContext;

/// Audio output rate (Hz).
pub const AUDIO_RATE: u32 = 48_000;

/// Demodulator flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioKind {
    Am,
    Nfm,
    Wfm,
}

impl AudioKind {
    pub fn name(self) -> &'static str {
        match self {
            AudioKind::Am => "am-audio",
            AudioKind::Nfm => "nfm-audio",
            AudioKind::Wfm => "wfm-audio",
        }
    }

    /// Channel rate after the front-end decimation.
    pub fn channel_rate(self) -> u32 {
        match self {
            AudioKind::Wfm => AUDIO_RATE * 4,
            AudioKind::Am | AudioKind::Nfm => AUDIO_RATE,
        }
    }

    fn audio_decimation(self) -> u32 {
        self.channel_rate() / AUDIO_RATE
    }
}

/// Single-pole DC blocker coefficient for the AM envelope.
const DC_ALPHA: f32 = 0.002;

/// Audio receiver state.
#[derive(Debug, Clone)]
pub struct AudioReceiver {
    kind: AudioKind,
    input_rate: u32,
    requested_decimation: u32,
    decimator: Decimator,
    discriminator: Discriminator,
    dc: f32,
    audio_sum: f32,
    audio_count: u32,
    channel: Vec<IqF32>,
    audio: Vec<i16>,
    stats: Option<ChannelStatsCollector>,
}

impl AudioReceiver {
    pub fn new(kind: AudioKind) -> Self {
        Self {
            kind,
            input_rate: 0,
            requested_decimation: 1,
            decimator: Decimator::new(1),
            discriminator: Discriminator::default(),
            dc: 0.0,
            audio_sum: 0.0,
            audio_count: 0,
            channel: Vec::new(),
            audio: Vec::new(),
            stats: None,
        }
    }

    pub fn kind(&self) -> AudioKind {
        self.kind
    }

    /// Audio produced by the last call to `execute`.
    pub fn last_audio(&self) -> &[i16] {
        &self.audio
    }

    pub fn execute(&mut self, buffer: &mut SampleBuffer<'_>, ctx: &ProcessorContext<'_>) {
        if buffer.sampling_rate != self.input_rate
            || buffer.decimation_factor != self.requested_decimation
        {
            self.input_rate = buffer.sampling_rate;
            self.requested_decimation = buffer.decimation_factor;
            self.decimator.set_factor(front_end_factor(
                buffer.sampling_rate,
                self.kind.channel_rate(),
                buffer.decimation_factor,
            ));
        }
        let channel_rate = (self.input_rate / self.decimator.factor()).max(1);

        self.decimator.process(buffer.samples, &mut self.channel);

        self.audio.clear();
        let audio_decimation = self.kind.audio_decimation();
        for &s in &self.channel {
            let demod = match self.kind {
                AudioKind::Am => {
                    let envelope = s.norm();
                    self.dc += (envelope - self.dc) * DC_ALPHA;
                    envelope - self.dc
                }
                AudioKind::Nfm | AudioKind::Wfm => self.discriminator.step(s),
            };

            self.audio_sum += demod;
            self.audio_count += 1;
            if self.audio_count >= audio_decimation {
                let value = self.audio_sum / audio_decimation as f32;
                self.audio
                    .push((value * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16);
                self.audio_sum = 0.0;
                self.audio_count = 0;
            }
        }

        if !self.audio.is_empty() {
            ctx.audio.write(&self.audio);
        }

        let stats = self
            .stats
            .get_or_insert_with(|| ChannelStatsCollector::new(ctx.stats_interval_ms));
        stats.process(&self.channel, channel_rate, |s| {
            ctx.shared.publish(&Message::ChannelStatistics(s));
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dds::PhaseAccumulator;
    use crate::hal::AudioOutput;
    use crate::processor::test_support::Bench;
    use crate::types::Iq8;

    const RATE: u32 = 3_072_000;

    fn carrier(offset_hz: f64, len: usize) -> Vec<Iq8> {
        let mut phase = PhaseAccumulator::new();
        let inc = PhaseAccumulator::increment_for(offset_hz, RATE as f64);
        (0..len)
            .map(|_| {
                let s = Iq8::new(phase.cosine(), phase.sine());
                phase.advance(inc);
                s
            })
            .collect()
    }

    fn execute(rx: &mut AudioReceiver, bench: &Bench, samples: &mut [Iq8]) {
        let mut buffer = SampleBuffer::new(samples, RATE);
        rx.execute(&mut buffer, &bench.ctx());
    }

    #[test]
    fn test_nfm_offset_carrier_gives_constant_audio() {
        let bench = Bench::new();
        let mut rx = AudioReceiver::new(AudioKind::Nfm);
        let mut samples = carrier(10_000.0, 2048);
        execute(&mut rx, &bench, &mut samples);

        // 2048 / 64 = 32 audio samples; step = 10k/48k of a half cycle
        let audio = rx.last_audio();
        assert_eq!(audio.len(), 32);
        let expected = (2.0 * 10_000.0 / 48_000.0 * 32767.0) as i32;
        for &a in &audio[1..] {
            assert!((a as i32 - expected).abs() < 800, "{} vs {}", a, expected);
        }
    }

    #[test]
    fn test_wfm_decimates_to_audio_rate() {
        let bench = Bench::new();
        let mut rx = AudioReceiver::new(AudioKind::Wfm);
        let mut samples = carrier(-40_000.0, 8192);
        execute(&mut rx, &bench, &mut samples);

        // 8192 / 16 = 512 channel samples, / 4 = 128 audio samples
        let audio = rx.last_audio();
        assert_eq!(audio.len(), 128);
        assert!(audio[1..].iter().all(|&a| a < 0));
    }

    #[test]
    fn test_configured_decimation_overrides_front_end() {
        let bench = Bench::new();
        let mut rx = AudioReceiver::new(AudioKind::Nfm);
        let mut samples = carrier(10_000.0, 8192);

        execute(&mut rx, &bench, &mut samples);
        assert_eq!(rx.last_audio().len(), 128);

        let mut buffer = SampleBuffer::new(&mut samples, RATE).with_decimation(8);
        rx.execute(&mut buffer, &bench.ctx());
        assert_eq!(rx.last_audio().len(), 1024);

        // Back to automatic
        execute(&mut rx, &bench, &mut samples);
        assert_eq!(rx.last_audio().len(), 128);
    }

    #[test]
    fn test_audio_written_only_when_unmuted() {
        let bench = Bench::new();
        let mut rx = AudioReceiver::new(AudioKind::Am);
        let mut samples = carrier(0.0, 2048);
        execute(&mut rx, &bench, &mut samples);
        assert_eq!(bench.audio.samples_written(), 0);

        bench.audio.unmute();
        execute(&mut rx, &bench, &mut samples);
        assert_eq!(bench.audio.samples_written(), 32);
    }

    #[test]
    fn test_publishes_channel_statistics() {
        let bench = Bench::new();
        let mut rx = AudioReceiver::new(AudioKind::Am);

        // 1 ms at 48 kHz = 48 channel samples; each buffer yields 32
        let mut silence = vec![Iq8::new(0, 0); 2048];
        execute(&mut rx, &bench, &mut silence);
        assert!(bench.shared.application_queue.is_empty());
        execute(&mut rx, &bench, &mut silence);

        match bench.shared.application_queue.drain().as_slice() {
            [Message::ChannelStatistics(s)] => {
                assert_eq!(s.count, 64);
                assert_eq!(s.max_db, ChannelStatsCollector::FLOOR_DB);
            }
            other => panic!("unexpected messages: {:?}", other),
        }
    }

    #[test]
    fn test_am_removes_carrier_dc() {
        let bench = Bench::new();
        let mut rx = AudioReceiver::new(AudioKind::Am);
        let mut samples = carrier(0.0, 8192);
        for _ in 0..40 {
            execute(&mut rx, &bench, &mut samples);
        }
        // Unmodulated carrier settles to (near) silence
        assert!(rx.last_audio().iter().all(|&a| a.abs() < 500));
    }
}
