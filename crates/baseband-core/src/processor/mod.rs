//! # Baseband Processors
//!
//! A processor consumes (receive) or fills (transmit) one sample buffer per
//! call. The set of processors is closed, so they form one sum type and the
//! factory is a plain function from [`Mode`] to a fresh value.
//!
//! | Mode                 | Processor                | Direction |
//! |----------------------|--------------------------|-----------|
//! | 0 AM, 1 NFM, 2 WFM   | [`AudioReceiver`]        | Rx        |
//! | 3 AIS, 5 TPMS        | [`PacketReceiver`]       | Rx        |
//! | 4 Spectrum           | [`WidebandSpectrum`]     | Rx        |
//! | 16 LCR/FSK           | [`LcrFskGenerator`]      | Tx        |
//! | 18 Jammer            | [`JammerGenerator`]      | Tx        |
//!
//! `execute` runs on the baseband runtime thread and must finish within one
//! buffer period. It never blocks and never allocates once warmed up.
//! `update_spectrum` runs on the dispatcher thread and is never concurrent
//! with `execute`.

mod audio;
mod channel;
mod jammer;
mod lcr_fsk;
mod packet;
mod spectrum;

pub use audio::{AudioKind, AudioReceiver};
pub use jammer::{JammerGenerator, DURATION_THRESHOLD, SWEEP_INCREMENT, SWEEP_INTERVAL};
pub use lcr_fsk::{frame_bit, LcrFskGenerator};
pub use packet::{PacketProfile, PacketReceiver};
pub use spectrum::{WidebandSpectrum, FFT_SIZE};

use crate::config::Mode;
use crate::hal::AudioOutput;
use crate::rt::EventFlags;
use crate::shared::SharedMemory;
use crate::types::SampleBuffer;

/// What a processor may touch while it runs.
#[derive(Clone, Copy)]
pub struct ProcessorContext<'a> {
    /// Mailbox and configuration surfaces
    pub shared: &'a SharedMemory,
    /// Audio output path
    pub audio: &'a dyn AudioOutput,
    /// Event flags (spectrum-ready)
    pub events: &'a EventFlags,
    /// Channel statistics interval for receive processors (ms)
    pub stats_interval_ms: u32,
}

/// The active processor.
#[derive(Debug)]
pub enum Processor {
    Audio(AudioReceiver),
    Packet(PacketReceiver),
    Spectrum(Box<WidebandSpectrum>),
    LcrFsk(LcrFskGenerator),
    Jammer(JammerGenerator),
    #[cfg(test)]
    Tracer(crate::context::tracer::Tracer),
}

impl Processor {
    /// Build the processor for `mode`.
    pub fn for_mode(mode: Mode) -> Processor {
        match mode {
            Mode::NarrowbandAmAudio => Processor::Audio(AudioReceiver::new(AudioKind::Am)),
            Mode::NarrowbandFmAudio => Processor::Audio(AudioReceiver::new(AudioKind::Nfm)),
            Mode::WidebandFmAudio => Processor::Audio(AudioReceiver::new(AudioKind::Wfm)),
            Mode::Ais => Processor::Packet(PacketReceiver::new(PacketProfile::ais())),
            Mode::Tpms => Processor::Packet(PacketReceiver::new(PacketProfile::tpms())),
            Mode::WidebandSpectrum => Processor::Spectrum(Box::new(WidebandSpectrum::new())),
            Mode::LcrFsk => Processor::LcrFsk(LcrFskGenerator::new()),
            Mode::Jammer => Processor::Jammer(JammerGenerator::new()),
        }
    }

    /// Build the processor for a raw mode value; unknown modes yield `None`.
    pub fn for_raw_mode(raw: u32) -> Option<Processor> {
        Mode::from_raw(raw).map(Self::for_mode)
    }

    /// Process one buffer.
    pub fn execute(&mut self, buffer: &mut SampleBuffer<'_>, ctx: &ProcessorContext<'_>) {
        match self {
            Processor::Audio(p) => p.execute(buffer, ctx),
            Processor::Packet(p) => p.execute(buffer, ctx),
            Processor::Spectrum(p) => p.execute(buffer, ctx),
            Processor::LcrFsk(p) => p.execute(buffer, ctx),
            Processor::Jammer(p) => p.execute(buffer, ctx),
            #[cfg(test)]
            Processor::Tracer(p) => p.execute(buffer),
        }
    }

    /// Publish spectrum data, for processors that produce it.
    pub fn update_spectrum(&mut self, ctx: &ProcessorContext<'_>) {
        if let Processor::Spectrum(p) = self {
            p.update_spectrum(ctx);
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Processor::Audio(p) => p.kind().name(),
            Processor::Packet(p) => p.profile().name,
            Processor::Spectrum(_) => "spectrum",
            Processor::LcrFsk(_) => "lcr-fsk",
            Processor::Jammer(_) => "jammer",
            #[cfg(test)]
            Processor::Tracer(_) => "tracer",
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::rt::EventFlags;
    use crate::shared::SharedMemory;
    use crate::sim::SimulatedAudio;

    use super::ProcessorContext;

    /// Owned collaborators for driving a processor directly.
    pub struct Bench {
        pub shared: SharedMemory,
        pub audio: SimulatedAudio,
        pub events: EventFlags,
    }

    impl Bench {
        pub fn new() -> Self {
            Self {
                shared: SharedMemory::new(64),
                audio: SimulatedAudio::new(),
                events: EventFlags::new(),
            }
        }

        pub fn ctx(&self) -> ProcessorContext<'_> {
            ProcessorContext {
                shared: &self.shared,
                audio: &self.audio,
                events: &self.events,
                stats_interval_ms: 1,
            }
        }
    }
}
