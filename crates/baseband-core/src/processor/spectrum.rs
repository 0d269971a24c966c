//! Wideband spectrum analyser
//!
//! `execute` chops each buffer into [`FFT_SIZE`]-point frames and accumulates
//! bin power. After enough frames for about [`UPDATES_PER_SECOND`] updates a
//! second it raises the spectrum event and stops accumulating; the dispatcher
//! then calls `update_spectrum`, which converts the average to dB, publishes
//! `ChannelSpectrum` and rearms the accumulator.

use std::fmt;
use std::sync::Arc;

use rustfft::{Fft, FftPlanner};

use crate::message::{ChannelSpectrum, Message, SPECTRUM_BINS};
use crate::rt::EVT_MASK_SPECTRUM;
use crate::types::{IqF32, SampleBuffer};

use super::ProcessorContext;

/// Transform length; equals the number of published bins.
pub const FFT_SIZE: usize = SPECTRUM_BINS;

/// Target publication rate.
pub const UPDATES_PER_SECOND: u32 = 30;

/// Offset added to bin power (dB) before it is clamped into a byte.
const DB_OFFSET: f32 = 80.0;

pub struct WidebandSpectrum {
    fft: Arc<dyn Fft<f32>>,
    frame: Vec<IqF32>,
    scratch: Vec<IqF32>,
    power: Vec<f32>,
    frames: u32,
    frames_per_update: u32,
    sampling_rate: u32,
    pending: bool,
    published: u64,
}

impl fmt::Debug for WidebandSpectrum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WidebandSpectrum")
            .field("frames", &self.frames)
            .field("frames_per_update", &self.frames_per_update)
            .field("sampling_rate", &self.sampling_rate)
            .field("pending", &self.pending)
            .field("published", &self.published)
            .finish()
    }
}

impl Default for WidebandSpectrum {
    fn default() -> Self {
        Self::new()
    }
}

impl WidebandSpectrum {
    pub fn new() -> Self {
        let fft = FftPlanner::new().plan_fft_forward(FFT_SIZE);
        let scratch = vec![IqF32::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        Self {
            fft,
            frame: Vec::with_capacity(FFT_SIZE),
            scratch,
            power: vec![0.0; FFT_SIZE],
            frames: 0,
            frames_per_update: 1,
            sampling_rate: 0,
            pending: false,
            published: 0,
        }
    }

    /// Frames averaged into one update at `sampling_rate`.
    pub fn frames_per_update(sampling_rate: u32) -> u32 {
        (sampling_rate / FFT_SIZE as u32 / UPDATES_PER_SECOND).max(1)
    }

    /// Whether an accumulated spectrum is waiting for `update_spectrum`.
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Spectra published so far.
    pub fn published(&self) -> u64 {
        self.published
    }

    pub fn execute(&mut self, buffer: &mut SampleBuffer<'_>, ctx: &ProcessorContext<'_>) {
        if buffer.sampling_rate != self.sampling_rate {
            self.sampling_rate = buffer.sampling_rate;
            self.frames_per_update = Self::frames_per_update(buffer.sampling_rate);
        }

        for chunk in buffer.samples.chunks_exact(FFT_SIZE) {
            if self.pending {
                return;
            }
            self.frame.clear();
            self.frame.extend(
                chunk
                    .iter()
                    .map(|s| IqF32::new(s.re as f32 / 128.0, s.im as f32 / 128.0)),
            );
            self.fft
                .process_with_scratch(&mut self.frame, &mut self.scratch);
            for (acc, bin) in self.power.iter_mut().zip(&self.frame) {
                *acc += bin.norm_sqr();
            }

            self.frames += 1;
            if self.frames >= self.frames_per_update {
                self.pending = true;
                ctx.events.signal(EVT_MASK_SPECTRUM);
            }
        }
    }

    /// Publish the pending spectrum (DC centred) and start a new average.
    pub fn update_spectrum(&mut self, ctx: &ProcessorContext<'_>) {
        if !self.pending {
            return;
        }

        let norm = 1.0 / (self.frames.max(1) as f32 * (FFT_SIZE * FFT_SIZE) as f32);
        let mut spectrum = Box::new(ChannelSpectrum {
            sampling_rate: self.sampling_rate,
            ..ChannelSpectrum::default()
        });
        for (i, &power) in self.power.iter().enumerate() {
            let db = 10.0 * (power * norm).log10();
            let shifted = (i + FFT_SIZE / 2) % FFT_SIZE;
            spectrum.db[shifted] = (db.round() + DB_OFFSET).clamp(0.0, 255.0) as u8;
        }
        ctx.shared.publish(&Message::ChannelSpectrum(spectrum));
        self.published += 1;

        self.power.iter_mut().for_each(|p| *p = 0.0);
        self.frames = 0;
        self.pending = false;
    }
}
