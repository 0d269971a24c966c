//! Core types for baseband sample processing.

use num_complex::Complex;
use serde::{Deserialize, Serialize};

/// Complex 8-bit sample as produced and consumed by the RF DMA engine.
pub type Iq8 = Complex<i8>;

/// Complex float sample used inside receive-side DSP.
pub type IqF32 = Complex<f32>;

/// Direction of the sample DMA engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Samples flow from the RF front end into the core
    #[default]
    Receive,
    /// The core fills buffers that flow out to the RF front end
    Transmit,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Receive => write!(f, "rx"),
            Direction::Transmit => write!(f, "tx"),
        }
    }
}

/// A view of one completed DMA transfer, tagged with the sampling rate in
/// effect when it was captured (or will be transmitted).
///
/// The view is only valid for the duration of one processing call.
#[derive(Debug)]
pub struct SampleBuffer<'a> {
    /// Samples of the transfer. Receive processors read them, transmit
    /// processors overwrite them.
    pub samples: &'a mut [Iq8],
    /// Sampling rate in Hz
    pub sampling_rate: u32,
    /// Front-end decimation requested by the configuration; 1 lets the
    /// receive processor pick its own.
    pub decimation_factor: u32,
}

impl<'a> SampleBuffer<'a> {
    /// Wrap a transfer's samples.
    pub fn new(samples: &'a mut [Iq8], sampling_rate: u32) -> Self {
        Self {
            samples,
            sampling_rate,
            decimation_factor: 1,
        }
    }

    pub fn with_decimation(mut self, factor: u32) -> Self {
        self.decimation_factor = factor.max(1);
        self
    }

    /// Number of samples in the buffer.
    #[inline]
    pub fn count(&self) -> usize {
        self.samples.len()
    }

    /// Duration of the buffer (the real-time deadline for one `execute`).
    pub fn period(&self) -> std::time::Duration {
        buffer_period(self.count(), self.sampling_rate)
    }

    /// Overwrite every sample with zero (carrier off).
    pub fn silence(&mut self) {
        self.samples.fill(Iq8::new(0, 0));
    }
}

/// A view of one completed RSSI transfer.
#[derive(Debug, Clone, Copy)]
pub struct RssiBuffer<'a> {
    /// Raw RSSI ADC readings
    pub samples: &'a [u8],
    /// Sampling rate in Hz
    pub sampling_rate: u32,
}

/// Wall-clock time covered by `count` samples at `sampling_rate`.
pub fn buffer_period(count: usize, sampling_rate: u32) -> std::time::Duration {
    if sampling_rate == 0 {
        return std::time::Duration::ZERO;
    }
    std::time::Duration::from_nanos(count as u64 * 1_000_000_000 / sampling_rate as u64)
}
