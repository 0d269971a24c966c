//! Direct Digital Synthesis primitives
//!
//! Every transmit synthesizer is built from the same two pieces:
//!
//! - **PhaseAccumulator**: a 32-bit unsigned angle register that wraps
//!   modulo 2^32 (one full cycle). The top 10 bits index the sine table.
//! - **FmModulator**: a second, independent accumulator advanced by a
//!   modulation value each sample. Reading it twice, 90° apart, yields the
//!   complex (I/Q) output, which gives single-sideband FM by construction.
//!
//! ## Signal Flow
//!
//! ```text
//! tone accumulator ──► sine(tone) × deviation ──► FM accumulator ──► (cos, sin) ──► I/Q
//! ```
//!
//! ## Example
//!
//! ```rust
//! use baseband_core::dds::{FmModulator, PhaseAccumulator};
//!
//! let mut tone = PhaseAccumulator::new();
//! let mut fm = FmModulator::new();
//!
//! tone.advance(PhaseAccumulator::increment_for(1200.0, 228_000.0));
//! let iq = fm.modulate(tone.sine() as i32 * 4_000);
//! assert!(iq.re.unsigned_abs() <= 127);
//! ```

mod sine_table;

pub use sine_table::{SINE_TABLE, SINE_TABLE_LEN};

use crate::types::Iq8;

/// Number of bits used to index the sine table.
pub const TABLE_INDEX_BITS: u32 = 10;

/// Right shift that leaves the top `TABLE_INDEX_BITS` of the accumulator.
pub const TABLE_INDEX_SHIFT: u32 = 32 - TABLE_INDEX_BITS;

/// A quarter cycle (90°) expressed in accumulator units.
pub const QUARTER_CYCLE: u32 = 1 << 30;

/// Look up the sine table at the angle held in `phase`.
#[inline]
pub fn sine_at(phase: u32) -> i8 {
    SINE_TABLE[(phase >> TABLE_INDEX_SHIFT) as usize]
}

/// Unsigned fixed-point angle accumulator, wrapping modulo 2^32.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseAccumulator {
    phase: u32,
}

impl PhaseAccumulator {
    /// Create an accumulator at angle zero.
    pub const fn new() -> Self {
        Self { phase: 0 }
    }

    /// Create an accumulator at a given raw angle.
    pub const fn with_phase(phase: u32) -> Self {
        Self { phase }
    }

    /// Phase increment that produces `frequency` Hz at `clock` Hz.
    ///
    /// Negative frequencies wrap to the equivalent unsigned increment.
    pub fn increment_for(frequency: f64, clock: f64) -> u32 {
        if clock <= 0.0 {
            return 0;
        }
        let cycles = frequency / clock;
        let scaled = (cycles * 4_294_967_296.0).round() as i64;
        scaled as u32
    }

    /// Advance by `increment`, wrapping modulo 2^32.
    #[inline]
    pub fn advance(&mut self, increment: u32) {
        self.phase = self.phase.wrapping_add(increment);
    }

    /// Advance by a signed amount (used for frequency modulation).
    #[inline]
    pub fn advance_signed(&mut self, delta: i32) {
        self.phase = self.phase.wrapping_add(delta as u32);
    }

    /// Raw accumulator value.
    #[inline]
    pub fn phase(&self) -> u32 {
        self.phase
    }

    /// Overwrite the raw accumulator value.
    #[inline]
    pub fn set_phase(&mut self, phase: u32) {
        self.phase = phase;
    }

    /// Sine table index (top 10 bits).
    #[inline]
    pub fn index(&self) -> usize {
        (self.phase >> TABLE_INDEX_SHIFT) as usize
    }

    /// Sine of the current angle.
    #[inline]
    pub fn sine(&self) -> i8 {
        sine_at(self.phase)
    }

    /// Cosine of the current angle (sine read a quarter cycle ahead).
    #[inline]
    pub fn cosine(&self) -> i8 {
        sine_at(self.phase.wrapping_add(QUARTER_CYCLE))
    }
}

/// Frequency modulator producing complex 8-bit samples.
///
/// Each call adds the modulation value to an internal accumulator and reads
/// I from the cosine and Q from the sine of the resulting angle.
#[derive(Debug, Clone, Copy, Default)]
pub struct FmModulator {
    carrier: PhaseAccumulator,
}

impl FmModulator {
    /// Create a modulator at angle zero.
    pub const fn new() -> Self {
        Self {
            carrier: PhaseAccumulator::new(),
        }
    }

    /// Deviation scale that maps a full-scale (±127) modulation sample to
    /// `deviation_hz` at `sampling_rate`.
    pub fn deviation_scale(deviation_hz: f64, sampling_rate: f64) -> i32 {
        if sampling_rate <= 0.0 {
            return 0;
        }
        let per_unit = deviation_hz / 127.0 / sampling_rate * 4_294_967_296.0;
        per_unit.round().clamp(i32::MIN as f64, i32::MAX as f64) as i32
    }

    /// Shift the carrier by `modulation` and return the next I/Q sample.
    #[inline]
    pub fn modulate(&mut self, modulation: i32) -> Iq8 {
        self.carrier.advance_signed(modulation);
        Iq8::new(self.carrier.cosine(), self.carrier.sine())
    }

    /// Current carrier angle.
    pub fn carrier(&self) -> PhaseAccumulator {
        self.carrier
    }
}
