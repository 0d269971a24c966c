//! Frequency-hopping jammer
//!
//! Two independent counters run on the sample clock:
//!
//! - **duration**: every [`DURATION_THRESHOLD`] samples the generator hops to
//!   the next active range of the shared table (circularly, skipping inactive
//!   entries) and publishes `Retune{center}` for the RF front end.
//! - **sweep**: every [`SWEEP_INTERVAL`] samples a nonlinear feedback term
//!   kicks the sweep accumulator, scattering the sweep across the range.
//!
//! The sweep accumulator also advances by [`SWEEP_INCREMENT`] every sample.
//! Its sine, scaled by the range width, frequency-modulates the carrier.

use crate::config::JAMMER_RANGES;
use crate::dds::{FmModulator, PhaseAccumulator};
use crate::message::Message;
use crate::types::SampleBuffer;

use super::ProcessorContext;

/// Samples spent on one range before hopping.
pub const DURATION_THRESHOLD: u32 = 10_000;

/// Samples between sweep perturbations.
pub const SWEEP_INTERVAL: u32 = 70;

/// Per-sample sweep increment.
pub const SWEEP_INCREMENT: u32 = 35_320 << 6;

const FEEDBACK_KEY: u32 = 0x4573;

/// Jammer state.
#[derive(Debug, Clone)]
pub struct JammerGenerator {
    duration_ticks: u32,
    sweep_ticks: u32,
    /// Index of the current range; starts on the last slot so the first hop
    /// lands on the lowest active index
    range_index: usize,
    width: i32,
    sweep: PhaseAccumulator,
    fm: FmModulator,
    retunes: u64,
}

impl Default for JammerGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl JammerGenerator {
    pub fn new() -> Self {
        Self {
            duration_ticks: 0,
            sweep_ticks: 0,
            range_index: JAMMER_RANGES - 1,
            width: 0,
            sweep: PhaseAccumulator::new(),
            fm: FmModulator::new(),
            retunes: 0,
        }
    }

    /// Retune messages published so far.
    pub fn retunes(&self) -> u64 {
        self.retunes
    }

    /// Index of the range currently swept.
    pub fn range_index(&self) -> usize {
        self.range_index
    }

    pub fn execute(&mut self, buffer: &mut SampleBuffer<'_>, ctx: &ProcessorContext<'_>) {
        for sample in buffer.samples.iter_mut() {
            self.duration_ticks += 1;
            if self.duration_ticks >= DURATION_THRESHOLD {
                self.duration_ticks = 0;
                self.hop(ctx);
            }

            self.sweep_ticks += 1;
            if self.sweep_ticks >= SWEEP_INTERVAL {
                self.sweep_ticks = 0;
                let kick = ((self.sweep.phase() >> 10) ^ FEEDBACK_KEY) << 20;
                self.sweep.advance(kick);
            }
            self.sweep.advance(SWEEP_INCREMENT);

            let modulation = (self.sweep.sine() as i32).wrapping_mul(self.width);
            *sample = self.fm.modulate(modulation);
        }
    }

    /// Move to the next active range. With no active range the generator
    /// stays where it is and publishes nothing.
    fn hop(&mut self, ctx: &ProcessorContext<'_>) {
        let table = &ctx.shared.jammer;
        for step in 1..=JAMMER_RANGES {
            let index = (self.range_index + step) % JAMMER_RANGES;
            if table.is_active(index) {
                let range = table.range(index);
                self.range_index = index;
                self.width = range.width;
                self.retunes += 1;
                ctx.shared.publish(&Message::Retune { freq: range.center });
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{JammerConfig, JammerRange};
    use crate::processor::test_support::Bench;
    use crate::types::Iq8;

    fn table(active: &[usize]) -> JammerConfig {
        let ranges = (0..JAMMER_RANGES)
            .map(|i| JammerRange {
                active: active.contains(&i),
                center: 100_000_000 + i as u64 * 1_000_000,
                width: 1000 + i as i32,
            })
            .collect();
        JammerConfig::new(ranges)
    }

    fn run(gen: &mut JammerGenerator, bench: &Bench, buffers: usize, len: usize) {
        let mut samples = vec![Iq8::new(0, 0); len];
        for _ in 0..buffers {
            let mut buffer = SampleBuffer::new(&mut samples, 2_280_000);
            gen.execute(&mut buffer, &bench.ctx());
        }
    }

    fn retune_centers(bench: &Bench) -> Vec<u64> {
        bench
            .shared
            .application_queue
            .drain()
            .into_iter()
            .filter_map(|m| match m {
                Message::Retune { freq } => Some(freq),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_cycles_active_ranges_in_order() {
        let bench = Bench::new();
        bench.shared.jammer.store(&table(&[0, 3, 7]));
        let mut gen = JammerGenerator::new();

        // 30 buffers of 2048 = 61440 samples: six expiries
        run(&mut gen, &bench, 30, 2048);
        let centers = retune_centers(&bench);
        let c = |i: u64| 100_000_000 + i * 1_000_000;
        assert_eq!(centers, vec![c(0), c(3), c(7), c(0), c(3), c(7)]);
        assert_eq!(gen.retunes(), 6);
        assert_eq!(gen.range_index(), 7);
    }

    #[test]
    fn test_one_retune_per_threshold() {
        let bench = Bench::new();
        bench.shared.jammer.store(&table(&[5]));
        let mut gen = JammerGenerator::new();

        run(&mut gen, &bench, 1, DURATION_THRESHOLD as usize - 1);
        assert!(retune_centers(&bench).is_empty());
        run(&mut gen, &bench, 1, 1);
        assert_eq!(retune_centers(&bench).len(), 1);

        // Odd buffer sizes must not disturb the cadence
        run(&mut gen, &bench, 7, 1_427);
        run(&mut gen, &bench, 1, 10);
        assert!(retune_centers(&bench).is_empty());
        run(&mut gen, &bench, 1, 1);
        assert_eq!(retune_centers(&bench).len(), 1);
    }

    #[test]
    fn test_no_active_range_publishes_nothing() {
        let bench = Bench::new();
        bench.shared.jammer.store(&table(&[]));
        let mut gen = JammerGenerator::new();
        run(&mut gen, &bench, 20, 2048);
        assert!(retune_centers(&bench).is_empty());
        assert_eq!(gen.retunes(), 0);
    }

    #[test]
    fn test_table_changes_take_effect_at_next_hop() {
        let bench = Bench::new();
        bench.shared.jammer.store(&table(&[2]));
        let mut gen = JammerGenerator::new();
        run(&mut gen, &bench, 1, 10_000);
        bench.shared.jammer.set_active(9, true);
        run(&mut gen, &bench, 2, 10_000);
        let c = |i: u64| 100_000_000 + i * 1_000_000;
        assert_eq!(retune_centers(&bench), vec![c(2), c(9), c(2)]);
    }

    #[test]
    fn test_output_is_constant_envelope() {
        let bench = Bench::new();
        bench.shared.jammer.store(&table(&[0]));
        let mut gen = JammerGenerator::new();
        let mut samples = vec![Iq8::new(0, 0); 4096];
        let mut buffer = SampleBuffer::new(&mut samples, 2_280_000);
        gen.execute(&mut buffer, &bench.ctx());
        for s in &samples {
            let power = s.re as i32 * s.re as i32 + s.im as i32 * s.im as i32;
            assert!(power > 120 * 120, "{:?}", s);
        }
    }
}
