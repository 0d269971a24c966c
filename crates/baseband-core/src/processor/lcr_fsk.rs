//! LCR/AFSK transmit generator
//!
//! Sends the bytes of the shared AFSK surface as audio FSK on an FM carrier.
//!
//! ## Timing
//!
//! ```text
//! sample clock (2.28 MHz) ──÷10──► symbol clock (228 kHz) ──÷samples_per_bit──► bit clock
//! ```
//!
//! Each byte is framed as 10 bits: a 0 start bit, the eight data bits
//! MSB-first, and a 1 stop bit. Byte 0x00 terminates the message. At the
//! terminator the generator either rewinds (if repeats remain) and reports
//! `TxDone{n}` with the repeat count it is about to use, or reports
//! `TxDone{0}`, marks the surface done and goes silent. At most one message
//! is published per bit boundary.
//!
//! A run belongs to one surface generation. If the application stores a new
//! transmission mid-buffer, the run goes quiet at the next bit boundary
//! without reporting and the next buffer starts the new one.

use crate::config::FSK_DECIMATION;
use crate::dds::{FmModulator, PhaseAccumulator};
use crate::message::Message;
use crate::shared::{AfskParams, AfskSurface, RepeatTake};
use crate::types::{Iq8, SampleBuffer};

use super::ProcessorContext;

/// Bits per framed byte.
const FRAME_BITS: u8 = 10;

/// Bit `bit_pos` (0 = start bit, 9 = stop bit) of the framed `byte`.
#[inline]
pub fn frame_bit(byte: u8, bit_pos: u8) -> bool {
    let framed = ((byte as u16) << 1) | 1;
    (framed >> (FRAME_BITS - 1 - bit_pos)) & 1 == 1
}

/// FSK generator state.
#[derive(Debug, Clone)]
pub struct LcrFskGenerator {
    /// Position within the symbol-clock decimation
    substep: u32,
    /// Symbol ticks elapsed in the current bit
    symbol_ticks: u32,
    byte_pos: usize,
    bit_pos: u8,
    current_byte: u8,
    current_bit: bool,
    tone: PhaseAccumulator,
    tone_sample: i8,
    fm: FmModulator,
    done: bool,
    /// Surface generation this run was started from; `None` once superseded
    generation: Option<u32>,
    bits_sent: u64,
}

impl Default for LcrFskGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl LcrFskGenerator {
    pub fn new() -> Self {
        Self {
            substep: 0,
            symbol_ticks: 0,
            byte_pos: 0,
            bit_pos: 0,
            current_byte: 0,
            current_bit: true,
            tone: PhaseAccumulator::new(),
            tone_sample: 0,
            fm: FmModulator::new(),
            done: false,
            generation: None,
            bits_sent: 0,
        }
    }

    /// Whether the message (with its repeats) has been sent.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Bits started since the last restart.
    pub fn bits_sent(&self) -> u64 {
        self.bits_sent
    }

    fn is_idle(&self) -> bool {
        self.done || self.generation.is_none()
    }

    fn restart(&mut self, generation: u32) {
        *self = Self {
            generation: Some(generation),
            tone: self.tone,
            fm: self.fm,
            ..Self::new()
        };
    }

    pub fn execute(&mut self, buffer: &mut SampleBuffer<'_>, ctx: &ProcessorContext<'_>) {
        let surface = &ctx.shared.afsk;
        let generation = surface.generation();
        if AfskSurface::is_writing(generation) {
            buffer.silence();
            return;
        }
        if self.generation != Some(generation) {
            self.restart(generation);
        }

        let params = surface.params();
        if !surface.is_current(generation) || self.done || params.samples_per_bit == 0 {
            buffer.silence();
            return;
        }

        for sample in buffer.samples.iter_mut() {
            if self.is_idle() {
                *sample = Iq8::new(0, 0);
                continue;
            }

            if self.substep == 0 {
                self.symbol_tick(&params, ctx);
            }
            self.substep += 1;
            if self.substep >= FSK_DECIMATION {
                self.substep = 0;
            }

            *sample = if self.is_idle() {
                Iq8::new(0, 0)
            } else {
                self.fm
                    .modulate((self.tone_sample as i32).wrapping_mul(params.fm_deviation))
            };
        }
    }

    fn symbol_tick(&mut self, params: &AfskParams, ctx: &ProcessorContext<'_>) {
        if self.symbol_ticks == 0 {
            self.next_bit(ctx);
            if self.is_idle() {
                return;
            }
        }
        self.symbol_ticks += 1;
        if self.symbol_ticks >= params.samples_per_bit {
            self.symbol_ticks = 0;
        }

        let increment = if self.current_bit {
            params.phase_inc_mark
        } else {
            params.phase_inc_space
        };
        self.tone.advance(increment);
        self.tone_sample = self.tone.sine();
    }

    /// Bit boundary: pick the next framed bit, handling the terminator.
    fn next_bit(&mut self, ctx: &ProcessorContext<'_>) {
        let surface = &ctx.shared.afsk;
        let Some(generation) = self.generation else {
            return;
        };

        if self.bit_pos == 0 {
            let mut byte = surface.byte(self.byte_pos);
            if !surface.is_current(generation) {
                self.generation = None;
                return;
            }
            if byte == 0 {
                match surface.take_repeat(generation) {
                    RepeatTake::Repeat(n) => {
                        ctx.shared.publish(&Message::TxDone { n });
                        self.byte_pos = 0;
                        byte = surface.byte(0);
                        if !surface.is_current(generation) {
                            self.generation = None;
                            return;
                        }
                        if byte == 0 {
                            // Empty message: hold the line at mark for one bit
                            self.current_bit = true;
                            return;
                        }
                    }
                    RepeatTake::Finished => {
                        ctx.shared.publish(&Message::TxDone { n: 0 });
                        surface.set_transmit_done(generation);
                        self.done = true;
                        return;
                    }
                    RepeatTake::Superseded => {
                        self.generation = None;
                        return;
                    }
                }
            }
            self.current_byte = byte;
        }

        self.current_bit = frame_bit(self.current_byte, self.bit_pos);
        self.bits_sent += 1;

        if self.bit_pos == FRAME_BITS - 1 {
            self.bit_pos = 0;
            self.byte_pos += 1;
        } else {
            self.bit_pos += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AfskConfig;
    use crate::processor::test_support::Bench;

    const BUFFER: usize = 2048;

    fn afsk(data: &[u8], repeat: u32, samples_per_bit: u32) -> AfskConfig {
        AfskConfig {
            samples_per_bit,
            ..AfskConfig::bell202(data, repeat)
        }
    }

    fn run_buffer(gen: &mut LcrFskGenerator, bench: &Bench) -> Vec<Iq8> {
        let mut samples = vec![Iq8::new(55, 55); BUFFER];
        let mut buffer = SampleBuffer::new(&mut samples, 2_280_000);
        gen.execute(&mut buffer, &bench.ctx());
        samples
    }

    #[test]
    fn test_frame_bits() {
        // 0x41 = 0100_0001: start 0, data MSB-first, stop 1
        let bits: Vec<bool> = (0..10).map(|i| frame_bit(0x41, i)).collect();
        let expected = [false, false, true, false, false, false, false, false, true, true];
        assert_eq!(bits, expected);
        assert!(!frame_bit(0xFF, 0));
        assert!(frame_bit(0x00, 9));
    }

    #[test]
    fn test_single_pass_reports_done_once() {
        let bench = Bench::new();
        bench.shared.afsk.store(&afsk(&[0x41, 0x00], 0, 4));
        let mut gen = LcrFskGenerator::new();

        // One byte = 10 bits x 4 ticks x 10 samples = 400 samples
        let first = run_buffer(&mut gen, &bench);
        assert!(gen.is_done());
        assert_eq!(gen.bits_sent(), 10);
        assert!(first[..400].iter().any(|s| *s != Iq8::new(0, 0)));
        assert!(first[400..].iter().all(|s| *s == Iq8::new(0, 0)));

        assert_eq!(bench.shared.application_queue.drain(), vec![Message::TxDone { n: 0 }]);
        assert!(bench.shared.afsk.transmit_done());

        for _ in 0..8 {
            let samples = run_buffer(&mut gen, &bench);
            assert!(samples.iter().all(|s| *s == Iq8::new(0, 0)));
        }
        assert!(bench.shared.application_queue.is_empty());
        assert_eq!(gen.bits_sent(), 10);
    }

    #[test]
    fn test_repeat_counts_down() {
        let bench = Bench::new();
        bench.shared.afsk.store(&afsk(&[0x41, 0x00], 2, 4));
        let mut gen = LcrFskGenerator::new();

        for _ in 0..4 {
            run_buffer(&mut gen, &bench);
        }
        assert_eq!(
            bench.shared.application_queue.drain(),
            vec![
                Message::TxDone { n: 2 },
                Message::TxDone { n: 1 },
                Message::TxDone { n: 0 },
            ]
        );
        assert_eq!(gen.bits_sent(), 30);
    }

    #[test]
    fn test_bit_length_spans_samples_per_bit() {
        let bench = Bench::new();
        bench.shared.afsk.store(&afsk(b"UUUUUUUU", 0, 190));
        let mut gen = LcrFskGenerator::new();

        // 2048 samples = 205 symbol ticks: bit 1 starts at tick 0, bit 2 at tick 190
        run_buffer(&mut gen, &bench);
        assert_eq!(gen.bits_sent(), 2);
        assert!(!gen.is_done());
    }

    #[test]
    fn test_empty_message_with_repeats() {
        let bench = Bench::new();
        bench.shared.afsk.store(&afsk(&[0x00], 2, 1));
        let mut gen = LcrFskGenerator::new();
        run_buffer(&mut gen, &bench);
        assert_eq!(
            bench.shared.application_queue.drain(),
            vec![
                Message::TxDone { n: 2 },
                Message::TxDone { n: 1 },
                Message::TxDone { n: 0 },
            ]
        );
    }

    #[test]
    fn test_new_surface_restarts() {
        let bench = Bench::new();
        bench.shared.afsk.store(&afsk(&[0x41, 0x00], 0, 4));
        let mut gen = LcrFskGenerator::new();
        run_buffer(&mut gen, &bench);
        assert!(gen.is_done());

        bench.shared.afsk.store(&afsk(&[0x42, 0x43, 0x00], 0, 4));
        let samples = run_buffer(&mut gen, &bench);
        assert!(gen.is_done());
        assert_eq!(gen.bits_sent(), 20);
        assert!(samples[..800].iter().any(|s| *s != Iq8::new(0, 0)));
        assert_eq!(bench.shared.application_queue.drain().len(), 2);
    }

    #[test]
    fn test_store_at_terminator_keeps_new_repeats() {
        let bench = Bench::new();
        bench.shared.afsk.store(&afsk(&[0x41, 0x00], 0, 4));
        let mut gen = LcrFskGenerator::new();

        // Stop just before the terminator at sample 400
        let mut samples = vec![Iq8::new(0, 0); 390];
        let mut buffer = SampleBuffer::new(&mut samples, 2_280_000);
        gen.execute(&mut buffer, &bench.ctx());
        assert_eq!(gen.bits_sent(), 10);

        // New transmission lands while the old run is mid-buffer
        bench.shared.afsk.store(&afsk(&[0x41, 0x00], 3, 4));
        gen.next_bit(&bench.ctx());
        assert!(gen.is_idle());
        assert!(!gen.is_done());
        assert!(bench.shared.application_queue.is_empty());
        assert_eq!(bench.shared.afsk.repeat(), 3);
        assert!(!bench.shared.afsk.transmit_done());

        // Terminators fall at samples 400, 800, 1200 and 1600
        run_buffer(&mut gen, &bench);
        assert_eq!(
            bench.shared.application_queue.drain(),
            vec![
                Message::TxDone { n: 3 },
                Message::TxDone { n: 2 },
                Message::TxDone { n: 1 },
                Message::TxDone { n: 0 },
            ]
        );
        assert!(bench.shared.afsk.transmit_done());
    }

    #[test]
    fn test_unwritten_surface_is_silent() {
        let bench = Bench::new();
        let mut gen = LcrFskGenerator::new();
        let samples = run_buffer(&mut gen, &bench);
        assert!(samples.iter().all(|s| *s == Iq8::new(0, 0)));
        assert!(bench.shared.application_queue.is_empty());
    }
}
