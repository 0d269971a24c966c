//! Front-end helpers shared by the receive processors.

use std::f32::consts::PI;

use crate::types::{Iq8, IqF32};

/// Integer decimation factor from `input_rate` to about `output_rate`.
pub(crate) fn decimation_for(input_rate: u32, output_rate: u32) -> u32 {
    if output_rate == 0 || input_rate <= output_rate {
        1
    } else {
        (input_rate + output_rate / 2) / output_rate
    }
}

/// Front-end factor: `requested` when above 1, otherwise the ratio from
/// `input_rate` down to `channel_rate`.
pub(crate) fn front_end_factor(input_rate: u32, channel_rate: u32, requested: u32) -> u32 {
    if requested > 1 {
        requested
    } else {
        decimation_for(input_rate, channel_rate)
    }
}

/// Integrate-and-dump decimator. Partial sums carry over between buffers.
#[derive(Debug, Clone)]
pub(crate) struct Decimator {
    factor: u32,
    sum: IqF32,
    count: u32,
}

impl Decimator {
    pub(crate) fn new(factor: u32) -> Self {
        Self {
            factor: factor.max(1),
            sum: IqF32::new(0.0, 0.0),
            count: 0,
        }
    }

    pub(crate) fn factor(&self) -> u32 {
        self.factor
    }

    /// Change the factor, discarding any partial sum.
    pub(crate) fn set_factor(&mut self, factor: u32) {
        *self = Self::new(factor);
    }

    /// Decimate `input` into `output` (cleared first). Full scale is 1.0.
    pub(crate) fn process(&mut self, input: &[Iq8], output: &mut Vec<IqF32>) {
        output.clear();
        let scale = 1.0 / (128.0 * self.factor as f32);
        for s in input {
            self.sum += IqF32::new(s.re as f32, s.im as f32);
            self.count += 1;
            if self.count >= self.factor {
                output.push(self.sum * scale);
                self.sum = IqF32::new(0.0, 0.0);
                self.count = 0;
            }
        }
    }
}

/// Polar FM discriminator; output is the phase step in units of pi.
#[derive(Debug, Clone, Default)]
pub(crate) struct Discriminator {
    previous: IqF32,
}

impl Discriminator {
    #[inline]
    pub(crate) fn step(&mut self, sample: IqF32) -> f32 {
        let product = sample * self.previous.conj();
        self.previous = sample;
        product.arg() / PI
    }
}
