//! AIS / TPMS packet receivers
//!
//! Both run the same chain with different parameters:
//!
//! 1. Decimate to [`SAMPLES_PER_SYMBOL`] channel samples per symbol.
//! 2. FM-discriminate and integrate one symbol; the sign is the bit.
//! 3. Shift bits through a register until the profile's sync word shows up.
//! 4. Capture the next [`PACKET_BITS`] bits and publish them as
//!    `PacketReceived`, then resume the sync search.
//!
//! Symbol timing is free-running from the first sample; there is no clock
//! recovery.

use crate::message::{Message, PacketKind, PacketReceived, PACKET_BITS};
use crate::stats::ChannelStatsCollector;
use crate::types::{IqF32, SampleBuffer};

use super::channel::{front_end_factor, Decimator, Discriminator};
use super::ProcessorContext;

/// Channel samples integrated per symbol.
pub const SAMPLES_PER_SYMBOL: u32 = 4;

/// Framing parameters of a packet protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketProfile {
    pub kind: PacketKind,
    pub name: &'static str,
    /// Symbols per second
    pub symbol_rate: u32,
    /// Sync word, right-aligned
    pub sync_word: u32,
    pub sync_bits: u32,
}

impl PacketProfile {
    /// AIS: 9600 baud GMSK, HDLC preamble plus flag.
    pub fn ais() -> Self {
        Self {
            kind: PacketKind::Ais,
            name: "ais",
            symbol_rate: 9_600,
            sync_word: 0x55_55_7E,
            sync_bits: 24,
        }
    }

    /// TPMS: 19200 baud FSK, Manchester preamble.
    pub fn tpms() -> Self {
        Self {
            kind: PacketKind::Tpms,
            name: "tpms",
            symbol_rate: 19_200,
            sync_word: 0xAA_A9,
            sync_bits: 16,
        }
    }

    fn sync_mask(&self) -> u32 {
        if self.sync_bits >= 32 {
            u32::MAX
        } else {
            (1 << self.sync_bits) - 1
        }
    }

    /// Channel rate the front end decimates to.
    pub fn channel_rate(&self) -> u32 {
        self.symbol_rate * SAMPLES_PER_SYMBOL
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Framer {
    Searching,
    Capturing { bits: usize },
}

/// Packet receiver state.
#[derive(Debug, Clone)]
pub struct PacketReceiver {
    profile: PacketProfile,
    input_rate: u32,
    requested_decimation: u32,
    decimator: Decimator,
    discriminator: Discriminator,
    symbol_sum: f32,
    symbol_count: u32,
    shift: u32,
    framer: Framer,
    packet: [u8; PACKET_BITS / 8],
    packets: u64,
    channel: Vec<IqF32>,
    stats: Option<ChannelStatsCollector>,
}

impl PacketReceiver {
    pub fn new(profile: PacketProfile) -> Self {
        Self {
            profile,
            input_rate: 0,
            requested_decimation: 1,
            decimator: Decimator::new(1),
            discriminator: Discriminator::default(),
            symbol_sum: 0.0,
            symbol_count: 0,
            shift: 0,
            framer: Framer::Searching,
            packet: [0; PACKET_BITS / 8],
            packets: 0,
            channel: Vec::new(),
            stats: None,
        }
    }

    pub fn profile(&self) -> &PacketProfile {
        &self.profile
    }

    /// Packets published so far.
    pub fn packets(&self) -> u64 {
        self.packets
    }

    pub fn execute(&mut self, buffer: &mut SampleBuffer<'_>, ctx: &ProcessorContext<'_>) {
        if buffer.sampling_rate != self.input_rate
            || buffer.decimation_factor != self.requested_decimation
        {
            self.input_rate = buffer.sampling_rate;
            self.requested_decimation = buffer.decimation_factor;
            self.decimator.set_factor(front_end_factor(
                buffer.sampling_rate,
                self.profile.channel_rate(),
                buffer.decimation_factor,
            ));
        }
        let channel_rate = (self.input_rate / self.decimator.factor()).max(1);

        let mut channel = std::mem::take(&mut self.channel);
        self.decimator.process(buffer.samples, &mut channel);

        for &s in &channel {
            self.symbol_sum += self.discriminator.step(s);
            self.symbol_count += 1;
            if self.symbol_count >= SAMPLES_PER_SYMBOL {
                let bit = self.symbol_sum > 0.0;
                self.symbol_sum = 0.0;
                self.symbol_count = 0;
                self.push_bit(bit, ctx);
            }
        }

        let stats = self
            .stats
            .get_or_insert_with(|| ChannelStatsCollector::new(ctx.stats_interval_ms));
        stats.process(&channel, channel_rate, |s| {
            ctx.shared.publish(&Message::ChannelStatistics(s));
        });
        self.channel = channel;
    }

    fn push_bit(&mut self, bit: bool, ctx: &ProcessorContext<'_>) {
        match self.framer {
            Framer::Searching => {
                self.shift = (self.shift << 1) | bit as u32;
                let mask = self.profile.sync_mask();
                if self.shift & mask == self.profile.sync_word & mask {
                    self.packet = [0; PACKET_BITS / 8];
                    self.framer = Framer::Capturing { bits: 0 };
                }
            }
            Framer::Capturing { bits } => {
                if bit {
                    self.packet[bits / 8] |= 0x80 >> (bits % 8);
                }
                let bits = bits + 1;
                if bits == PACKET_BITS {
                    self.packets += 1;
                    ctx.shared.publish(&Message::PacketReceived(PacketReceived {
                        kind: self.profile.kind,
                        bits: self.packet,
                    }));
                    self.shift = 0;
                    self.framer = Framer::Searching;
                } else {
                    self.framer = Framer::Capturing { bits };
                }
            }
        }
    }
}
