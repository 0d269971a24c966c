//! # Mailbox Messages
//!
//! Tagged, fixed-maximum-size records exchanged with the application core.
//!
//! ## Wire Format
//!
//! ```text
//! ┌──────────┬──────────────────────────────┬─────────────┐
//! │ id (u16) │ payload (little endian)      │ zero fill   │
//! └──────────┴──────────────────────────────┴─────────────┘
//!  0          2                              ... MAX_SIZE
//! ```
//!
//! Every record occupies exactly [`MAX_SIZE`] bytes in the ring. There is no
//! framing beyond that bound.
//!
//! | id | kind                  | direction   | payload                                  |
//! |----|-----------------------|-------------|------------------------------------------|
//! | 0  | RssiStatistics        | core → app  | accumulator u32, count u32, min u8, max u8 |
//! | 1  | BasebandStatistics    | core → app  | six u32 counters                         |
//! | 2  | ChannelStatistics     | core → app  | max_db i32, count u32                    |
//! | 3  | ChannelSpectrum       | core → app  | sampling_rate u32, db [u8; 256]          |
//! | 4  | PacketReceived        | core → app  | kind u8, bits [u8; 32]                   |
//! | 5  | BasebandConfiguration | app → core  | mode u32, sampling_rate u32, decimation u32 |
//! | 6  | Shutdown              | both        | none                                     |
//! | 7  | TxDone                | core → app  | n u32                                    |
//! | 8  | Retune                | core → app  | freq u64                                 |

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use thiserror::Error;

use crate::config::BasebandConfiguration;

/// Maximum encoded size of any message (bytes).
pub const MAX_SIZE: usize = 288;

/// Number of spectrum bins in a `ChannelSpectrum` message.
pub const SPECTRUM_BINS: usize = 256;

/// Captured packet length in bits.
pub const PACKET_BITS: usize = 256;

/// One encoded mailbox record.
pub type Record = [u8; MAX_SIZE];

/// Message encoding/decoding errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageError {
    /// Discriminant does not name a known message kind
    #[error("unknown message id {0}")]
    UnknownId(u16),
    /// Record ended before the payload did
    #[error("record truncated")]
    Truncated,
    /// Payload does not fit in a record
    #[error("payload exceeds the record size")]
    Overflow,
    /// A payload field holds an out-of-range value
    #[error("invalid value for field '{0}'")]
    InvalidField(&'static str),
}

/// Message discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
pub enum MessageId {
    RssiStatistics = 0,
    BasebandStatistics = 1,
    ChannelStatistics = 2,
    ChannelSpectrum = 3,
    PacketReceived = 4,
    BasebandConfiguration = 5,
    Shutdown = 6,
    TxDone = 7,
    Retune = 8,
}

impl MessageId {
    pub fn from_raw(raw: u16) -> Option<MessageId> {
        Some(match raw {
            0 => MessageId::RssiStatistics,
            1 => MessageId::BasebandStatistics,
            2 => MessageId::ChannelStatistics,
            3 => MessageId::ChannelSpectrum,
            4 => MessageId::PacketReceived,
            5 => MessageId::BasebandConfiguration,
            6 => MessageId::Shutdown,
            7 => MessageId::TxDone,
            8 => MessageId::Retune,
            _ => return None,
        })
    }

    pub fn raw(self) -> u16 {
        self as u16
    }
}

/// RSSI window aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RssiStatistics {
    /// Sum of raw readings over the window
    pub accumulator: u32,
    /// Readings in the window
    pub count: u32,
    pub min: u8,
    pub max: u8,
}

impl RssiStatistics {
    /// Mean raw reading, or 0 for an empty window.
    pub fn mean(&self) -> u32 {
        if self.count == 0 {
            0
        } else {
            self.accumulator / self.count
        }
    }
}

/// Baseband runtime window aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BasebandStatistics {
    /// Buffers processed in the window
    pub buffer_count: u32,
    /// Samples processed in the window
    pub sample_count: u32,
    /// Worst `execute` time in the window (µs)
    pub max_execute_us: u32,
    /// Time spent in `execute` relative to the window's sample time (‰)
    pub load_permille: u32,
    /// Buffers whose `execute` overran the buffer period (since start)
    pub deadline_overruns: u32,
    /// Application-queue records dropped because the ring was full (since start)
    pub messages_dropped: u32,
}

/// Channel power aggregate of a receive processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelStatistics {
    /// Peak channel power (dBFS, rounded)
    pub max_db: i32,
    /// Channel samples in the window
    pub count: u32,
}

/// Averaged power spectrum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSpectrum {
    pub sampling_rate: u32,
    /// Bin power in dB above the floor, DC at the center bin
    pub db: [u8; SPECTRUM_BINS],
}

impl Default for ChannelSpectrum {
    fn default() -> Self {
        Self {
            sampling_rate: 0,
            db: [0; SPECTRUM_BINS],
        }
    }
}

/// Packet protocol of a `PacketReceived` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketKind {
    Ais = 0,
    Tpms = 1,
}

/// Raw bits captured after a sync word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketReceived {
    pub kind: PacketKind,
    /// Bits MSB-first
    pub bits: [u8; PACKET_BITS / 8],
}

/// A decoded mailbox message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    RssiStatistics(RssiStatistics),
    BasebandStatistics(BasebandStatistics),
    ChannelStatistics(ChannelStatistics),
    ChannelSpectrum(Box<ChannelSpectrum>),
    PacketReceived(PacketReceived),
    BasebandConfiguration(BasebandConfiguration),
    Shutdown,
    /// Transmit progress: remaining repeats, 0 when done
    TxDone { n: u32 },
    /// Retune the RF front end to `freq` Hz
    Retune { freq: u64 },
}

impl Message {
    pub fn id(&self) -> MessageId {
        match self {
            Message::RssiStatistics(_) => MessageId::RssiStatistics,
            Message::BasebandStatistics(_) => MessageId::BasebandStatistics,
            Message::ChannelStatistics(_) => MessageId::ChannelStatistics,
            Message::ChannelSpectrum(_) => MessageId::ChannelSpectrum,
            Message::PacketReceived(_) => MessageId::PacketReceived,
            Message::BasebandConfiguration(_) => MessageId::BasebandConfiguration,
            Message::Shutdown => MessageId::Shutdown,
            Message::TxDone { .. } => MessageId::TxDone,
            Message::Retune { .. } => MessageId::Retune,
        }
    }

    /// Encode into a zero-filled record.
    pub fn encode(&self) -> Result<Record, MessageError> {
        let mut record = [0u8; MAX_SIZE];
        let mut w = &mut record[..];
        self.write_to(&mut w).map_err(|_| MessageError::Overflow)?;
        Ok(record)
    }

    fn write_to(&self, w: &mut &mut [u8]) -> std::io::Result<()> {
        w.write_u16::<LittleEndian>(self.id().raw())?;
        match self {
            Message::RssiStatistics(s) => {
                w.write_u32::<LittleEndian>(s.accumulator)?;
                w.write_u32::<LittleEndian>(s.count)?;
                w.write_u8(s.min)?;
                w.write_u8(s.max)?;
            }
            Message::BasebandStatistics(s) => {
                for v in [
                    s.buffer_count,
                    s.sample_count,
                    s.max_execute_us,
                    s.load_permille,
                    s.deadline_overruns,
                    s.messages_dropped,
                ] {
                    w.write_u32::<LittleEndian>(v)?;
                }
            }
            Message::ChannelStatistics(s) => {
                w.write_i32::<LittleEndian>(s.max_db)?;
                w.write_u32::<LittleEndian>(s.count)?;
            }
            Message::ChannelSpectrum(s) => {
                w.write_u32::<LittleEndian>(s.sampling_rate)?;
                std::io::Write::write_all(w, &s.db)?;
            }
            Message::PacketReceived(p) => {
                w.write_u8(p.kind as u8)?;
                std::io::Write::write_all(w, &p.bits)?;
            }
            Message::BasebandConfiguration(c) => {
                w.write_u32::<LittleEndian>(c.mode)?;
                w.write_u32::<LittleEndian>(c.sampling_rate)?;
                w.write_u32::<LittleEndian>(c.decimation_factor)?;
            }
            Message::Shutdown => {}
            Message::TxDone { n } => w.write_u32::<LittleEndian>(*n)?,
            Message::Retune { freq } => w.write_u64::<LittleEndian>(*freq)?,
        }
        Ok(())
    }

    /// Read only the discriminant of an encoded record.
    pub fn peek_id(bytes: &[u8]) -> Result<u16, MessageError> {
        let mut r = bytes;
        r.read_u16::<LittleEndian>().map_err(|_| MessageError::Truncated)
    }

    /// Decode a record.
    pub fn decode(bytes: &[u8]) -> Result<Message, MessageError> {
        let raw = Self::peek_id(bytes)?;
        let id = MessageId::from_raw(raw).ok_or(MessageError::UnknownId(raw))?;
        let mut r = &bytes[2..];
        Self::read_payload(id, &mut r).map_err(|e| match e.kind() {
            std::io::ErrorKind::InvalidData => MessageError::InvalidField("kind"),
            _ => MessageError::Truncated,
        })
    }

    fn read_payload(id: MessageId, r: &mut &[u8]) -> std::io::Result<Message> {
        Ok(match id {
            MessageId::RssiStatistics => Message::RssiStatistics(RssiStatistics {
                accumulator: r.read_u32::<LittleEndian>()?,
                count: r.read_u32::<LittleEndian>()?,
                min: r.read_u8()?,
                max: r.read_u8()?,
            }),
            MessageId::BasebandStatistics => Message::BasebandStatistics(BasebandStatistics {
                buffer_count: r.read_u32::<LittleEndian>()?,
                sample_count: r.read_u32::<LittleEndian>()?,
                max_execute_us: r.read_u32::<LittleEndian>()?,
                load_permille: r.read_u32::<LittleEndian>()?,
                deadline_overruns: r.read_u32::<LittleEndian>()?,
                messages_dropped: r.read_u32::<LittleEndian>()?,
            }),
            MessageId::ChannelStatistics => Message::ChannelStatistics(ChannelStatistics {
                max_db: r.read_i32::<LittleEndian>()?,
                count: r.read_u32::<LittleEndian>()?,
            }),
            MessageId::ChannelSpectrum => {
                let sampling_rate = r.read_u32::<LittleEndian>()?;
                let mut db = [0u8; SPECTRUM_BINS];
                std::io::Read::read_exact(r, &mut db)?;
                Message::ChannelSpectrum(Box::new(ChannelSpectrum { sampling_rate, db }))
            }
            MessageId::PacketReceived => {
                let kind = match r.read_u8()? {
                    0 => PacketKind::Ais,
                    1 => PacketKind::Tpms,
                    _ => {
                        return Err(std::io::Error::new(
                            std::io::ErrorKind::InvalidData,
                            "packet kind",
                        ))
                    }
                };
                let mut bits = [0u8; PACKET_BITS / 8];
                std::io::Read::read_exact(r, &mut bits)?;
                Message::PacketReceived(PacketReceived { kind, bits })
            }
            MessageId::BasebandConfiguration => {
                Message::BasebandConfiguration(BasebandConfiguration {
                    mode: r.read_u32::<LittleEndian>()?,
                    sampling_rate: r.read_u32::<LittleEndian>()?,
                    decimation_factor: r.read_u32::<LittleEndian>()?,
                })
            }
            MessageId::Shutdown => Message::Shutdown,
            MessageId::TxDone => Message::TxDone {
                n: r.read_u32::<LittleEndian>()?,
            },
            MessageId::Retune => Message::Retune {
                freq: r.read_u64::<LittleEndian>()?,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Mode;

    #[test]
    fn test_configuration_layout() {
        let msg = Message::BasebandConfiguration(BasebandConfiguration::new(Mode::Jammer, 2_280_000));
        let record = msg.encode().unwrap();
        assert_eq!(&record[0..2], &[5, 0]);
        assert_eq!(&record[2..6], &18u32.to_le_bytes());
        assert_eq!(&record[6..10], &2_280_000u32.to_le_bytes());
        assert!(record[14..].iter().all(|&b| b == 0));
        assert_eq!(Message::decode(&record).unwrap(), msg);
    }

    #[test]
    fn test_spectrum_fits_record() {
        let mut spectrum = ChannelSpectrum {
            sampling_rate: 20_000_000,
            ..Default::default()
        };
        spectrum.db[0] = 1;
        spectrum.db[255] = 200;
        let msg = Message::ChannelSpectrum(Box::new(spectrum));
        let record = msg.encode().unwrap();
        assert_eq!(Message::decode(&record).unwrap(), msg);
    }

    #[test]
    fn test_retune_and_txdone() {
        for msg in [
            Message::Retune { freq: 433_920_000 },
            Message::TxDone { n: 2 },
            Message::Shutdown,
        ] {
            let record = msg.encode().unwrap();
            assert_eq!(Message::peek_id(&record).unwrap(), msg.id().raw());
            assert_eq!(Message::decode(&record).unwrap(), msg);
        }
    }

    #[test]
    fn test_unknown_id() {
        let mut record = [0u8; MAX_SIZE];
        record[0] = 0x34;
        record[1] = 0x12;
        assert_eq!(Message::decode(&record), Err(MessageError::UnknownId(0x1234)));
    }

    #[test]
    fn test_truncated_payload() {
        let record = Message::Retune { freq: 1 }.encode().unwrap();
        assert_eq!(Message::decode(&record[..6]), Err(MessageError::Truncated));
        assert_eq!(Message::decode(&record[..1]), Err(MessageError::Truncated));
    }

    #[test]
    fn test_invalid_packet_kind() {
        let mut record = [0u8; MAX_SIZE];
        record[0] = MessageId::PacketReceived as u8;
        record[2] = 9;
        assert_eq!(
            Message::decode(&record),
            Err(MessageError::InvalidField("kind"))
        );
    }

    #[test]
    fn test_rssi_mean() {
        let s = RssiStatistics {
            accumulator: 1000,
            count: 10,
            min: 90,
            max: 110,
        };
        assert_eq!(s.mean(), 100);
        assert_eq!(RssiStatistics::default().mean(), 0);
    }
}
