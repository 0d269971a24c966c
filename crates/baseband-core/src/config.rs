//! Configuration types
//!
//! - [`Mode`] and [`BasebandConfiguration`]: the snapshot carried by a
//!   configuration message and the fixed mode → direction policy.
//! - [`RuntimeConfig`]: buffer geometry, priorities and reporting intervals
//!   of the runtime threads.
//! - [`AfskConfig`] / [`JammerConfig`]: the external configuration surfaces
//!   the application side writes into shared memory for the transmit
//!   synthesizers.
//! - [`CoreConfig`]: all of the above, loadable from JSON.
//!
//! ## Example
//!
//! ```rust
//! use baseband_core::config::{AfskConfig, Mode, RuntimeConfig};
//! use baseband_core::types::Direction;
//!
//! assert_eq!(Mode::LcrFsk.direction(), Direction::Transmit);
//!
//! let runtime = RuntimeConfig::default().with_mailbox_capacity(32);
//! assert_eq!(runtime.baseband_transfer_samples(), 2048);
//!
//! let afsk = AfskConfig::bell202(b"HELLO", 1);
//! assert_eq!(afsk.samples_per_bit, 190);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dds::{FmModulator, PhaseAccumulator};
use crate::error::{BasebandError, Result};
use crate::rt::RtPriority;
use crate::types::Direction;

/// Base sample clock of the transmit synthesizers (Hz).
pub const TX_SAMPLING_RATE: u32 = 2_280_000;

/// Decimation from the transmit sample clock to the FSK symbol clock.
pub const FSK_DECIMATION: u32 = 10;

/// FSK symbol clock (Hz).
pub const FSK_SYMBOL_CLOCK: u32 = TX_SAMPLING_RATE / FSK_DECIMATION;

/// Size of the FSK data surface in bytes.
pub const AFSK_DATA_LEN: usize = 256;

/// Number of jammer frequency ranges.
pub const JAMMER_RANGES: usize = 16;

/// Processor mode selected by a configuration message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum Mode {
    /// Narrowband AM audio receiver
    NarrowbandAmAudio = 0,
    /// Narrowband FM audio receiver
    NarrowbandFmAudio = 1,
    /// Wideband FM audio receiver
    WidebandFmAudio = 2,
    /// AIS packet receiver
    Ais = 3,
    /// Wideband spectrum display
    WidebandSpectrum = 4,
    /// TPMS packet receiver
    Tpms = 5,
    /// LCR/AFSK transmitter
    LcrFsk = 16,
    /// Frequency-hopping jammer
    Jammer = 18,
}

impl Mode {
    /// Every supported mode, in discriminant order.
    pub const ALL: [Mode; 8] = [
        Mode::NarrowbandAmAudio,
        Mode::NarrowbandFmAudio,
        Mode::WidebandFmAudio,
        Mode::Ais,
        Mode::WidebandSpectrum,
        Mode::Tpms,
        Mode::LcrFsk,
        Mode::Jammer,
    ];

    /// Decode a raw mode value; unknown values yield `None`.
    pub fn from_raw(raw: u32) -> Option<Mode> {
        Self::ALL.iter().copied().find(|m| m.raw() == raw)
    }

    pub fn raw(self) -> u32 {
        self as u32
    }

    /// Fixed direction policy: the two synthesizers transmit, everything
    /// else receives.
    pub fn direction(self) -> Direction {
        match self {
            Mode::LcrFsk | Mode::Jammer => Direction::Transmit,
            _ => Direction::Receive,
        }
    }

    /// Whether the mode drives the audio output path.
    pub fn is_audio(self) -> bool {
        matches!(
            self,
            Mode::NarrowbandAmAudio | Mode::NarrowbandFmAudio | Mode::WidebandFmAudio
        )
    }

    /// Short display name.
    pub fn name(self) -> &'static str {
        match self {
            Mode::NarrowbandAmAudio => "AM",
            Mode::NarrowbandFmAudio => "NFM",
            Mode::WidebandFmAudio => "WFM",
            Mode::Ais => "AIS",
            Mode::WidebandSpectrum => "Spectrum",
            Mode::Tpms => "TPMS",
            Mode::LcrFsk => "LCR/FSK",
            Mode::Jammer => "Jammer",
        }
    }

    /// Sampling rate the application normally pairs with this mode.
    pub fn default_sampling_rate(self) -> u32 {
        match self {
            Mode::NarrowbandAmAudio | Mode::NarrowbandFmAudio | Mode::WidebandFmAudio => 3_072_000,
            Mode::Ais | Mode::Tpms => 2_457_600,
            Mode::WidebandSpectrum => 20_000_000,
            Mode::LcrFsk | Mode::Jammer => TX_SAMPLING_RATE,
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.raw())
    }
}

/// Configuration snapshot carried by a `BasebandConfiguration` message.
///
/// Replaced as a whole; `mode` stays raw so unknown values survive the trip
/// through the mailbox and are handled by the factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasebandConfiguration {
    /// Raw mode value
    pub mode: u32,
    /// Sampling rate in Hz
    pub sampling_rate: u32,
    /// Front-end decimation for receive processors (1 = derived from the
    /// sampling rate)
    pub decimation_factor: u32,
}

impl BasebandConfiguration {
    /// Snapshot for a known mode.
    pub fn new(mode: Mode, sampling_rate: u32) -> Self {
        Self::with_raw_mode(mode.raw(), sampling_rate)
    }

    /// Snapshot with an arbitrary (possibly unknown) raw mode.
    pub fn with_raw_mode(mode: u32, sampling_rate: u32) -> Self {
        Self {
            mode,
            sampling_rate,
            decimation_factor: 1,
        }
    }

    pub fn with_decimation(mut self, factor: u32) -> Self {
        self.decimation_factor = factor.max(1);
        self
    }

    /// Decoded mode.
    pub fn mode(&self) -> Option<Mode> {
        Mode::from_raw(self.mode)
    }
}

/// Pacing of the simulated DMA engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimPacing {
    /// Complete transfers at the wall-clock rate of the given sampling rate
    Realtime { sampling_rate: u32 },
    /// Complete transfers as fast as they are released
    FreeRunning,
    /// No clock thread; the owner completes transfers by hand
    Stepped,
}

impl Default for SimPacing {
    fn default() -> Self {
        SimPacing::Realtime {
            sampling_rate: TX_SAMPLING_RATE,
        }
    }
}

/// Runtime configuration of the baseband core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Total baseband DMA buffer size in samples
    pub baseband_buffer_samples: usize,
    /// Number of transfers the baseband buffer is split into
    pub baseband_transfers: usize,
    /// Samples per RSSI transfer
    pub rssi_transfer_samples: usize,
    /// Number of RSSI transfers
    pub rssi_transfers: usize,
    /// RSSI sampling rate in Hz
    pub rssi_sampling_rate: u32,
    /// Records per mailbox direction
    pub mailbox_capacity: usize,
    /// Priority of the baseband runtime thread
    pub baseband_priority: RtPriority,
    /// Priority of the RSSI runtime thread
    pub rssi_priority: RtPriority,
    /// Baseband statistics reporting interval (ms of samples)
    pub baseband_stats_interval_ms: u32,
    /// RSSI statistics reporting interval (ms of samples)
    pub rssi_stats_interval_ms: u32,
    /// Channel statistics reporting interval of receive processors (ms)
    pub channel_stats_interval_ms: u32,
    /// Simulated hardware pacing
    pub sim_pacing: SimPacing,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            baseband_buffer_samples: 8192,
            baseband_transfers: 4,
            rssi_transfer_samples: 400,
            rssi_transfers: 4,
            rssi_sampling_rate: 400_000,
            mailbox_capacity: 16,
            baseband_priority: RtPriority::High,
            rssi_priority: RtPriority::Medium,
            baseband_stats_interval_ms: 1000,
            rssi_stats_interval_ms: 100,
            channel_stats_interval_ms: 100,
            sim_pacing: SimPacing::default(),
        }
    }
}

impl RuntimeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deterministic preset for tests: normal priorities and manual stepping.
    pub fn stepped() -> Self {
        Self {
            baseband_priority: RtPriority::Normal,
            rssi_priority: RtPriority::Normal,
            sim_pacing: SimPacing::Stepped,
            ..Self::default()
        }
    }

    /// Preset for hosted runs without real-time privileges.
    pub fn hosted() -> Self {
        Self {
            baseband_priority: RtPriority::Normal,
            rssi_priority: RtPriority::Normal,
            ..Self::default()
        }
    }

    pub fn with_buffer(mut self, samples: usize, transfers: usize) -> Self {
        self.baseband_buffer_samples = samples;
        self.baseband_transfers = transfers;
        self
    }

    pub fn with_mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = capacity;
        self
    }

    pub fn with_priorities(mut self, baseband: RtPriority, rssi: RtPriority) -> Self {
        self.baseband_priority = baseband;
        self.rssi_priority = rssi;
        self
    }

    pub fn with_stats_intervals(mut self, baseband_ms: u32, rssi_ms: u32) -> Self {
        self.baseband_stats_interval_ms = baseband_ms;
        self.rssi_stats_interval_ms = rssi_ms;
        self
    }

    pub fn with_sim_pacing(mut self, pacing: SimPacing) -> Self {
        self.sim_pacing = pacing;
        self
    }

    /// Samples per baseband transfer.
    pub fn baseband_transfer_samples(&self) -> usize {
        self.baseband_buffer_samples / self.baseband_transfers.max(1)
    }

    /// Check geometry and capacities.
    pub fn validate(&self) -> Result<()> {
        if self.baseband_transfers < 2 {
            return Err(BasebandError::Config(
                "baseband buffer needs at least two transfers".to_string(),
            ));
        }
        if self.baseband_transfer_samples() == 0 {
            return Err(BasebandError::Config(
                "baseband transfer size is zero".to_string(),
            ));
        }
        if self.rssi_transfers == 0 || self.rssi_transfer_samples == 0 {
            return Err(BasebandError::Config("RSSI geometry is empty".to_string()));
        }
        if self.rssi_sampling_rate == 0 {
            return Err(BasebandError::Config("RSSI sampling rate is zero".to_string()));
        }
        if self.mailbox_capacity == 0 {
            return Err(BasebandError::Config("mailbox capacity is zero".to_string()));
        }
        Ok(())
    }
}

/// AFSK transmit surface: framing data and tone parameters for the LCR/FSK
/// generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AfskConfig {
    /// Bytes to send, terminated by 0x00 (at most 256 bytes)
    pub data: Vec<u8>,
    /// Symbol-clock ticks per bit
    pub samples_per_bit: u32,
    /// Tone phase increment for a 1 bit (per symbol-clock tick)
    pub phase_inc_mark: u32,
    /// Tone phase increment for a 0 bit (per symbol-clock tick)
    pub phase_inc_space: u32,
    /// FM deviation per unit of tone amplitude
    pub fm_deviation: i32,
    /// Additional passes after the first
    pub repeat: u32,
}

impl AfskConfig {
    /// Default FM deviation of the AFSK transmitter (Hz).
    pub const DEFAULT_DEVIATION_HZ: f64 = 5_000.0;

    /// Bell 202 tones (1200 Hz mark, 2200 Hz space) at 1200 baud.
    ///
    /// A terminator is appended if `payload` lacks one.
    pub fn bell202(payload: &[u8], repeat: u32) -> Self {
        let clock = FSK_SYMBOL_CLOCK as f64;
        let mut data: Vec<u8> = payload.iter().copied().take(AFSK_DATA_LEN - 1).collect();
        if data.last() != Some(&0) {
            data.push(0);
        }
        Self {
            data,
            samples_per_bit: FSK_SYMBOL_CLOCK / 1200,
            phase_inc_mark: PhaseAccumulator::increment_for(1200.0, clock),
            phase_inc_space: PhaseAccumulator::increment_for(2200.0, clock),
            fm_deviation: FmModulator::deviation_scale(
                Self::DEFAULT_DEVIATION_HZ,
                TX_SAMPLING_RATE as f64,
            ),
            repeat,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.data.len() > AFSK_DATA_LEN {
            return Err(BasebandError::Config(format!(
                "AFSK data is {} bytes, surface holds {}",
                self.data.len(),
                AFSK_DATA_LEN
            )));
        }
        if self.samples_per_bit == 0 {
            return Err(BasebandError::Config("samples_per_bit is zero".to_string()));
        }
        Ok(())
    }
}

impl Default for AfskConfig {
    fn default() -> Self {
        Self::bell202(&[], 0)
    }
}

/// One jammer frequency range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JammerRange {
    /// Whether the hopper visits this range
    pub active: bool,
    /// Center frequency (Hz) announced in the retune message
    pub center: u64,
    /// Sweep width: FM deviation per unit of sweep amplitude
    pub width: i32,
}

impl JammerRange {
    /// Active range sweeping `bandwidth_hz` around `center`.
    pub fn new(center: u64, bandwidth_hz: f64) -> Self {
        Self {
            active: true,
            center,
            width: Self::width_for_bandwidth(bandwidth_hz, TX_SAMPLING_RATE),
        }
    }

    /// Sweep width that covers `bandwidth_hz` (peak-to-peak) at
    /// `sampling_rate`.
    pub fn width_for_bandwidth(bandwidth_hz: f64, sampling_rate: u32) -> i32 {
        FmModulator::deviation_scale(bandwidth_hz / 2.0, sampling_rate as f64)
    }
}

/// Jammer range table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JammerConfig {
    /// Up to 16 ranges; missing entries are inactive
    pub ranges: Vec<JammerRange>,
}

impl JammerConfig {
    pub fn new(ranges: Vec<JammerRange>) -> Self {
        Self { ranges }
    }

    /// Parse `center:bandwidth` pairs, both in Hz (e.g. `433920000:200000`).
    pub fn parse_ranges(specs: &[String]) -> Result<Self> {
        let mut ranges = Vec::with_capacity(specs.len());
        for spec in specs {
            let (center, width) = spec
                .split_once(':')
                .ok_or_else(|| BasebandError::Config(format!("expected center:bandwidth, got '{}'", spec)))?;
            let center: u64 = center
                .trim()
                .parse()
                .map_err(|_| BasebandError::Config(format!("bad center frequency '{}'", center)))?;
            let width: f64 = width
                .trim()
                .parse()
                .map_err(|_| BasebandError::Config(format!("bad bandwidth '{}'", width)))?;
            ranges.push(JammerRange::new(center, width));
        }
        let config = Self { ranges };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.ranges.len() > JAMMER_RANGES {
            return Err(BasebandError::Config(format!(
                "{} jammer ranges, table holds {}",
                self.ranges.len(),
                JAMMER_RANGES
            )));
        }
        Ok(())
    }
}

/// Complete configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub runtime: RuntimeConfig,
    pub afsk: Option<AfskConfig>,
    pub jammer: Option<JammerConfig>,
}

impl CoreConfig {
    /// Load from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: CoreConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.runtime.validate()?;
        if let Some(afsk) = &self.afsk {
            afsk.validate()?;
        }
        if let Some(jammer) = &self.jammer {
            jammer.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_policy_table() {
        for mode in Mode::ALL {
            let expected = match mode.raw() {
                16 | 18 => Direction::Transmit,
                _ => Direction::Receive,
            };
            assert_eq!(mode.direction(), expected, "{}", mode);
            assert_eq!(Mode::from_raw(mode.raw()), Some(mode));
        }
        assert_eq!(Mode::from_raw(15), None);
        assert_eq!(Mode::from_raw(17), None);
        assert_eq!(Mode::from_raw(99), None);
    }

    #[test]
    fn test_transfer_geometry() {
        let config = RuntimeConfig::default();
        assert_eq!(config.baseband_transfer_samples(), 2048);
        assert!(config.validate().is_ok());

        let bad = RuntimeConfig::default().with_buffer(8192, 1);
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_bell202_parameters() {
        let afsk = AfskConfig::bell202(b"AB", 2);
        assert_eq!(afsk.data, vec![b'A', b'B', 0]);
        assert_eq!(afsk.samples_per_bit, 190);
        assert!(afsk.phase_inc_space > afsk.phase_inc_mark);
        assert_eq!(afsk.repeat, 2);

        // Terminator is not doubled
        let afsk = AfskConfig::bell202(&[0x41, 0x00], 0);
        assert_eq!(afsk.data, vec![0x41, 0x00]);
    }

    #[test]
    fn test_afsk_validate() {
        let mut afsk = AfskConfig::default();
        afsk.data = vec![1; AFSK_DATA_LEN + 1];
        assert!(afsk.validate().is_err());
    }

    #[test]
    fn test_parse_jammer_ranges() {
        let specs = vec!["433920000:200000".to_string(), "315000000:1000000".to_string()];
        let config = JammerConfig::parse_ranges(&specs).unwrap();
        assert_eq!(config.ranges.len(), 2);
        assert_eq!(config.ranges[0].center, 433_920_000);
        assert!(config.ranges[0].active);
        assert!(config.ranges[1].width > config.ranges[0].width);

        assert!(JammerConfig::parse_ranges(&["nonsense".to_string()]).is_err());
    }

    #[test]
    fn test_core_config_json() {
        let json = r#"{
            "runtime": { "mailbox_capacity": 8, "rssi_priority": "low" },
            "jammer": { "ranges": [ { "active": true, "center": 1000, "width": 64 } ] }
        }"#;
        let config = CoreConfig::from_json_str(json).unwrap();
        assert_eq!(config.runtime.mailbox_capacity, 8);
        assert_eq!(config.runtime.rssi_priority, RtPriority::Low);
        assert_eq!(config.runtime.baseband_buffer_samples, 8192);
        assert_eq!(config.jammer.unwrap().ranges[0].center, 1000);
        assert!(config.afsk.is_none());
    }

    #[test]
    fn test_core_config_rejects_invalid() {
        let json = r#"{ "runtime": { "mailbox_capacity": 0 } }"#;
        assert!(matches!(
            CoreConfig::from_json_str(json),
            Err(BasebandError::Config(_))
        ));
        assert!(matches!(
            CoreConfig::from_json_str("{ not json"),
            Err(BasebandError::Json(_))
        ));
    }
}
