//! # Statistics Collectors
//!
//! Window aggregators run by the runtime threads and receive processors.
//! Each collector accumulates per buffer and calls its publish callback once
//! a reporting window (a number of samples derived from the sampling rate and
//! the configured interval) has elapsed. The snapshot handed to the callback
//! is a fresh value; the collector starts a new window afterwards.
//!
//! [`RuntimeCounters`] holds lifetime totals that other threads may read
//! while the runtime is running.
//!
//! ## Example
//!
//! ```rust
//! use baseband_core::stats::RssiStatsCollector;
//!
//! let mut stats = RssiStatsCollector::new(1);
//! let mut published = Vec::new();
//! stats.process(&[100; 400], 400_000, |s| published.push(s));
//! assert_eq!(published.len(), 1);
//! assert_eq!(published[0].mean(), 100);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::message::{BasebandStatistics, ChannelStatistics, RssiStatistics};
use crate::types::{buffer_period, IqF32};

/// Samples in a window of `interval_ms` at `sampling_rate`, at least 1.
pub fn window_samples(sampling_rate: u32, interval_ms: u32) -> u64 {
    (sampling_rate as u64 * interval_ms as u64 / 1000).max(1)
}

fn saturate(v: u64) -> u32 {
    v.min(u32::MAX as u64) as u32
}

/// Lock-free lifetime counters of the baseband runtime.
#[derive(Debug, Default)]
pub struct RuntimeCounters {
    buffers: AtomicU64,
    executed: AtomicU64,
    overruns: AtomicU64,
    max_execute_ns: AtomicU64,
}

impl RuntimeCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one drained buffer and, if a processor ran, its execute time.
    pub fn record(&self, execute: Option<Duration>, overran: bool) {
        self.buffers.fetch_add(1, Ordering::Relaxed);
        if let Some(execute) = execute {
            self.executed.fetch_add(1, Ordering::Relaxed);
            self.max_execute_ns
                .fetch_max(execute.as_nanos() as u64, Ordering::Relaxed);
        }
        if overran {
            self.overruns.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Buffers taken from the DMA engine.
    pub fn buffers(&self) -> u64 {
        self.buffers.load(Ordering::Relaxed)
    }

    /// Buffers handed to a processor.
    pub fn executed(&self) -> u64 {
        self.executed.load(Ordering::Relaxed)
    }

    /// Buffers whose processing overran the buffer period.
    pub fn overruns(&self) -> u64 {
        self.overruns.load(Ordering::Relaxed)
    }

    pub fn max_execute(&self) -> Duration {
        Duration::from_nanos(self.max_execute_ns.load(Ordering::Relaxed))
    }
}

/// Aggregates per-buffer timing of the baseband runtime.
#[derive(Debug, Clone)]
pub struct BasebandStatsCollector {
    interval_ms: u32,
    buffers: u32,
    samples: u64,
    busy: Duration,
    max_execute: Duration,
    overruns: u32,
}

impl BasebandStatsCollector {
    pub fn new(interval_ms: u32) -> Self {
        Self {
            interval_ms,
            buffers: 0,
            samples: 0,
            busy: Duration::ZERO,
            max_execute: Duration::ZERO,
            overruns: 0,
        }
    }

    /// Whether `execute` took longer than the buffer it processed.
    pub fn is_overrun(count: usize, sampling_rate: u32, execute: Duration) -> bool {
        sampling_rate != 0 && execute > buffer_period(count, sampling_rate)
    }

    /// Account one buffer. Returns whether it overran its deadline.
    pub fn process<F>(
        &mut self,
        count: usize,
        sampling_rate: u32,
        execute: Duration,
        messages_dropped: u32,
        publish: F,
    ) -> bool
    where
        F: FnOnce(BasebandStatistics),
    {
        let overran = Self::is_overrun(count, sampling_rate, execute);
        if overran {
            self.overruns = self.overruns.saturating_add(1);
        }

        self.buffers = self.buffers.saturating_add(1);
        self.samples += count as u64;
        self.busy += execute;
        self.max_execute = self.max_execute.max(execute);

        if self.samples >= window_samples(sampling_rate, self.interval_ms) {
            let window = buffer_period(self.samples as usize, sampling_rate);
            let load_permille = if window.is_zero() {
                0
            } else {
                saturate((self.busy.as_nanos() * 1000 / window.as_nanos()) as u64)
            };
            publish(BasebandStatistics {
                buffer_count: self.buffers,
                sample_count: saturate(self.samples),
                max_execute_us: saturate(self.max_execute.as_micros() as u64),
                load_permille,
                deadline_overruns: self.overruns,
                messages_dropped,
            });
            self.buffers = 0;
            self.samples = 0;
            self.busy = Duration::ZERO;
            self.max_execute = Duration::ZERO;
        }
        overran
    }

    /// Overruns since creation.
    pub fn overruns(&self) -> u32 {
        self.overruns
    }
}

/// Aggregates raw RSSI readings.
#[derive(Debug, Clone)]
pub struct RssiStatsCollector {
    interval_ms: u32,
    current: RssiStatistics,
}

impl RssiStatsCollector {
    pub fn new(interval_ms: u32) -> Self {
        Self {
            interval_ms,
            current: Self::empty(),
        }
    }

    fn empty() -> RssiStatistics {
        RssiStatistics {
            accumulator: 0,
            count: 0,
            min: u8::MAX,
            max: u8::MIN,
        }
    }

    pub fn process<F>(&mut self, samples: &[u8], sampling_rate: u32, publish: F)
    where
        F: FnOnce(RssiStatistics),
    {
        for &v in samples {
            self.current.accumulator = self.current.accumulator.wrapping_add(v as u32);
            self.current.min = self.current.min.min(v);
            self.current.max = self.current.max.max(v);
        }
        self.current.count = self.current.count.saturating_add(samples.len() as u32);

        if self.current.count as u64 >= window_samples(sampling_rate, self.interval_ms) {
            publish(self.current);
            self.current = Self::empty();
        }
    }
}

/// Tracks peak channel power of a receive processor.
#[derive(Debug, Clone)]
pub struct ChannelStatsCollector {
    interval_ms: u32,
    max_power: f32,
    count: u64,
}

impl ChannelStatsCollector {
    /// Power floor reported for an all-zero window (dB).
    pub const FLOOR_DB: i32 = -120;

    pub fn new(interval_ms: u32) -> Self {
        Self {
            interval_ms,
            max_power: 0.0,
            count: 0,
        }
    }

    /// Account channel samples (full scale = 1.0) at `sampling_rate`.
    pub fn process<F>(&mut self, samples: &[IqF32], sampling_rate: u32, publish: F)
    where
        F: FnOnce(ChannelStatistics),
    {
        for s in samples {
            self.max_power = self.max_power.max(s.norm_sqr());
        }
        self.count += samples.len() as u64;

        if self.count >= window_samples(sampling_rate, self.interval_ms) {
            let max_db = if self.max_power > 0.0 {
                ((10.0 * self.max_power.log10()).round() as i32).max(Self::FLOOR_DB)
            } else {
                Self::FLOOR_DB
            };
            publish(ChannelStatistics {
                max_db,
                count: saturate(self.count),
            });
            self.max_power = 0.0;
            self.count = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_samples() {
        assert_eq!(window_samples(400_000, 100), 40_000);
        assert_eq!(window_samples(0, 100), 1);
    }

    #[test]
    fn test_baseband_window_and_load() {
        // 1000 samples per buffer at 1 MHz = 1 ms per buffer; 10 ms window
        let mut stats = BasebandStatsCollector::new(10);
        let mut published = Vec::new();
        for _ in 0..9 {
            stats.process(1000, 1_000_000, Duration::from_micros(250), 0, |s| published.push(s));
        }
        assert!(published.is_empty());
        stats.process(1000, 1_000_000, Duration::from_micros(250), 3, |s| published.push(s));

        assert_eq!(published.len(), 1);
        let s = published[0];
        assert_eq!(s.buffer_count, 10);
        assert_eq!(s.sample_count, 10_000);
        assert_eq!(s.max_execute_us, 250);
        assert_eq!(s.load_permille, 250);
        assert_eq!(s.deadline_overruns, 0);
        assert_eq!(s.messages_dropped, 3);
    }

    #[test]
    fn test_baseband_overrun_detection() {
        let mut stats = BasebandStatsCollector::new(1000);
        assert!(!stats.process(1000, 1_000_000, Duration::from_micros(999), 0, |_| {}));
        assert!(stats.process(1000, 1_000_000, Duration::from_micros(1001), 0, |_| {}));
        assert_eq!(stats.overruns(), 1);
        // No configured rate: no deadline to miss
        assert!(!stats.process(1000, 0, Duration::from_secs(1), 0, |_| {}));
    }

    #[test]
    fn test_rssi_min_max_mean() {
        let mut stats = RssiStatsCollector::new(1);
        let mut published = None;
        let readings: Vec<u8> = (0..400).map(|i| 100 + (i % 21) as u8).collect();
        stats.process(&readings, 400_000, |s| published = Some(s));

        let s = published.unwrap();
        assert_eq!(s.count, 400);
        assert_eq!(s.min, 100);
        assert_eq!(s.max, 120);
        assert!((109..=111).contains(&s.mean()));
    }

    #[test]
    fn test_rssi_window_spans_buffers() {
        // 100 ms at 400 kHz = 40000 readings = 100 buffers of 400
        let mut stats = RssiStatsCollector::new(100);
        let mut count = 0;
        for _ in 0..250 {
            stats.process(&[50; 400], 400_000, |_| count += 1);
        }
        assert_eq!(count, 2);
    }

    #[test]
    fn test_channel_power_db() {
        let mut stats = ChannelStatsCollector::new(1);
        let mut published = None;
        let samples = vec![IqF32::new(0.1, 0.0); 48];
        stats.process(&samples, 48_000, |s| published = Some(s));
        let s = published.unwrap();
        assert_eq!(s.max_db, -20);
        assert_eq!(s.count, 48);

        let mut published = None;
        stats.process(&[IqF32::new(0.0, 0.0); 48], 48_000, |s| published = Some(s));
        assert_eq!(published.unwrap().max_db, ChannelStatsCollector::FLOOR_DB);
    }

    #[test]
    fn test_runtime_counters() {
        let counters = RuntimeCounters::new();
        counters.record(None, false);
        counters.record(Some(Duration::from_micros(40)), true);
        counters.record(Some(Duration::from_micros(10)), false);
        assert_eq!(counters.buffers(), 3);
        assert_eq!(counters.executed(), 2);
        assert_eq!(counters.overruns(), 1);
        assert_eq!(counters.max_execute(), Duration::from_micros(40));
    }
}
