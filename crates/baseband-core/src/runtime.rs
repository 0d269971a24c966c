//! # Runtime Threads
//!
//! Two real-time loops, each suspended only in its driver wait:
//!
//! - [`BasebandRuntime`]: wait for the next transfer in the current
//!   direction, run the active processor over it, account execute time
//!   against the buffer period, publish `BasebandStatistics` once per window,
//!   hand the transfer back.
//! - [`RssiRuntime`]: wait for RSSI transfers, publish `RssiStatistics` once
//!   per window. Independent of the active processor.
//!
//! Both loops end when their driver is halted (the wait returns `None`).

use std::sync::Arc;

use tracing::{info, warn};

use crate::context::BasebandContext;
use crate::hal::RssiSampler;
use crate::message::Message;
use crate::shared::SharedMemory;
use crate::stats::{BasebandStatsCollector, RssiStatsCollector, RuntimeCounters};
use crate::types::Direction;

/// The baseband loop.
#[derive(Debug, Clone)]
pub struct BasebandRuntime {
    context: Arc<BasebandContext>,
    counters: Arc<RuntimeCounters>,
    stats_interval_ms: u32,
}

impl BasebandRuntime {
    pub fn new(context: Arc<BasebandContext>, counters: Arc<RuntimeCounters>, stats_interval_ms: u32) -> Self {
        Self {
            context,
            counters,
            stats_interval_ms,
        }
    }

    pub fn run(&self) {
        let dma = &self.context.hardware().dma;
        let shared = self.context.shared();
        let mut stats = BasebandStatsCollector::new(self.stats_interval_ms);
        info!("baseband runtime started");

        loop {
            let transfer = match self.context.direction() {
                Direction::Receive => dma.wait_for_rx_buffer(),
                Direction::Transmit => dma.wait_for_tx_buffer(),
            };
            let Some(mut transfer) = transfer else {
                break;
            };

            let outcome = self.context.process_buffer(&mut transfer);

            // Without a configured rate there is no window and no deadline.
            let overran = outcome.sampling_rate != 0
                && stats.process(
                    outcome.count,
                    outcome.sampling_rate,
                    outcome.executed.unwrap_or_default(),
                    shared.application_queue.dropped(),
                    |s| {
                        shared.publish(&Message::BasebandStatistics(s));
                    },
                );
            dma.release(transfer);

            self.counters.record(outcome.executed, overran);
            if overran {
                let overruns = self.counters.overruns();
                if overruns.is_power_of_two() {
                    warn!(
                        overruns,
                        execute_us = outcome.executed.unwrap_or_default().as_micros() as u64,
                        samples = outcome.count,
                        rate = outcome.sampling_rate,
                        "execute overran the buffer period"
                    );
                }
            }
        }

        info!(
            buffers = self.counters.buffers(),
            executed = self.counters.executed(),
            overruns = self.counters.overruns(),
            "baseband runtime stopped"
        );
    }
}

/// The RSSI loop.
#[derive(Clone)]
pub struct RssiRuntime {
    rssi: Arc<dyn RssiSampler>,
    shared: Arc<SharedMemory>,
    sampling_rate: u32,
    stats_interval_ms: u32,
}

impl RssiRuntime {
    pub fn new(
        rssi: Arc<dyn RssiSampler>,
        shared: Arc<SharedMemory>,
        sampling_rate: u32,
        stats_interval_ms: u32,
    ) -> Self {
        Self {
            rssi,
            shared,
            sampling_rate,
            stats_interval_ms,
        }
    }

    pub fn run(&self) {
        let mut stats = RssiStatsCollector::new(self.stats_interval_ms);
        let mut buffers: u64 = 0;
        info!(rate = self.sampling_rate, "rssi runtime started");

        while let Some(transfer) = self.rssi.wait_for_buffer() {
            buffers += 1;
            stats.process(&transfer.samples, self.sampling_rate, |s| {
                self.shared.publish(&Message::RssiStatistics(s));
            });
            self.rssi.release(transfer);
        }

        info!(buffers, "rssi runtime stopped");
    }
}

impl std::fmt::Debug for RssiRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RssiRuntime")
            .field("sampling_rate", &self.sampling_rate)
            .field("stats_interval_ms", &self.stats_interval_ms)
            .finish()
    }
}
