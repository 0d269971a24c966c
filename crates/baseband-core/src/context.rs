//! # Runtime Context
//!
//! The single owner of the active processor, its configuration snapshot and
//! the transfer direction. The baseband runtime thread reads it once per
//! buffer; the dispatcher replaces its contents through
//! [`BasebandContext::apply_configuration`].
//!
//! ## Hot-swap
//!
//! ```text
//! dispatcher                               runtime thread
//! ──────────                               ──────────────
//! mute, DMA off, RSSI off  (if active)
//! lock ─ take processor ─ unlock           sees None: drains buffers
//! drop old processor
//! build new processor
//! RSSI on (Rx), DMA on, RSSI off (Tx)
//! DMA configure
//! lock ─ install {processor, config,       sees new processor with its own
//!                 direction} ─ unlock       config and direction
//! ```
//!
//! `execute` runs with the slot locked, so a processor is never dropped while
//! it runs and never executes against a configuration it was not built for.
//! Transfers still in flight from the old direction are drained without
//! processing.
//!
//! The dispatcher holds the lock only for slot and snapshot updates and for
//! `update_spectrum`. Hardware calls happen outside it, as do processor
//! construction and drop, so the runtime thread waits for at most one such
//! section per buffer.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::config::{BasebandConfiguration, RuntimeConfig};
use crate::hal::{BufferGeometry, DmaTransfer, Hardware};
use crate::processor::{Processor, ProcessorContext};
use crate::rt::EventFlags;
use crate::shared::SharedMemory;
use crate::types::{Direction, Iq8, SampleBuffer};

/// What a configuration message did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapOutcome {
    /// A new processor was installed.
    Rebuilt,
    /// The mode is unknown; no processor is active.
    NoProcessor,
    /// Same mode as before; only the snapshot changed.
    Refreshed,
}

/// Result of handing one transfer to the context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferOutcome {
    /// Execute time, if a processor ran
    pub executed: Option<Duration>,
    /// Sampling rate the buffer was tagged with
    pub sampling_rate: u32,
    /// Samples in the buffer
    pub count: usize,
}

/// Point-in-time view of the active slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSnapshot {
    pub processor: Option<&'static str>,
    pub configuration: Option<BasebandConfiguration>,
    pub direction: Direction,
    /// Bumped on every processor install
    pub instance: u64,
}

#[derive(Debug, Default)]
struct ActiveState {
    processor: Option<Processor>,
    configuration: Option<BasebandConfiguration>,
    direction: Direction,
    instance: u64,
}

/// Shared runtime state of the baseband core.
#[derive(Debug)]
pub struct BasebandContext {
    shared: Arc<SharedMemory>,
    events: Arc<EventFlags>,
    hardware: Hardware,
    geometry: BufferGeometry,
    channel_stats_interval_ms: u32,
    active: Mutex<ActiveState>,
}

impl BasebandContext {
    pub fn new(
        shared: Arc<SharedMemory>,
        events: Arc<EventFlags>,
        hardware: Hardware,
        config: &RuntimeConfig,
    ) -> Self {
        Self {
            shared,
            events,
            hardware,
            geometry: BufferGeometry::new(
                config.baseband_transfer_samples(),
                config.baseband_transfers,
            ),
            channel_stats_interval_ms: config.channel_stats_interval_ms,
            active: Mutex::new(ActiveState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ActiveState> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn shared(&self) -> &SharedMemory {
        &self.shared
    }

    pub fn events(&self) -> &EventFlags {
        &self.events
    }

    pub fn hardware(&self) -> &Hardware {
        &self.hardware
    }

    pub fn geometry(&self) -> BufferGeometry {
        self.geometry
    }

    /// Direction the runtime thread should wait on.
    pub fn direction(&self) -> Direction {
        self.lock().direction
    }

    pub fn snapshot(&self) -> ActiveSnapshot {
        let state = self.lock();
        ActiveSnapshot {
            processor: state.processor.as_ref().map(Processor::name),
            configuration: state.configuration,
            direction: state.direction,
            instance: state.instance,
        }
    }

    fn processor_context(&self) -> ProcessorContext<'_> {
        ProcessorContext {
            shared: &self.shared,
            audio: &*self.hardware.audio,
            events: &self.events,
            stats_interval_ms: self.channel_stats_interval_ms,
        }
    }

    /// Handle a configuration message.
    pub fn apply_configuration(&self, configuration: BasebandConfiguration) -> SwapOutcome {
        let refreshed = {
            let mut state = self.lock();
            if state.configuration.map(|c| c.mode) == Some(configuration.mode) {
                state.configuration = Some(configuration);
                Some(state.direction)
            } else {
                None
            }
        };
        if let Some(direction) = refreshed {
            self.hardware.dma.configure(self.geometry, direction);
            debug!(mode = configuration.mode, rate = configuration.sampling_rate, "configuration refreshed");
            return SwapOutcome::Refreshed;
        }

        let hw = &self.hardware;
        let had_processor = self.lock().processor.is_some();
        if had_processor {
            hw.audio.mute();
            hw.dma.disable();
            hw.rssi.stop();
        }

        let old = self.detach();
        let old_name = old.as_ref().map(Processor::name);
        drop(old);

        let mode = configuration.mode();
        let processor = mode.map(Processor::for_mode);
        let direction = match mode {
            Some(mode) => {
                let direction = mode.direction();
                if direction == Direction::Receive {
                    hw.rssi.start();
                }
                hw.dma.enable(direction);
                if direction != Direction::Receive {
                    hw.rssi.stop();
                }
                if mode.is_audio() {
                    hw.audio.unmute();
                }
                direction
            }
            None => self.direction(),
        };

        hw.dma.configure(self.geometry, direction);

        let outcome = if processor.is_some() {
            SwapOutcome::Rebuilt
        } else {
            SwapOutcome::NoProcessor
        };
        let new_name = processor.as_ref().map(Processor::name);
        self.install(processor, configuration, direction);

        match outcome {
            SwapOutcome::NoProcessor => info!(
                mode = configuration.mode,
                from = ?old_name,
                "unknown mode, no active processor"
            ),
            _ => info!(
                mode = configuration.mode,
                from = ?old_name,
                to = ?new_name,
                direction = %direction,
                rate = configuration.sampling_rate,
                "processor swapped"
            ),
        }
        outcome
    }

    /// Detach the active processor; the slot reads as empty afterwards.
    pub(crate) fn detach(&self) -> Option<Processor> {
        self.lock().processor.take()
    }

    /// Install a processor together with the snapshot it was built for.
    pub(crate) fn install(
        &self,
        processor: Option<Processor>,
        configuration: BasebandConfiguration,
        direction: Direction,
    ) {
        let mut state = self.lock();
        state.processor = processor;
        state.configuration = Some(configuration);
        state.direction = direction;
        state.instance += 1;
    }

    /// Run the active processor over one transfer.
    ///
    /// Transfers from another direction, or with no active processor, are
    /// drained; transmit transfers drained that way go out as silence.
    pub fn process_buffer(&self, transfer: &mut DmaTransfer) -> BufferOutcome {
        let count = transfer.samples.len();
        let mut state = self.lock();
        let sampling_rate = state.configuration.map_or(0, |c| c.sampling_rate);
        let decimation = state.configuration.map_or(1, |c| c.decimation_factor);
        let direction = state.direction;

        let executed = match state.processor.as_mut() {
            Some(processor) if transfer.direction == direction => {
                let mut buffer =
                    SampleBuffer::new(&mut transfer.samples, sampling_rate).with_decimation(decimation);
                let ctx = self.processor_context();
                let start = Instant::now();
                processor.execute(&mut buffer, &ctx);
                Some(start.elapsed())
            }
            _ => None,
        };
        drop(state);

        if executed.is_none() && transfer.direction == Direction::Transmit {
            transfer.samples.fill(Iq8::new(0, 0));
        }
        BufferOutcome {
            executed,
            sampling_rate,
            count,
        }
    }

    /// Let the active processor publish its spectrum.
    pub fn update_spectrum(&self) {
        let mut state = self.lock();
        if let Some(processor) = state.processor.as_mut() {
            processor.update_spectrum(&self.processor_context());
        }
    }

    /// Quiesce the hardware and drop the active processor.
    pub fn shutdown(&self) {
        let hw = &self.hardware;
        hw.audio.mute();
        hw.dma.disable();
        hw.rssi.stop();
        if let Some(old) = self.detach() {
            debug!(processor = old.name(), "processor released at shutdown");
        }
    }
}

#[cfg(test)]
pub(crate) mod tracer {
    use std::sync::{Arc, Mutex};

    use crate::types::SampleBuffer;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum TracerEvent {
        Constructed(u64),
        Executed(u64),
        DestroyBegin(u64),
    }

    pub type TracerLog = Arc<Mutex<Vec<TracerEvent>>>;

    /// Processor stand-in that records its lifecycle.
    #[derive(Debug)]
    pub struct Tracer {
        id: u64,
        log: TracerLog,
    }

    impl Tracer {
        pub fn new(id: u64, log: &TracerLog) -> Self {
            log.lock().unwrap().push(TracerEvent::Constructed(id));
            Self {
                id,
                log: Arc::clone(log),
            }
        }

        pub fn execute(&mut self, buffer: &mut SampleBuffer<'_>) {
            self.log.lock().unwrap().push(TracerEvent::Executed(self.id));
            buffer.silence();
        }
    }

    impl Drop for Tracer {
        fn drop(&mut self) {
            if let Ok(mut log) = self.log.lock() {
                log.push(TracerEvent::DestroyBegin(self.id));
            }
        }
    }
}
