//! # Baseband System
//!
//! Boots the core against a set of drivers and runs it to shutdown.
//!
//! ```text
//!  Baseband::start                       Baseband::run (caller's thread)
//!  ───────────────                       ────────────────────────────────
//!  DMA init (fatal on error)             dispatcher loop until Shutdown or
//!  RSSI init                              StopHandle::request_stop
//!  shared memory + external surfaces     quiesce, halt drivers
//!  spawn "rssi"     (RtPriority Medium)  join runtime threads
//!  spawn "baseband" (RtPriority High)    publish Shutdown to the app
//!  register handlers
//! ```
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//! use baseband_core::config::{BasebandConfiguration, CoreConfig, Mode, RuntimeConfig};
//! use baseband_core::message::Message;
//! use baseband_core::sim::{RxSource, SimulatedHardware};
//! use baseband_core::system::Baseband;
//!
//! let config = CoreConfig { runtime: RuntimeConfig::stepped(), ..Default::default() };
//! let sim = SimulatedHardware::new(&config.runtime, RxSource::Silence);
//! let baseband = Baseband::start(config, sim.hardware()).unwrap();
//! let link = baseband.link();
//!
//! link.configure(BasebandConfiguration::new(Mode::Ais, 2_457_600)).unwrap();
//! link.shutdown().unwrap();
//! baseband.run();
//!
//! let last = link.collect_until(Duration::from_secs(1), |m| *m == Message::Shutdown);
//! assert_eq!(last.last(), Some(&Message::Shutdown));
//! ```

use std::sync::Arc;
use std::thread::JoinHandle;

use tracing::{error, info};

use crate::config::{CoreConfig, RuntimeConfig};
use crate::context::BasebandContext;
use crate::dispatcher::{EventDispatcher, StopHandle};
use crate::error::{BasebandError, Result};
use crate::hal::Hardware;
use crate::message::{Message, MessageId};
use crate::rt::{spawn_rt_thread, EventFlags, RtConfig, RtPriority};
use crate::runtime::{BasebandRuntime, RssiRuntime};
use crate::shared::{AppLink, SharedMemory};
use crate::stats::RuntimeCounters;
use crate::types::Direction;

/// Summary returned by [`Baseband::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    pub buffers: u64,
    pub executed: u64,
    pub overruns: u64,
    /// Records dropped on the application queue
    pub dropped: u32,
}

/// A running baseband core.
#[derive(Debug)]
pub struct Baseband {
    config: RuntimeConfig,
    shared: Arc<SharedMemory>,
    events: Arc<EventFlags>,
    context: Arc<BasebandContext>,
    counters: Arc<RuntimeCounters>,
    dispatcher: EventDispatcher,
    threads: Vec<JoinHandle<()>>,
}

impl Baseband {
    /// Bring up the drivers and runtime threads.
    ///
    /// A DMA initialization failure is fatal and nothing is started.
    pub fn start(config: CoreConfig, hardware: Hardware) -> Result<Self> {
        config.validate()?;
        let runtime = config.runtime.clone();

        hardware.dma.init()?;
        hardware.rssi.init()?;

        let shared = Arc::new(SharedMemory::new(runtime.mailbox_capacity));
        if let Some(afsk) = &config.afsk {
            shared.afsk.store(afsk);
        }
        if let Some(jammer) = &config.jammer {
            shared.jammer.store(jammer);
        }

        let events = Arc::new(EventFlags::new());
        let context = Arc::new(BasebandContext::new(
            Arc::clone(&shared),
            Arc::clone(&events),
            hardware.clone(),
            &runtime,
        ));
        hardware.dma.configure(context.geometry(), Direction::Receive);

        let counters = Arc::new(RuntimeCounters::new());
        let mut threads = Vec::with_capacity(2);

        let rssi = RssiRuntime::new(
            Arc::clone(&hardware.rssi),
            Arc::clone(&shared),
            runtime.rssi_sampling_rate,
            runtime.rssi_stats_interval_ms,
        );
        match spawn("rssi", runtime.rssi_priority, move || rssi.run()) {
            Ok(handle) => threads.push(handle),
            Err(e) => {
                hardware.rssi.halt();
                hardware.dma.halt();
                return Err(e);
            }
        }

        let baseband = BasebandRuntime::new(
            Arc::clone(&context),
            Arc::clone(&counters),
            runtime.baseband_stats_interval_ms,
        );
        match spawn("baseband", runtime.baseband_priority, move || baseband.run()) {
            Ok(handle) => threads.push(handle),
            Err(e) => {
                hardware.rssi.halt();
                hardware.dma.halt();
                join_all(threads);
                return Err(e);
            }
        }

        let mut dispatcher = EventDispatcher::new(Arc::clone(&context), Arc::clone(&events));
        {
            let context = Arc::clone(&context);
            dispatcher.register_handler(MessageId::BasebandConfiguration, move |message| {
                if let Message::BasebandConfiguration(configuration) = message {
                    context.apply_configuration(*configuration);
                }
            });
        }
        {
            let stop = dispatcher.stop_handle();
            dispatcher.register_handler(MessageId::Shutdown, move |_| {
                info!("shutdown requested by the application");
                stop.request_stop();
            });
        }

        info!(
            buffer = runtime.baseband_buffer_samples,
            transfers = runtime.baseband_transfers,
            mailbox = runtime.mailbox_capacity,
            "baseband core started"
        );

        Ok(Self {
            config: runtime,
            shared,
            events,
            context,
            counters,
            dispatcher,
            threads,
        })
    }

    /// Application-side handle to the mailbox and shared surfaces.
    pub fn link(&self) -> AppLink {
        AppLink::new(Arc::clone(&self.shared), Arc::clone(&self.events))
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.dispatcher.stop_handle()
    }

    pub fn context(&self) -> &Arc<BasebandContext> {
        &self.context
    }

    pub fn counters(&self) -> &RuntimeCounters {
        &self.counters
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Run the dispatcher on this thread until stopped, then shut down.
    pub fn run(mut self) -> ShutdownReport {
        self.dispatcher.run();

        self.context.shutdown();
        let hw = self.context.hardware();
        hw.dma.halt();
        hw.rssi.halt();
        join_all(std::mem::take(&mut self.threads));

        self.shared.publish(&Message::Shutdown);

        let report = ShutdownReport {
            buffers: self.counters.buffers(),
            executed: self.counters.executed(),
            overruns: self.counters.overruns(),
            dropped: self.shared.application_queue.dropped(),
        };
        info!(?report, "baseband core stopped");
        report
    }
}

fn spawn<F>(name: &str, priority: RtPriority, f: F) -> Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    let config = RtConfig::new(name).with_priority(priority);
    spawn_rt_thread(config, f).map_err(|e| BasebandError::ThreadSpawn {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

fn join_all(threads: Vec<JoinHandle<()>>) {
    for handle in threads {
        let name = handle.thread().name().unwrap_or("runtime").to_string();
        if handle.join().is_err() {
            error!(thread = %name, "runtime thread panicked");
        }
    }
}
