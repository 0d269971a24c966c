//! # Baseband Core
//!
//! The real-time core of an SDR baseband coprocessor. It pulls complex
//! sample buffers from a DMA engine, runs them through the active processor,
//! synthesizes transmit waveforms sample by sample, and talks to the
//! application core over a shared-memory mailbox.
//!
//! ## Overview
//!
//! - **Runtime threads**: the baseband loop (one `execute` per DMA transfer,
//!   deadline accounting, statistics) and the independent RSSI loop.
//! - **Event dispatcher**: drains the inbound mailbox, routes messages to
//!   handlers, services the spectrum-ready event.
//! - **Hot-swap**: configuration messages replace the active processor and
//!   transfer direction without racing the runtime thread.
//! - **DDS**: 32-bit phase accumulators over a 1024-entry sine table, FM
//!   modulation, the LCR/AFSK generator and the frequency-hopping jammer.
//!
//! ## Data Flow
//!
//! ```text
//! DMA ──► baseband runtime ──► Processor::execute ──► stats ──► application_queue ──► app
//! app ──► baseband_queue ──► EventDispatcher ──► handler ──► BasebandContext (hot-swap)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//! use baseband_core::prelude::*;
//!
//! let config = CoreConfig {
//!     runtime: RuntimeConfig::hosted().with_sim_pacing(SimPacing::FreeRunning),
//!     afsk: Some(AfskConfig::bell202(b"HI", 0)),
//!     ..Default::default()
//! };
//! let sim = SimulatedHardware::new(&config.runtime, RxSource::Silence);
//! let baseband = Baseband::start(config, sim.hardware()).unwrap();
//! let link = baseband.link();
//! let stop = baseband.stop_handle();
//!
//! let app = std::thread::spawn(move || {
//!     link.configure(BasebandConfiguration::new(Mode::LcrFsk, 2_280_000)).unwrap();
//!     let seen = link.collect_until(Duration::from_secs(10), |m| *m == Message::TxDone { n: 0 });
//!     stop.request_stop();
//!     seen
//! });
//! baseband.run();
//! assert!(app.join().unwrap().contains(&Message::TxDone { n: 0 }));
//! ```

pub mod config;
pub mod context;
pub mod dds;
pub mod dispatcher;
pub mod error;
pub mod hal;
pub mod mailbox;
pub mod message;
pub mod processor;
pub mod rt;
pub mod runtime;
pub mod shared;
pub mod sim;
pub mod stats;
pub mod system;
pub mod types;

// Re-export main types
pub use config::{AfskConfig, BasebandConfiguration, CoreConfig, JammerConfig, Mode, RuntimeConfig};
pub use context::{BasebandContext, SwapOutcome};
pub use dds::{FmModulator, PhaseAccumulator};
pub use dispatcher::{EventDispatcher, StopHandle};
pub use error::{BasebandError, Result};
pub use message::{Message, MessageId};
pub use processor::Processor;
pub use shared::{AppLink, SharedMemory};
pub use system::Baseband;
pub use types::{Direction, Iq8, SampleBuffer};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{
        AfskConfig, BasebandConfiguration, CoreConfig, JammerConfig, JammerRange, Mode,
        RuntimeConfig, SimPacing,
    };
    pub use crate::message::Message;
    pub use crate::shared::AppLink;
    pub use crate::sim::{RxSource, SimulatedHardware};
    pub use crate::system::Baseband;
    pub use crate::types::{Direction, Iq8};
}
