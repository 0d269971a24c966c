//! # Real-Time Primitives
//!
//! Building blocks shared by the runtime threads and the dispatcher:
//!
//! - **Ring buffer**: the lock-free SPSC ring under each mailbox queue
//! - **Event flags**: the event mask the dispatcher blocks on
//! - **RT thread spawning**: priority and CPU affinity for the runtime loops
//!
//! ## Example
//!
//! ```rust
//! use baseband_core::rt::{EventFlags, EVT_MASK_BASEBAND, ALL_EVENTS};
//!
//! let events = EventFlags::new();
//! events.signal(EVT_MASK_BASEBAND);
//! assert_eq!(events.wait_any(ALL_EVENTS), EVT_MASK_BASEBAND);
//! ```

mod events;
mod ringbuffer;
mod thread;

pub use events::{EventFlags, EventMask, ALL_EVENTS, EVT_MASK_BASEBAND, EVT_MASK_SPECTRUM, EVT_MASK_STOP};
pub use ringbuffer::{RingBuffer, RingError};
pub use thread::{spawn_rt_thread, RtConfig, RtError, RtPriority};
