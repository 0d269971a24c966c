//! # Event Dispatcher
//!
//! The control-plane loop of the baseband core. It blocks on the event mask
//! and, on wake:
//!
//! 1. drains the inbound mailbox completely, handing each message to the
//!    handler registered for its id (ids without a handler are ignored);
//! 2. lets the active processor publish its spectrum if one is ready;
//! 3. re-checks the running flag.
//!
//! Stopping is cooperative: [`StopHandle::request_stop`] clears the flag and
//! raises a dedicated stop event so the loop wakes promptly. Buffer
//! processing in flight on the runtime thread is never interrupted.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::context::BasebandContext;
use crate::message::{Message, MessageError, MessageId};
use crate::rt::{EventFlags, ALL_EVENTS, EVT_MASK_BASEBAND, EVT_MASK_SPECTRUM, EVT_MASK_STOP};

/// Callback invoked for every message of one id.
pub type MessageHandler = Box<dyn FnMut(&Message) + Send>;

/// Handlers by message id. Populated once at startup.
#[derive(Default)]
pub struct MessageHandlerMap {
    handlers: HashMap<MessageId, MessageHandler>,
}

impl MessageHandlerMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `id`. A second registration for the same id
    /// replaces the first and is reported as a configuration mistake.
    pub fn register_handler<F>(&mut self, id: MessageId, handler: F)
    where
        F: FnMut(&Message) + Send + 'static,
    {
        if self.handlers.insert(id, Box::new(handler)).is_some() {
            warn!(?id, "handler registered twice, last registration wins");
        }
    }

    pub fn contains(&self, id: MessageId) -> bool {
        self.handlers.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Hand `message` to its handler. Returns false if none is registered.
    pub fn send(&mut self, message: &Message) -> bool {
        match self.handlers.get_mut(&message.id()) {
            Some(handler) => {
                handler(message);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for MessageHandlerMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.handlers.keys()).finish()
    }
}

/// Requests the dispatcher loop to end.
#[derive(Debug, Clone)]
pub struct StopHandle {
    running: Arc<AtomicBool>,
    events: Arc<EventFlags>,
}

impl StopHandle {
    pub fn request_stop(&self) {
        self.running.store(false, Ordering::Release);
        self.events.signal(EVT_MASK_STOP);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Counters of one dispatcher's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchCounters {
    pub wakeups: u64,
    pub dispatched: u64,
    /// Messages with no handler or an unknown id
    pub ignored: u64,
    /// Records that failed to decode
    pub malformed: u64,
    pub spectrum_updates: u64,
}

/// The dispatcher loop.
pub struct EventDispatcher {
    context: Arc<BasebandContext>,
    events: Arc<EventFlags>,
    handlers: MessageHandlerMap,
    running: Arc<AtomicBool>,
    counters: DispatchCounters,
}

impl EventDispatcher {
    pub fn new(context: Arc<BasebandContext>, events: Arc<EventFlags>) -> Self {
        Self {
            context,
            events,
            handlers: MessageHandlerMap::new(),
            running: Arc::new(AtomicBool::new(true)),
            counters: DispatchCounters::default(),
        }
    }

    pub fn register_handler<F>(&mut self, id: MessageId, handler: F)
    where
        F: FnMut(&Message) + Send + 'static,
    {
        self.handlers.register_handler(id, handler);
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            running: Arc::clone(&self.running),
            events: Arc::clone(&self.events),
        }
    }

    pub fn request_stop(&self) {
        self.stop_handle().request_stop();
    }

    pub fn counters(&self) -> DispatchCounters {
        self.counters
    }

    /// Run until stopped.
    pub fn run(&mut self) {
        debug!(handlers = ?self.handlers, "dispatcher running");
        while self.running.load(Ordering::Acquire) {
            let fired = self.events.wait_any(ALL_EVENTS);
            self.dispatch(fired);
        }
        debug!(counters = ?self.counters, "dispatcher stopped");
    }

    /// Handle one set of fired events.
    pub fn dispatch(&mut self, fired: u32) {
        self.counters.wakeups += 1;
        if fired & EVT_MASK_BASEBAND != 0 {
            self.drain_mailbox();
        }
        if fired & EVT_MASK_SPECTRUM != 0 {
            self.context.update_spectrum();
            self.counters.spectrum_updates += 1;
        }
        if fired & EVT_MASK_STOP != 0 {
            trace!("stop event");
        }
    }

    fn drain_mailbox(&mut self) {
        while let Some(record) = self.context.shared().baseband_queue.pop() {
            match record {
                Ok(message) => {
                    trace!(id = ?message.id(), "dispatch");
                    if self.handlers.send(&message) {
                        self.counters.dispatched += 1;
                    } else {
                        trace!(id = ?message.id(), "no handler, ignored");
                        self.counters.ignored += 1;
                    }
                }
                Err(MessageError::UnknownId(id)) => {
                    trace!(id, "unknown message id, ignored");
                    self.counters.ignored += 1;
                }
                Err(e) => {
                    warn!("malformed mailbox record: {}", e);
                    self.counters.malformed += 1;
                }
            }
        }
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("handlers", &self.handlers)
            .field("running", &self.running.load(Ordering::Relaxed))
            .field("counters", &self.counters)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BasebandConfiguration, Mode, RuntimeConfig};
    use crate::hal::{DmaTransfer, Transfer};
    use crate::message::MAX_SIZE;
    use crate::processor::WidebandSpectrum;
    use crate::shared::{AppLink, SharedMemory};
    use crate::sim::{RxSource, SimulatedHardware};
    use crate::types::{Direction, Iq8};
    use std::sync::Mutex;
    use std::thread;
    use std::time::{Duration, Instant};

    fn dispatcher() -> (EventDispatcher, AppLink) {
        let (dispatcher, link, _ctx) = dispatcher_with_context();
        (dispatcher, link)
    }

    fn dispatcher_with_context() -> (EventDispatcher, AppLink, Arc<BasebandContext>) {
        let config = RuntimeConfig::stepped();
        let sim = SimulatedHardware::new(&config, RxSource::Silence);
        let shared = Arc::new(SharedMemory::new(16));
        let events = Arc::new(EventFlags::new());
        let ctx = Arc::new(BasebandContext::new(
            Arc::clone(&shared),
            Arc::clone(&events),
            sim.hardware(),
            &config,
        ));
        (
            EventDispatcher::new(Arc::clone(&ctx), Arc::clone(&events)),
            AppLink::new(shared, events),
            ctx,
        )
    }

    fn rx_transfer(len: usize) -> DmaTransfer {
        Transfer {
            samples: vec![Iq8::new(30, -30); len].into_boxed_slice(),
            direction: Direction::Receive,
            sequence: 1,
        }
    }

    #[test]
    fn test_handlers_see_messages_in_order() {
        let (mut dispatcher, link) = dispatcher();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        dispatcher.register_handler(MessageId::BasebandConfiguration, move |m| {
            if let Message::BasebandConfiguration(c) = m {
                log.lock().unwrap().push(c.mode);
            }
        });

        for mode in [Mode::Ais, Mode::Tpms, Mode::Jammer] {
            link.configure(BasebandConfiguration::new(mode, 1_000_000)).unwrap();
        }
        dispatcher.dispatch(EVT_MASK_BASEBAND);

        assert_eq!(*seen.lock().unwrap(), vec![3, 5, 18]);
        assert_eq!(dispatcher.counters().dispatched, 3);
        assert!(link.shared().baseband_queue.is_empty());
    }

    #[test]
    fn test_unknown_id_is_ignored() {
        let (mut dispatcher, link) = dispatcher();
        let hits = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&hits);
        dispatcher.register_handler(MessageId::Shutdown, move |_| {
            *counter.lock().unwrap() += 1;
        });

        let mut record = [0u8; MAX_SIZE];
        record[0] = 42;
        link.shared().baseband_queue.push_record(record).unwrap();
        // Known id without a handler
        link.send(&Message::TxDone { n: 1 }).unwrap();
        link.shutdown().unwrap();

        dispatcher.dispatch(EVT_MASK_BASEBAND);
        assert_eq!(*hits.lock().unwrap(), 1);
        let counters = dispatcher.counters();
        assert_eq!(counters.ignored, 2);
        assert_eq!(counters.dispatched, 1);
    }

    #[test]
    fn test_spectrum_event_publishes_one_frame() {
        let (mut dispatcher, link, ctx) = dispatcher_with_context();
        // One 256-sample frame per update at this rate
        let rate = 256 * 30;
        assert_eq!(WidebandSpectrum::frames_per_update(rate), 1);
        ctx.apply_configuration(BasebandConfiguration::new(Mode::WidebandSpectrum, rate));

        let mut t = rx_transfer(256);
        assert!(ctx.process_buffer(&mut t).executed.is_some());
        assert_eq!(dispatcher.events.take(EVT_MASK_SPECTRUM), EVT_MASK_SPECTRUM);
        assert!(link.shared().application_queue.is_empty());

        dispatcher.dispatch(EVT_MASK_SPECTRUM);
        match link.shared().application_queue.drain().as_slice() {
            [Message::ChannelSpectrum(s)] => assert_eq!(s.sampling_rate, rate),
            other => panic!("unexpected messages: {:?}", other),
        }
        assert_eq!(dispatcher.counters().spectrum_updates, 1);

        // Nothing accumulated since, so a second event publishes nothing
        dispatcher.dispatch(EVT_MASK_SPECTRUM);
        assert!(link.shared().application_queue.is_empty());
    }

    #[test]
    fn test_spectrum_event_without_processor_is_noop() {
        let (mut dispatcher, link, ctx) = dispatcher_with_context();
        assert_eq!(ctx.snapshot().processor, None);

        dispatcher.dispatch(EVT_MASK_SPECTRUM);
        assert!(link.shared().application_queue.is_empty());
        assert_eq!(dispatcher.counters().spectrum_updates, 1);

        // An unknown mode also leaves the slot empty
        ctx.apply_configuration(BasebandConfiguration::with_raw_mode(17, 2_280_000));
        dispatcher.dispatch(EVT_MASK_SPECTRUM);
        assert!(link.shared().application_queue.is_empty());
    }

    #[test]
    fn test_duplicate_registration_last_wins() {
        let mut map = MessageHandlerMap::new();
        let which = Arc::new(Mutex::new(0));
        let first = Arc::clone(&which);
        map.register_handler(MessageId::Shutdown, move |_| *first.lock().unwrap() = 1);
        let second = Arc::clone(&which);
        map.register_handler(MessageId::Shutdown, move |_| *second.lock().unwrap() = 2);

        assert_eq!(map.len(), 1);
        assert!(map.send(&Message::Shutdown));
        assert_eq!(*which.lock().unwrap(), 2);
        assert!(!map.send(&Message::TxDone { n: 0 }));
    }

    #[test]
    fn test_stop_wakes_blocked_loop() {
        let (mut dispatcher, _link) = dispatcher();
        let stop = dispatcher.stop_handle();
        let handle = thread::spawn(move || {
            dispatcher.run();
            dispatcher.counters()
        });

        thread::sleep(Duration::from_millis(20));
        let start = Instant::now();
        stop.request_stop();
        let counters = handle.join().unwrap();
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(!stop.is_running());
        assert_eq!(counters.wakeups, 1);
    }
}
