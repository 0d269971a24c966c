//! Shared memory between the application core and the baseband core.
//!
//! Holds both mailbox directions plus the two configuration surfaces the
//! application populates for the transmit synthesizers. Every field is an
//! atomic and the synthesizers read them once per symbol or range boundary.
//! The AFSK surface adds a generation counter so the generator can tell a
//! complete transmission from one still being written.

use std::sync::atomic::{fence, AtomicBool, AtomicI32, AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::{
    AfskConfig, BasebandConfiguration, JammerConfig, JammerRange, AFSK_DATA_LEN, JAMMER_RANGES,
};
use crate::error::Result;
use crate::mailbox::MessageQueue;
use crate::message::Message;
use crate::rt::{EventFlags, EVT_MASK_BASEBAND};

/// Tone and framing parameters of the FSK generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AfskParams {
    pub samples_per_bit: u32,
    pub phase_inc_mark: u32,
    pub phase_inc_space: u32,
    pub fm_deviation: i32,
}

/// What `take_repeat` found at the end of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatTake {
    /// A repeat was consumed; the count before the decrement
    Repeat(u32),
    /// No repeats remain
    Finished,
    /// A newer `store` replaced the transmission
    Superseded,
}

/// FSK data buffer and parameters.
///
/// `store` brackets its writes with a generation counter that is odd while
/// the write is in progress (one writer at a time). The repeat count and the
/// done flag are tagged with the generation they belong to, so a generator
/// finishing an older transmission cannot consume the new repeat count or
/// mark the new one done.
#[derive(Debug)]
pub struct AfskSurface {
    data: [AtomicU8; AFSK_DATA_LEN],
    samples_per_bit: AtomicU32,
    phase_inc_mark: AtomicU32,
    phase_inc_space: AtomicU32,
    fm_deviation: AtomicI32,
    /// Generation in the high word, remaining repeats in the low word
    repeat: AtomicU64,
    done_generation: AtomicU32,
    generation: AtomicU32,
}

impl Default for AfskSurface {
    fn default() -> Self {
        Self {
            data: std::array::from_fn(|_| AtomicU8::new(0)),
            samples_per_bit: AtomicU32::new(0),
            phase_inc_mark: AtomicU32::new(0),
            phase_inc_space: AtomicU32::new(0),
            fm_deviation: AtomicI32::new(0),
            repeat: AtomicU64::new(0),
            done_generation: AtomicU32::new(u32::MAX),
            generation: AtomicU32::new(0),
        }
    }
}

#[inline]
fn pack_repeat(generation: u32, count: u32) -> u64 {
    ((generation as u64) << 32) | count as u64
}

#[inline]
fn unpack_repeat(word: u64) -> (u32, u32) {
    ((word >> 32) as u32, word as u32)
}

impl AfskSurface {
    /// Write a new transmission. Bytes beyond `config.data` are zeroed, the
    /// done flag is cleared and the generation advances so a running
    /// generator restarts from the first byte.
    pub fn store(&self, config: &AfskConfig) {
        let writing = self.generation.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        fence(Ordering::Release);

        for (i, slot) in self.data.iter().enumerate() {
            slot.store(config.data.get(i).copied().unwrap_or(0), Ordering::Relaxed);
        }
        self.samples_per_bit
            .store(config.samples_per_bit, Ordering::Relaxed);
        self.phase_inc_mark.store(config.phase_inc_mark, Ordering::Relaxed);
        self.phase_inc_space
            .store(config.phase_inc_space, Ordering::Relaxed);
        self.fm_deviation.store(config.fm_deviation, Ordering::Relaxed);

        let generation = writing.wrapping_add(1);
        self.repeat
            .store(pack_repeat(generation, config.repeat), Ordering::Relaxed);
        self.generation.store(generation, Ordering::Release);
    }

    /// Byte at `index`; reads past the end see the terminator.
    pub fn byte(&self, index: usize) -> u8 {
        self.data
            .get(index)
            .map(|b| b.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn params(&self) -> AfskParams {
        AfskParams {
            samples_per_bit: self.samples_per_bit.load(Ordering::Relaxed),
            phase_inc_mark: self.phase_inc_mark.load(Ordering::Relaxed),
            phase_inc_space: self.phase_inc_space.load(Ordering::Relaxed),
            fm_deviation: self.fm_deviation.load(Ordering::Relaxed),
        }
    }

    /// Repeats left in the current transmission.
    pub fn repeat(&self) -> u32 {
        unpack_repeat(self.repeat.load(Ordering::Acquire)).1
    }

    /// Consume one repeat of transmission `generation`.
    pub fn take_repeat(&self, generation: u32) -> RepeatTake {
        let mut outcome = RepeatTake::Superseded;
        let _ = self
            .repeat
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |word| {
                let (tag, count) = unpack_repeat(word);
                if tag != generation {
                    outcome = RepeatTake::Superseded;
                    return None;
                }
                match count.checked_sub(1) {
                    Some(left) => {
                        outcome = RepeatTake::Repeat(count);
                        Some(pack_repeat(tag, left))
                    }
                    None => {
                        outcome = RepeatTake::Finished;
                        None
                    }
                }
            });
        outcome
    }

    /// Whether the current transmission has been sent.
    pub fn transmit_done(&self) -> bool {
        self.done_generation.load(Ordering::Acquire) == self.generation.load(Ordering::Acquire)
    }

    pub fn set_transmit_done(&self, generation: u32) {
        self.done_generation.store(generation, Ordering::Release);
    }

    /// Advanced by two on every `store`; odd while a store is in progress.
    pub fn generation(&self) -> u32 {
        self.generation.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_writing(generation: u32) -> bool {
        generation & 1 == 1
    }

    /// Whether reads made since `generation` was loaded saw a single,
    /// complete store.
    pub fn is_current(&self, generation: u32) -> bool {
        fence(Ordering::Acquire);
        !Self::is_writing(generation) && self.generation.load(Ordering::Relaxed) == generation
    }
}

#[derive(Debug, Default)]
struct JammerSlot {
    active: AtomicBool,
    center: AtomicU64,
    width: AtomicI32,
}

/// Jammer frequency-range table.
#[derive(Debug, Default)]
pub struct JammerSurface {
    ranges: [JammerSlot; JAMMER_RANGES],
}

impl JammerSurface {
    /// Overwrite the whole table; entries missing from `config` become
    /// inactive.
    pub fn store(&self, config: &JammerConfig) {
        for (i, slot) in self.ranges.iter().enumerate() {
            let range = config.ranges.get(i).copied().unwrap_or_default();
            slot.center.store(range.center, Ordering::Relaxed);
            slot.width.store(range.width, Ordering::Relaxed);
            slot.active.store(range.active, Ordering::Release);
        }
    }

    /// Overwrite one entry. Out-of-range indices are ignored.
    pub fn set_range(&self, index: usize, range: JammerRange) {
        if let Some(slot) = self.ranges.get(index) {
            slot.center.store(range.center, Ordering::Relaxed);
            slot.width.store(range.width, Ordering::Relaxed);
            slot.active.store(range.active, Ordering::Release);
        }
    }

    pub fn set_active(&self, index: usize, active: bool) {
        if let Some(slot) = self.ranges.get(index) {
            slot.active.store(active, Ordering::Release);
        }
    }

    pub fn is_active(&self, index: usize) -> bool {
        self.ranges
            .get(index)
            .map(|s| s.active.load(Ordering::Acquire))
            .unwrap_or(false)
    }

    pub fn range(&self, index: usize) -> JammerRange {
        match self.ranges.get(index) {
            Some(slot) => JammerRange {
                active: slot.active.load(Ordering::Acquire),
                center: slot.center.load(Ordering::Relaxed),
                width: slot.width.load(Ordering::Relaxed),
            },
            None => JammerRange::default(),
        }
    }
}

/// Everything the two cores share.
#[derive(Debug)]
pub struct SharedMemory {
    /// App → baseband
    pub baseband_queue: MessageQueue,
    /// Baseband → app
    pub application_queue: MessageQueue,
    pub afsk: AfskSurface,
    pub jammer: JammerSurface,
}

impl SharedMemory {
    pub fn new(mailbox_capacity: usize) -> Self {
        Self {
            baseband_queue: MessageQueue::new("baseband", mailbox_capacity),
            application_queue: MessageQueue::new("application", mailbox_capacity),
            afsk: AfskSurface::default(),
            jammer: JammerSurface::default(),
        }
    }

    /// Publish to the application core, dropping on a full ring.
    pub fn publish(&self, message: &Message) -> bool {
        self.application_queue.push_or_drop(message)
    }
}

/// The application core's end of the mailbox.
///
/// Sending raises the "baseband queue has data" event, as the inter-core
/// interrupt does on target.
#[derive(Debug, Clone)]
pub struct AppLink {
    shared: Arc<SharedMemory>,
    events: Arc<EventFlags>,
}

impl AppLink {
    pub fn new(shared: Arc<SharedMemory>, events: Arc<EventFlags>) -> Self {
        Self { shared, events }
    }

    pub fn shared(&self) -> &SharedMemory {
        &self.shared
    }

    /// Queue a message for the baseband core and wake its dispatcher.
    pub fn send(&self, message: &Message) -> Result<()> {
        let result = self.shared.baseband_queue.push(message);
        // Wake the dispatcher even on a full ring so it drains.
        self.events.signal(EVT_MASK_BASEBAND);
        result
    }

    pub fn configure(&self, configuration: BasebandConfiguration) -> Result<()> {
        self.send(&Message::BasebandConfiguration(configuration))
    }

    pub fn shutdown(&self) -> Result<()> {
        self.send(&Message::Shutdown)
    }

    pub fn write_afsk(&self, config: &AfskConfig) {
        self.shared.afsk.store(config);
    }

    pub fn write_jammer(&self, config: &JammerConfig) {
        self.shared.jammer.store(config);
    }

    /// Next message from the baseband core, skipping undecodable records.
    pub fn recv(&self) -> Option<Message> {
        while let Some(result) = self.shared.application_queue.pop() {
            if let Ok(message) = result {
                return Some(message);
            }
        }
        None
    }

    /// Poll for a message until `timeout` elapses.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Message> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(message) = self.recv() {
                return Some(message);
            }
            if Instant::now() >= deadline {
                return None;
            }
            std::thread::sleep(Duration::from_micros(200));
        }
    }

    /// Collect messages until `stop` returns true for one of them (that one
    /// included) or `timeout` elapses.
    pub fn collect_until<F>(&self, timeout: Duration, mut stop: F) -> Vec<Message>
    where
        F: FnMut(&Message) -> bool,
    {
        let deadline = Instant::now() + timeout;
        let mut collected = Vec::new();
        while let Some(message) = self.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
            let done = stop(&message);
            collected.push(message);
            if done {
                break;
            }
        }
        collected
    }
}
