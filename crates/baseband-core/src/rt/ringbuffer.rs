//! # Lock-Free Ring Buffer
//!
//! Single-producer, single-consumer ring under each mailbox direction.
//! Records are moved in and out whole and a slot is never overwritten while
//! unread: a full ring rejects the newest record.
//!
//! The producer publishes a slot with a Release store on `head`; the consumer
//! frees it with a Release store on `tail`. Each side reads the other's index
//! with Acquire. Both indices are cache-padded.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam::utils::CachePadded;
use thiserror::Error;

/// Push failure.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingError {
    /// Every slot holds an unread record; the pushed value was dropped
    #[error("ring buffer is full")]
    Full,
}

/// Single-producer, single-consumer lock-free ring buffer.
///
/// At most one thread may push and at most one may pop at any time.
/// [`crate::mailbox::MessageQueue`] serializes each side for the shared
/// queues.
///
/// # Example
///
/// ```rust
/// use baseband_core::rt::{RingBuffer, RingError};
///
/// let ring: RingBuffer<u32> = RingBuffer::new(2);
/// ring.push(1).unwrap();
/// ring.push(2).unwrap();
/// assert_eq!(ring.push(3), Err(RingError::Full));
/// assert_eq!(ring.pop(), Some(1));
/// ```
pub struct RingBuffer<T> {
    slots: Box<[UnsafeCell<MaybeUninit<T>>]>,
    head: CachePadded<AtomicUsize>,
    tail: CachePadded<AtomicUsize>,
    mask: usize,
}

// SAFETY: a slot is written only by the producer before it is published and
// read only by the consumer after; `head`/`tail` carry the hand-off.
unsafe impl<T: Send> Send for RingBuffer<T> {}
unsafe impl<T: Send> Sync for RingBuffer<T> {}

impl<T> RingBuffer<T> {
    /// Ring with room for `capacity` records, rounded up to a power of two
    /// (minimum 2).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2).next_power_of_two();
        Self {
            slots: (0..capacity)
                .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
                .collect(),
            head: CachePadded::new(AtomicUsize::new(0)),
            tail: CachePadded::new(AtomicUsize::new(0)),
            mask: capacity - 1,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Unread records at the time of the call.
    #[inline]
    pub fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::Acquire);
        self.head.load(Ordering::Acquire).wrapping_sub(tail)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity()
    }

    /// Append `value`, or drop it and return `Full`.
    pub fn push(&self, value: T) -> Result<(), RingError> {
        let head = self.head.load(Ordering::Relaxed);
        if head.wrapping_sub(self.tail.load(Ordering::Acquire)) >= self.capacity() {
            return Err(RingError::Full);
        }

        let slot = &self.slots[head & self.mask];
        // SAFETY: the slot is free and only the producer touches it until
        // `head` is advanced.
        unsafe { (*slot.get()).write(value) };
        self.head.store(head.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    /// Take the oldest record.
    pub fn pop(&self) -> Option<T> {
        let tail = self.tail.load(Ordering::Relaxed);
        if tail == self.head.load(Ordering::Acquire) {
            return None;
        }

        let slot = &self.slots[tail & self.mask];
        // SAFETY: the producer's Release on `head` published this slot and
        // only the consumer reads it before `tail` moves past.
        let value = unsafe { (*slot.get()).assume_init_read() };
        self.tail.store(tail.wrapping_add(1), Ordering::Release);
        Some(value)
    }
}

impl<T> Drop for RingBuffer<T> {
    fn drop(&mut self) {
        while self.pop().is_some() {}
    }
}

impl<T> std::fmt::Debug for RingBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish()
    }
}
