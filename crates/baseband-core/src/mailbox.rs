//! # Message Mailbox
//!
//! One [`MessageQueue`] per direction: `baseband_queue` (app → core) and
//! `application_queue` (core → app). Each is a ring of fixed-size
//! [`Record`]s over the SPSC [`RingBuffer`].
//!
//! ## Full-Ring Policy
//!
//! Drop-newest, in both directions. A push into a full ring fails, the record
//! is discarded and the queue's drop counter increments. Unread records are
//! never overwritten. Real-time producers use [`MessageQueue::push_or_drop`],
//! which logs the drop at power-of-two counts and carries on.
//!
//! Several threads publish into the application queue (baseband runtime,
//! RSSI runtime, dispatcher). Producers are serialized by a short lock so the
//! ring underneath keeps its single-producer contract; consumers likewise.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};

use tracing::{trace, warn};

use crate::error::{BasebandError, Result};
use crate::message::{Message, MessageError, Record};
use crate::rt::{RingBuffer, RingError};

/// A mailbox direction.
#[derive(Debug)]
pub struct MessageQueue {
    name: &'static str,
    ring: RingBuffer<Record>,
    producer: Mutex<()>,
    consumer: Mutex<()>,
    dropped: AtomicU32,
}

impl MessageQueue {
    /// Create a queue holding at least `capacity` records.
    pub fn new(name: &'static str, capacity: usize) -> Self {
        Self {
            name,
            ring: RingBuffer::new(capacity),
            producer: Mutex::new(()),
            consumer: Mutex::new(()),
            dropped: AtomicU32::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Records discarded because the ring was full.
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Push an encoded record. On a full ring the record is discarded and
    /// counted.
    pub fn push_record(&self, record: Record) -> std::result::Result<(), RingError> {
        let result = {
            let _guard = self.producer.lock().unwrap_or_else(PoisonError::into_inner);
            self.ring.push(record)
        };
        if result.is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    /// Encode and push a message.
    ///
    /// # Errors
    ///
    /// `MailboxFull` if the ring is full (the message is dropped).
    pub fn push(&self, message: &Message) -> Result<()> {
        let record = message.encode()?;
        self.push_record(record)
            .map_err(|_| BasebandError::MailboxFull(self.name))?;
        trace!(queue = self.name, id = ?message.id(), "pushed");
        Ok(())
    }

    /// Push from a real-time context: never fails, drops on a full ring.
    ///
    /// Returns whether the message was enqueued.
    pub fn push_or_drop(&self, message: &Message) -> bool {
        match self.push(message) {
            Ok(()) => true,
            Err(BasebandError::MailboxFull(_)) => {
                let dropped = self.dropped();
                if dropped.is_power_of_two() {
                    warn!(queue = self.name, dropped, id = ?message.id(), "mailbox full, message dropped");
                }
                false
            }
            Err(e) => {
                warn!(queue = self.name, "message not sent: {}", e);
                false
            }
        }
    }

    /// Pop the oldest raw record.
    pub fn pop_record(&self) -> Option<Record> {
        let _guard = self.consumer.lock().unwrap_or_else(PoisonError::into_inner);
        self.ring.pop()
    }

    /// Pop and decode the oldest record.
    pub fn pop(&self) -> Option<std::result::Result<Message, MessageError>> {
        self.pop_record().map(|record| Message::decode(&record))
    }

    /// Pop and decode everything currently queued, skipping records that fail
    /// to decode.
    pub fn drain(&self) -> Vec<Message> {
        std::iter::from_fn(|| self.pop())
            .filter_map(|m| m.ok())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_push_pop_message() {
        let queue = MessageQueue::new("test", 4);
        queue.push(&Message::TxDone { n: 3 }).unwrap();
        queue.push(&Message::Retune { freq: 100 }).unwrap();
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop(), Some(Ok(Message::TxDone { n: 3 })));
        assert_eq!(queue.pop(), Some(Ok(Message::Retune { freq: 100 })));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_full_ring_drops_newest() {
        let queue = MessageQueue::new("application", 2);
        queue.push(&Message::TxDone { n: 1 }).unwrap();
        queue.push(&Message::TxDone { n: 2 }).unwrap();

        let err = queue.push(&Message::TxDone { n: 3 }).unwrap_err();
        assert!(matches!(err, BasebandError::MailboxFull("application")));
        assert!(!queue.push_or_drop(&Message::TxDone { n: 4 }));
        assert_eq!(queue.dropped(), 2);

        // The unread records survive, in order
        assert_eq!(queue.drain(), vec![Message::TxDone { n: 1 }, Message::TxDone { n: 2 }]);

        assert!(queue.push_or_drop(&Message::TxDone { n: 5 }));
        assert_eq!(queue.drain(), vec![Message::TxDone { n: 5 }]);
    }

    #[test]
    fn test_undecodable_record_surfaces_error() {
        let queue = MessageQueue::new("test", 2);
        let mut record = [0u8; crate::message::MAX_SIZE];
        record[0] = 0xFF;
        record[1] = 0xFF;
        queue.push_record(record).unwrap();
        assert_eq!(queue.pop(), Some(Err(MessageError::UnknownId(0xFFFF))));
    }

    #[test]
    fn test_multiple_producers() {
        let queue = Arc::new(MessageQueue::new("application", 4096));
        let handles: Vec<_> = (0..4u64)
            .map(|p| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for i in 0..500 {
                        queue.push(&Message::Retune { freq: p * 1000 + i }).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let messages = queue.drain();
        assert_eq!(messages.len(), 2000);
        // Per-producer order is preserved
        for p in 0..4u64 {
            let freqs: Vec<u64> = messages
                .iter()
                .filter_map(|m| match m {
                    Message::Retune { freq } if freq / 1000 == p => Some(*freq),
                    _ => None,
                })
                .collect();
            assert_eq!(freqs.len(), 500);
            assert!(freqs.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
