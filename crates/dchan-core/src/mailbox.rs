//! Single-slot transmit mailbox
//!
//! The interactive producer fills the slot with one complete line; the I/O
//! loop takes it out whole. Every access goes through one lock and holds it
//! only for the copy in or out.
//!
//! A taken message stays "in flight" until the loop reports it fully written
//! with [`Mailbox::finish`], so the producer can tell an empty slot from a
//! drained one.

use parking_lot::Mutex;

use crate::error::MailboxError;

/// Default slot size in bytes (line plus terminator)
pub const DEFAULT_CAPACITY: usize = 512;

/// Smallest usable slot: one byte of payload plus the terminator
const MIN_CAPACITY: usize = 2;

#[derive(Debug)]
struct Slot {
    data: Vec<u8>,
    in_flight: bool,
}

/// Holds at most one pending outbound message
#[derive(Debug)]
pub struct Mailbox {
    slot: Mutex<Slot>,
    capacity: usize,
}

impl Mailbox {
    /// Create an empty mailbox of `capacity` bytes
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(MIN_CAPACITY);
        Self {
            slot: Mutex::new(Slot {
                data: Vec::with_capacity(capacity),
                in_flight: false,
            }),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Longest line accepted by [`publish`](Self::publish)
    pub fn max_line_len(&self) -> usize {
        self.capacity - 1
    }

    /// True when no message is pending
    pub fn is_empty(&self) -> bool {
        self.slot.lock().data.is_empty()
    }

    /// True when nothing is pending and nothing taken is still being written
    pub fn is_idle(&self) -> bool {
        let slot = self.slot.lock();
        slot.data.is_empty() && !slot.in_flight
    }

    /// Store `line` (plus `terminator`, if any) as the pending message
    ///
    /// Returns the number of bytes now pending. The slot is left untouched on
    /// rejection. Publishing an empty line with no terminator stores nothing.
    pub fn publish(&self, line: &[u8], terminator: Option<u8>) -> Result<usize, MailboxError> {
        let mut slot = self.slot.lock();
        if !slot.data.is_empty() {
            return Err(MailboxError::Occupied);
        }
        if line.len() > self.max_line_len() {
            return Err(MailboxError::TooLong {
                len: line.len(),
                max: self.max_line_len(),
            });
        }

        slot.data.extend_from_slice(line);
        if let Some(byte) = terminator {
            slot.data.push(byte);
        }
        Ok(slot.data.len())
    }

    /// Take the pending message out, leaving the slot empty
    ///
    /// The message counts as in flight until [`finish`](Self::finish).
    pub fn take_if_ready(&self) -> Option<Vec<u8>> {
        let mut slot = self.slot.lock();
        if slot.data.is_empty() {
            return None;
        }
        slot.in_flight = true;
        Some(std::mem::replace(
            &mut slot.data,
            Vec::with_capacity(self.capacity),
        ))
    }

    /// Mark the last taken message as fully written (or abandoned)
    pub fn finish(&self) {
        self.slot.lock().in_flight = false;
    }
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
