//! Shared context between the input side and the I/O loop

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::mailbox::Mailbox;

/// Why the link stopped running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Interrupt from the terminal or a signal
    Interrupted,
    /// The user closed the input stream
    EndOfInput,
    /// The device refused a write
    WriteFailed,
    /// The line source failed
    InputFailed,
}

/// Running flag plus transmit mailbox, shared by `Arc` between both threads
///
/// The flag starts out set and is cleared exactly once; later `stop` calls
/// are no-ops and do not overwrite the first reason.
#[derive(Debug)]
pub struct Link {
    running: AtomicBool,
    stop_reason: Mutex<Option<StopReason>>,
    mailbox: Mailbox,
}

impl Link {
    /// Create a running link around a mailbox of `capacity` bytes
    pub fn new(capacity: usize) -> Self {
        Self {
            running: AtomicBool::new(true),
            stop_reason: Mutex::new(None),
            mailbox: Mailbox::new(capacity),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Clear the running flag
    ///
    /// Returns `true` for the call that actually stopped the link.
    pub fn stop(&self, reason: StopReason) -> bool {
        let mut stop_reason = self.stop_reason.lock();
        let was_running = self.running.swap(false, Ordering::AcqRel);
        if was_running {
            *stop_reason = Some(reason);
            tracing::debug!("Link stopped: {:?}", reason);
        }
        was_running
    }

    /// Reason recorded by the first [`stop`](Self::stop)
    pub fn stop_reason(&self) -> Option<StopReason> {
        *self.stop_reason.lock()
    }

    pub fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }
}
