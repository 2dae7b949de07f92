//! Interactive producer side: line source and the pump feeding the mailbox

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::display::DisplaySink;
use crate::error::{InputError, MailboxError};
use crate::link::{Link, StopReason};

/// What the line source produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// A complete line, without its line ending
    Line(String),
    /// The input stream was closed
    EndOfInput,
    /// The read was interrupted (Ctrl-C or the link stopped)
    Interrupted,
}

/// Blocking, cancellable source of typed lines
pub trait LineSource {
    /// Block until a line is available or the read is cancelled
    ///
    /// Implementations must return [`LineEvent::Interrupted`] promptly once
    /// `link` stops running.
    fn next_line(&mut self, link: &Link) -> Result<LineEvent, InputError>;
}

/// How typed lines are turned into device messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxPolicy {
    /// Append `\r` to every transmitted line
    pub append_cr: bool,
}

impl TxPolicy {
    pub fn terminator(self) -> Option<u8> {
        self.append_cr.then_some(b'\r')
    }
}

impl Default for TxPolicy {
    fn default() -> Self {
        Self { append_cr: true }
    }
}

/// Reads lines and publishes them into the link's mailbox one at a time
///
/// A new line is only requested once the previous message has been picked
/// up by the I/O loop; until then the pump sleeps in `poll_interval` steps.
pub struct InputPump<S> {
    source: S,
    link: Arc<Link>,
    display: Arc<dyn DisplaySink>,
    policy: TxPolicy,
    poll_interval: Duration,
}

impl<S: LineSource> InputPump<S> {
    pub fn new(
        source: S,
        link: Arc<Link>,
        display: Arc<dyn DisplaySink>,
        policy: TxPolicy,
        poll_interval: Duration,
    ) -> Self {
        Self {
            source,
            link,
            display,
            policy,
            poll_interval,
        }
    }

    /// Feed the mailbox until the link stops, input ends or is interrupted
    ///
    /// Stops the link on interrupt and end of input.
    pub fn run(&mut self) -> Result<(), InputError> {
        while self.link.is_running() {
            if !self.wait_for_free_slot() {
                break;
            }

            let line = match self.source.next_line(&self.link) {
                Ok(LineEvent::Line(line)) => line,
                Ok(LineEvent::EndOfInput) => {
                    // Let the last line reach the device before shutting down
                    self.wait_for_drain();
                    self.link.stop(StopReason::EndOfInput);
                    break;
                }
                Ok(LineEvent::Interrupted) => {
                    self.link.stop(StopReason::Interrupted);
                    break;
                }
                Err(e) => {
                    self.link.stop(StopReason::InputFailed);
                    return Err(e);
                }
            };

            if line.is_empty() {
                continue;
            }
            self.submit(&line);
        }
        Ok(())
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Sleep until the mailbox is empty; `false` if the link stopped meanwhile
    fn wait_for_free_slot(&self) -> bool {
        while !self.link.mailbox().is_empty() {
            if !self.link.is_running() {
                return false;
            }
            thread::sleep(self.poll_interval);
        }
        self.link.is_running()
    }

    /// Sleep until the I/O loop has written everything it was given
    fn wait_for_drain(&self) {
        while !self.link.mailbox().is_idle() && self.link.is_running() {
            thread::sleep(self.poll_interval);
        }
    }

    fn submit(&self, line: &str) {
        let terminator = self.policy.terminator();
        loop {
            match self.link.mailbox().publish(line.as_bytes(), terminator) {
                Ok(len) => {
                    tracing::debug!("Queued {} byte(s) for transmission", len);
                    return;
                }
                Err(MailboxError::TooLong { len, max }) => {
                    tracing::debug!("Rejected {} byte line", len);
                    self.display
                        .error(&format!("-ERR {}", MailboxError::TooLong { len, max }));
                    return;
                }
                Err(MailboxError::Occupied) => {
                    if !self.wait_for_free_slot() {
                        tracing::debug!("Dropping line, link stopped while waiting");
                        return;
                    }
                }
            }
        }
    }
}
