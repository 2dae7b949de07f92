//! Readiness-driven I/O loop
//!
//! Each iteration picks up a pending mailbox message (if none is in flight),
//! waits on the device for input and, while a message is in flight, output
//! readiness, then services whichever direction is ready. Short writes are
//! accumulated across iterations until the whole message has been accepted.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::channel::{DeviceChannel, Readiness, WaitOutcome};
use crate::display::{render_frame, Direction, DisplaySink};
use crate::error::ChannelError;
use crate::link::{Link, StopReason};

/// Tunables for the I/O loop
#[derive(Debug, Clone)]
pub struct IoLoopConfig {
    /// Upper bound of a single readiness wait
    pub wait_timeout: Duration,
    /// Largest frame read from the device in one call
    pub max_frame: usize,
    /// Show CR/LF as escapes instead of stripping them
    pub verbose: bool,
}

impl Default for IoLoopConfig {
    fn default() -> Self {
        Self {
            wait_timeout: Duration::from_millis(10),
            max_frame: 512,
            verbose: false,
        }
    }
}

/// Outcome of one loop iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Wait timed out or failed; nothing was serviced
    Idle,
    /// At least one ready direction was serviced
    Serviced,
    /// The link is no longer running
    Stopped,
}

/// Message taken from the mailbox and being written out
#[derive(Debug)]
struct PendingTx {
    data: Vec<u8>,
    cursor: usize,
}

impl PendingTx {
    fn new(data: Vec<u8>) -> Self {
        Self { data, cursor: 0 }
    }

    fn remaining(&self) -> &[u8] {
        &self.data[self.cursor..]
    }

    fn advance(&mut self, written: usize) {
        self.cursor = (self.cursor + written).min(self.data.len());
    }

    fn is_done(&self) -> bool {
        self.cursor == self.data.len()
    }
}

/// The loop servicing one device channel
pub struct IoLoop<C> {
    channel: C,
    link: Arc<Link>,
    display: Arc<dyn DisplaySink>,
    config: IoLoopConfig,
    pending: Option<PendingTx>,
    rx_buf: Vec<u8>,
    /// Consecutive failed reads; only the first of a run is logged as a warning
    read_faults: u64,
}

impl<C: DeviceChannel> IoLoop<C> {
    /// Create a loop that owns `channel` until it exits
    pub fn new(
        channel: C,
        link: Arc<Link>,
        display: Arc<dyn DisplaySink>,
        config: IoLoopConfig,
    ) -> Self {
        let rx_buf = vec![0u8; config.max_frame.max(1)];
        Self {
            channel,
            link,
            display,
            config,
            pending: None,
            rx_buf,
            read_faults: 0,
        }
    }

    /// `(cursor, length)` of the message currently being written
    pub fn pending_progress(&self) -> Option<(usize, usize)> {
        self.pending.as_ref().map(|p| (p.cursor, p.data.len()))
    }

    /// Consecutive failed reads since the last good one
    pub fn read_faults(&self) -> u64 {
        self.read_faults
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Run a single iteration
    pub fn step(&mut self) -> Step {
        if !self.link.is_running() {
            return Step::Stopped;
        }

        // Copy-and-clear under the mailbox lock; the lock is released before waiting
        if self.pending.is_none() {
            if let Some(data) = self.link.mailbox().take_if_ready() {
                tracing::debug!("Picked up {} byte(s) for transmission", data.len());
                self.pending = Some(PendingTx::new(data));
            }
        }

        let mut requested = Readiness::INPUT;
        if self.pending.is_some() {
            requested |= Readiness::OUTPUT;
        }

        let observed = match self.channel.wait(requested, self.config.wait_timeout) {
            Ok(WaitOutcome::Timeout) => return Step::Idle,
            Ok(WaitOutcome::Ready(observed)) => observed,
            Err(e) => {
                tracing::warn!("{}", e);
                return Step::Idle;
            }
        };

        if observed.contains(Readiness::INPUT) && !self.service_read() {
            // A hung-up node polls ready forever; don't spin on it
            thread::sleep(self.config.wait_timeout);
        }

        if observed.contains(Readiness::OUTPUT) && self.pending.is_some() {
            if let Err(e) = self.service_write() {
                tracing::error!("{}", e);
                self.link.stop(StopReason::WriteFailed);
                return Step::Stopped;
            }
        }

        Step::Serviced
    }

    /// Iterate until the link stops, then hand the channel back
    pub fn run(mut self) -> C {
        tracing::debug!("I/O loop started on {}", self.channel.name());
        while self.step() != Step::Stopped {}
        if let Some(p) = self.pending.take() {
            tracing::warn!(
                "Discarding unsent message on {} ({} of {} byte(s) written)",
                self.channel.name(),
                p.cursor,
                p.data.len()
            );
            self.link.mailbox().finish();
        }
        tracing::debug!("I/O loop on {} exited", self.channel.name());
        self.channel
    }

    /// Move the loop onto its own thread
    pub fn spawn(self) -> io::Result<IoLoopHandle<C>>
    where
        C: 'static,
    {
        let handle = thread::Builder::new()
            .name("dchan-io".into())
            .spawn(move || self.run())?;
        Ok(IoLoopHandle { handle })
    }

    /// Read and print one frame; `false` if the read produced nothing
    fn service_read(&mut self) -> bool {
        let result = self.channel.read(&mut self.rx_buf);
        let n = match result {
            Ok(n) if n > 0 => n,
            Ok(_) => {
                let message = format!("Failed to read device {}: no data", self.channel.name());
                self.read_failed(&message);
                return false;
            }
            Err(e) => {
                self.read_failed(&e.to_string());
                return false;
            }
        };

        if self.read_faults > 0 {
            tracing::info!(
                "Reads on {} recovered after {} failure(s)",
                self.channel.name(),
                self.read_faults
            );
            self.read_faults = 0;
        }
        if let Some(line) = render_frame(Direction::Rx, &self.rx_buf[..n], self.config.verbose) {
            self.display.show(&line);
        }
        true
    }

    fn read_failed(&mut self, message: &str) {
        self.read_faults += 1;
        if self.read_faults == 1 {
            tracing::warn!("{}", message);
        } else {
            tracing::debug!("{} (repeated {} times)", message, self.read_faults);
        }
    }

    fn service_write(&mut self) -> Result<(), ChannelError> {
        let Some(pending) = self.pending.as_mut() else {
            return Ok(());
        };

        let remaining = pending.remaining().len();
        let written = self.channel.write(pending.remaining())?;
        if written == 0 {
            return Err(ChannelError::Write {
                device: self.channel.name().to_string(),
                source: io::Error::new(
                    io::ErrorKind::WriteZero,
                    format!("device accepted 0 of {} byte(s)", remaining),
                ),
            });
        }

        pending.advance(written);
        tracing::debug!(
            "Wrote {} byte(s), {}/{} sent",
            written,
            pending.cursor,
            pending.data.len()
        );

        if pending.is_done() {
            if let Some(line) = render_frame(Direction::Tx, &pending.data, self.config.verbose) {
                self.display.show(&line);
            }
            self.pending = None;
            self.link.mailbox().finish();
        }
        Ok(())
    }
}

/// Join handle of a spawned [`IoLoop`]
pub struct IoLoopHandle<C> {
    handle: JoinHandle<C>,
}

impl<C> IoLoopHandle<C> {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the loop to exit and take the channel back
    pub fn join(self) -> thread::Result<C> {
        self.handle.join()
    }
}
