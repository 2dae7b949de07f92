//! Scripted test doubles for the device channel, display and line source.
//!
//! [`MockChannel`] replays a queue of wait results, read frames and write
//! acceptances and records every call made against it, so loop behavior can
//! be asserted without hardware. [`BlockingLines`] stands in for a prompt that
//! never gets an answer, to exercise cancellation of a pending read.

use std::collections::VecDeque;
use std::io;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::channel::{DeviceChannel, Readiness, WaitOutcome};
use crate::display::DisplaySink;
use crate::error::{ChannelError, InputError};
use crate::input::{LineEvent, LineSource};
use crate::link::Link;

/// Scripted result of one `wait` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitScript {
    /// Report a timeout immediately
    Timeout,
    /// Report these directions (masked by what was requested)
    Ready(Readiness),
    /// Fail the wait
    Fail,
}

/// Scripted result of one `write` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteScript {
    /// Accept up to this many bytes
    Accept(usize),
    /// Fail the write
    Fail,
}

/// A call observed by [`MockChannel`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelCall {
    Wait(Readiness),
    Read,
    Write(Vec<u8>),
    Close,
}

/// In-memory device channel driven by scripts
///
/// Once the wait script runs out, `wait` sleeps for the timeout and reports
/// the idle readiness (masked by the request) or [`WaitOutcome::Timeout`];
/// once the write script runs out, writes are accepted in full.
#[derive(Debug)]
pub struct MockChannel {
    name: String,
    waits: VecDeque<WaitScript>,
    reads: VecDeque<Option<Vec<u8>>>,
    writes: VecDeque<WriteScript>,
    idle: Readiness,
    calls: Vec<ChannelCall>,
    written: Vec<u8>,
    closed: bool,
}

impl MockChannel {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            waits: VecDeque::new(),
            reads: VecDeque::new(),
            writes: VecDeque::new(),
            idle: Readiness::NONE,
            calls: Vec::new(),
            written: Vec::new(),
            closed: false,
        }
    }

    pub fn with_wait(mut self, wait: WaitScript) -> Self {
        self.waits.push_back(wait);
        self
    }

    pub fn with_read(mut self, frame: Vec<u8>) -> Self {
        self.reads.push_back(Some(frame));
        self
    }

    pub fn with_read_error(mut self) -> Self {
        self.reads.push_back(None);
        self
    }

    pub fn with_write(mut self, write: WriteScript) -> Self {
        self.writes.push_back(write);
        self
    }

    /// Readiness reported after the wait script is exhausted
    pub fn with_idle_readiness(mut self, idle: Readiness) -> Self {
        self.idle = idle;
        self
    }

    /// Every call in order
    pub fn calls(&self) -> &[ChannelCall] {
        &self.calls
    }

    /// Masks passed to `wait`, in order
    pub fn requested(&self) -> Vec<Readiness> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                ChannelCall::Wait(mask) => Some(*mask),
                _ => None,
            })
            .collect()
    }

    /// Buffers submitted to `write`, in order
    pub fn write_attempts(&self) -> Vec<Vec<u8>> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                ChannelCall::Write(buf) => Some(buf.clone()),
                _ => None,
            })
            .collect()
    }

    /// Bytes the device accepted, concatenated
    pub fn written(&self) -> Vec<u8> {
        self.written.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn check_open(&self) -> Result<(), ChannelError> {
        if self.closed {
            return Err(ChannelError::Closed {
                device: self.name.clone(),
            });
        }
        Ok(())
    }
}

impl DeviceChannel for MockChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn wait(
        &mut self,
        requested: Readiness,
        timeout: Duration,
    ) -> Result<WaitOutcome, ChannelError> {
        self.check_open()?;
        self.calls.push(ChannelCall::Wait(requested));
        match self.waits.pop_front() {
            Some(WaitScript::Timeout) => Ok(WaitOutcome::Timeout),
            Some(WaitScript::Ready(observed)) => Ok(WaitOutcome::Ready(observed & requested)),
            Some(WaitScript::Fail) => Err(ChannelError::Wait {
                device: self.name.clone(),
                source: io::Error::from(io::ErrorKind::Interrupted),
            }),
            None => {
                thread::sleep(timeout);
                let observed = self.idle & requested;
                if observed.is_empty() {
                    Ok(WaitOutcome::Timeout)
                } else {
                    Ok(WaitOutcome::Ready(observed))
                }
            }
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ChannelError> {
        self.check_open()?;
        self.calls.push(ChannelCall::Read);
        match self.reads.pop_front() {
            Some(Some(frame)) => {
                let n = frame.len().min(buf.len());
                buf[..n].copy_from_slice(&frame[..n]);
                Ok(n)
            }
            Some(None) | None => Err(ChannelError::Read {
                device: self.name.clone(),
                source: io::Error::from(io::ErrorKind::WouldBlock),
            }),
        }
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, ChannelError> {
        self.check_open()?;
        self.calls.push(ChannelCall::Write(buf.to_vec()));
        let accepted = match self.writes.pop_front() {
            Some(WriteScript::Accept(n)) => n.min(buf.len()),
            Some(WriteScript::Fail) => {
                return Err(ChannelError::Write {
                    device: self.name.clone(),
                    source: io::Error::from(io::ErrorKind::BrokenPipe),
                })
            }
            None => buf.len(),
        };
        self.written.extend_from_slice(&buf[..accepted]);
        Ok(accepted)
    }

    fn close(&mut self) -> Result<(), ChannelError> {
        self.check_open()?;
        self.calls.push(ChannelCall::Close);
        self.closed = true;
        Ok(())
    }
}

/// Display sink that records everything shown
#[derive(Debug, Default)]
pub struct CaptureDisplay {
    lines: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
}

impl CaptureDisplay {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().clone()
    }
}

impl DisplaySink for CaptureDisplay {
    fn show(&self, line: &str) {
        self.lines.lock().push(line.to_string());
    }

    fn error(&self, message: &str) {
        self.errors.lock().push(message.to_string());
    }
}

/// Line source replaying a fixed list of events, then end of input
#[derive(Debug, Default)]
pub struct ScriptedLines {
    events: VecDeque<LineEvent>,
}

impl ScriptedLines {
    pub fn new<I>(events: I) -> Self
    where
        I: IntoIterator<Item = LineEvent>,
    {
        Self {
            events: events.into_iter().collect(),
        }
    }

    /// Convenience for a list of typed lines
    pub fn lines(lines: &[&str]) -> Self {
        Self::new(lines.iter().map(|l| LineEvent::Line(l.to_string())))
    }

    pub fn remaining(&self) -> usize {
        self.events.len()
    }
}

impl LineSource for ScriptedLines {
    fn next_line(&mut self, _link: &Link) -> Result<LineEvent, InputError> {
        Ok(self.events.pop_front().unwrap_or(LineEvent::EndOfInput))
    }
}

/// Line source that never produces a line
///
/// Each call blocks, checking `link` every `poll_interval`, and reports
/// [`LineEvent::Interrupted`] once the link stops.
#[derive(Debug)]
pub struct BlockingLines {
    poll_interval: Duration,
    calls: usize,
}

impl BlockingLines {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            calls: 0,
        }
    }

    /// Number of reads started
    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl LineSource for BlockingLines {
    fn next_line(&mut self, link: &Link) -> Result<LineEvent, InputError> {
        self.calls += 1;
        while link.is_running() {
            thread::sleep(self.poll_interval);
        }
        Ok(LineEvent::Interrupted)
    }
}
