//! Device channel contract consumed by the I/O loop
//!
//! A channel is an opened handle to a half-duplex byte device together with
//! a way to wait (bounded) until it can accept output and/or has input.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};
use std::time::Duration;

use crate::error::ChannelError;

/// Readiness mask, requested by the caller and reported back by the device
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Readiness(u8);

impl Readiness {
    /// No direction
    pub const NONE: Self = Self(0);
    /// Device has inbound bytes
    pub const INPUT: Self = Self(0b01);
    /// Device can accept outbound bytes
    pub const OUTPUT: Self = Self(0b10);

    /// True when every bit of `other` is set (and `other` is not empty)
    pub fn contains(self, other: Self) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Readiness {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Readiness {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Readiness {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl fmt::Debug for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.contains(Self::INPUT), self.contains(Self::OUTPUT)) {
            (true, true) => f.write_str("INPUT|OUTPUT"),
            (true, false) => f.write_str("INPUT"),
            (false, true) => f.write_str("OUTPUT"),
            (false, false) => f.write_str("NONE"),
        }
    }
}

/// Result of a successful [`DeviceChannel::wait`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// At least one requested direction is ready
    Ready(Readiness),
    /// Nothing happened within the timeout
    Timeout,
}

/// An opened device handle driven by the I/O loop
///
/// Implementations are owned by exactly one thread at a time: the I/O loop
/// takes the channel when it starts and hands it back when it exits, so
/// `close()` can never race an in-flight read or write.
pub trait DeviceChannel: Send {
    /// Identifier used in log and error messages
    fn name(&self) -> &str;

    /// Wait up to `timeout` for any of the `requested` directions
    fn wait(&mut self, requested: Readiness, timeout: Duration)
        -> Result<WaitOutcome, ChannelError>;

    /// Read one frame into `buf`, returning the number of bytes read
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ChannelError>;

    /// Write from `buf`, returning how many bytes the device accepted
    ///
    /// May accept fewer than `buf.len()` bytes; the caller resubmits the rest.
    fn write(&mut self, buf: &[u8]) -> Result<usize, ChannelError>;

    /// Release the handle
    fn close(&mut self) -> Result<(), ChannelError>;
}
