//! Error types shared by the core components

use std::io;
use thiserror::Error;

/// Failure reported by a [`DeviceChannel`](crate::DeviceChannel) operation
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The readiness wait failed (not a timeout)
    #[error("error waiting on device {device}: {source}")]
    Wait {
        device: String,
        #[source]
        source: io::Error,
    },

    /// Reading a frame from the device failed
    #[error("failed to read device {device}: {source}")]
    Read {
        device: String,
        #[source]
        source: io::Error,
    },

    /// Writing to the device failed
    #[error("failed to write to device {device}: {source}")]
    Write {
        device: String,
        #[source]
        source: io::Error,
    },

    /// The handle was already released
    #[error("device {device} is closed")]
    Closed { device: String },
}

/// Rejection reported by [`Mailbox::publish`](crate::Mailbox::publish)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MailboxError {
    /// The line does not fit, one byte is always reserved for the terminator
    #[error("Line too long (max is {max})")]
    TooLong { len: usize, max: usize },

    /// A previous message is still waiting to be picked up
    #[error("a message is already pending")]
    Occupied,
}

/// Failure of the interactive line source
#[derive(Debug, Error)]
pub enum InputError {
    /// The line editor reported an unrecoverable error
    #[error("line editor failed: {message}")]
    Editor { message: String },

    /// The line editor went away without reporting end of input
    #[error("line editor disconnected")]
    Disconnected,
}
