//! dchan-core: the I/O synchronization engine behind the `dchan` console.
//!
//! The interactive side publishes one line at a time into a single-slot
//! [`Mailbox`]; a dedicated [`IoLoop`] thread waits on the device for
//! readiness, prints whatever arrives and drains the mailbox to the device,
//! resubmitting short writes until the whole message is out. Both sides
//! share a [`Link`] that carries the mailbox and the running flag.

pub mod channel;
pub mod display;
pub mod error;
pub mod input;
pub mod io_loop;
pub mod link;
pub mod mailbox;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use channel::{DeviceChannel, Readiness, WaitOutcome};
pub use display::{format_bytes, render_frame, Direction, DisplaySink};
pub use error::{ChannelError, InputError, MailboxError};
pub use input::{InputPump, LineEvent, LineSource, TxPolicy};
pub use io_loop::{IoLoop, IoLoopConfig, IoLoopHandle, Step};
pub use link::{Link, StopReason};
pub use mailbox::Mailbox;
