//! `poll(2)` based device channel
//!
//! The device node is opened non-blocking; readiness comes from `poll` on the
//! descriptor and frames are moved with plain `read`/`write` calls.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::fd::AsFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};

use dchan_core::{ChannelError, DeviceChannel, Readiness, WaitOutcome};

/// Device channel over a non-blocking file descriptor
#[derive(Debug)]
pub struct PollChannel {
    name: String,
    file: Option<File>,
}

impl PollChannel {
    /// Open `path` read/write and non-blocking
    pub fn open(name: &str, path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NONBLOCK | libc::O_NOCTTY)
            .open(path)
            .with_context(|| format!("Unable to open {} ({})", name, path.display()))?;
        tracing::debug!("Opened {} at {}", name, path.display());
        Ok(Self::from_file(name, file))
    }

    /// Wrap an already opened descriptor
    pub fn from_file(name: &str, file: File) -> Self {
        Self {
            name: name.to_string(),
            file: Some(file),
        }
    }

    fn file(&self) -> Result<&File, ChannelError> {
        self.file.as_ref().ok_or_else(|| ChannelError::Closed {
            device: self.name.clone(),
        })
    }
}

/// Translate a readiness mask into poll events
fn to_poll_flags(requested: Readiness) -> PollFlags {
    let mut flags = PollFlags::empty();
    if requested.contains(Readiness::INPUT) {
        flags |= PollFlags::POLLIN | PollFlags::POLLPRI;
    }
    if requested.contains(Readiness::OUTPUT) {
        flags |= PollFlags::POLLOUT;
    }
    flags
}

/// Translate returned poll events into a readiness mask
///
/// Error and hang-up conditions are reported as input readiness so the
/// following read surfaces the actual error.
fn from_poll_flags(revents: PollFlags) -> Readiness {
    let mut observed = Readiness::NONE;
    if revents.intersects(
        PollFlags::POLLIN | PollFlags::POLLPRI | PollFlags::POLLERR | PollFlags::POLLHUP,
    ) {
        observed |= Readiness::INPUT;
    }
    if revents.contains(PollFlags::POLLOUT) {
        observed |= Readiness::OUTPUT;
    }
    observed
}

fn poll_timeout(timeout: Duration) -> PollTimeout {
    let millis = u16::try_from(timeout.as_millis()).unwrap_or(u16::MAX);
    PollTimeout::from(millis)
}

impl DeviceChannel for PollChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn wait(
        &mut self,
        requested: Readiness,
        timeout: Duration,
    ) -> Result<WaitOutcome, ChannelError> {
        let file = self.file()?;
        let mut fds = [PollFd::new(file.as_fd(), to_poll_flags(requested))];

        let ready = poll(&mut fds, poll_timeout(timeout)).map_err(|errno: Errno| {
            ChannelError::Wait {
                device: self.name.clone(),
                source: io::Error::from(errno),
            }
        })?;
        if ready == 0 {
            return Ok(WaitOutcome::Timeout);
        }

        let observed = fds[0]
            .revents()
            .map(from_poll_flags)
            .unwrap_or(Readiness::NONE);
        Ok(WaitOutcome::Ready(observed & requested))
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ChannelError> {
        let mut file = self.file()?;
        file.read(buf).map_err(|source| ChannelError::Read {
            device: self.name.clone(),
            source,
        })
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, ChannelError> {
        let mut file = self.file()?;
        let written = file.write(buf).map_err(|source| ChannelError::Write {
            device: self.name.clone(),
            source,
        })?;
        Ok(written)
    }

    fn close(&mut self) -> Result<(), ChannelError> {
        let file = self.file.take().ok_or_else(|| ChannelError::Closed {
            device: self.name.clone(),
        })?;
        drop(file);
        tracing::debug!("Closed {}", self.name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::fd::OwnedFd;
    use std::os::unix::net::UnixStream;

    fn socket_channel() -> (PollChannel, UnixStream) {
        let (ours, theirs) = UnixStream::pair().unwrap();
        let file = File::from(OwnedFd::from(ours));
        (PollChannel::from_file("pair", file), theirs)
    }

    #[test]
    fn test_flag_translation() {
        let flags = to_poll_flags(Readiness::INPUT | Readiness::OUTPUT);
        assert!(flags.contains(PollFlags::POLLIN));
        assert!(flags.contains(PollFlags::POLLOUT));
        assert!(!to_poll_flags(Readiness::INPUT).contains(PollFlags::POLLOUT));

        assert_eq!(from_poll_flags(PollFlags::POLLHUP), Readiness::INPUT);
        assert_eq!(from_poll_flags(PollFlags::POLLOUT), Readiness::OUTPUT);
        assert_eq!(from_poll_flags(PollFlags::empty()), Readiness::NONE);
    }

    #[test]
    fn test_poll_timeout_saturates() {
        assert_eq!(poll_timeout(Duration::from_millis(10)), PollTimeout::from(10u16));
        assert_eq!(poll_timeout(Duration::from_secs(3600)), PollTimeout::from(u16::MAX));
    }

    #[test]
    fn test_wait_times_out_without_input() {
        let (mut channel, _peer) = socket_channel();
        let outcome = channel
            .wait(Readiness::INPUT, Duration::from_millis(5))
            .unwrap();
        assert_eq!(outcome, WaitOutcome::Timeout);
    }

    #[test]
    fn test_read_after_input_ready() {
        let (mut channel, mut peer) = socket_channel();
        peer.write_all(b"OK\r\n").unwrap();

        let outcome = channel
            .wait(Readiness::INPUT, Duration::from_millis(100))
            .unwrap();
        assert_eq!(outcome, WaitOutcome::Ready(Readiness::INPUT));

        let mut buf = [0u8; 512];
        let n = channel.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"OK\r\n");
    }

    #[test]
    fn test_write_reaches_peer() {
        let (mut channel, mut peer) = socket_channel();
        let outcome = channel
            .wait(Readiness::INPUT | Readiness::OUTPUT, Duration::from_millis(100))
            .unwrap();
        assert_eq!(outcome, WaitOutcome::Ready(Readiness::OUTPUT));

        assert_eq!(channel.write(b"ATI\r").unwrap(), 4);
        let mut buf = [0u8; 4];
        peer.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ATI\r");
    }

    #[test]
    fn test_closed_channel_rejects_calls() {
        let (mut channel, _peer) = socket_channel();
        channel.close().unwrap();
        assert!(matches!(
            channel.wait(Readiness::INPUT, Duration::from_millis(1)),
            Err(ChannelError::Closed { .. })
        ));
        assert!(matches!(channel.close(), Err(ChannelError::Closed { .. })));
    }

    #[test]
    fn test_open_missing_device_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = PollChannel::open("s9c2", &dir.path().join("wptdm_s9c2")).unwrap_err();
        assert!(err.to_string().starts_with("Unable to open s9c2"));
    }
}
