//! Device identifiers and the concrete channel implementation
//!
//! Wanpipe exposes each TDM channel as `/dev/wptdm_s{span}c{chan}`; a plain
//! character device (USB modem, UART) can be given by absolute path.

pub mod poll_channel;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

pub use poll_channel::PollChannel;

/// Directory holding Wanpipe TDM API device nodes
const WANPIPE_DEV_DIR: &str = "/dev";

/// Errors from parsing a device identifier
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceIdError {
    #[error("Invalid Wanpipe span/channel string {0:?} (for span 1 chan 1 you must provide string s1c1)")]
    Malformed(String),

    #[error("Invalid D-channel device {0} (channel must be even number >= 2)")]
    InvalidChannel(String),
}

/// Which device to open
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceId {
    /// Wanpipe span/channel pair, e.g. `s1c2`
    Span { span: u32, chan: u32 },
    /// Explicit device node
    Path(PathBuf),
}

impl DeviceId {
    /// Device node backing this identifier
    pub fn node_path(&self) -> PathBuf {
        match self {
            DeviceId::Span { span, chan } => {
                PathBuf::from(WANPIPE_DEV_DIR).join(format!("wptdm_s{}c{}", span, chan))
            }
            DeviceId::Path(path) => path.clone(),
        }
    }
}

impl FromStr for DeviceId {
    type Err = DeviceIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with('/') {
            return Ok(DeviceId::Path(PathBuf::from(s)));
        }

        let lower = s.to_ascii_lowercase();
        let rest = lower
            .strip_prefix('s')
            .ok_or_else(|| DeviceIdError::Malformed(s.to_string()))?;
        let (span, chan) = rest
            .split_once('c')
            .ok_or_else(|| DeviceIdError::Malformed(s.to_string()))?;
        let span: u32 = span
            .parse()
            .map_err(|_| DeviceIdError::Malformed(s.to_string()))?;
        let chan: u32 = chan
            .parse()
            .map_err(|_| DeviceIdError::Malformed(s.to_string()))?;

        // D-channels sit on even timeslots
        if chan < 2 || chan % 2 != 0 {
            return Err(DeviceIdError::InvalidChannel(s.to_string()));
        }
        Ok(DeviceId::Span { span, chan })
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceId::Span { span, chan } => write!(f, "s{}c{}", span, chan),
            DeviceId::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_span_chan() {
        let id: DeviceId = "s1c2".parse().unwrap();
        assert_eq!(id, DeviceId::Span { span: 1, chan: 2 });
        assert_eq!(id.to_string(), "s1c2");
        assert_eq!(id.node_path(), PathBuf::from("/dev/wptdm_s1c2"));
    }

    #[test]
    fn test_parse_uppercase() {
        let id: DeviceId = "S2C24".parse().unwrap();
        assert_eq!(id, DeviceId::Span { span: 2, chan: 24 });
    }

    #[test]
    fn test_odd_channel_rejected() {
        assert_eq!(
            "s1c3".parse::<DeviceId>(),
            Err(DeviceIdError::InvalidChannel("s1c3".to_string()))
        );
        assert!(matches!(
            "s1c0".parse::<DeviceId>(),
            Err(DeviceIdError::InvalidChannel(_))
        ));
    }

    #[test]
    fn test_malformed_rejected() {
        for bad in ["", "s1", "x1c2", "s1cx", "sac2", "1c2", "s-1c2"] {
            assert!(
                matches!(bad.parse::<DeviceId>(), Err(DeviceIdError::Malformed(_))),
                "{bad:?} should be malformed"
            );
        }
    }

    #[test]
    fn test_absolute_path() {
        let id: DeviceId = "/dev/ttyUSB0".parse().unwrap();
        assert_eq!(id, DeviceId::Path(PathBuf::from("/dev/ttyUSB0")));
        assert_eq!(id.node_path(), PathBuf::from("/dev/ttyUSB0"));
        assert_eq!(id.to_string(), "/dev/ttyUSB0");
    }
}
