//! Rendering of raw device bytes for the terminal
//!
//! Printable ASCII passes through, CR/LF are dropped (or spelled out as
//! `\r` / `\n` in verbose mode) and anything else becomes `<xx>`.

use std::fmt::Write as _;

/// Direction of a displayed frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Received from the device
    Rx,
    /// Transmitted to the device
    Tx,
}

impl Direction {
    pub fn label(self) -> &'static str {
        match self {
            Direction::Rx => "Rx <<",
            Direction::Tx => "Tx >>",
        }
    }
}

/// Where rendered frames and user-facing errors end up
pub trait DisplaySink: Send + Sync {
    /// Show one rendered frame line
    fn show(&self, line: &str);

    /// Report a user-facing error (e.g. a rejected input line)
    fn error(&self, message: &str);
}

/// Escape `data` for single-line display
pub fn format_bytes(data: &[u8], verbose: bool) -> String {
    let mut out = String::with_capacity(data.len() * 2);
    for &byte in data {
        match byte {
            b'\r' => {
                if verbose {
                    out.push_str("\\r");
                }
            }
            b'\n' => {
                if verbose {
                    out.push_str("\\n");
                }
            }
            0x20..=0x7e => out.push(byte as char),
            _ => {
                let _ = write!(out, "<{:02x}>", byte);
            }
        }
    }
    out
}

/// Render a labelled frame, or `None` when nothing visible remains
pub fn render_frame(direction: Direction, data: &[u8], verbose: bool) -> Option<String> {
    let body = format_bytes(data, verbose);
    if body.is_empty() {
        return None;
    }
    Some(format!("{} {}", direction.label(), body))
}
