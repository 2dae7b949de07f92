//! Terminal state around the interactive session

use std::io::{self, IsTerminal, Write};
use std::os::fd::AsFd;

use crossterm::cursor::MoveToColumn;
use crossterm::terminal::{Clear, ClearType};
use nix::sys::termios::{tcgetattr, tcsetattr, SetArg, Termios};

/// Snapshot of the stdin line discipline, restored on drop
///
/// The line editor thread may still sit in raw mode when the session ends
/// (write failure, external SIGINT); restoring here leaves the shell usable.
pub struct TerminalGuard {
    saved: Option<Termios>,
}

impl TerminalGuard {
    /// Record the current settings if stdin is a terminal
    pub fn capture() -> Self {
        let stdin = io::stdin();
        if !stdin.is_terminal() {
            return Self { saved: None };
        }
        match tcgetattr(stdin.as_fd()) {
            Ok(termios) => Self {
                saved: Some(termios),
            },
            Err(e) => {
                tracing::debug!("tcgetattr failed: {}", e);
                Self { saved: None }
            }
        }
    }

    fn restore(&self) {
        if let Some(termios) = &self.saved {
            let stdin = io::stdin();
            if let Err(e) = tcsetattr(stdin.as_fd(), SetArg::TCSANOW, termios) {
                tracing::debug!("tcsetattr failed: {}", e);
            }
        }
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        self.restore();
    }
}

/// Wipe the half-drawn prompt line before printing shutdown messages
pub fn clear_current_line() {
    let mut stdout = io::stdout();
    if stdout.is_terminal() {
        let _ = crossterm::execute!(stdout, Clear(ClearType::CurrentLine), MoveToColumn(0));
    }
    let _ = stdout.flush();
}
