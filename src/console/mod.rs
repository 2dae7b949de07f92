//! Interactive terminal adapters: line editor, display and terminal state

pub mod display;
pub mod readline;
pub mod terminal;

pub use display::TerminalDisplay;
pub use readline::ReadlineSource;
pub use terminal::{clear_current_line, TerminalGuard};
