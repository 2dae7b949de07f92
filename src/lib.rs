//! dchan: interactive console for Wanpipe D-channel and UART devices
//!
//! The I/O engine lives in `dchan-core`; this crate adds the command line,
//! settings file, the `poll(2)` device channel and the terminal adapters.

pub mod app;
pub mod config;
pub mod console;
pub mod device;
