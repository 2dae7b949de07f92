//! Terminal display for device frames
//!
//! While the prompt is active, frames go through rustyline's external printer
//! so an incoming `Rx` line does not tear the line being typed. The printer is
//! fed from a bounded queue drained on its own thread. When the queue stays
//! full, lines are dropped and counted rather than written around it, so what
//! is shown keeps device order. Without a printer, frames go straight to stdout.

use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rustyline::ExternalPrinter;

use dchan_core::DisplaySink;

/// Queue between callers and the external printer
struct PrinterQueue {
    tx: SyncSender<String>,
}

impl PrinterQueue {
    const CAPACITY: usize = 256;
    /// How long a caller keeps retrying a full queue before dropping the line
    const PATIENCE: Duration = Duration::from_millis(50);

    fn start(mut printer: Box<dyn ExternalPrinter + Send>) -> io::Result<Self> {
        let (tx, rx) = mpsc::sync_channel::<String>(Self::CAPACITY);
        thread::Builder::new()
            .name("dchan-printer".into())
            .spawn(move || {
                while let Ok(msg) = rx.recv() {
                    if let Err(e) = printer.print(msg) {
                        tracing::debug!("External printer failed: {}", e);
                        break;
                    }
                }
            })?;
        Ok(Self { tx })
    }
}

/// Result of handing a line to the printer queue
enum Enqueue {
    Sent,
    Dropped,
    /// No printer attached (or it went away); print it yourself
    Unrouted(String),
}

/// [`DisplaySink`] writing to the interactive terminal
#[derive(Default)]
pub struct TerminalDisplay {
    printer: Mutex<Option<PrinterQueue>>,
    dropped: AtomicU64,
}

impl TerminalDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route subsequent output through `printer`
    pub fn attach(&self, printer: Box<dyn ExternalPrinter + Send>) {
        match PrinterQueue::start(printer) {
            Ok(queue) => *self.printer.lock() = Some(queue),
            Err(e) => tracing::warn!("Failed to start printer thread: {}", e),
        }
    }

    /// Go back to writing stdout directly
    pub fn detach(&self) {
        *self.printer.lock() = None;
    }

    /// Lines lost to a stalled printer so far
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn enqueue(&self, msg: String) -> Enqueue {
        // Held across retries so concurrent callers cannot reorder lines
        let guard = self.printer.lock();
        let Some(queue) = guard.as_ref() else {
            return Enqueue::Unrouted(msg);
        };

        let deadline = Instant::now() + PrinterQueue::PATIENCE;
        let mut msg = msg;
        loop {
            match queue.tx.try_send(msg) {
                Ok(()) => return Enqueue::Sent,
                Err(TrySendError::Disconnected(m)) => return Enqueue::Unrouted(m),
                Err(TrySendError::Full(m)) => {
                    if Instant::now() >= deadline {
                        let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                        if total == 1 || total % 100 == 0 {
                            tracing::warn!("Printer queue full, {} line(s) dropped", total);
                        }
                        return Enqueue::Dropped;
                    }
                    msg = m;
                    thread::sleep(Duration::from_millis(1));
                }
            }
        }
    }
}

impl DisplaySink for TerminalDisplay {
    fn show(&self, line: &str) {
        if let Enqueue::Unrouted(msg) = self.enqueue(format!("{line}\n")) {
            let mut stdout = io::stdout().lock();
            let _ = stdout.write_all(msg.as_bytes());
            let _ = stdout.flush();
        }
    }

    fn error(&self, message: &str) {
        if let Enqueue::Unrouted(_) = self.enqueue(format!("{message}\n")) {
            eprintln!("{message}");
        }
    }
}
