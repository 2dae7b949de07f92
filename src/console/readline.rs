//! rustyline-backed line source
//!
//! The editor lives on a dedicated thread and reads exactly one line per
//! request, so nothing is read while the transmit slot is still busy. The
//! caller waits for the answer in short slices and gives up as soon as the
//! link stops, which is how an interrupt unwinds a pending prompt.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use rustyline::error::ReadlineError;
use rustyline::ExternalPrinter;

use dchan_core::{InputError, LineEvent, LineSource, Link};

/// Answer from the editor thread
type EditorReply = Result<LineEvent, String>;

/// Startup handshake: the editor's external printer, or why the editor failed
type EditorReady = Result<Option<Box<dyn ExternalPrinter + Send>>, String>;

/// [`LineSource`] reading from the terminal through rustyline
pub struct ReadlineSource {
    request_tx: SyncSender<()>,
    reply_rx: Receiver<EditorReply>,
    poll_interval: Duration,
    awaiting: bool,
}

impl ReadlineSource {
    /// Start the editor thread
    ///
    /// Also returns the editor's external printer (if the terminal supports
    /// one) for output that must not corrupt the prompt.
    pub fn spawn(
        prompt: String,
        poll_interval: Duration,
    ) -> Result<(Self, Option<Box<dyn ExternalPrinter + Send>>)> {
        let (request_tx, request_rx) = mpsc::sync_channel::<()>(1);
        let (reply_tx, reply_rx) = mpsc::sync_channel::<EditorReply>(1);
        let (ready_tx, ready_rx) = mpsc::sync_channel::<EditorReady>(1);

        thread::Builder::new()
            .name("dchan-readline".into())
            .spawn(move || {
                let config = rustyline::Config::builder()
                    .auto_add_history(false)
                    .build();
                let mut rl = match rustyline::DefaultEditor::with_config(config) {
                    Ok(editor) => editor,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };

                let printer = rl
                    .create_external_printer()
                    .ok()
                    .map(|p| Box::new(p) as Box<dyn ExternalPrinter + Send>);
                let _ = ready_tx.send(Ok(printer));

                // One line per request; the sender going away ends the thread
                while request_rx.recv().is_ok() {
                    let reply = match rl.readline(&prompt) {
                        Ok(line) => {
                            if !line.is_empty() {
                                let _ = rl.add_history_entry(line.as_str());
                            }
                            Ok(LineEvent::Line(line))
                        }
                        Err(ReadlineError::Interrupted) => Ok(LineEvent::Interrupted),
                        Err(ReadlineError::Eof) => Ok(LineEvent::EndOfInput),
                        Err(e) => Err(e.to_string()),
                    };
                    let done = !matches!(reply, Ok(LineEvent::Line(_)));
                    if reply_tx.send(reply).is_err() || done {
                        break;
                    }
                }
            })
            .context("Failed to spawn line editor thread")?;

        let printer = ready_rx
            .recv()
            .context("Line editor thread exited during startup")?
            .map_err(|e| anyhow::anyhow!("Failed to create line editor: {e}"))?;
        let source = Self {
            request_tx,
            reply_rx,
            poll_interval,
            awaiting: false,
        };
        Ok((source, printer))
    }
}

/// Wait for the editor's answer in `poll_interval` slices
///
/// `None` means the link stopped first; the request stays outstanding.
fn await_reply(
    reply_rx: &Receiver<EditorReply>,
    link: &Link,
    poll_interval: Duration,
) -> Option<Result<LineEvent, InputError>> {
    loop {
        if !link.is_running() {
            return None;
        }
        match reply_rx.recv_timeout(poll_interval) {
            Ok(reply) => return Some(reply.map_err(|message| InputError::Editor { message })),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => return Some(Err(InputError::Disconnected)),
        }
    }
}

impl LineSource for ReadlineSource {
    fn next_line(&mut self, link: &Link) -> Result<LineEvent, InputError> {
        if !self.awaiting {
            self.request_tx
                .send(())
                .map_err(|_| InputError::Disconnected)?;
            self.awaiting = true;
        }

        match await_reply(&self.reply_rx, link, self.poll_interval) {
            Some(reply) => {
                self.awaiting = false;
                reply
            }
            None => Ok(LineEvent::Interrupted),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dchan_core::StopReason;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Instant;

    /// Source wired to channels the test plays the editor thread on
    fn detached_source(
        poll_interval: Duration,
    ) -> (ReadlineSource, Receiver<()>, SyncSender<EditorReply>) {
        let (request_tx, request_rx) = mpsc::sync_channel(1);
        let (reply_tx, reply_rx) = mpsc::sync_channel(1);
        let source = ReadlineSource {
            request_tx,
            reply_rx,
            poll_interval,
            awaiting: false,
        };
        (source, request_rx, reply_tx)
    }

    #[test]
    fn test_stop_unwinds_unanswered_prompt() {
        let link = Arc::new(Link::new(64));
        let (mut source, request_rx, _reply_tx) = detached_source(Duration::from_millis(10));

        let stopper = {
            let link = link.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                link.stop(StopReason::Interrupted);
                Instant::now()
            })
        };

        let event = source.next_line(&link).unwrap();
        let stopped_at = stopper.join().unwrap();

        assert_eq!(event, LineEvent::Interrupted);
        assert!(stopped_at.elapsed() < Duration::from_millis(200));
        assert!(request_rx.try_recv().is_ok());
        assert!(source.awaiting);
    }

    #[test]
    fn test_answer_is_returned_and_request_not_repeated() {
        let link = Link::new(64);
        let (mut source, request_rx, reply_tx) = detached_source(Duration::from_millis(5));

        reply_tx.send(Ok(LineEvent::Line("ATI".into()))).unwrap();
        assert_eq!(source.next_line(&link).unwrap(), LineEvent::Line("ATI".into()));
        assert!(request_rx.try_recv().is_ok());
        assert!(!source.awaiting);
    }

    #[test]
    fn test_await_reply_maps_failures() {
        let link = Link::new(64);
        let (reply_tx, reply_rx) = mpsc::sync_channel::<EditorReply>(1);

        reply_tx.send(Err("tty gone".into())).unwrap();
        assert!(matches!(
            await_reply(&reply_rx, &link, Duration::from_millis(5)),
            Some(Err(InputError::Editor { message })) if message == "tty gone"
        ));

        drop(reply_tx);
        assert!(matches!(
            await_reply(&reply_rx, &link, Duration::from_millis(5)),
            Some(Err(InputError::Disconnected))
        ));
    }

    #[test]
    fn test_await_reply_returns_none_once_stopped() {
        let link = Link::new(64);
        let (_reply_tx, reply_rx) = mpsc::sync_channel::<EditorReply>(1);
        link.stop(StopReason::EndOfInput);
        assert!(await_reply(&reply_rx, &link, Duration::from_millis(5)).is_none());
    }
}
