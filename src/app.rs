//! Interactive session wiring
//!
//! Opens the device, starts the I/O loop on its own thread and feeds it from
//! the line editor until the user quits, then joins the loop before the
//! device is closed.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};

use dchan_core::{
    DeviceChannel, DisplaySink, InputError, InputPump, IoLoop, IoLoopConfig, IoLoopHandle,
    LineSource, Link, StopReason, TxPolicy,
};

use crate::config::Settings;
use crate::console::{clear_current_line, ReadlineSource, TerminalDisplay, TerminalGuard};
use crate::device::{DeviceId, PollChannel};

/// How a session ended
#[derive(Debug)]
pub struct SessionEnd<C> {
    /// First reason the link was stopped with
    pub reason: Option<StopReason>,
    /// The device, already closed
    pub channel: C,
}

/// A running I/O loop plus the link it shares with the input side
pub struct Session<C> {
    link: Arc<Link>,
    display: Arc<dyn DisplaySink>,
    io: IoLoopHandle<C>,
}

impl<C: DeviceChannel + 'static> Session<C> {
    /// Start the I/O loop on `channel`
    pub fn start(
        channel: C,
        link: Arc<Link>,
        display: Arc<dyn DisplaySink>,
        config: IoLoopConfig,
    ) -> Result<Self> {
        let io = IoLoop::new(channel, link.clone(), display.clone(), config)
            .spawn()
            .context("Failed to spawn I/O thread")?;
        Ok(Self { link, display, io })
    }

    /// Feed typed lines to the device until the link stops
    pub fn pump<S: LineSource>(
        &self,
        source: S,
        policy: TxPolicy,
        poll_interval: Duration,
    ) -> Result<(), InputError> {
        InputPump::new(
            source,
            self.link.clone(),
            self.display.clone(),
            policy,
            poll_interval,
        )
        .run()
    }

    /// Stop the loop, wait for it to exit and close the device
    pub fn shutdown(self) -> Result<SessionEnd<C>> {
        // No-op when the input side already stopped the link
        self.link.stop(StopReason::Interrupted);

        let mut channel = self
            .io
            .join()
            .map_err(|_| anyhow!("I/O thread panicked"))?;
        channel
            .close()
            .with_context(|| format!("Failed to close {}", channel.name()))?;

        Ok(SessionEnd {
            reason: self.link.stop_reason(),
            channel,
        })
    }
}

/// Run an interactive session on `device`
pub fn run(settings: &Settings, device: &DeviceId) -> Result<()> {
    let name = device.to_string();
    let channel = PollChannel::open(&name, &device.node_path())?;

    let link = Arc::new(Link::new(settings.mailbox_capacity));
    {
        let link = link.clone();
        ctrlc::set_handler(move || {
            link.stop(StopReason::Interrupted);
        })
        .context("Failed to install interrupt handler")?;
    }

    let terminal = TerminalGuard::capture();
    let display = Arc::new(TerminalDisplay::new());
    let (source, printer) =
        ReadlineSource::spawn(settings.prompt.clone(), settings.input_poll_interval())?;
    if let Some(printer) = printer {
        display.attach(printer);
    }

    tracing::info!("Connected to {} ({})", name, device.node_path().display());
    let session = Session::start(channel, link, display.clone(), settings.io_loop_config())?;
    let input = session.pump(source, settings.tx_policy(), settings.input_poll_interval());

    display.detach();
    drop(terminal);
    clear_current_line();
    println!("\nAborting ...");

    let end = session.shutdown()?;
    input.context("Interactive input failed")?;
    tracing::debug!("Session on {} ended: {:?}", name, end.reason);

    if end.reason == Some(StopReason::WriteFailed) {
        bail!("Transmission to {} failed, channel closed", name);
    }
    Ok(())
}
