//! End-to-end behavior of the I/O loop against a scripted device

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use dchan_core::testing::{
    CaptureDisplay, ChannelCall, MockChannel, ScriptedLines, WaitScript, WriteScript,
};
use dchan_core::{
    DeviceChannel, InputPump, IoLoop, IoLoopConfig, Link, Readiness, Step, StopReason, TxPolicy,
};
use pretty_assertions::assert_eq;

fn both() -> Readiness {
    Readiness::INPUT | Readiness::OUTPUT
}

fn build(
    channel: MockChannel,
    verbose: bool,
) -> (IoLoop<MockChannel>, Arc<Link>, Arc<CaptureDisplay>) {
    let link = Arc::new(Link::new(512));
    let display = Arc::new(CaptureDisplay::default());
    let config = IoLoopConfig {
        verbose,
        ..IoLoopConfig::default()
    };
    let io = IoLoop::new(channel, link.clone(), display.clone(), config);
    (io, link, display)
}

#[test]
fn test_typed_line_is_written_and_confirmed() {
    let channel = MockChannel::new("s1c2")
        .with_wait(WaitScript::Ready(both()))
        .with_write(WriteScript::Accept(4))
        .with_read(b"ATI\r\r\nOK\r\n".to_vec());
    let (mut io, link, display) = build(channel, true);

    assert_eq!(link.mailbox().publish(b"ATI", TxPolicy::default().terminator()), Ok(4));
    assert_eq!(io.step(), Step::Serviced);

    assert_eq!(io.channel().requested(), vec![both()]);
    assert_eq!(io.channel().write_attempts(), vec![b"ATI\r".to_vec()]);
    assert_eq!(
        display.lines(),
        vec!["Rx << ATI\\r\\r\\nOK\\r\\n", "Tx >> ATI\\r"]
    );
    assert!(link.mailbox().is_empty());
    assert_eq!(io.pending_progress(), None);
}

#[test]
fn test_received_bell_is_escaped() {
    let channel = MockChannel::new("s1c2")
        .with_wait(WaitScript::Ready(Readiness::INPUT))
        .with_read(b"RI\x07NG!".to_vec());
    let (mut io, _link, display) = build(channel, false);

    assert_eq!(io.step(), Step::Serviced);
    assert_eq!(display.lines(), vec!["Rx << RI<07>NG!"]);
}

#[test]
fn test_partial_writes_accumulate() {
    let channel = MockChannel::new("s1c2")
        .with_wait(WaitScript::Ready(Readiness::OUTPUT))
        .with_write(WriteScript::Accept(2))
        .with_wait(WaitScript::Timeout)
        .with_wait(WaitScript::Ready(Readiness::OUTPUT))
        .with_write(WriteScript::Accept(2))
        .with_wait(WaitScript::Timeout);
    let (mut io, link, display) = build(channel, false);
    link.mailbox().publish(b"ATI", Some(b'\r')).unwrap();

    assert_eq!(io.step(), Step::Serviced);
    assert_eq!(io.pending_progress(), Some((2, 4)));
    assert!(display.lines().is_empty());

    assert_eq!(io.step(), Step::Idle);
    assert_eq!(io.pending_progress(), Some((2, 4)));

    assert_eq!(io.step(), Step::Serviced);
    assert_eq!(io.pending_progress(), None);
    assert_eq!(display.lines(), vec!["Tx >> ATI"]);

    // Nothing left to send, only input is requested again
    assert_eq!(io.step(), Step::Idle);
    assert_eq!(
        io.channel().requested(),
        vec![both(), both(), both(), Readiness::INPUT]
    );
    assert_eq!(
        io.channel().write_attempts(),
        vec![b"ATI\r".to_vec(), b"I\r".to_vec()]
    );
    assert_eq!(io.channel().written(), b"ATI\r".to_vec());
}

#[test]
fn test_short_writes_deliver_in_order() {
    let message: Vec<u8> = (0..64u8).map(|i| b'A' + (i % 26)).collect();
    let mut channel = MockChannel::new("/dev/ttyUSB0");
    for chunk in [1usize, 7, 3, 20, 5, 40] {
        channel = channel
            .with_wait(WaitScript::Ready(Readiness::OUTPUT))
            .with_write(WriteScript::Accept(chunk));
    }
    let (mut io, link, display) = build(channel, false);
    link.mailbox().publish(&message, None).unwrap();

    for _ in 0..6 {
        assert_eq!(io.step(), Step::Serviced);
    }

    assert_eq!(io.channel().written(), message);
    assert_eq!(display.lines().len(), 1);
    assert_eq!(io.pending_progress(), None);
}

#[test]
fn test_long_line_never_reaches_device() {
    let link = Arc::new(Link::new(8));
    let display = Arc::new(CaptureDisplay::default());
    let mut pump = InputPump::new(
        ScriptedLines::lines(&["AT+CMGS=\"0123456789\""]),
        link.clone(),
        display.clone(),
        TxPolicy::default(),
        Duration::from_millis(1),
    );
    pump.run().unwrap();
    assert!(link.mailbox().is_empty());
    assert_eq!(display.errors(), vec!["-ERR Line too long (max is 7)"]);

    // The loop would only ever see an empty mailbox
    let channel = MockChannel::new("s1c2").with_wait(WaitScript::Timeout);
    let mut io = IoLoop::new(channel, Arc::new(Link::new(8)), display, IoLoopConfig::default());
    io.step();
    assert!(io.channel().write_attempts().is_empty());
}

#[test]
fn test_spawned_loop_exits_after_stop() {
    let channel = MockChannel::new("s1c2");
    let (io, link, _display) = build(channel, false);
    let handle = io.spawn().unwrap();

    thread::sleep(Duration::from_millis(30));
    assert!(!handle.is_finished());

    let stopped_at = Instant::now();
    link.stop(StopReason::Interrupted);
    let channel = handle.join().unwrap();
    assert!(stopped_at.elapsed() < Duration::from_millis(500));

    // Only waits happened; no read or write after the stop
    assert!(channel
        .calls()
        .iter()
        .all(|c| matches!(c, ChannelCall::Wait(_))));
}

#[test]
fn test_write_failure_stops_spawned_loop() {
    let channel = MockChannel::new("s1c2")
        .with_wait(WaitScript::Ready(Readiness::OUTPUT))
        .with_write(WriteScript::Fail);
    let (io, link, display) = build(channel, false);
    link.mailbox().publish(b"ATZ", Some(b'\r')).unwrap();

    let mut channel = io.spawn().unwrap().join().unwrap();
    assert_eq!(link.stop_reason(), Some(StopReason::WriteFailed));
    assert!(display.lines().is_empty());

    channel.close().unwrap();
    assert!(channel.is_closed());
}

#[test]
fn test_end_of_input_waits_for_last_line() {
    let channel = MockChannel::new("s1c2")
        .with_idle_readiness(Readiness::OUTPUT)
        .with_write(WriteScript::Accept(2));
    let (io, link, display) = build(channel, false);
    let handle = io.spawn().unwrap();

    let mut pump = InputPump::new(
        ScriptedLines::lines(&["ATI"]),
        link.clone(),
        display.clone(),
        TxPolicy::default(),
        Duration::from_millis(1),
    );
    pump.run().unwrap();
    let channel = handle.join().unwrap();

    assert_eq!(channel.written(), b"ATI\r".to_vec());
    assert_eq!(display.lines(), vec!["Tx >> ATI"]);
    assert_eq!(link.stop_reason(), Some(StopReason::EndOfInput));
    assert!(link.mailbox().is_idle());
}
