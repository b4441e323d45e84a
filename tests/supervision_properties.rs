//! Termination and stream-bridging properties of supervised processes
//!
//! Each test drives a real child through the public channels only.

use std::time::Duration;

use procstream_integration_tests::{closes_within, collect_until_closed, take};
use procstream_process::{
    DiagnosticSink, FrameCodec, Message, ProcessConfig, ProcessError, ProcessState, Signal,
    Supervisor,
};
use tokio::sync::mpsc;
use tokio::time::sleep;

const SECOND: Duration = Duration::from_secs(1);

fn sh(script: &str) -> ProcessConfig {
    ProcessConfig::new("sh").args(["-c", script])
}

#[tokio::test]
async fn closing_input_closes_every_output() {
    let (input, input_rx) = mpsc::channel::<Message>(1);
    let (_signals, signals_rx) = mpsc::channel(1);

    let mut process = Supervisor::new()
        .spawn_lines(ProcessConfig::new("cat"), input_rx, signals_rx)
        .await
        .unwrap();

    drop(input);

    assert!(closes_within(process.stdout(), SECOND).await);
    assert!(closes_within(process.stderr().unwrap(), SECOND).await);
    process.exited().await;
    assert_eq!(process.state(), ProcessState::Exited);
}

#[tokio::test]
async fn closing_signals_does_not_terminate() {
    let (input, input_rx) = mpsc::channel::<Message>(1);
    let (signals, signals_rx) = mpsc::channel(1);

    let mut process = Supervisor::new()
        .spawn_lines(ProcessConfig::new("cat"), input_rx, signals_rx)
        .await
        .unwrap();

    drop(signals);
    sleep(SECOND).await;

    assert_eq!(process.state(), ProcessState::Running);
    assert!(matches!(
        process.stdout().try_recv(),
        Err(mpsc::error::TryRecvError::Empty)
    ));

    drop(input);
    assert!(closes_within(process.stdout(), SECOND).await);
}

#[tokio::test]
async fn lines_round_trip_in_order() {
    let (input, input_rx) = mpsc::channel(8);
    let (_signals, signals_rx) = mpsc::channel(1);

    let mut process = Supervisor::new()
        .spawn_lines(ProcessConfig::new("cat"), input_rx, signals_rx)
        .await
        .unwrap();

    let sent: Vec<Message> = (0..50)
        .map(|i| Message::new(format!("line {i} \u{e9}\t\x01 end").into_bytes()))
        .collect();
    let feeder = {
        let sent = sent.clone();
        tokio::spawn(async move {
            for msg in sent {
                input.send(msg).await.unwrap();
            }
            input
        })
    };

    let received = take(process.stdout(), sent.len(), 5 * SECOND).await.unwrap();
    assert_eq!(received, sent);

    drop(feeder.await.unwrap());
    assert!(closes_within(process.stdout(), SECOND).await);
}

#[tokio::test]
async fn early_input_close_never_yields_more_output() {
    let script = "for i in 1 2 3 4 5 6 7 8 9 10; do echo $i; sleep 0.05; done";

    let full = {
        let (input, input_rx) = mpsc::channel::<Message>(1);
        let (_signals, signals_rx) = mpsc::channel(1);
        let mut process = Supervisor::new()
            .spawn_lines(sh(script), input_rx, signals_rx)
            .await
            .unwrap();
        let lines = collect_until_closed(process.stdout(), 5 * SECOND).await.unwrap();
        drop(input);
        lines.len()
    };

    let early = {
        let (input, input_rx) = mpsc::channel::<Message>(1);
        let (_signals, signals_rx) = mpsc::channel(1);
        let mut process = Supervisor::new()
            .spawn_lines(sh(script), input_rx, signals_rx)
            .await
            .unwrap();
        sleep(Duration::from_millis(120)).await;
        drop(input);
        collect_until_closed(process.stdout(), 5 * SECOND).await.unwrap().len()
    };

    // Lines come every 50ms and input closes after 120ms
    assert_eq!(full, 10);
    assert!(early < full);
    assert!(early <= 5, "interrupt should cut output short, got {early} lines");
}

#[tokio::test]
async fn merged_mode_skips_malformed_lines() {
    let (_input, input_rx) = mpsc::channel(1);
    let (_signals, signals_rx) = mpsc::channel(1);

    let config = sh("printf 'key\\tvalue\\nnoseparator\\n'").merged(DiagnosticSink::Null);
    let mut process = Supervisor::new()
        .spawn(config, FrameCodec::default(), input_rx, signals_rx)
        .await
        .unwrap();

    assert!(process.stderr().is_none());

    let frames = collect_until_closed(process.stdout(), 2 * SECOND).await.unwrap();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].key(), "key");
    assert_eq!(frames[0].value(), b"value");
}

#[tokio::test]
async fn closed_stdout_is_reported_before_exit() {
    let (_input, input_rx) = mpsc::channel::<Message>(1);
    let (_signals, signals_rx) = mpsc::channel(1);

    let (mut stdout, stderr) = Supervisor::new()
        .spawn_lines(sh("exec 1>&-; sleep 1"), input_rx, signals_rx)
        .await
        .unwrap()
        .into_channels();
    let mut stderr = stderr.unwrap();

    assert!(closes_within(&mut stdout, SECOND).await);
    assert!(closes_within(&mut stderr, 2 * SECOND).await);
}

#[tokio::test]
async fn closed_stderr_is_reported_before_exit() {
    let (_input, input_rx) = mpsc::channel::<Message>(1);
    let (_signals, signals_rx) = mpsc::channel(1);

    let (mut stdout, stderr) = Supervisor::new()
        .spawn_lines(sh("exec 2>&-; sleep 1"), input_rx, signals_rx)
        .await
        .unwrap()
        .into_channels();
    let mut stderr = stderr.unwrap();

    assert!(closes_within(&mut stderr, SECOND).await);
    assert!(closes_within(&mut stdout, 2 * SECOND).await);
}

#[tokio::test]
async fn split_mode_keeps_streams_apart() {
    let (_input, input_rx) = mpsc::channel(1);
    let (_signals, signals_rx) = mpsc::channel(1);

    let (mut stdout, stderr) = Supervisor::new()
        .spawn_lines(ProcessConfig::new("echo").args(["Test"]), input_rx, signals_rx)
        .await
        .unwrap()
        .into_channels();
    let mut stderr = stderr.unwrap();

    let out = collect_until_closed(&mut stdout, 2 * SECOND).await.unwrap();
    let err = collect_until_closed(&mut stderr, 2 * SECOND).await.unwrap();
    assert_eq!(out, vec![Message::from("Test")]);
    assert!(err.is_empty());
}

#[tokio::test]
async fn relayed_signal_reaches_grandchildren() {
    let (_input, input_rx) = mpsc::channel::<Message>(1);
    let (signals, signals_rx) = mpsc::channel(1);

    // The background sleep holds stdout open until it dies too
    let mut process = Supervisor::new()
        .spawn_lines(sh("sleep 30 & echo $!; wait"), input_rx, signals_rx)
        .await
        .unwrap();

    let pid = take(process.stdout(), 1, 2 * SECOND).await.unwrap();
    assert!(!pid[0].is_empty());

    signals.send(Signal::SIGTERM).await.unwrap();
    assert!(closes_within(process.stdout(), 2 * SECOND).await);
    process.exited().await;
}

#[tokio::test]
async fn interrupt_escalates_to_kill() {
    let (input, input_rx) = mpsc::channel::<Message>(1);
    let (_signals, signals_rx) = mpsc::channel(1);

    let config = sh("trap '' INT; sleep 10").kill_after(Duration::from_millis(200));
    let mut process = Supervisor::new()
        .spawn_lines(config, input_rx, signals_rx)
        .await
        .unwrap();

    // Let the trap install before interrupting
    sleep(Duration::from_millis(200)).await;
    drop(input);

    assert!(closes_within(process.stdout(), 3 * SECOND).await);
    process.exited().await;
}

#[tokio::test]
async fn escalation_kills_descendants_that_outlive_the_leader() {
    let (input, input_rx) = mpsc::channel::<Message>(1);
    let (_signals, signals_rx) = mpsc::channel(1);

    // The leader dies on SIGINT; the subshell ignores it and holds stdout open
    let config = sh("(trap '' INT; sleep 5) & sleep 30").kill_after(Duration::from_millis(200));
    let mut process = Supervisor::new()
        .spawn_lines(config, input_rx, signals_rx)
        .await
        .unwrap();

    sleep(Duration::from_millis(200)).await;
    drop(input);

    process.exited().await;
    assert!(closes_within(process.stdout(), 3 * SECOND).await);
    assert!(closes_within(process.stderr().unwrap(), SECOND).await);
}

#[tokio::test]
async fn slow_consumer_loses_nothing() {
    let (_input, input_rx) = mpsc::channel::<Message>(1);
    let (_signals, signals_rx) = mpsc::channel(1);

    let config = ProcessConfig::new("seq").args(["1", "100"]).channel_capacity(4);
    let mut process = Supervisor::new()
        .spawn_lines(config, input_rx, signals_rx)
        .await
        .unwrap();

    sleep(Duration::from_millis(200)).await;

    let lines = collect_until_closed(process.stdout(), 5 * SECOND).await.unwrap();
    let expected: Vec<Message> = (1..=100).map(|i| Message::from(i.to_string())).collect();
    assert_eq!(lines, expected);
}

#[tokio::test]
async fn spawn_failures_are_errors() {
    let (_input, input_rx) = mpsc::channel::<Message>(1);
    let (_signals, signals_rx) = mpsc::channel(1);
    let err = Supervisor::new()
        .spawn_lines(
            ProcessConfig::new("procstream-no-such-binary"),
            input_rx,
            signals_rx,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ProcessError::Spawn { .. }));

    assert!(matches!(
        ProcessConfig::from_argv(Vec::<String>::new()),
        Err(ProcessError::InvalidArgument(_))
    ));
}
