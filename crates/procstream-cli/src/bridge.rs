// Terminal <-> supervised process bridge

use anyhow::{Context, Result};
use procstream_process::{
    trim_line_ending, FrameCodec, LineCodec, ProcessConfig, RawCodec, Signal, StreamKind,
    Supervisor,
};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cli::Cli;

/// Signals the CLI catches and relays to the child's process group
fn relayed() -> [(SignalKind, Signal); 5] {
    [
        (SignalKind::interrupt(), Signal::SIGINT),
        (SignalKind::terminate(), Signal::SIGTERM),
        (SignalKind::hangup(), Signal::SIGHUP),
        (SignalKind::user_defined1(), Signal::SIGUSR1),
        (SignalKind::user_defined2(), Signal::SIGUSR2),
    ]
}

const INPUT_CAPACITY: usize = 64;

/// Run the command described by `cli` until all of its output channels close
pub async fn run(cli: Cli) -> Result<()> {
    let config = cli.process_config().context("Invalid command line")?;

    if cli.merged {
        bridge(config, FrameCodec::new(cli.separator)).await
    } else {
        bridge(config, RawCodec).await
    }
}

async fn bridge<C>(config: ProcessConfig, codec: C) -> Result<()>
where
    C: LineCodec + Clone,
{
    let command = config.command.clone();
    let (input_tx, input_rx) = mpsc::channel(INPUT_CAPACITY);
    let (signal_tx, signal_rx) = mpsc::channel(8);

    let process = Supervisor::new()
        .spawn(config, codec.clone(), input_rx, signal_rx)
        .await
        .with_context(|| format!("Failed to start `{command}`"))?;
    info!(pid = process.pid(), command = %command, "Supervising");

    tokio::spawn(forward_lines(codec.clone(), tokio::io::stdin(), input_tx));
    tokio::spawn(forward_signals(signal_tx));

    let (stdout, stderr) = process.into_channels();
    let stdout_task = tokio::spawn(print_lines(
        StreamKind::Stdout,
        codec.clone(),
        stdout,
        tokio::io::stdout(),
    ));
    if let Some(stderr) = stderr {
        print_lines(StreamKind::Stderr, codec, stderr, tokio::io::stderr()).await;
    }
    stdout_task.await.context("stdout printer panicked")?;

    debug!(command = %command, "All output channels closed");
    Ok(())
}

/// Read `source` line by line into the input channel; EOF closes it
async fn forward_lines<C, R>(codec: C, source: R, input: mpsc::Sender<C::Item>)
where
    C: LineCodec,
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(source);
    let mut line = Vec::new();

    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "Failed to read stdin");
                break;
            }
        }

        match codec.decode(trim_line_ending(&line)) {
            Ok(item) => {
                if input.send(item).await.is_err() {
                    break;
                }
            }
            Err(e) => warn!(error = %e, "Skipping undecodable input line"),
        }
    }

    debug!("Input source closed, closing input channel");
}

/// Relay the signals we receive until the supervisor stops listening
async fn forward_signals(signals: mpsc::Sender<Signal>) {
    let (tx, mut rx) = mpsc::unbounded_channel();

    for (kind, sig) in relayed() {
        let mut stream = match signal(kind) {
            Ok(stream) => stream,
            Err(e) => {
                warn!(signal = %sig, error = %e, "Cannot listen for signal");
                continue;
            }
        };
        let tx = tx.clone();
        tokio::spawn(async move {
            while stream.recv().await.is_some() {
                if tx.send(sig).is_err() {
                    break;
                }
            }
        });
    }
    drop(tx);

    while let Some(sig) = rx.recv().await {
        debug!(signal = %sig, "Relaying signal");
        if signals.send(sig).await.is_err() {
            debug!("Signal relay stopped");
            break;
        }
    }
}

async fn print_lines<C, W>(stream: StreamKind, codec: C, mut rx: mpsc::Receiver<C::Item>, mut out: W)
where
    C: LineCodec,
    W: AsyncWrite + Unpin,
{
    let mut buf = Vec::new();

    while let Some(item) = rx.recv().await {
        buf.clear();
        codec.encode(&item, &mut buf);
        buf.push(b'\n');

        let written = async {
            out.write_all(&buf).await?;
            out.flush().await
        };
        if let Err(e) = written.await {
            warn!(%stream, error = %e, "Failed to print line");
        }
    }
}
