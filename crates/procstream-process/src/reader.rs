//! Line readers: child stdout/stderr → output channels

use std::fmt;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::codec::LineCodec;

/// Which output pipe a reader is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout => f.write_str("stdout"),
            Self::Stderr => f.write_str("stderr"),
        }
    }
}

/// Strip the trailing `\n` and an optional `\r` before it
pub fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Scan `pipe` line by line and send each decoded line on `output`
///
/// Undecodable lines are logged and dropped. If the receiver goes away the pipe is
/// still drained so the child never blocks on a full pipe. On EOF or a read error the
/// output channel is closed first, then `done` is raised.
pub(crate) async fn read_lines<C, R>(
    stream: StreamKind,
    codec: Arc<C>,
    pipe: R,
    output: mpsc::Sender<C::Item>,
    done: oneshot::Sender<()>,
) where
    C: LineCodec,
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(pipe);
    let mut output = Some(output);
    let mut line = Vec::new();

    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => {
                debug!(%stream, "Pipe reached EOF");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(%stream, error = %e, "Failed to read from pipe");
                break;
            }
        }

        let item = match codec.decode(trim_line_ending(&line)) {
            Ok(item) => item,
            Err(e) => {
                warn!(%stream, error = %e, "Dropping undecodable line");
                continue;
            }
        };

        if let Some(tx) = &output {
            if tx.send(item).await.is_err() {
                debug!(%stream, "Output receiver dropped, discarding further lines");
                output = None;
            }
        }
    }

    drop(output);
    drop(reader);
    let _ = done.send(());
}

/// Drain `pipe` into the log; used for stderr in merged mode
pub(crate) async fn log_lines<R>(pid: u32, pipe: R)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(pipe);
    let mut line = Vec::new();

    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(trim_line_ending(&line));
                warn!(pid, stream = %StreamKind::Stderr, line = %text, "Child diagnostic output");
            }
            Err(e) => {
                warn!(pid, error = %e, "Failed to read child diagnostics");
                break;
            }
        }
    }
}
