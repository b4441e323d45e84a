//! Stream writer: input channel → child stdin

use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::codec::LineCodec;

/// Drain `input` into `stdin`, one newline-terminated line per item
///
/// Write failures are logged and the item skipped. When the input channel closes,
/// `stdin` is shut down and dropped, then `done` is raised. A write still blocked on a
/// full pipe at that point is abandoned, so a child that stops reading cannot keep
/// the closure from being reported. At most one item is held back while a write is
/// blocked.
pub(crate) async fn write_stream<C, W>(
    codec: Arc<C>,
    mut input: mpsc::Receiver<C::Item>,
    mut stdin: W,
    done: oneshot::Sender<()>,
) where
    C: LineCodec,
    W: AsyncWrite + Unpin,
{
    let mut buf = Vec::new();
    let mut queued = None;

    loop {
        let item = match queued.take() {
            Some(item) => item,
            None => match input.recv().await {
                Some(item) => item,
                None => break,
            },
        };

        buf.clear();
        codec.encode(&item, &mut buf);
        buf.push(b'\n');

        let write = write_line(&mut stdin, &buf);
        tokio::pin!(write);

        let abandoned = loop {
            tokio::select! {
                biased;
                result = &mut write => {
                    if let Err(e) = result {
                        warn!(error = %e, bytes = buf.len(), "Failed to write message to stdin");
                    }
                    break false;
                }
                received = input.recv(), if queued.is_none() => match received {
                    Some(next) => queued = Some(next),
                    None => break true,
                },
            }
        };

        if abandoned {
            warn!(bytes = buf.len(), "Input closed while stdin was full, abandoning write");
            break;
        }
    }

    debug!("Input channel closed, closing stdin");
    if let Err(e) = stdin.shutdown().await {
        debug!(error = %e, "Error shutting down stdin");
    }
    drop(stdin);

    let _ = done.send(());
}

async fn write_line<W: AsyncWrite + Unpin>(stdin: &mut W, line: &[u8]) -> std::io::Result<()> {
    stdin.write_all(line).await?;
    stdin.flush().await
}
