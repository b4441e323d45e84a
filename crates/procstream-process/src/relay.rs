//! Signal relay: signal channel → child process group

use std::sync::Arc;

use nix::sys::signal::Signal;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::child::{ProcessHandle, ProcessState};

/// Forward every received signal to the child's process group
///
/// Closing the signal channel only stops the relay; it never terminates the child and
/// raises no completion. The relay also retires once the child has exited so that a
/// recycled group id is never signaled.
pub(crate) async fn relay_signals(
    handle: Arc<ProcessHandle>,
    mut signals: mpsc::Receiver<Signal>,
    mut state: watch::Receiver<ProcessState>,
) {
    loop {
        tokio::select! {
            received = signals.recv() => match received {
                Some(signal) => {
                    if let Err(e) = handle.signal_group(signal) {
                        warn!(pgid = %handle.pgid(), %signal, error = %e, "Failed to relay signal");
                    }
                }
                None => {
                    debug!(pid = handle.pid(), "Signal channel closed, relay stopped");
                    return;
                }
            },
            _ = state.wait_for(|s| *s == ProcessState::Exited) => {
                debug!(pid = handle.pid(), "Process exited, relay stopped");
                return;
            }
        }
    }
}
