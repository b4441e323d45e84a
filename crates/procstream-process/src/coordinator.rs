//! Termination coordinator
//!
//! Waits for the first of the writer, reader and runner completions and reacts to it
//! exactly once. Only an input closure that wins the race is escalated into a signal
//! to the process group: every other first event means the child is already on its
//! way out.

use std::sync::Arc;
use std::time::Duration;

use nix::sys::signal::Signal;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::child::ProcessHandle;
use crate::reader::StreamKind;

/// A task that reached its terminal state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The caller closed the input channel and stdin was closed
    InputClosed,
    /// An output pipe reached EOF and its channel was closed
    OutputClosed(StreamKind),
    /// The child exited
    ProcessExited,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Reaction {
    Interrupt,
    Nothing,
}

impl Completion {
    pub(crate) fn reaction(self) -> Reaction {
        match self {
            Self::InputClosed => Reaction::Interrupt,
            Self::OutputClosed(_) | Self::ProcessExited => Reaction::Nothing,
        }
    }
}

/// Completion slots the coordinator races
pub(crate) struct CompletionSlots {
    pub(crate) writer: oneshot::Receiver<()>,
    pub(crate) stdout: oneshot::Receiver<()>,
    pub(crate) stderr: Option<oneshot::Receiver<()>>,
    pub(crate) process: oneshot::Receiver<()>,
}

pub(crate) struct Coordinator {
    handle: Arc<ProcessHandle>,
    interrupt_signal: Signal,
    kill_after: Option<Duration>,
    slots: CompletionSlots,
}

impl Coordinator {
    pub(crate) fn new(
        handle: Arc<ProcessHandle>,
        interrupt_signal: Signal,
        kill_after: Option<Duration>,
        slots: CompletionSlots,
    ) -> Self {
        Self {
            handle,
            interrupt_signal,
            kill_after,
            slots,
        }
    }

    /// Observe the first completion and apply its reaction
    pub(crate) async fn run(mut self) -> Completion {
        let first = self.first_completion().await;
        debug!(pid = self.handle.pid(), ?first, "First completion observed");

        match first.reaction() {
            Reaction::Interrupt => self.interrupt().await,
            Reaction::Nothing => {}
        }
        first
    }

    // A dropped sender resolves its slot too: the task ended either way.
    async fn first_completion(&mut self) -> Completion {
        let CompletionSlots {
            writer,
            stdout,
            stderr,
            process,
        } = &mut self.slots;

        let stderr_done = async {
            match stderr {
                Some(rx) => {
                    let _ = rx.await;
                }
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = writer => Completion::InputClosed,
            _ = stdout => Completion::OutputClosed(StreamKind::Stdout),
            _ = stderr_done => Completion::OutputClosed(StreamKind::Stderr),
            _ = process => Completion::ProcessExited,
        }
    }

    async fn interrupt(&mut self) {
        let signal = self.interrupt_signal;
        info!(pgid = %self.handle.pgid(), %signal, "Input closed, interrupting process group");
        if let Err(e) = self.handle.signal_group(signal) {
            warn!(pgid = %self.handle.pgid(), %signal, error = %e, "Failed to interrupt process group");
        }

        let Some(grace) = self.kill_after else {
            return;
        };

        // Descendants that survive the leader keep the output pipes open, so the group
        // has settled only once every reader and the runner are done.
        let CompletionSlots {
            stdout,
            stderr,
            process,
            ..
        } = &mut self.slots;
        let settled = async {
            let stderr_done = async {
                if let Some(rx) = stderr {
                    let _ = rx.await;
                }
            };
            let _ = tokio::join!(stdout, stderr_done, process);
        };

        tokio::select! {
            _ = settled => {
                debug!(pid = self.handle.pid(), "Process group settled after interrupt");
            }
            _ = tokio::time::sleep(grace) => {
                warn!(
                    pgid = %self.handle.pgid(),
                    grace_ms = grace.as_millis() as u64,
                    "Process group outlived interrupt, killing it"
                );
                if let Err(e) = self.handle.signal_group(Signal::SIGKILL) {
                    warn!(pgid = %self.handle.pgid(), error = %e, "Failed to kill process group");
                }
            }
        }
    }
}
