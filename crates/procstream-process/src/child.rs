//! Supervised child identity and the process runner

use std::fmt;
use std::sync::Arc;

use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tokio::process::Child;
use tokio::sync::{oneshot, watch};
use tracing::{debug, info, warn};

/// Lifecycle of a supervised process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Spawn in progress
    Starting,
    /// Spawned and not yet reaped
    Running,
    /// Exited, killed or failed to be waited on
    Exited,
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Exited => "exited",
        };
        f.write_str(s)
    }
}

/// Read-only identity of a spawned child
///
/// The child leads its own process group (`pgid == pid`), so signals sent through the
/// handle reach every descendant that stayed in the group.
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    command: String,
    args: Vec<String>,
    pid: u32,
    pgid: Pid,
}

impl ProcessHandle {
    pub(crate) fn new(command: String, args: Vec<String>, pid: u32) -> Self {
        Self {
            command,
            args,
            pid,
            pgid: Pid::from_raw(pid as i32),
        }
    }

    /// Get process ID
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Get process group ID
    pub fn pgid(&self) -> Pid {
        self.pgid
    }

    /// Get the executable the child was started from
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Get the arguments passed to the child
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Send `signal` to the whole process group
    ///
    /// `ESRCH` means the group is already gone and is reported as success.
    pub fn signal_group(&self, signal: Signal) -> nix::Result<()> {
        match killpg(self.pgid, signal) {
            Ok(()) => {
                debug!(pgid = %self.pgid, %signal, "Signaled process group");
                Ok(())
            }
            Err(Errno::ESRCH) => {
                debug!(pgid = %self.pgid, %signal, "Process group already gone");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

/// Wait for the child to exit, then mark it exited and raise `done`
pub(crate) async fn run_process(
    mut child: Child,
    handle: Arc<ProcessHandle>,
    state: watch::Sender<ProcessState>,
    done: oneshot::Sender<()>,
) {
    match child.wait().await {
        Ok(status) => info!(pid = handle.pid(), %status, "Process exited"),
        Err(e) => warn!(pid = handle.pid(), error = %e, "Error waiting for process"),
    }

    state.send_replace(ProcessState::Exited);
    let _ = done.send(());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;
    use tokio::process::Command;

    fn spawn_in_group(script: &str) -> (Child, ProcessHandle) {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", script]).process_group(0);
        let child = cmd.spawn().unwrap();
        let pid = child.id().unwrap();
        (child, ProcessHandle::new("sh".into(), vec![], pid))
    }

    #[tokio::test]
    async fn test_pgid_matches_pid() {
        let (mut child, handle) = spawn_in_group("exit 0");
        assert_eq!(handle.pgid().as_raw() as u32, handle.pid());
        child.wait().await.unwrap();
    }

    #[tokio::test]
    async fn test_signal_group_terminates_leader() {
        let (mut child, handle) = spawn_in_group("sleep 10");
        handle.signal_group(Signal::SIGTERM).unwrap();

        let status = child.wait().await.unwrap();
        assert_eq!(status.signal(), Some(Signal::SIGTERM as i32));
    }

    #[tokio::test]
    async fn test_signal_group_after_exit_is_ok() {
        let (mut child, handle) = spawn_in_group("exit 0");
        child.wait().await.unwrap();
        assert!(handle.signal_group(Signal::SIGTERM).is_ok());
    }

    #[tokio::test]
    async fn test_run_process_marks_exited_and_completes() {
        let (child, handle) = spawn_in_group("exit 3");
        let (state_tx, state_rx) = watch::channel(ProcessState::Running);
        let (done_tx, done_rx) = oneshot::channel();

        run_process(child, Arc::new(handle), state_tx, done_tx).await;

        assert!(done_rx.await.is_ok());
        assert_eq!(*state_rx.borrow(), ProcessState::Exited);
    }
}
