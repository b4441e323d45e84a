//! Supervisor - wires a child process to message channels

use std::io;
use std::process::Stdio;
use std::sync::Arc;

use nix::sys::signal::Signal;
use nix::unistd::Pid;
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info};

use crate::{
    child::{run_process, ProcessHandle, ProcessState},
    codec::{LineCodec, Message, RawCodec},
    config::{DiagnosticSink, OutputMode, ProcessConfig},
    coordinator::{CompletionSlots, Coordinator},
    error::{ProcessError, Result},
    reader::{log_lines, read_lines, StreamKind},
    relay::relay_signals,
    writer::write_stream,
};

/// Spawns and supervises child processes
#[derive(Debug, Clone, Copy, Default)]
pub struct Supervisor;

impl Supervisor {
    /// Create new supervisor
    pub fn new() -> Self {
        Self
    }

    /// Spawn a supervised process
    ///
    /// Items received on `input` are encoded with `codec` and written to the child's
    /// stdin, one line each. Lines read from the child's output pipes are decoded and
    /// delivered on the returned channels. Signals received on `signals` are sent to
    /// the child's process group.
    ///
    /// Dropping every sender of `input` closes the child's stdin; if that happens
    /// before the child's output closes or the child exits, the process group also
    /// receives the configured interrupt signal. Dropping the `signals` senders only
    /// disables signal forwarding.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    /// [`ProcessError::InvalidArgument`] for an empty command,
    /// [`ProcessError::InvalidConfig`] for a bad configuration and
    /// [`ProcessError::Spawn`] if the process or its pipes cannot be created. No task
    /// is started in any of these cases.
    ///
    /// # Examples
    /// ```no_run
    /// use procstream_process::{Message, ProcessConfig, RawCodec, Supervisor};
    /// use tokio::sync::mpsc;
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let (input, input_rx) = mpsc::channel(16);
    /// let (_signals, signals_rx) = mpsc::channel(1);
    ///
    /// let process = Supervisor::new()
    ///     .spawn(ProcessConfig::new("cat"), RawCodec, input_rx, signals_rx)
    ///     .await?;
    /// let (mut stdout, _stderr) = process.into_channels();
    ///
    /// input.send(Message::from("hello")).await?;
    /// drop(input);
    ///
    /// while let Some(line) = stdout.recv().await {
    ///     println!("{:?}", line);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn spawn<C>(
        &self,
        config: ProcessConfig,
        codec: C,
        input: mpsc::Receiver<C::Item>,
        signals: mpsc::Receiver<Signal>,
    ) -> Result<SupervisedProcess<C::Item>>
    where
        C: LineCodec,
    {
        config.validate()?;

        debug!(
            command = %config.command,
            args = ?config.args,
            mode = ?config.output_mode,
            "Spawning supervised process"
        );

        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args);

        if let Some(ref dir) = config.working_dir {
            cmd.current_dir(dir);
        }

        for (key, value) in &config.env {
            cmd.env(key, value);
        }

        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(match config.output_mode {
            OutputMode::Split | OutputMode::Merged(DiagnosticSink::Log) => Stdio::piped(),
            OutputMode::Merged(DiagnosticSink::Inherit) => Stdio::inherit(),
            OutputMode::Merged(DiagnosticSink::Null) => Stdio::null(),
        });

        // Own process group so the whole tree can be signaled at once
        cmd.process_group(0);

        let (state_tx, state_rx) = watch::channel(ProcessState::Starting);

        let mut child = cmd
            .spawn()
            .map_err(|e| ProcessError::spawn(&config.command, e))?;
        let pipes = take_pipes(&mut child, &config)?;

        let handle = Arc::new(ProcessHandle::new(
            config.command.clone(),
            config.args.clone(),
            pipes.pid,
        ));
        state_tx.send_replace(ProcessState::Running);

        info!(pid = pipes.pid, command = %config.command, "Process spawned");

        let codec = Arc::new(codec);
        let capacity = config.channel_capacity;

        let (writer_done, writer_slot) = oneshot::channel();
        tokio::spawn(write_stream(
            Arc::clone(&codec),
            input,
            pipes.stdin,
            writer_done,
        ));

        let (stdout_tx, stdout_rx) = mpsc::channel(capacity);
        let (stdout_done, stdout_slot) = oneshot::channel();
        tokio::spawn(read_lines(
            StreamKind::Stdout,
            Arc::clone(&codec),
            pipes.stdout,
            stdout_tx,
            stdout_done,
        ));

        let mut stderr_rx = None;
        let mut stderr_slot = None;
        if let Some(stderr) = pipes.stderr {
            match config.output_mode {
                OutputMode::Split => {
                    let (tx, rx) = mpsc::channel(capacity);
                    let (done, slot) = oneshot::channel();
                    tokio::spawn(read_lines(
                        StreamKind::Stderr,
                        Arc::clone(&codec),
                        stderr,
                        tx,
                        done,
                    ));
                    stderr_rx = Some(rx);
                    stderr_slot = Some(slot);
                }
                OutputMode::Merged(_) => {
                    tokio::spawn(log_lines(pipes.pid, stderr));
                }
            }
        }

        let (process_done, process_slot) = oneshot::channel();
        tokio::spawn(run_process(child, Arc::clone(&handle), state_tx, process_done));

        tokio::spawn(relay_signals(Arc::clone(&handle), signals, state_rx.clone()));

        let coordinator = Coordinator::new(
            Arc::clone(&handle),
            config.interrupt_signal,
            config.kill_after,
            CompletionSlots {
                writer: writer_slot,
                stdout: stdout_slot,
                stderr: stderr_slot,
                process: process_slot,
            },
        );
        tokio::spawn(coordinator.run());

        Ok(SupervisedProcess {
            handle,
            state: state_rx,
            stdout: stdout_rx,
            stderr: stderr_rx,
        })
    }

    /// Spawn with raw line messages on every channel
    pub async fn spawn_lines(
        &self,
        config: ProcessConfig,
        input: mpsc::Receiver<Message>,
        signals: mpsc::Receiver<Signal>,
    ) -> Result<SupervisedProcess<Message>> {
        self.spawn(config, RawCodec, input, signals).await
    }
}

struct Pipes {
    pid: u32,
    stdin: tokio::process::ChildStdin,
    stdout: tokio::process::ChildStdout,
    stderr: Option<tokio::process::ChildStderr>,
}

/// Take the child's pipes; on failure the child is killed before returning
fn take_pipes(child: &mut Child, config: &ProcessConfig) -> Result<Pipes> {
    let taken = child.id().and_then(|pid| {
        Some(Pipes {
            pid,
            stdin: child.stdin.take()?,
            stdout: child.stdout.take()?,
            stderr: child.stderr.take(),
        })
    });

    let wants_stderr = matches!(
        config.output_mode,
        OutputMode::Split | OutputMode::Merged(DiagnosticSink::Log)
    );

    match taken {
        Some(pipes) if pipes.stderr.is_some() || !wants_stderr => Ok(pipes),
        _ => {
            let _ = child.start_kill();
            Err(ProcessError::spawn(
                &config.command,
                io::Error::other("child pipes unavailable after spawn"),
            ))
        }
    }
}

/// A running child and the channels carrying its output
#[derive(Debug)]
pub struct SupervisedProcess<T> {
    handle: Arc<ProcessHandle>,
    state: watch::Receiver<ProcessState>,
    stdout: mpsc::Receiver<T>,
    stderr: Option<mpsc::Receiver<T>>,
}

impl<T> SupervisedProcess<T> {
    /// Get process ID
    pub fn pid(&self) -> u32 {
        self.handle.pid()
    }

    /// Get process group ID
    pub fn pgid(&self) -> Pid {
        self.handle.pgid()
    }

    /// Shared identity of the child, usable to signal its group directly
    pub fn handle(&self) -> &ProcessHandle {
        &self.handle
    }

    /// Current lifecycle state
    pub fn state(&self) -> ProcessState {
        *self.state.borrow()
    }

    /// Wait until the child has exited
    pub async fn exited(&self) {
        let mut state = self.state.clone();
        let _ = state.wait_for(|s| *s == ProcessState::Exited).await;
    }

    /// Stdout channel
    pub fn stdout(&mut self) -> &mut mpsc::Receiver<T> {
        &mut self.stdout
    }

    /// Stderr channel, present in split mode only
    pub fn stderr(&mut self) -> Option<&mut mpsc::Receiver<T>> {
        self.stderr.as_mut()
    }

    /// Give up the handle and keep only the output channels
    pub fn into_channels(self) -> (mpsc::Receiver<T>, Option<mpsc::Receiver<T>>) {
        (self.stdout, self.stderr)
    }
}
