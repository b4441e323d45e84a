//! Process configuration

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use nix::sys::signal::Signal;

use crate::error::{ProcessError, Result};

/// Default capacity of each output channel
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Where stderr goes when it is not exposed as a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiagnosticSink {
    /// Share the supervisor's own stderr
    #[default]
    Inherit,
    /// Discard
    Null,
    /// Read line by line and emit each line as a `tracing` warning
    Log,
}

/// How the child's output pipes map onto channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// One channel for stdout and one for stderr
    #[default]
    Split,
    /// A single stdout channel; stderr goes to a diagnostic sink
    Merged(DiagnosticSink),
}

/// Configuration for spawning a supervised process
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    /// Executable command
    pub command: String,
    /// Command arguments
    pub args: Vec<String>,
    /// Working directory (None = current dir)
    pub working_dir: Option<PathBuf>,
    /// Environment variables (added to parent env)
    pub env: HashMap<String, String>,
    /// Output channel layout
    pub output_mode: OutputMode,
    /// Capacity of each output channel
    pub channel_capacity: usize,
    /// Signal sent to the process group when the input channel closes first
    pub interrupt_signal: Signal,
    /// Escalate to SIGKILL if the process outlives the interrupt by this long
    pub kill_after: Option<Duration>,
}

impl ProcessConfig {
    /// Create new process configuration
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: vec![],
            working_dir: None,
            env: HashMap::new(),
            output_mode: OutputMode::Split,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            interrupt_signal: Signal::SIGINT,
            kill_after: None,
        }
    }

    /// Build from an argument vector whose first element is the command
    ///
    /// # Examples
    /// ```
    /// use procstream_process::ProcessConfig;
    ///
    /// let config = ProcessConfig::from_argv(["bash", "-c", "echo hi"]).unwrap();
    /// assert_eq!(config.command, "bash");
    /// assert_eq!(config.args, vec!["-c", "echo hi"]);
    ///
    /// assert!(ProcessConfig::from_argv(Vec::<String>::new()).is_err());
    /// ```
    pub fn from_argv<I, S>(argv: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut argv = argv.into_iter().map(Into::into);
        let command = argv
            .next()
            .ok_or_else(|| ProcessError::InvalidArgument("no arguments specified".into()))?;
        Ok(Self::new(command).args(argv))
    }

    /// Set command arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set working directory
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Add environment variable
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Expose stdout and stderr as separate channels
    pub fn split(mut self) -> Self {
        self.output_mode = OutputMode::Split;
        self
    }

    /// Expose only stdout; route stderr to `sink`
    pub fn merged(mut self, sink: DiagnosticSink) -> Self {
        self.output_mode = OutputMode::Merged(sink);
        self
    }

    /// Set output channel capacity
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Set the signal sent when input closes first
    pub fn interrupt_signal(mut self, signal: Signal) -> Self {
        self.interrupt_signal = signal;
        self
    }

    /// Enable SIGKILL escalation after an interrupt
    pub fn kill_after(mut self, grace: Duration) -> Self {
        self.kill_after = Some(grace);
        self
    }

    /// Check the configuration before anything is spawned
    pub fn validate(&self) -> Result<()> {
        if self.command.is_empty() {
            return Err(ProcessError::InvalidArgument("empty command".into()));
        }
        if self.channel_capacity == 0 {
            return Err(ProcessError::InvalidConfig(
                "channel capacity must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
