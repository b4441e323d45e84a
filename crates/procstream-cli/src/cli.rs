// Command-line arguments

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use procstream_process::{
    DiagnosticSink, ProcessConfig, Signal, DEFAULT_CHANNEL_CAPACITY, DEFAULT_SEPARATOR,
};

/// procstream - run a command with line-bridged stdio
#[derive(Parser, Debug)]
#[command(name = "procstream")]
#[command(about = "Run a command with line-bridged stdio and signals relayed to its process group")]
#[command(
    long_about = "Runs COMMAND in its own process group. Lines read from stdin are written to the \
command's stdin; its stdout and stderr lines are echoed back. Closing stdin (EOF) interrupts the \
command. SIGINT, SIGTERM, SIGHUP, SIGUSR1 and SIGUSR2 are relayed to the whole group."
)]
#[command(version)]
pub struct Cli {
    /// Parse stdout as `<key><SEP><value>` frames and route stderr to --stderr-sink
    #[arg(long)]
    pub merged: bool,

    /// Where stderr goes in merged mode
    #[arg(long, value_enum, default_value_t = SinkArg::Inherit)]
    pub stderr_sink: SinkArg,

    /// Frame separator byte for merged mode
    #[arg(long, value_name = "CHAR", default_value = "\t", value_parser = parse_separator)]
    pub separator: u8,

    /// Output channel capacity
    #[arg(long, value_name = "N", default_value_t = DEFAULT_CHANNEL_CAPACITY)]
    pub capacity: usize,

    /// Signal sent to the process group when stdin reaches EOF
    #[arg(long, value_name = "SIGNAL", default_value = "SIGINT", value_parser = parse_signal)]
    pub interrupt_signal: Signal,

    /// SIGKILL the process group if it outlives the interrupt by this many milliseconds
    #[arg(long, value_name = "MS")]
    pub kill_after_ms: Option<u64>,

    /// Working directory for the command
    #[arg(short = 'C', long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Minimize output
    #[arg(short, long)]
    pub quiet: bool,

    /// Command and its arguments
    #[arg(value_name = "COMMAND", required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

/// Merged-mode stderr destinations
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SinkArg {
    Inherit,
    Null,
    Log,
}

impl From<SinkArg> for DiagnosticSink {
    fn from(sink: SinkArg) -> Self {
        match sink {
            SinkArg::Inherit => DiagnosticSink::Inherit,
            SinkArg::Null => DiagnosticSink::Null,
            SinkArg::Log => DiagnosticSink::Log,
        }
    }
}

impl Cli {
    /// Translate flags into a process configuration
    pub fn process_config(&self) -> procstream_process::Result<ProcessConfig> {
        let mut config = ProcessConfig::from_argv(self.command.iter().cloned())?
            .channel_capacity(self.capacity)
            .interrupt_signal(self.interrupt_signal);

        if self.merged {
            config = config.merged(self.stderr_sink.into());
        }
        if let Some(ms) = self.kill_after_ms {
            config = config.kill_after(Duration::from_millis(ms));
        }
        if let Some(ref dir) = self.cwd {
            config = config.working_dir(dir);
        }

        config.validate()?;
        Ok(config)
    }
}

/// Accept a single ASCII character, or `\t`
fn parse_separator(s: &str) -> Result<u8, String> {
    if s == "\\t" {
        return Ok(DEFAULT_SEPARATOR);
    }
    match *s.as_bytes() {
        [b] if b.is_ascii() && b != b'\n' => Ok(b),
        _ => Err(format!(
            "separator must be a single ASCII character other than newline, got {s:?}"
        )),
    }
}

/// Accept `SIGTERM`, `TERM` or `term`
fn parse_signal(s: &str) -> Result<Signal, String> {
    let upper = s.to_ascii_uppercase();
    let name = if upper.starts_with("SIG") {
        upper
    } else {
        format!("SIG{upper}")
    };
    Signal::from_str(&name).map_err(|_| format!("unknown signal {s:?}"))
}
