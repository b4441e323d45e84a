//! # procstream-process
//!
//! **Purpose**: Run one child process behind typed message channels
//!
//! Spawns a child in its own process group, bridges its stdin/stdout/stderr to Tokio
//! channels, relays signals to the whole group, and makes sure the child and every
//! task watching it wind down whichever terminal event comes first.
//!
//! ## Features
//!
//! - **Process Group Isolation**: The child leads its own group; signals reach grandchildren
//! - **Stream Bridging**: Input channel → stdin, stdout/stderr → output channels, line by line
//! - **Signal Relay**: Forward any signal to the group; closing the relay never kills
//! - **Termination Coordination**: Closing input interrupts the group, with optional SIGKILL escalation
//! - **Line Codecs**: Raw byte lines or `<key><SEP><value>` frames
//! - **Output Modes**: Split stdout/stderr channels, or stdout only with stderr to a sink
//!
//! ## Usage
//!
//! ```rust,no_run
//! use procstream_process::{Message, ProcessConfig, Supervisor};
//! use tokio::sync::mpsc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let (input, input_rx) = mpsc::channel(16);
//! let (signals, signals_rx) = mpsc::channel(4);
//!
//! // Spawn process
//! let config = ProcessConfig::from_argv(["cat"])?;
//! let process = Supervisor::new().spawn_lines(config, input_rx, signals_rx).await?;
//! let (mut stdout, _stderr) = process.into_channels();
//!
//! input.send(Message::from("ping")).await?;
//!
//! // Closing input shuts the process down
//! drop(input);
//! drop(signals);
//! while let Some(line) = stdout.recv().await {
//!     println!("{:?}", line);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Only Unix-like platforms are supported.

#![cfg(unix)]

pub mod child;
pub mod codec;
pub mod config;
mod coordinator;
pub mod error;
pub mod reader;
mod relay;
pub mod supervisor;
mod writer;

pub use child::{ProcessHandle, ProcessState};
pub use codec::{Frame, FrameCodec, LineCodec, Message, RawCodec, DEFAULT_SEPARATOR};
pub use config::{DiagnosticSink, OutputMode, ProcessConfig, DEFAULT_CHANNEL_CAPACITY};
pub use error::{CodecError, ProcessError, Result};
pub use nix::sys::signal::Signal;
pub use reader::{trim_line_ending, StreamKind};
pub use supervisor::{SupervisedProcess, Supervisor};
