//! Error types for process supervision

use std::io;
use thiserror::Error;

/// Supervision errors
///
/// Only raised synchronously from [`Supervisor::spawn`](crate::Supervisor::spawn) and
/// configuration helpers. Once the child is running, failures are logged and absorbed;
/// callers observe them only as output channels closing.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Empty command or argument vector
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Pipe creation or process start failed
    #[error("Failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    /// Invalid configuration value
    #[error("Invalid process configuration: {0}")]
    InvalidConfig(String),
}

impl ProcessError {
    pub(crate) fn spawn(command: &str, source: io::Error) -> Self {
        Self::Spawn {
            command: command.to_string(),
            source,
        }
    }
}

/// Result type for process operations
pub type Result<T> = std::result::Result<T, ProcessError>;

/// Line decoding errors
///
/// Never fatal to a stream: the offending line is dropped and scanning continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The line does not contain the separator byte
    #[error("missing separator {separator:#04x} in line of {len} bytes")]
    MissingSeparator { separator: u8, len: usize },

    /// The key is not valid UTF-8 or contains the separator
    #[error("invalid key: {0}")]
    InvalidKey(String),
}
