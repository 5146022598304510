//! Command orchestration for the `hdfs-sink` binary.

pub mod send;

pub use send::{execute_send, SendResult};

use std::io;

use hdfs_sink_fs::FsError;
use thiserror::Error;

use crate::cli::CliError;
use crate::config::ConfigError;
use crate::transport::TransportError;

/// Errors from command execution.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("invalid argument: {0}")]
    InvalidArgument(#[from] CliError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("cannot open input {path}: {source}")]
    OpenInput {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to read input: {0}")]
    Read(#[source] io::Error),

    #[error("client error: {0}")]
    Client(#[from] FsError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Result of command execution.
pub type CommandResult<T> = Result<T, CommandError>;
