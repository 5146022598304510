//! HDFS sink transport.
//!
//! This crate wraps `RotatingRemoteWriter` in a start/stop transport, loads
//! its configuration, and provides the command-line interface of the
//! `hdfs-sink` binary.

pub mod cli;
pub mod commands;
pub mod config;
pub mod exit;
pub mod transport;

pub use cli::{parse_from, Cli, CliError, DEFAULT_TIMEOUT_SECS};
pub use commands::{execute_send, CommandError, CommandResult, SendResult};
pub use config::{ConfigError, TransportConfig};
pub use transport::{OutboundTransport, RunningState, TransportError};
