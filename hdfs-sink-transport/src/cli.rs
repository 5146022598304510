//! CLI argument parsing for the `hdfs-sink` binary.
//!
//! Settings come from an optional JSON config file; any flag given on the
//! command line overrides the matching property.

use std::path::PathBuf;

use clap::{ArgAction, Parser};
use thiserror::Error;

use crate::config::{ConfigError, TransportConfig};

/// Default request timeout for WebHDFS calls, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Errors from CLI argument validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CliError {
    #[error("port must be between 1 and 65535, got {0}")]
    InvalidPort(u16),

    #[error("timeout must be at least 1 second, got {0}")]
    InvalidTimeout(u64),
}

/// Stream newline-delimited records into rotating HDFS files.
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "hdfs-sink")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// JSON file with transport properties (host, port, filePath, ...).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Namenode host.
    #[arg(long)]
    pub host: Option<String>,

    /// Namenode WebHDFS port.
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Directory the output files are written to.
    #[arg(long)]
    pub file_path: Option<String>,

    /// File name prefix; the sequence number follows it.
    #[arg(long)]
    pub base_filename: Option<String>,

    /// File extension, without the dot.
    #[arg(long)]
    pub filename_suffix: Option<String>,

    /// User to write as.
    #[arg(short, long)]
    pub user: Option<String>,

    /// Records per file before rotating. Zero or less puts each record in its own file.
    #[arg(long, allow_negative_numbers = true)]
    pub max_events_per_file: Option<i64>,

    /// Write under this local directory instead of HDFS.
    #[arg(long)]
    pub local_root: Option<PathBuf>,

    /// Read records from this file instead of stdin.
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// WebHDFS request timeout in seconds.
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Talk to the namenode over HTTPS.
    #[arg(long, conflicts_with = "local_root")]
    pub https: bool,

    /// Enable verbose output (-v for debug).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Validate the arguments.
    pub fn validate(&self) -> Result<(), CliError> {
        if self.port == Some(0) {
            return Err(CliError::InvalidPort(0));
        }
        if self.timeout == 0 {
            return Err(CliError::InvalidTimeout(self.timeout));
        }
        Ok(())
    }

    /// Configuration from `--config` (or defaults) with flag overrides applied.
    pub fn load_config(&self) -> Result<TransportConfig, ConfigError> {
        let base = match &self.config {
            Some(path) => TransportConfig::from_json_file(path)?,
            None => TransportConfig::default(),
        };
        Ok(self.apply_overrides(base))
    }

    pub fn apply_overrides(&self, mut config: TransportConfig) -> TransportConfig {
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(file_path) = &self.file_path {
            config.file_path = file_path.clone();
        }
        if let Some(base_filename) = &self.base_filename {
            config.base_filename = base_filename.clone();
        }
        if let Some(suffix) = &self.filename_suffix {
            config.filename_suffix = suffix.clone();
        }
        if let Some(user) = &self.user {
            config.user_name = Some(user.clone());
        }
        if let Some(max) = self.max_events_per_file {
            config.max_events_per_file = max;
        }
        config
    }
}

/// Parse CLI arguments from an iterator (for testing).
pub fn parse_from<I, T>(iter: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(iter)
}
