//! Transport configuration.
//!
//! Property names are camelCase on the wire (`filePath`, `maxEventsPerFile`,
//! ...) so existing connector definitions load unchanged. Missing properties
//! take the defaults below.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use hdfs_sink_fs::ConnectionTarget;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 8020;
pub const DEFAULT_FILE_PATH: &str = "/user/cloudera";
pub const DEFAULT_BASE_FILENAME: &str = "gepOutput";
pub const DEFAULT_FILENAME_SUFFIX: &str = "json";
pub const DEFAULT_MAX_EVENTS_PER_FILE: i64 = 10_000;

/// Errors from loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("host must not be empty")]
    EmptyHost,

    #[error("port must be between 1 and 65535, got {0}")]
    InvalidPort(u16),

    #[error("baseFilename must not be empty")]
    EmptyBaseFilename,

    #[error("filenameSuffix must not be empty")]
    EmptyFilenameSuffix,
}

/// Connection and rotation settings for one transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TransportConfig {
    pub host: String,
    pub port: u16,
    /// Directory the output files are written to.
    pub file_path: String,
    pub base_filename: String,
    pub filename_suffix: String,
    /// Identity to write as. Blank means the client's default identity.
    pub user_name: Option<String>,
    pub max_events_per_file: i64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            file_path: DEFAULT_FILE_PATH.to_string(),
            base_filename: DEFAULT_BASE_FILENAME.to_string(),
            filename_suffix: DEFAULT_FILENAME_SUFFIX.to_string(),
            user_name: None,
            max_events_per_file: DEFAULT_MAX_EVENTS_PER_FILE,
        }
    }
}

impl TransportConfig {
    /// Load from a JSON file. Properties absent from the file keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_file_path(mut self, file_path: impl Into<String>) -> Self {
        self.file_path = file_path.into();
        self
    }

    pub fn with_base_filename(mut self, base_filename: impl Into<String>) -> Self {
        self.base_filename = base_filename.into();
        self
    }

    pub fn with_filename_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.filename_suffix = suffix.into();
        self
    }

    pub fn with_user_name(mut self, user_name: impl Into<String>) -> Self {
        self.user_name = Some(user_name.into());
        self
    }

    pub fn with_max_events_per_file(mut self, max: i64) -> Self {
        self.max_events_per_file = max;
        self
    }

    /// Copy with trailing slashes of `file_path` removed (a lone `/` stays)
    /// and a blank `user_name` dropped.
    pub fn normalized(&self) -> Self {
        let mut config = self.clone();
        while config.file_path.len() > 1 && config.file_path.ends_with('/') {
            config.file_path.pop();
        }
        config.user_name = config
            .user_name
            .take()
            .filter(|user| !user.trim().is_empty());
        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }
        if self.base_filename.is_empty() {
            return Err(ConfigError::EmptyBaseFilename);
        }
        if self.filename_suffix.is_empty() {
            return Err(ConfigError::EmptyFilenameSuffix);
        }
        Ok(())
    }

    /// Writer target for this configuration, after normalization.
    pub fn to_target(&self) -> ConnectionTarget {
        let config = self.normalized();
        let target = ConnectionTarget::new(
            config.host,
            config.port,
            config.file_path,
            config.base_filename,
            config.filename_suffix,
            config.max_events_per_file,
        );
        match config.user_name {
            Some(user) => target.with_user(user),
            None => target,
        }
    }
}
