//! Outbound transport: a running-state machine around one rotating writer.
//!
//! The transport owns its configuration. `start` builds a writer from it,
//! `stop` closes and drops the writer, and `update_config` rebuilds the
//! writer in place when the transport is running.

use std::fmt;

use hdfs_sink_fs::{RemoteFilesystem, RotatingRemoteWriter, WriterError};
use hdfs_sink_log::Logger;
use thiserror::Error;

use crate::config::{ConfigError, TransportConfig};

/// Lifecycle state of a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunningState {
    Stopped,
    Starting,
    Started,
    Stopping,
    /// The last start or reconfiguration failed; see `status_details`.
    Error,
}

impl fmt::Display for RunningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunningState::Stopped => "stopped",
            RunningState::Starting => "starting",
            RunningState::Started => "started",
            RunningState::Stopping => "stopping",
            RunningState::Error => "error",
        };
        f.write_str(name)
    }
}

/// Errors from transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport is {0}, not started")]
    NotStarted(RunningState),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Writer(#[from] WriterError),
}

/// Sends records to rotating files on a remote filesystem.
pub struct OutboundTransport<F, L>
where
    F: RemoteFilesystem + Clone,
    L: Logger + Clone,
{
    fs: F,
    logger: L,
    config: TransportConfig,
    writer: Option<RotatingRemoteWriter<F, L>>,
    state: RunningState,
    error_message: String,
}

impl<F, L> OutboundTransport<F, L>
where
    F: RemoteFilesystem + Clone,
    L: Logger + Clone,
{
    /// Create a stopped transport.
    pub fn new(fs: F, config: TransportConfig, logger: L) -> Self {
        Self {
            fs,
            logger,
            config,
            writer: None,
            state: RunningState::Stopped,
            error_message: String::new(),
        }
    }

    /// Build the writer and enter `Started`. A no-op when already started.
    pub fn start(&mut self) -> Result<(), TransportError> {
        if self.state == RunningState::Started {
            return Ok(());
        }
        self.state = RunningState::Starting;
        self.logger.debug("transport starting");
        self.open_writer()
    }

    /// Close the writer and enter `Stopped`.
    pub fn stop(&mut self) {
        self.state = RunningState::Stopping;
        if let Some(mut writer) = self.writer.take() {
            writer.close();
        }
        self.error_message.clear();
        self.state = RunningState::Stopped;
        self.logger.info("transport stopped");
    }

    /// Replace the configuration. A started transport rebuilds its writer
    /// from the new settings; otherwise they apply on the next `start`.
    pub fn update_config(&mut self, config: TransportConfig) -> Result<(), TransportError> {
        self.config = config;
        if self.state != RunningState::Started {
            return Ok(());
        }
        if let Some(mut writer) = self.writer.take() {
            writer.close();
        }
        self.state = RunningState::Starting;
        self.logger.info("configuration changed, reopening writer");
        self.open_writer()
    }

    /// Send one record. The payload is written as is, terminator included.
    ///
    /// A failed write closes the current file, so the next record goes to a
    /// fresh one.
    pub fn receive(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        let state = self.state;
        let writer = match self.writer.as_mut() {
            Some(writer) if state == RunningState::Started => writer,
            _ => return Err(TransportError::NotStarted(state)),
        };
        if let Err(e) = writer.send(payload) {
            if matches!(e, WriterError::Write { .. }) {
                writer.close();
            }
            self.logger.error(&format!("failed to send record: {}", e));
            self.error_message = e.to_string();
            return Err(e.into());
        }
        Ok(())
    }

    pub fn state(&self) -> RunningState {
        self.state
    }

    /// Message of the last failure, empty when there is none.
    pub fn status_details(&self) -> &str {
        &self.error_message
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// The active writer, present only while started.
    pub fn writer(&self) -> Option<&RotatingRemoteWriter<F, L>> {
        self.writer.as_ref()
    }

    fn open_writer(&mut self) -> Result<(), TransportError> {
        match self.build_writer() {
            Ok(writer) => {
                self.logger.info(&format!(
                    "transport started, writing to {}",
                    writer.next_candidate().map_or_else(
                        |_| writer.target().base_path.clone(),
                        |address| address.to_string()
                    )
                ));
                self.writer = Some(writer);
                self.error_message.clear();
                self.state = RunningState::Started;
                Ok(())
            }
            Err(e) => {
                self.logger.error(&format!("transport failed to start: {}", e));
                self.error_message = e.to_string();
                self.state = RunningState::Error;
                Err(e)
            }
        }
    }

    fn build_writer(&self) -> Result<RotatingRemoteWriter<F, L>, TransportError> {
        self.config.validate()?;
        let writer = RotatingRemoteWriter::new(
            self.fs.clone(),
            self.config.to_target(),
            self.logger.clone(),
        )?;
        Ok(writer)
    }
}
