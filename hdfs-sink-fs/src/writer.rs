//! Rotating record writer over a remote filesystem.
//!
//! Each `send` appends one record to the current output file and flushes it.
//! When the file holds `max_records_per_file` records (or no file is open)
//! the writer closes it, picks the next sequence number, skips every
//! candidate that already exists remotely and creates a fresh file.

use hdfs_sink_log::Logger;
use thiserror::Error;

use crate::address::{AddressError, ConnectionTarget, RemoteAddress};
use crate::remote::{FsError, RemoteConnection, RemoteFilesystem, RemoteStream};
use crate::rotation::RotationPolicy;

type StreamOf<F> = <<F as RemoteFilesystem>::Connection as RemoteConnection>::Stream;

/// Errors surfaced by the writer. Close failures are never surfaced.
#[derive(Debug, Error)]
pub enum WriterError {
    #[error(transparent)]
    AddressResolution(#[from] AddressError),

    #[error("cannot open {address}: {source}")]
    Connection {
        address: String,
        #[source]
        source: FsError,
    },

    #[error("failed to write to {address}: {source}")]
    Write {
        address: String,
        #[source]
        source: FsError,
    },
}

/// Lifecycle of a writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    /// Constructed, nothing opened yet.
    Unopened,
    /// A file is open for writing.
    Open,
    /// The last file was closed; the next `send` opens a new one.
    Closed,
}

/// Writes records to a sequence of remote files, rotating by record count.
///
/// Not internally synchronized: share across threads behind a `Mutex` held
/// for the whole `send`/`close` call.
pub struct RotatingRemoteWriter<F: RemoteFilesystem, L: Logger> {
    fs: F,
    logger: L,
    target: ConnectionTarget,
    policy: RotationPolicy,
    root: RemoteAddress,
    connection: Option<F::Connection>,
    stream: Option<StreamOf<F>>,
    current: Option<RemoteAddress>,
    file_sequence: u64,
    /// Whether a file has been opened under `file_sequence`.
    sequence_used: bool,
    records_in_current_file: u64,
    state: WriterState,
}

impl<F: RemoteFilesystem, L: Logger> RotatingRemoteWriter<F, L> {
    /// Create a writer. Validates the target and computes the sequence-0
    /// candidate, but does not contact the filesystem.
    pub fn new(fs: F, target: ConnectionTarget, logger: L) -> Result<Self, WriterError> {
        let root = target.root_address()?;
        let first = target.address_for(0)?;
        let policy = RotationPolicy::new(target.max_records_per_file);

        if target.max_records_per_file <= 0 {
            logger.warn(&format!(
                "max records per file is {}; every record will be written to its own file",
                target.max_records_per_file
            ));
        }
        logger.debug(&format!("writer ready, first candidate {}", first));

        Ok(Self {
            fs,
            logger,
            target,
            policy,
            root,
            connection: None,
            stream: None,
            current: None,
            file_sequence: 0,
            sequence_used: false,
            records_in_current_file: 0,
            state: WriterState::Unopened,
        })
    }

    /// Append one record to the current file and flush it, rotating first if
    /// needed.
    ///
    /// On `WriterError::Write` the failed stream stays open; call `close()`
    /// before retrying so the retry goes to a fresh file.
    pub fn send(&mut self, payload: &[u8]) -> Result<(), WriterError> {
        let stream = match self.stream.take() {
            Some(stream) if !self.policy.should_rotate(true, self.records_in_current_file) => {
                stream
            }
            previous => self.rotate(previous)?,
        };
        let stream = self.stream.insert(stream);

        stream
            .write_all(payload)
            .and_then(|()| stream.flush())
            .map_err(|source| WriterError::Write {
                address: display_address(&self.current),
                source,
            })?;
        self.records_in_current_file += 1;
        Ok(())
    }

    /// Close the current file, if any. Idempotent; close failures are logged.
    pub fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            self.close_stream(stream);
        }
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    pub fn file_sequence(&self) -> u64 {
        self.file_sequence
    }

    pub fn records_in_current_file(&self) -> u64 {
        self.records_in_current_file
    }

    /// Address of the file most recently opened.
    pub fn current_address(&self) -> Option<&RemoteAddress> {
        self.current.as_ref()
    }

    /// First address the next rotation will probe.
    pub fn next_candidate(&self) -> Result<RemoteAddress, AddressError> {
        let sequence = if self.sequence_used {
            self.file_sequence + 1
        } else {
            self.file_sequence
        };
        self.target.address_for(sequence)
    }

    pub fn target(&self) -> &ConnectionTarget {
        &self.target
    }

    /// Close `previous`, then open the first free file after it.
    fn rotate(&mut self, previous: Option<StreamOf<F>>) -> Result<StreamOf<F>, WriterError> {
        if let Some(stream) = previous {
            self.close_stream(stream);
        }
        if self.sequence_used {
            self.file_sequence += 1;
            self.sequence_used = false;
        }
        self.records_in_current_file = 0;

        let connection = match self.connection.take() {
            Some(connection) => connection,
            None => self
                .fs
                .connect(&self.root, self.target.user.as_deref())
                .map_err(|source| WriterError::Connection {
                    address: self.root.to_string(),
                    source,
                })?,
        };

        // A failed probe or create drops the connection so the next
        // rotation reconnects.
        let (address, stream) = self.open_free_slot(&connection)?;
        self.connection = Some(connection);

        self.logger.info(&format!(
            "opened {} (sequence {})",
            address, self.file_sequence
        ));
        self.sequence_used = true;
        self.current = Some(address);
        self.state = WriterState::Open;
        Ok(stream)
    }

    /// Probe from the current sequence upwards until a candidate can be
    /// created without clobbering an existing file.
    fn open_free_slot(
        &mut self,
        connection: &F::Connection,
    ) -> Result<(RemoteAddress, StreamOf<F>), WriterError> {
        let mut candidate = self.target.address_for(self.file_sequence)?;
        loop {
            let taken = connection
                .exists(&candidate)
                .map_err(|source| connection_error(&candidate, source))?;
            if !taken {
                match connection.create(&candidate) {
                    Ok(stream) => return Ok((candidate, stream)),
                    // Created by someone else between the probe and the create.
                    Err(FsError::AlreadyExists(_)) => {}
                    Err(source) => return Err(connection_error(&candidate, source)),
                }
            }
            self.logger
                .debug(&format!("{} already exists, skipping", candidate));
            self.file_sequence += 1;
            candidate = self.target.address_for(self.file_sequence)?;
        }
    }

    fn close_stream(&mut self, stream: StreamOf<F>) {
        if let Err(e) = stream.close() {
            self.logger.warn(&format!(
                "failed to close {}: {}",
                display_address(&self.current),
                e
            ));
        }
        self.state = WriterState::Closed;
    }
}

impl<F: RemoteFilesystem, L: Logger> Drop for RotatingRemoteWriter<F, L> {
    fn drop(&mut self) {
        self.close();
    }
}

fn connection_error(address: &RemoteAddress, source: FsError) -> WriterError {
    WriterError::Connection {
        address: address.to_string(),
        source,
    }
}

fn display_address(address: &Option<RemoteAddress>) -> String {
    address
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "<no file>".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{MockFaults, MockRemoteFilesystem};
    use hdfs_sink_log::{LogLevel, MockLogger};

    fn target(max: i64) -> ConnectionTarget {
        ConnectionTarget::new("localhost", 8020, "/data", "out", "log", max)
    }

    fn writer(
        fs: &MockRemoteFilesystem,
        max: i64,
    ) -> (RotatingRemoteWriter<MockRemoteFilesystem, MockLogger>, MockLogger) {
        let logger = MockLogger::new();
        let w = RotatingRemoteWriter::new(fs.clone(), target(max), logger.clone())
            .expect("writer");
        (w, logger)
    }

    fn lines(fs: &MockRemoteFilesystem, path: &str) -> usize {
        fs.read_string(path).map_or(0, |s| s.lines().count())
    }

    // ===========================================
    // Construction
    // ===========================================

    #[test]
    fn test_new_does_not_touch_filesystem() {
        let fs = MockRemoteFilesystem::new();
        let (w, _) = writer(&fs, 10);

        assert_eq!(w.state(), WriterState::Unopened);
        assert_eq!(w.file_sequence(), 0);
        assert!(w.current_address().is_none());
        assert!(fs.connect_users().is_empty());
        assert!(fs.created_paths().is_empty());
    }

    #[test]
    fn test_new_computes_first_candidate() {
        let fs = MockRemoteFilesystem::new();
        let (w, _) = writer(&fs, 10);

        let candidate = w.next_candidate().expect("candidate");
        assert_eq!(candidate.as_str(), "hdfs://localhost:8020/data/out0.log");
    }

    #[test]
    fn test_new_rejects_bad_address() {
        let fs = MockRemoteFilesystem::new();
        let mut t = target(10);
        t.base_filename = "bad name".to_string();

        let result = RotatingRemoteWriter::new(fs, t, MockLogger::new());
        assert!(matches!(result, Err(WriterError::AddressResolution(_))));
    }

    #[test]
    fn test_new_warns_on_non_positive_limit() {
        let fs = MockRemoteFilesystem::new();
        let (_, logger) = writer(&fs, 0);

        let warnings = logger.messages_at_level(LogLevel::Warn);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("its own file"));
    }

    // ===========================================
    // send / rotation
    // ===========================================

    #[test]
    fn test_first_send_opens_sequence_zero() {
        let fs = MockRemoteFilesystem::new();
        let (mut w, logger) = writer(&fs, 10);

        w.send(b"a\n").expect("send");

        assert_eq!(w.state(), WriterState::Open);
        assert_eq!(w.file_sequence(), 0);
        assert_eq!(w.records_in_current_file(), 1);
        assert_eq!(fs.created_paths(), vec!["/data/out0.log"]);
        assert_eq!(fs.read_string("/data/out0.log").as_deref(), Some("a\n"));
        assert!(logger.contains("opened hdfs://localhost:8020/data/out0.log (sequence 0)"));
    }

    #[test]
    fn test_every_send_is_flushed() {
        let fs = MockRemoteFilesystem::new();
        let (mut w, _) = writer(&fs, 10);

        for _ in 0..4 {
            w.send(b"x\n").expect("send");
        }

        assert_eq!(fs.flush_count(), 4);
    }

    #[test]
    fn test_rotates_at_limit() {
        let fs = MockRemoteFilesystem::new();
        let (mut w, _) = writer(&fs, 2);

        for i in 0..5 {
            w.send(format!("{}\n", i).as_bytes()).expect("send");
        }

        assert_eq!(
            fs.created_paths(),
            vec!["/data/out0.log", "/data/out1.log", "/data/out2.log"]
        );
        assert_eq!(fs.read_string("/data/out0.log").as_deref(), Some("0\n1\n"));
        assert_eq!(fs.read_string("/data/out1.log").as_deref(), Some("2\n3\n"));
        assert_eq!(fs.read_string("/data/out2.log").as_deref(), Some("4\n"));
        // Rotation closed the two earlier files
        assert_eq!(fs.close_count(), 2);
        assert_eq!(w.records_in_current_file(), 1);
    }

    #[test]
    fn test_connection_reused_across_rotations() {
        let fs = MockRemoteFilesystem::new();
        let (mut w, _) = writer(&fs, 1);

        for _ in 0..3 {
            w.send(b"x\n").expect("send");
        }

        assert_eq!(fs.created_paths().len(), 3);
        assert_eq!(fs.connect_users().len(), 1);
    }

    #[test]
    fn test_connects_as_configured_user() {
        let fs = MockRemoteFilesystem::new();
        let t = target(10).with_user("cloudera");
        let mut w = RotatingRemoteWriter::new(fs.clone(), t, MockLogger::new()).expect("writer");

        w.send(b"x\n").expect("send");

        assert_eq!(fs.connect_users(), vec![Some("cloudera".to_string())]);
    }

    #[test]
    fn test_connects_with_default_identity() {
        let fs = MockRemoteFilesystem::new();
        let (mut w, _) = writer(&fs, 10);

        w.send(b"x\n").expect("send");

        assert_eq!(fs.connect_users(), vec![None]);
    }

    #[test]
    fn test_zero_limit_one_record_per_file() {
        let fs = MockRemoteFilesystem::new();
        let (mut w, _) = writer(&fs, 0);

        for _ in 0..3 {
            w.send(b"x\n").expect("send");
        }

        assert_eq!(
            fs.created_paths(),
            vec!["/data/out0.log", "/data/out1.log", "/data/out2.log"]
        );
        for path in fs.created_paths() {
            assert_eq!(lines(&fs, &path), 1);
        }
    }

    #[test]
    fn test_negative_limit_one_record_per_file() {
        let fs = MockRemoteFilesystem::new();
        let (mut w, _) = writer(&fs, -7);

        w.send(b"x\n").expect("send");
        w.send(b"y\n").expect("send");

        assert_eq!(fs.created_paths(), vec!["/data/out0.log", "/data/out1.log"]);
    }

    // ===========================================
    // Collision avoidance
    // ===========================================

    #[test]
    fn test_skips_existing_sequence_zero() {
        let fs = MockRemoteFilesystem::new();
        fs.add_file("/data/out0.log", b"old\n");
        fs.add_file("/data/out1.log", b"old\n");
        let (mut w, logger) = writer(&fs, 10);

        w.send(b"new\n").expect("send");

        assert_eq!(w.file_sequence(), 2);
        assert_eq!(fs.created_paths(), vec!["/data/out2.log"]);
        assert_eq!(fs.read_string("/data/out0.log").as_deref(), Some("old\n"));
        assert_eq!(fs.read_string("/data/out1.log").as_deref(), Some("old\n"));
        assert!(logger.contains("out0.log already exists"));
        assert!(logger.contains("out1.log already exists"));
    }

    #[test]
    fn test_collision_during_later_rotation() {
        let fs = MockRemoteFilesystem::new();
        let (mut w, _) = writer(&fs, 1);

        w.send(b"a\n").expect("send");
        fs.add_file("/data/out1.log", b"foreign\n");
        w.send(b"b\n").expect("send");

        assert_eq!(fs.created_paths(), vec!["/data/out0.log", "/data/out2.log"]);
        assert_eq!(fs.read_string("/data/out1.log").as_deref(), Some("foreign\n"));
    }

    #[test]
    fn test_next_candidate_tracks_sequence() {
        let fs = MockRemoteFilesystem::new();
        let (mut w, _) = writer(&fs, 10);

        w.send(b"a\n").expect("send");
        assert_eq!(
            w.next_candidate().expect("candidate").file_name(),
            "out1.log"
        );
    }

    // ===========================================
    // close
    // ===========================================

    #[test]
    fn test_close_is_idempotent() {
        let fs = MockRemoteFilesystem::new();
        let (mut w, logger) = writer(&fs, 10);
        w.send(b"a\n").expect("send");

        w.close();
        let sequence = w.file_sequence();
        let logged = logger.count();
        w.close();

        assert_eq!(w.state(), WriterState::Closed);
        assert_eq!(w.file_sequence(), sequence);
        assert_eq!(fs.close_count(), 1);
        assert_eq!(logger.count(), logged);
    }

    #[test]
    fn test_close_before_send_is_noop() {
        let fs = MockRemoteFilesystem::new();
        let (mut w, _) = writer(&fs, 10);

        w.close();

        assert_eq!(w.state(), WriterState::Unopened);
        assert_eq!(fs.close_count(), 0);
    }

    #[test]
    fn test_send_after_close_opens_new_file() {
        let fs = MockRemoteFilesystem::new();
        let (mut w, _) = writer(&fs, 10);

        w.send(b"a\n").expect("send");
        w.close();
        w.send(b"b\n").expect("send");

        assert_eq!(w.state(), WriterState::Open);
        assert_eq!(w.file_sequence(), 1);
        assert_eq!(fs.created_paths(), vec!["/data/out0.log", "/data/out1.log"]);
        assert_eq!(fs.read_string("/data/out0.log").as_deref(), Some("a\n"));
        assert_eq!(fs.read_string("/data/out1.log").as_deref(), Some("b\n"));
    }

    #[test]
    fn test_close_failure_is_logged_not_raised() {
        let fs = MockRemoteFilesystem::new();
        let (mut w, logger) = writer(&fs, 10);
        w.send(b"a\n").expect("send");

        fs.set_faults(MockFaults {
            fail_close: true,
            ..MockFaults::default()
        });
        w.close();

        assert_eq!(w.state(), WriterState::Closed);
        let warnings = logger.messages_at_level(LogLevel::Warn);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("failed to close hdfs://localhost:8020/data/out0.log"));
    }

    #[test]
    fn test_close_failure_does_not_block_rotation() {
        let fs = MockRemoteFilesystem::new();
        let (mut w, logger) = writer(&fs, 1);
        w.send(b"a\n").expect("send");

        fs.set_faults(MockFaults {
            fail_close: true,
            ..MockFaults::default()
        });
        w.send(b"b\n").expect("send");

        assert_eq!(fs.created_paths(), vec!["/data/out0.log", "/data/out1.log"]);
        assert!(logger.contains("failed to close"));
    }

    #[test]
    fn test_drop_closes_stream() {
        let fs = MockRemoteFilesystem::new();
        {
            let (mut w, _) = writer(&fs, 10);
            w.send(b"a\n").expect("send");
        }
        assert_eq!(fs.close_count(), 1);
    }

    // ===========================================
    // Failures
    // ===========================================

    #[test]
    fn test_connect_failure_is_connection_error() {
        let fs = MockRemoteFilesystem::new();
        fs.set_faults(MockFaults {
            refuse_connect: true,
            ..MockFaults::default()
        });
        let (mut w, _) = writer(&fs, 10);

        let err = w.send(b"a\n").unwrap_err();

        assert!(matches!(err, WriterError::Connection { .. }));
        assert_eq!(w.state(), WriterState::Unopened);
        assert!(fs.created_paths().is_empty());
    }

    #[test]
    fn test_auth_failure_is_connection_error() {
        let fs = MockRemoteFilesystem::new();
        fs.set_faults(MockFaults {
            reject_users: vec!["mallory".to_string()],
            ..MockFaults::default()
        });
        let t = target(10).with_user("mallory");
        let mut w = RotatingRemoteWriter::new(fs.clone(), t, MockLogger::new()).expect("writer");

        match w.send(b"a\n").unwrap_err() {
            WriterError::Connection { source, .. } => assert!(matches!(source, FsError::Auth(_))),
            other => panic!("expected connection error, got {:?}", other),
        }
    }

    #[test]
    fn test_failed_first_open_retries_sequence_zero() {
        let fs = MockRemoteFilesystem::new();
        fs.set_faults(MockFaults {
            refuse_connect: true,
            ..MockFaults::default()
        });
        let (mut w, _) = writer(&fs, 10);
        assert!(w.send(b"a\n").is_err());

        fs.clear_faults();
        w.send(b"a\n").expect("send");

        assert_eq!(fs.created_paths(), vec!["/data/out0.log"]);
    }

    #[test]
    fn test_probe_failure_reconnects_next_time() {
        let fs = MockRemoteFilesystem::new();
        let (mut w, _) = writer(&fs, 1);
        w.send(b"a\n").expect("send");

        fs.set_faults(MockFaults {
            fail_exists: true,
            ..MockFaults::default()
        });
        assert!(matches!(
            w.send(b"b\n").unwrap_err(),
            WriterError::Connection { .. }
        ));

        fs.clear_faults();
        w.send(b"b\n").expect("send");

        assert_eq!(fs.connect_users().len(), 2);
        assert_eq!(fs.created_paths(), vec!["/data/out0.log", "/data/out1.log"]);
    }

    #[test]
    fn test_write_failure_keeps_stream() {
        let fs = MockRemoteFilesystem::new();
        let (mut w, _) = writer(&fs, 10);
        w.send(b"a\n").expect("send");

        fs.set_faults(MockFaults {
            fail_write: true,
            ..MockFaults::default()
        });
        let err = w.send(b"b\n").unwrap_err();

        match err {
            WriterError::Write { address, .. } => {
                assert_eq!(address, "hdfs://localhost:8020/data/out0.log")
            }
            other => panic!("expected write error, got {:?}", other),
        }
        assert_eq!(w.state(), WriterState::Open);
        assert_eq!(w.records_in_current_file(), 1);
    }

    #[test]
    fn test_flush_failure_is_write_error() {
        let fs = MockRemoteFilesystem::new();
        let (mut w, _) = writer(&fs, 10);
        fs.set_faults(MockFaults {
            fail_flush: true,
            ..MockFaults::default()
        });

        assert!(matches!(w.send(b"a\n").unwrap_err(), WriterError::Write { .. }));
        assert_eq!(w.records_in_current_file(), 0);
    }

    #[test]
    fn test_close_then_retry_after_write_failure() {
        let fs = MockRemoteFilesystem::new();
        let (mut w, _) = writer(&fs, 10);
        w.send(b"a\n").expect("send");

        fs.set_faults(MockFaults {
            fail_write: true,
            ..MockFaults::default()
        });
        assert!(w.send(b"b\n").is_err());

        fs.clear_faults();
        w.close();
        w.send(b"b\n").expect("send");

        assert_eq!(fs.created_paths(), vec!["/data/out0.log", "/data/out1.log"]);
        assert_eq!(fs.read_string("/data/out1.log").as_deref(), Some("b\n"));
    }

    #[test]
    fn test_create_failure_is_connection_error() {
        let fs = MockRemoteFilesystem::new();
        fs.set_faults(MockFaults {
            fail_create: true,
            ..MockFaults::default()
        });
        let (mut w, _) = writer(&fs, 10);

        assert!(matches!(
            w.send(b"a\n").unwrap_err(),
            WriterError::Connection { .. }
        ));
    }
}
