//! Remote filesystem abstraction.
//!
//! The writer only needs four things from a distributed filesystem: connect
//! to it, ask whether a file exists, create a new file, and push bytes into
//! that file. Those are split into three traits so the connection and the
//! stream can be owned separately.

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, RwLock};

use thiserror::Error;

use crate::address::RemoteAddress;

/// Errors from remote filesystem operations.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("filesystem unreachable: {0}")]
    Unreachable(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("file already exists: {0}")]
    AlreadyExists(String),

    #[error("remote error (HTTP {status}): {message}")]
    Remote { status: u16, message: String },
}

/// Entry point to a remote filesystem.
pub trait RemoteFilesystem: Send + Sync {
    type Connection: RemoteConnection;

    /// Resolve `root` and connect, authenticating as `user` if given.
    fn connect(&self, root: &RemoteAddress, user: Option<&str>)
        -> Result<Self::Connection, FsError>;
}

/// An established connection.
pub trait RemoteConnection: Send {
    type Stream: RemoteStream;

    /// Check whether anything already occupies `address`.
    fn exists(&self, address: &RemoteAddress) -> Result<bool, FsError>;

    /// Create a new file at `address` and open it for writing.
    /// Must fail with `FsError::AlreadyExists` rather than overwrite.
    fn create(&self, address: &RemoteAddress) -> Result<Self::Stream, FsError>;
}

/// An open output file.
pub trait RemoteStream: Send {
    fn write_all(&mut self, data: &[u8]) -> Result<(), FsError>;

    /// Make everything written so far durable on the remote side.
    fn flush(&mut self) -> Result<(), FsError>;

    fn close(self) -> Result<(), FsError>
    where
        Self: Sized;
}

/// Faults the mock filesystem can be told to produce.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockFaults {
    pub refuse_connect: bool,
    /// Users for which `connect` fails with `FsError::Auth`.
    pub reject_users: Vec<String>,
    pub fail_exists: bool,
    pub fail_create: bool,
    pub fail_write: bool,
    pub fail_flush: bool,
    pub fail_close: bool,
}

#[derive(Debug, Default)]
struct MockState {
    files: HashMap<String, Vec<u8>>,
    created: Vec<String>,
    connects: Vec<Option<String>>,
    flushes: usize,
    closes: usize,
    faults: MockFaults,
}

/// In-memory filesystem for testing.
/// Cloning creates a new handle to the same underlying data.
#[derive(Debug, Clone, Default)]
pub struct MockRemoteFilesystem {
    state: Arc<RwLock<MockState>>,
}

impl MockRemoteFilesystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file directly (for test setup).
    pub fn add_file(&self, path: &str, data: &[u8]) {
        self.state
            .write()
            .unwrap()
            .files
            .insert(path.to_string(), data.to_vec());
    }

    pub fn get_file(&self, path: &str) -> Option<Vec<u8>> {
        self.state.read().unwrap().files.get(path).cloned()
    }

    /// File content as text, if present and valid UTF-8.
    pub fn read_string(&self, path: &str) -> Option<String> {
        self.get_file(path).and_then(|d| String::from_utf8(d).ok())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.state.read().unwrap().files.contains_key(path)
    }

    /// Paths created through `RemoteConnection::create`, in order.
    pub fn created_paths(&self) -> Vec<String> {
        self.state.read().unwrap().created.clone()
    }

    /// User identity passed to each `connect` call, in order.
    pub fn connect_users(&self) -> Vec<Option<String>> {
        self.state.read().unwrap().connects.clone()
    }

    pub fn flush_count(&self) -> usize {
        self.state.read().unwrap().flushes
    }

    pub fn close_count(&self) -> usize {
        self.state.read().unwrap().closes
    }

    /// Replace the active fault set.
    pub fn set_faults(&self, faults: MockFaults) {
        self.state.write().unwrap().faults = faults;
    }

    pub fn clear_faults(&self) {
        self.set_faults(MockFaults::default());
    }

    fn faults(&self) -> MockFaults {
        self.state.read().unwrap().faults.clone()
    }
}

fn injected(what: &str) -> FsError {
    FsError::Io(io::Error::new(io::ErrorKind::Other, format!("injected {} failure", what)))
}

impl RemoteFilesystem for MockRemoteFilesystem {
    type Connection = MockConnection;

    fn connect(
        &self,
        root: &RemoteAddress,
        user: Option<&str>,
    ) -> Result<Self::Connection, FsError> {
        let faults = self.faults();
        if faults.refuse_connect {
            return Err(FsError::Unreachable(format!("connection refused: {}", root)));
        }
        if let Some(user) = user {
            if faults.reject_users.iter().any(|u| u == user) {
                return Err(FsError::Auth(format!("user {} rejected", user)));
            }
        }
        self.state
            .write()
            .unwrap()
            .connects
            .push(user.map(str::to_string));
        Ok(MockConnection { fs: self.clone() })
    }
}

/// Connection handle of `MockRemoteFilesystem`.
#[derive(Debug, Clone)]
pub struct MockConnection {
    fs: MockRemoteFilesystem,
}

impl RemoteConnection for MockConnection {
    type Stream = MockStream;

    fn exists(&self, address: &RemoteAddress) -> Result<bool, FsError> {
        if self.fs.faults().fail_exists {
            return Err(FsError::Unreachable("injected exists failure".to_string()));
        }
        Ok(self.fs.contains(address.path()))
    }

    fn create(&self, address: &RemoteAddress) -> Result<Self::Stream, FsError> {
        if self.fs.faults().fail_create {
            return Err(injected("create"));
        }
        let path = address.path().to_string();
        let mut state = self.fs.state.write().unwrap();
        if state.files.contains_key(&path) {
            return Err(FsError::AlreadyExists(path));
        }
        state.files.insert(path.clone(), Vec::new());
        state.created.push(path.clone());
        Ok(MockStream {
            fs: self.fs.clone(),
            path,
        })
    }
}

/// Output stream of `MockRemoteFilesystem`; writes land in the shared map.
#[derive(Debug)]
pub struct MockStream {
    fs: MockRemoteFilesystem,
    path: String,
}

impl RemoteStream for MockStream {
    fn write_all(&mut self, data: &[u8]) -> Result<(), FsError> {
        if self.fs.faults().fail_write {
            return Err(injected("write"));
        }
        let mut state = self.fs.state.write().unwrap();
        state
            .files
            .entry(self.path.clone())
            .or_default()
            .extend_from_slice(data);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), FsError> {
        if self.fs.faults().fail_flush {
            return Err(injected("flush"));
        }
        self.fs.state.write().unwrap().flushes += 1;
        Ok(())
    }

    fn close(self) -> Result<(), FsError> {
        self.fs.state.write().unwrap().closes += 1;
        if self.fs.faults().fail_close {
            return Err(injected("close"));
        }
        Ok(())
    }
}
