//! Local directory stand-in for a remote filesystem.
//!
//! Remote paths are mapped under a root directory, so
//! `hdfs://host:8020/user/cloudera/out0.json` becomes
//! `<root>/user/cloudera/out0.json`. Host, port and user are ignored.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use percent_encoding::percent_decode_str;

use crate::address::RemoteAddress;
use crate::remote::{FsError, RemoteConnection, RemoteFilesystem, RemoteStream};

/// Filesystem that writes into a local directory tree.
#[derive(Debug, Clone)]
pub struct LocalFilesystem {
    root: PathBuf,
}

impl LocalFilesystem {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Local path a remote address maps to.
    pub fn local_path(&self, address: &RemoteAddress) -> PathBuf {
        local_path(&self.root, address)
    }
}

fn local_path(root: &Path, address: &RemoteAddress) -> PathBuf {
    let mut path = root.to_path_buf();
    if let Some(segments) = address.url().path_segments() {
        // URL paths are percent-encoded; the local name must be the decoded one.
        for segment in segments.filter(|s| !s.is_empty()) {
            path.push(&*percent_decode_str(segment).decode_utf8_lossy());
        }
    }
    path
}

impl RemoteFilesystem for LocalFilesystem {
    type Connection = LocalConnection;

    fn connect(
        &self,
        _root: &RemoteAddress,
        _user: Option<&str>,
    ) -> Result<Self::Connection, FsError> {
        fs::create_dir_all(&self.root)?;
        Ok(LocalConnection {
            root: self.root.clone(),
        })
    }
}

/// Connection handle of `LocalFilesystem`.
#[derive(Debug, Clone)]
pub struct LocalConnection {
    root: PathBuf,
}

impl RemoteConnection for LocalConnection {
    type Stream = LocalStream;

    fn exists(&self, address: &RemoteAddress) -> Result<bool, FsError> {
        match fs::metadata(local_path(&self.root, address)) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(FsError::Io(e)),
        }
    }

    fn create(&self, address: &RemoteAddress) -> Result<Self::Stream, FsError> {
        let path = local_path(&self.root, address);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| match e.kind() {
                io::ErrorKind::AlreadyExists => FsError::AlreadyExists(path.display().to_string()),
                _ => FsError::Io(e),
            })?;
        Ok(LocalStream { file })
    }
}

/// Output stream of `LocalFilesystem`.
#[derive(Debug)]
pub struct LocalStream {
    file: File,
}

impl RemoteStream for LocalStream {
    fn write_all(&mut self, data: &[u8]) -> Result<(), FsError> {
        self.file.write_all(data)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), FsError> {
        self.file.flush()?;
        // sync_data skips the metadata sync, still durable for append-only data
        self.file.sync_data()?;
        Ok(())
    }

    fn close(self) -> Result<(), FsError> {
        self.file.sync_all()?;
        Ok(())
    }
}
