//! Remote filesystem writing for the HDFS sink.
//!
//! This crate provides:
//! - Address synthesis for sequence-numbered output files
//! - A count-based rotation policy
//! - `RotatingRemoteWriter`, which rotates files and never overwrites one
//! - Remote filesystem traits with mock, local-directory and WebHDFS clients

pub mod address;
pub mod local;
pub mod remote;
pub mod rotation;
pub mod webhdfs;
pub mod writer;

pub use address::{AddressError, ConnectionTarget, RemoteAddress, SCHEME};
pub use local::LocalFilesystem;
pub use remote::{
    FsError, MockFaults, MockRemoteFilesystem, RemoteConnection, RemoteFilesystem, RemoteStream,
};
pub use rotation::{should_rotate, RotationPolicy};
pub use webhdfs::WebHdfsFilesystem;
pub use writer::{RotatingRemoteWriter, WriterError, WriterState};
