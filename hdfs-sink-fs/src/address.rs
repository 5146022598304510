//! Remote address synthesis.
//!
//! Output files are addressed as
//! `hdfs://host:port/base/path/<base_filename><sequence>.<suffix>`, with the
//! sequence rendered in plain decimal directly after the base filename.

use std::fmt;

use thiserror::Error;
use url::Url;

/// URI scheme of every synthesized address.
pub const SCHEME: &str = "hdfs";

/// Characters that a path component may not contain.
const FORBIDDEN_CHARS: &[char] = &['"', '<', '>', '\\', '^', '`', '{', '|', '}', '#', '?', '%'];

/// A host/path/filename combination that cannot form a well-formed address.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid remote address {address}: {reason}")]
pub struct AddressError {
    pub address: String,
    pub reason: String,
}

impl AddressError {
    fn new(address: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            reason: reason.into(),
        }
    }
}

/// A validated `hdfs://` address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteAddress {
    url: Url,
}

impl RemoteAddress {
    /// Parse an absolute `hdfs://host:port/path` address.
    pub fn parse(address: &str) -> Result<Self, AddressError> {
        let url = Url::parse(address).map_err(|e| AddressError::new(address, e.to_string()))?;
        if url.scheme() != SCHEME {
            return Err(AddressError::new(
                address,
                format!("scheme must be {}, got {}", SCHEME, url.scheme()),
            ));
        }
        if url.host_str().map_or(true, str::is_empty) {
            return Err(AddressError::new(address, "missing host"));
        }
        if url.port().is_none() {
            return Err(AddressError::new(address, "missing port"));
        }
        Ok(Self { url })
    }

    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    pub fn port(&self) -> u16 {
        self.url.port().unwrap_or_default()
    }

    /// Absolute path on the remote filesystem, e.g. `/user/cloudera/out3.log`.
    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// Last path component.
    pub fn file_name(&self) -> &str {
        self.path().rsplit('/').next().unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl fmt::Display for RemoteAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

/// Where output files go. Immutable once handed to a writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionTarget {
    pub host: String,
    pub port: u16,
    /// Directory holding the output files.
    pub base_path: String,
    pub base_filename: String,
    /// Extension appended after the sequence number, without the dot.
    pub filename_suffix: String,
    /// Identity to authenticate as; `None` uses the client's default identity.
    pub user: Option<String>,
    /// Records written to a file before rotating. Values <= 0 put every
    /// record in its own file.
    pub max_records_per_file: i64,
}

impl ConnectionTarget {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        base_path: impl Into<String>,
        base_filename: impl Into<String>,
        filename_suffix: impl Into<String>,
        max_records_per_file: i64,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            base_path: base_path.into(),
            base_filename: base_filename.into(),
            filename_suffix: filename_suffix.into(),
            user: None,
            max_records_per_file,
        }
    }

    /// Builder: authenticate as `user`.
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// File name for a sequence number, e.g. `gepOutput3.json`.
    pub fn file_name_for(&self, sequence: u64) -> String {
        format!("{}{}.{}", self.base_filename, sequence, self.filename_suffix)
    }

    /// Address of the filesystem root on the target host.
    pub fn root_address(&self) -> Result<RemoteAddress, AddressError> {
        let raw = format!("{}://{}:{}/", SCHEME, self.host, self.port);
        self.check_host(&raw)?;
        RemoteAddress::parse(&raw)
    }

    /// Full address of the output file for a sequence number.
    pub fn address_for(&self, sequence: u64) -> Result<RemoteAddress, AddressError> {
        let segments: Vec<&str> = self
            .base_path
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();
        let file_name = self.file_name_for(sequence);

        let mut raw = format!("{}://{}:{}/", SCHEME, self.host, self.port);
        for segment in &segments {
            raw.push_str(segment);
            raw.push('/');
        }
        raw.push_str(&file_name);

        self.check_host(&raw)?;
        for segment in &segments {
            check_component(&raw, "path segment", segment)?;
        }
        check_component(&raw, "base filename", &self.base_filename)?;
        check_component(&raw, "filename suffix", &self.filename_suffix)?;

        RemoteAddress::parse(&raw)
    }

    fn check_host(&self, raw: &str) -> Result<(), AddressError> {
        if self.host.trim().is_empty() {
            return Err(AddressError::new(raw, "host is empty"));
        }
        if self.port == 0 {
            return Err(AddressError::new(raw, "port must be non-zero"));
        }
        Ok(())
    }
}

fn check_component(raw: &str, what: &str, value: &str) -> Result<(), AddressError> {
    if value.is_empty() {
        return Err(AddressError::new(raw, format!("{} is empty", what)));
    }
    if value == "." || value == ".." {
        return Err(AddressError::new(raw, format!("{} may not be {:?}", what, value)));
    }
    if let Some(c) = value
        .chars()
        .find(|c| c.is_control() || c.is_whitespace() || FORBIDDEN_CHARS.contains(c))
    {
        return Err(AddressError::new(
            raw,
            format!("{} {:?} contains illegal character {:?}", what, value, c),
        ));
    }
    if value.contains('/') {
        return Err(AddressError::new(raw, format!("{} {:?} contains '/'", what, value)));
    }
    Ok(())
}
