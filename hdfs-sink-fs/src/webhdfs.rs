//! HDFS access over the WebHDFS REST API.
//!
//! `hdfs://host:port/path` is served from
//! `http://host:port/webhdfs/v1/path`, so the configured port must be the
//! namenode's HTTP port (9870 on Hadoop 3). Authentication is the simple
//! `user.name` scheme.
//!
//! File creation and appends follow the two-step protocol: the namenode
//! answers with a 307 pointing at a datanode, and the data goes there.
//! Writes are buffered until `flush`, which ships them in one `APPEND`.

use std::mem;
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::LOCATION;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use url::Url;

use crate::address::RemoteAddress;
use crate::remote::{FsError, RemoteConnection, RemoteFilesystem, RemoteStream};

pub const WEBHDFS_PREFIX: &str = "/webhdfs/v1";

/// Longest response body quoted in an error message.
const MAX_ERROR_BODY: usize = 256;

#[derive(Debug, Deserialize)]
struct RemoteExceptionBody {
    #[serde(rename = "RemoteException")]
    remote_exception: RemoteException,
}

#[derive(Debug, Deserialize)]
struct RemoteException {
    #[serde(default)]
    exception: String,
    #[serde(default)]
    message: String,
}

/// WebHDFS client.
#[derive(Debug, Clone)]
pub struct WebHdfsFilesystem {
    client: Client,
    scheme: &'static str,
}

impl WebHdfsFilesystem {
    /// Client with reqwest's default timeouts.
    pub fn new() -> Result<Self, FsError> {
        Self::build(None)
    }

    /// Client whose requests give up after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Result<Self, FsError> {
        Self::build(Some(timeout))
    }

    fn build(timeout: Option<Duration>) -> Result<Self, FsError> {
        let mut builder = Client::builder().redirect(reqwest::redirect::Policy::none());
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(transport_error)?;
        Ok(Self {
            client,
            scheme: "http",
        })
    }

    /// Talk to the namenode over HTTPS instead of HTTP.
    pub fn https(mut self) -> Self {
        self.scheme = "https";
        self
    }
}

impl RemoteFilesystem for WebHdfsFilesystem {
    type Connection = WebHdfsConnection;

    fn connect(
        &self,
        root: &RemoteAddress,
        user: Option<&str>,
    ) -> Result<Self::Connection, FsError> {
        let connection = WebHdfsConnection {
            client: self.client.clone(),
            scheme: self.scheme,
            user: user.map(str::to_string),
        };
        // Resolves the host and checks the identity is accepted.
        connection.file_status(root)?;
        Ok(connection)
    }
}

/// Connection to one WebHDFS namenode.
#[derive(Debug, Clone)]
pub struct WebHdfsConnection {
    client: Client,
    scheme: &'static str,
    user: Option<String>,
}

impl WebHdfsConnection {
    /// REST endpoint for an operation on `address`.
    pub fn endpoint(
        &self,
        address: &RemoteAddress,
        op: &str,
        params: &[(&str, &str)],
    ) -> Result<Url, FsError> {
        endpoint_url(self.scheme, address, op, self.user.as_deref(), params)
    }

    /// `Ok(true)` if anything (file or directory) exists at `address`.
    fn file_status(&self, address: &RemoteAddress) -> Result<bool, FsError> {
        let url = self.endpoint(address, "GETFILESTATUS", &[])?;
        let response = self.client.get(url).send().map_err(transport_error)?;
        match response.status() {
            s if s.is_success() => Ok(true),
            s if s == StatusCode::NOT_FOUND => Ok(false),
            _ => Err(error_from(response, address.path())),
        }
    }

    /// Send a CREATE/APPEND request, following the redirect to a datanode.
    fn two_step(
        &self,
        method: Method,
        url: Url,
        body: Vec<u8>,
        path: &str,
    ) -> Result<(), FsError> {
        let response = self
            .client
            .request(method.clone(), url)
            .send()
            .map_err(transport_error)?;
        let status = response.status();

        if status.is_redirection() {
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| FsError::Remote {
                    status: status.as_u16(),
                    message: "redirect without Location header".to_string(),
                })?;
            let target = Url::parse(location).map_err(|e| FsError::Remote {
                status: status.as_u16(),
                message: format!("bad redirect location {}: {}", location, e),
            })?;

            let response = self
                .client
                .request(method, target)
                .body(body)
                .send()
                .map_err(transport_error)?;
            if response.status().is_success() {
                return Ok(());
            }
            return Err(error_from(response, path));
        }

        if status.is_success() {
            if body.is_empty() {
                return Ok(());
            }
            return Err(FsError::Remote {
                status: status.as_u16(),
                message: format!("expected a datanode redirect for {}", path),
            });
        }
        Err(error_from(response, path))
    }
}

impl RemoteConnection for WebHdfsConnection {
    type Stream = WebHdfsStream;

    fn exists(&self, address: &RemoteAddress) -> Result<bool, FsError> {
        self.file_status(address)
    }

    fn create(&self, address: &RemoteAddress) -> Result<Self::Stream, FsError> {
        let url = self.endpoint(address, "CREATE", &[("overwrite", "false")])?;
        self.two_step(Method::PUT, url, Vec::new(), address.path())?;
        Ok(WebHdfsStream {
            connection: self.clone(),
            address: address.clone(),
            buffer: Vec::new(),
        })
    }
}

/// An HDFS file opened through WebHDFS.
#[derive(Debug)]
pub struct WebHdfsStream {
    connection: WebHdfsConnection,
    address: RemoteAddress,
    buffer: Vec<u8>,
}

impl RemoteStream for WebHdfsStream {
    fn write_all(&mut self, data: &[u8]) -> Result<(), FsError> {
        self.buffer.extend_from_slice(data);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), FsError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let body = mem::take(&mut self.buffer);
        let url = self.connection.endpoint(&self.address, "APPEND", &[])?;
        self.connection
            .two_step(Method::POST, url, body, self.address.path())
    }

    fn close(mut self) -> Result<(), FsError> {
        self.flush()
    }
}

fn endpoint_url(
    scheme: &str,
    address: &RemoteAddress,
    op: &str,
    user: Option<&str>,
    params: &[(&str, &str)],
) -> Result<Url, FsError> {
    let raw = format!(
        "{}://{}:{}{}{}",
        scheme,
        address.host(),
        address.port(),
        WEBHDFS_PREFIX,
        address.path()
    );
    let mut url = Url::parse(&raw)
        .map_err(|e| FsError::Unreachable(format!("invalid WebHDFS endpoint {}: {}", raw, e)))?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("op", op);
        if let Some(user) = user {
            query.append_pair("user.name", user);
        }
        for (key, value) in params {
            query.append_pair(key, value);
        }
    }
    Ok(url)
}

fn transport_error(e: reqwest::Error) -> FsError {
    FsError::Unreachable(e.to_string())
}

fn error_from(response: Response, path: &str) -> FsError {
    let status = response.status().as_u16();
    let body = response.text().unwrap_or_default();
    status_error(status, &body, path)
}

/// Map a failed WebHDFS response to an `FsError`.
///
/// WebHDFS reports most server-side `IOException`s as 403, so the exception
/// class in the body decides between "already exists", auth and generic.
fn status_error(status: u16, body: &str, path: &str) -> FsError {
    let exception = serde_json::from_str::<RemoteExceptionBody>(body)
        .ok()
        .map(|b| b.remote_exception);

    let message = match &exception {
        Some(e) if !e.message.is_empty() => e.message.clone(),
        Some(e) if !e.exception.is_empty() => e.exception.clone(),
        _ => {
            let mut text: String = body.trim().chars().take(MAX_ERROR_BODY).collect();
            if text.is_empty() {
                text = format!("request for {} failed", path);
            }
            text
        }
    };

    let class = exception.map(|e| e.exception).unwrap_or_default();
    match (status, class.as_str()) {
        (_, "FileAlreadyExistsException") => FsError::AlreadyExists(path.to_string()),
        (401, _) | (_, "AccessControlException") | (_, "SecurityException") => {
            FsError::Auth(message)
        }
        (403, "AuthorizationException") => FsError::Auth(message),
        _ => FsError::Remote { status, message },
    }
}
