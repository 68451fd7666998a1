//! Shared value types for the static-IP proxy domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! invariants (a [`ProxyEndpoint`] is always an absolute `http(s)` URL, a
//! [`ConnectRequest`] never leaks its secret through `Debug`) and are the
//! inputs and outputs of client operations.

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::{ConnectionId, ProxyError};

// ---------------------------------------------------------------------------
// Endpoint
// ---------------------------------------------------------------------------

/// Base URL of one proxy deployment (e.g. `https://static-ip-proxy.onrender.com`).
///
/// Always starts with `http://` or `https://`, has a non-empty authority, and
/// never ends with `/`, so route paths can be appended directly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProxyEndpoint(String);

impl ProxyEndpoint {
    /// The public deployment used when nothing else is configured.
    pub const DEFAULT: &'static str = "https://static-ip-proxy.onrender.com";

    /// Creates an endpoint, returning `None` if `url` is not an absolute
    /// `http`/`https` URL.
    #[must_use]
    pub fn new(url: impl AsRef<str>) -> Option<Self> {
        let trimmed = url.as_ref().trim().trim_end_matches('/');
        let authority = trimmed
            .strip_prefix("https://")
            .or_else(|| trimmed.strip_prefix("http://"))?;
        if authority.is_empty() || authority.chars().any(char::is_whitespace) {
            return None;
        }
        Some(Self(trimmed.to_string()))
    }

    /// Returns the base URL as a string slice (no trailing slash).
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Appends a route path (which must start with `/`) to the base URL.
    pub fn join(&self, path: &str) -> String {
        format!("{}{}", self.0, path)
    }
}

impl Default for ProxyEndpoint {
    fn default() -> Self {
        Self(Self::DEFAULT.to_string())
    }
}

impl std::fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ProxyEndpoint {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value).ok_or_else(|| format!("invalid proxy base URL: '{value}'"))
    }
}

impl From<ProxyEndpoint> for String {
    fn from(value: ProxyEndpoint) -> Self {
        value.0
    }
}

// ---------------------------------------------------------------------------
// HTTP method
// ---------------------------------------------------------------------------

/// HTTP method of a request sent to the proxy or relayed through `/proxy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
}

impl HttpMethod {
    /// Returns the canonical upper-case method name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            "HEAD" => Ok(Self::Head),
            other => Err(format!("unsupported HTTP method '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// SFTP connection
// ---------------------------------------------------------------------------

/// Default SSH/SFTP port.
pub const DEFAULT_SFTP_PORT: u16 = 22;

/// Parameters of an SFTP connect call.
///
/// Exactly one of [`with_password`](Self::with_password) or
/// [`with_private_key`](Self::with_private_key) must be supplied before the
/// request is sent; [`ConnectRequest::payload`] enforces this. Secrets are
/// held as [`SecretString`] and are redacted from `Debug` output.
#[derive(Debug)]
pub struct ConnectRequest {
    host: String,
    username: String,
    port: u16,
    password: Option<SecretString>,
    private_key: Option<SecretString>,
}

impl ConnectRequest {
    /// Starts a request for `username@host` on the default port with no
    /// credential.
    pub fn new(host: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            username: username.into(),
            port: DEFAULT_SFTP_PORT,
            password: None,
            private_key: None,
        }
    }

    /// Overrides the remote port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Authenticates with a password.
    #[must_use]
    pub fn with_password(mut self, password: SecretString) -> Self {
        self.password = Some(password);
        self
    }

    /// Authenticates with the content of a private key.
    #[must_use]
    pub fn with_private_key(mut self, private_key: SecretString) -> Self {
        self.private_key = Some(private_key);
        self
    }

    /// Remote SFTP host name.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Remote user name.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Remote port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Builds the JSON body of `POST /sftp/connect`.
    ///
    /// An empty secret counts as not supplied.
    ///
    /// # Errors
    ///
    /// [`ProxyError::InvalidArgument`] if the host is empty, or if neither or
    /// both of password and private key are supplied.
    pub fn payload(&self) -> Result<serde_json::Value, ProxyError> {
        if self.host.trim().is_empty() {
            return Err(ProxyError::invalid_argument("host", "must not be empty"));
        }

        let password = non_empty(self.password.as_ref());
        let private_key = non_empty(self.private_key.as_ref());

        let mut body = serde_json::json!({
            "host": self.host,
            "username": self.username,
            "port": self.port,
        });
        match (password, private_key) {
            (Some(password), None) => body["password"] = password.into(),
            (None, Some(key)) => body["privateKey"] = key.into(),
            (None, None) => {
                return Err(ProxyError::invalid_argument(
                    "credential",
                    "either a password or a private key must be provided",
                ));
            }
            (Some(_), Some(_)) => {
                return Err(ProxyError::invalid_argument(
                    "credential",
                    "provide a password or a private key, not both",
                ));
            }
        }
        Ok(body)
    }
}

fn non_empty(secret: Option<&SecretString>) -> Option<&str> {
    secret
        .map(|value| value.expose_secret())
        .filter(|value| !value.is_empty())
}

/// An SFTP session currently held open on the proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenConnection {
    /// Server-issued identifier of the session.
    pub id: ConnectionId,
    /// Host the session is connected to.
    pub host: String,
    /// When the proxy confirmed the session.
    pub opened_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Remote listing
// ---------------------------------------------------------------------------

/// Kind of a remote directory entry as reported by the proxy.
///
/// Unknown kinds are preserved verbatim in [`FileKind::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FileKind {
    File,
    Directory,
    Other(String),
}

impl From<String> for FileKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "file" => Self::File,
            "directory" => Self::Directory,
            _ => Self::Other(value),
        }
    }
}

impl From<FileKind> for String {
    fn from(value: FileKind) -> Self {
        match value {
            FileKind::File => "file".to_string(),
            FileKind::Directory => "directory".to_string(),
            FileKind::Other(other) => other,
        }
    }
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File => f.write_str("file"),
            Self::Directory => f.write_str("directory"),
            Self::Other(other) => f.write_str(other),
        }
    }
}

/// One entry of a remote directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFileEntry {
    /// Entry name (not a full path).
    pub name: String,
    /// Entry kind.
    #[serde(rename = "type")]
    pub kind: FileKind,
}

// ---------------------------------------------------------------------------
// Relay / server metadata
// ---------------------------------------------------------------------------

/// Body of `GET /ip`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpReport {
    /// Address the proxy uses for outbound traffic.
    pub outbound_ip: String,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    #[serde(default)]
    pub status: String,
    /// Server uptime in seconds.
    #[serde(default)]
    pub uptime: f64,
    #[serde(default)]
    pub features: Vec<String>,
}

/// Body of `GET /`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub usage: ServerUsage,
}

/// `usage` block of [`ServerInfo`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerUsage {
    #[serde(default)]
    pub static_ip: Option<String>,
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Milliseconds elapsed between this timestamp and now (zero if in the future).
    pub fn elapsed_ms(self) -> u64 {
        let elapsed = Utc::now().signed_duration_since(self.0).num_milliseconds();
        u64::try_from(elapsed).unwrap_or(0)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}
