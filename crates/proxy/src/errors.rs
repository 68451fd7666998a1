//! Error taxonomy shared by every client operation.
//!
//! [`ProxyError`] is the single error type returned by the SFTP bridge and
//! relay clients. Each operation recovers every remote-facing failure at its
//! own boundary and reports it as one of these variants, so a caller can keep
//! running other operations after one fails.
//!
//! [`TransportError`] is what a [`crate::Transport`] implementation reports
//! when no HTTP response could be obtained (or a streamed body broke off).

use std::path::PathBuf;

use thiserror::Error;

use crate::ConnectionId;

/// Longest response body excerpt kept in [`ProxyError::HttpStatusFailure`].
pub const MAX_BODY_EXCERPT: usize = 512;

// ---------------------------------------------------------------------------
// Transport-level errors
// ---------------------------------------------------------------------------

/// Broad classification of a network-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// The request or response exceeded the transport's timeout.
    Timeout,
    /// DNS resolution failed or the connection was refused or reset.
    Connect,
    /// The request could not be built or sent.
    Request,
    /// The response body could not be read to completion.
    Body,
}

impl std::fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Timeout => "timeout",
            Self::Connect => "connect",
            Self::Request => "request",
            Self::Body => "body",
        };
        f.write_str(label)
    }
}

/// A network-level failure: no usable HTTP response was received.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} error: {message}")]
pub struct TransportError {
    /// What went wrong.
    pub kind: TransportErrorKind,
    /// Human-readable detail from the underlying library.
    pub message: String,
}

impl TransportError {
    /// Creates a new transport error.
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Operation-level errors
// ---------------------------------------------------------------------------

/// Every way a proxy client operation can fail.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// A caller-supplied argument is missing or inconsistent.
    ///
    /// Produced before any network call (missing credential, local file name
    /// that cannot be derived from a remote path).
    #[error("Invalid argument '{field}': {reason}")]
    InvalidArgument {
        /// Name of the offending argument.
        field: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A local file required by the operation does not exist.
    #[error("Local file not found: {}", path.display())]
    NotFound {
        /// The path that was looked up.
        path: PathBuf,
    },

    /// The operation needs an open SFTP connection and none is held.
    #[error("Not connected. Call connect() first")]
    NotConnected,

    /// `connect` was called while a connection is already open.
    ///
    /// The existing session stays open; disconnect it first.
    #[error("Already connected (connection {connection_id})")]
    AlreadyConnected {
        /// Identifier of the session that is still open.
        connection_id: ConnectionId,
    },

    /// No HTTP response was obtained: timeout, DNS failure, refused
    /// connection, or a body stream that broke off.
    #[error("Transport failure: {0}")]
    TransportFailure(#[from] TransportError),

    /// The proxy answered with an envelope whose `success` flag is false.
    #[error("Remote failure: {}", message.as_deref().unwrap_or("Unknown error"))]
    RemoteFailure {
        /// HTTP status of the reply carrying the envelope.
        status: u16,
        /// The envelope's `message`, if it had one.
        message: Option<String>,
    },

    /// The proxy answered with a non-2xx status and no explicit failure
    /// envelope.
    #[error("HTTP {status}: {body}")]
    HttpStatusFailure {
        /// HTTP status code.
        status: u16,
        /// Leading excerpt of the response body.
        body: String,
    },

    /// A 2xx reply whose body does not have the expected shape.
    #[error("Malformed response: {reason}")]
    MalformedResponse {
        /// What was wrong with the body.
        reason: String,
    },

    /// Reading or writing a local file failed.
    #[error("Local I/O error on {}: {message}", path.display())]
    LocalIo {
        /// The local path being read or written.
        path: PathBuf,
        /// The underlying I/O error message.
        message: String,
    },
}

impl ProxyError {
    /// Shorthand for [`ProxyError::InvalidArgument`].
    pub fn invalid_argument(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for [`ProxyError::MalformedResponse`].
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`ProxyError::LocalIo`].
    pub fn local_io(path: impl Into<PathBuf>, error: &std::io::Error) -> Self {
        Self::LocalIo {
            path: path.into(),
            message: error.to_string(),
        }
    }

    /// Builds an [`ProxyError::HttpStatusFailure`] keeping at most
    /// [`MAX_BODY_EXCERPT`] characters of the body.
    pub fn http_status(status: u16, body: &[u8]) -> Self {
        let text = String::from_utf8_lossy(body);
        Self::HttpStatusFailure {
            status,
            body: text.chars().take(MAX_BODY_EXCERPT).collect(),
        }
    }
}
