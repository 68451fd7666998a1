//! The `Transport` port: how clients reach the proxy.
//!
//! Clients describe requests with [`TransportRequest`] (a route path relative
//! to the endpoint, query pairs, extra headers, and a body) and hand them to a
//! [`Transport`]. The infrastructure adapter owns the endpoint, the connection
//! pool, and the default headers; this crate never performs I/O itself.
//!
//! Two call shapes exist: [`Transport::send`] buffers the whole reply (JSON
//! endpoints), [`Transport::open_stream`] hands back a [`ByteStream`] that
//! yields bounded chunks (file download).

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::{HttpMethod, TransportError};

/// Largest chunk a [`ByteStream`] may yield.
pub const DOWNLOAD_CHUNK_SIZE: usize = 8192;

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Body of a [`TransportRequest`].
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    /// No body.
    #[default]
    Empty,
    /// A JSON document.
    Json(serde_json::Value),
    /// Raw bytes sent as-is.
    Bytes(Bytes),
    /// A `multipart/form-data` form.
    Multipart(MultipartForm),
}

/// A file attached to a [`MultipartForm`].
#[derive(Debug, Clone, PartialEq)]
pub struct FilePart {
    /// Form field name.
    pub field: String,
    /// File name announced in the part's `Content-Disposition`.
    pub file_name: String,
    /// MIME type of the part.
    pub content_type: String,
    /// File content.
    pub content: Bytes,
}

/// A `multipart/form-data` body: plain text fields plus at most one file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultipartForm {
    /// Text fields, in order.
    pub fields: Vec<(String, String)>,
    /// Attached file, if any.
    pub file: Option<FilePart>,
}

/// One HTTP request addressed to the proxy.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// Route path relative to the endpoint; always starts with `/`.
    pub path: String,
    /// Query parameters, in order. The adapter percent-encodes them.
    pub query: Vec<(String, String)>,
    /// Extra headers on top of the adapter's defaults.
    pub headers: Vec<(String, String)>,
    /// Request body.
    pub body: RequestBody,
}

impl TransportRequest {
    /// Creates a request with no query, headers, or body.
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    /// Shorthand for a `GET` request.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    /// Shorthand for a `POST` request.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    /// Appends a query parameter.
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Appends a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    /// Sets a JSON body.
    #[must_use]
    pub fn json(self, value: serde_json::Value) -> Self {
        self.body(RequestBody::Json(value))
    }

    /// Returns the first value of query parameter `key`, if present.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// A fully buffered HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw body bytes.
    pub body: Bytes,
}

impl TransportResponse {
    /// Creates a response.
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Returns `true` for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Source of body chunks for a streamed response.
#[async_trait]
pub trait ByteStream: Send {
    /// Returns the next chunk (at most [`DOWNLOAD_CHUNK_SIZE`] bytes),
    /// `None` at end of body, or the error that interrupted the stream.
    async fn next_chunk(&mut self) -> Option<Result<Bytes, TransportError>>;
}

/// A response whose body is consumed incrementally.
pub struct StreamingResponse {
    /// HTTP status code.
    pub status: u16,
    /// Body chunks.
    pub body: Box<dyn ByteStream>,
}

impl StreamingResponse {
    /// Returns `true` for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Drains up to `limit` bytes of the remaining body into memory.
    ///
    /// Used to read the error body of a non-2xx streamed reply.
    pub async fn collect_prefix(mut self, limit: usize) -> Result<Bytes, TransportError> {
        let mut collected = Vec::new();
        while collected.len() < limit {
            match self.body.next_chunk().await {
                Some(chunk) => collected.extend_from_slice(&chunk?),
                None => break,
            }
        }
        collected.truncate(limit);
        Ok(Bytes::from(collected))
    }
}

impl std::fmt::Debug for StreamingResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Port trait
// ---------------------------------------------------------------------------

/// Issues HTTP requests against one proxy deployment.
///
/// Implementations own the base URL and send `Content-Type: application/json`
/// plus a `User-Agent` naming the client on every request. They must not
/// retry: a failed attempt is reported once as a [`TransportError`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `request` and buffers the complete response.
    ///
    /// Any HTTP status (including 4xx/5xx) is a successful return; only
    /// network-level failures are errors.
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;

    /// Sends `request` and returns as soon as the status line and headers
    /// have arrived; the body is read through [`StreamingResponse::body`].
    async fn open_stream(
        &self,
        request: TransportRequest,
    ) -> Result<StreamingResponse, TransportError>;

    /// Base URL this transport targets, for logging.
    fn endpoint(&self) -> &str;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        (**self).send(request).await
    }

    async fn open_stream(
        &self,
        request: TransportRequest,
    ) -> Result<StreamingResponse, TransportError> {
        (**self).open_stream(request).await
    }

    fn endpoint(&self) -> &str {
        (**self).endpoint()
    }
}
