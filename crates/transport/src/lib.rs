//! HTTP transport adapter for the static-IP proxy.
//!
//! Implements [`proxy::Transport`] over a pooled [`reqwest::Client`]. One
//! [`ReqwestTransport`] targets one [`ProxyEndpoint`] and sends the same
//! default headers on every request: `Content-Type: application/json` and a
//! `User-Agent` naming the client.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** URL building, query encoding, multipart framing, body
//! streaming, and `reqwest` error classification all live here. The client
//! crates see only [`proxy::Transport`].
//!
//! Timeouts are `reqwest`'s defaults. Nothing is retried.

use async_trait::async_trait;
use bytes::Bytes;
use proxy::{
    ByteStream, ClientName, HttpMethod, MultipartForm, ProxyEndpoint, RequestBody,
    StreamingResponse, Transport, TransportError, TransportErrorKind, TransportRequest,
    TransportResponse, DOWNLOAD_CHUNK_SIZE,
};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use tracing::debug;

/// [`proxy::Transport`] over `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    endpoint: ProxyEndpoint,
    chunk_size: usize,
}

impl ReqwestTransport {
    /// Creates a transport for `endpoint` announcing itself as `client_name`.
    ///
    /// # Errors
    ///
    /// [`TransportErrorKind::Request`] if the HTTP client cannot be built
    /// (e.g. the client name is not a valid header value).
    pub fn new(endpoint: ProxyEndpoint, client_name: &ClientName) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .user_agent(client_name.as_str())
            .default_headers(headers)
            .build()
            .map_err(classify)?;

        Ok(Self {
            client,
            endpoint,
            chunk_size: DOWNLOAD_CHUNK_SIZE,
        })
    }

    /// Caps streamed chunks at `chunk_size` bytes (at least 1, at most
    /// [`DOWNLOAD_CHUNK_SIZE`]).
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.clamp(1, DOWNLOAD_CHUNK_SIZE);
        self
    }

    fn build(&self, request: TransportRequest) -> Result<reqwest::RequestBuilder, TransportError> {
        let url = self.endpoint.join(&request.path);
        let mut builder = self.client.request(to_method(request.method), url);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Bytes(bytes) => builder.body(bytes),
            RequestBody::Multipart(form) => builder.multipart(to_form(form)?),
        };
        Ok(builder)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let method = request.method;
        let path = request.path.clone();

        let response = self.build(request)?.send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(classify)?;

        debug!(%method, path = %path, status, bytes = body.len(), "proxy responded");
        Ok(TransportResponse { status, body })
    }

    async fn open_stream(
        &self,
        request: TransportRequest,
    ) -> Result<StreamingResponse, TransportError> {
        let method = request.method;
        let path = request.path.clone();

        let response = self.build(request)?.send().await.map_err(classify)?;
        let status = response.status().as_u16();

        debug!(%method, path = %path, status, "proxy stream opened");
        Ok(StreamingResponse {
            status,
            body: Box::new(ChunkedBody {
                response,
                pending: Bytes::new(),
                chunk_size: self.chunk_size,
            }),
        })
    }

    fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }
}

/// Re-slices `reqwest`'s body chunks so none exceeds `chunk_size`.
struct ChunkedBody {
    response: reqwest::Response,
    pending: Bytes,
    chunk_size: usize,
}

#[async_trait]
impl ByteStream for ChunkedBody {
    async fn next_chunk(&mut self) -> Option<Result<Bytes, TransportError>> {
        while self.pending.is_empty() {
            match self.response.chunk().await {
                Ok(Some(chunk)) => self.pending = chunk,
                Ok(None) => return None,
                Err(error) => return Some(Err(classify(error))),
            }
        }
        let take = self.pending.len().min(self.chunk_size);
        Some(Ok(self.pending.split_to(take)))
    }
}

fn to_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
        HttpMethod::Head => reqwest::Method::HEAD,
    }
}

fn to_form(form: MultipartForm) -> Result<Form, TransportError> {
    let mut multipart = Form::new();
    for (name, value) in form.fields {
        multipart = multipart.text(name, value);
    }
    if let Some(file) = form.file {
        let part = Part::bytes(file.content.to_vec())
            .file_name(file.file_name)
            .mime_str(&file.content_type)
            .map_err(classify)?;
        multipart = multipart.part(file.field, part);
    }
    Ok(multipart)
}

fn classify(error: reqwest::Error) -> TransportError {
    let kind = if error.is_timeout() {
        TransportErrorKind::Timeout
    } else if error.is_connect() {
        TransportErrorKind::Connect
    } else if error.is_body() || error.is_decode() {
        TransportErrorKind::Body
    } else {
        TransportErrorKind::Request
    };
    TransportError::new(kind, error.to_string())
}
