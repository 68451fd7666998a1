//! Scripted in-memory [`Transport`] for tests.
//!
//! Enabled with the `testing` feature. Replies are queued up front and handed
//! out in order, one per request; every request is recorded so tests can
//! assert on what was sent and how many calls were made.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;

use crate::{
    ByteStream, StreamingResponse, Transport, TransportError, TransportErrorKind,
    TransportRequest, TransportResponse,
};

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// A complete response.
    Response(TransportResponse),
    /// A streamed response; an `Err` item interrupts the body at that point.
    Stream {
        status: u16,
        chunks: Vec<Result<Bytes, TransportError>>,
    },
    /// The request never got a response.
    Fail(TransportError),
}

/// A [`Transport`] that replays scripted replies and records requests.
#[derive(Debug, Default)]
pub struct MockTransport {
    replies: Mutex<VecDeque<MockReply>>,
    requests: Mutex<Vec<TransportRequest>>,
}

impl MockTransport {
    /// Creates a transport with no scripted replies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an arbitrary reply.
    pub fn push(&self, reply: MockReply) -> &Self {
        self.replies
            .lock()
            .expect("mock reply queue poisoned")
            .push_back(reply);
        self
    }

    /// Queues a JSON reply with the given status.
    pub fn push_json(&self, status: u16, body: serde_json::Value) -> &Self {
        self.push(MockReply::Response(TransportResponse::new(
            status,
            body.to_string(),
        )))
    }

    /// Queues a raw-bodied reply with the given status.
    pub fn push_raw(&self, status: u16, body: impl Into<Bytes>) -> &Self {
        self.push(MockReply::Response(TransportResponse::new(status, body)))
    }

    /// Queues a streamed reply.
    pub fn push_stream(&self, status: u16, chunks: Vec<Result<Bytes, TransportError>>) -> &Self {
        self.push(MockReply::Stream { status, chunks })
    }

    /// Queues a network-level failure.
    pub fn push_failure(&self, kind: TransportErrorKind, message: &str) -> &Self {
        self.push(MockReply::Fail(TransportError::new(kind, message)))
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests
            .lock()
            .expect("mock request log poisoned")
            .clone()
    }

    /// Number of requests received so far.
    pub fn call_count(&self) -> usize {
        self.requests.lock().expect("mock request log poisoned").len()
    }

    /// Number of scripted replies not yet consumed.
    pub fn pending_replies(&self) -> usize {
        self.replies.lock().expect("mock reply queue poisoned").len()
    }

    fn next(&self, request: TransportRequest) -> MockReply {
        self.requests
            .lock()
            .expect("mock request log poisoned")
            .push(request.clone());
        self.replies
            .lock()
            .expect("mock reply queue poisoned")
            .pop_front()
            .unwrap_or_else(|| {
                panic!(
                    "no scripted reply for {} {}",
                    request.method, request.path
                )
            })
    }
}

struct ScriptedStream {
    chunks: VecDeque<Result<Bytes, TransportError>>,
}

#[async_trait]
impl ByteStream for ScriptedStream {
    async fn next_chunk(&mut self) -> Option<Result<Bytes, TransportError>> {
        self.chunks.pop_front()
    }
}

fn into_stream(status: u16, chunks: Vec<Result<Bytes, TransportError>>) -> StreamingResponse {
    StreamingResponse {
        status,
        body: Box::new(ScriptedStream {
            chunks: chunks.into(),
        }),
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        match self.next(request) {
            MockReply::Response(response) => Ok(response),
            MockReply::Fail(error) => Err(error),
            MockReply::Stream { status, chunks } => {
                let body = into_stream(status, chunks)
                    .collect_prefix(usize::MAX)
                    .await?;
                Ok(TransportResponse::new(status, body))
            }
        }
    }

    async fn open_stream(
        &self,
        request: TransportRequest,
    ) -> Result<StreamingResponse, TransportError> {
        match self.next(request) {
            MockReply::Stream { status, chunks } => Ok(into_stream(status, chunks)),
            MockReply::Response(response) => {
                Ok(into_stream(response.status, vec![Ok(response.body)]))
            }
            MockReply::Fail(error) => Err(error),
        }
    }

    fn endpoint(&self) -> &str {
        "mock://proxy"
    }
}
