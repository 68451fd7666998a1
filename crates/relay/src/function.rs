//! Client for a hosted relay function.

use proxy::{routes, Envelope, ProxyError, Transport, TransportRequest};
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

/// A client for a serverless relay function in front of the proxy.
///
/// The transport's endpoint is the full function URL. Each call is one
/// `POST {"targetUrl": url}` answered by a `{success, data, message?}`
/// envelope.
#[derive(Debug)]
pub struct FunctionRelayClient<T> {
    transport: T,
}

impl<T: Transport> FunctionRelayClient<T> {
    /// Creates a client over `transport`.
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Asks the function to `GET target_url` and returns the target's reply
    /// (the envelope's `data` field).
    ///
    /// # Errors
    ///
    /// - [`ProxyError::RemoteFailure`] when the envelope reports failure.
    /// - [`ProxyError::HttpStatusFailure`] for a non-2xx reply without one.
    /// - [`ProxyError::MalformedResponse`] when `data` is missing.
    /// - [`ProxyError::TransportFailure`] when the function is unreachable.
    #[instrument(skip(self))]
    pub async fn relay(&self, target_url: &str) -> Result<Value, ProxyError> {
        let result = self.try_relay(target_url).await;
        if let Err(error) = &result {
            warn!(%error, "function relay failed");
        }
        result
    }

    async fn try_relay(&self, target_url: &str) -> Result<Value, ProxyError> {
        let request = TransportRequest::post(routes::FUNCTION_RELAY)
            .json(json!({ routes::FUNCTION_TARGET_FIELD: target_url }));

        let response = self.transport.send(request).await?;
        let mut envelope = Envelope::from_response(&response)?;
        let data: Value = envelope.take(routes::FUNCTION_DATA_FIELD)?;

        debug!(status = response.status, "function relay answered");
        Ok(data)
    }
}
