//! The response envelope contract and response decoding.
//!
//! Every SFTP bridge endpoint answers with a JSON object shaped like
//! `{ "success": bool, "message": string?, ...payload }`. [`Envelope`] holds
//! the flag, the optional message, and every other top-level field as the
//! payload; it is built from one response and consumed immediately.
//!
//! Status handling:
//!
//! | Status | Body | Result |
//! |--------|------|--------|
//! | 2xx | envelope, `success: true` | `Ok(envelope)` |
//! | 2xx | envelope, `success` false or absent | [`ProxyError::RemoteFailure`] |
//! | non-2xx | explicit `success: false` | [`ProxyError::RemoteFailure`] |
//! | non-2xx | anything else | [`ProxyError::HttpStatusFailure`] |
//! | 2xx | not an envelope | [`ProxyError::MalformedResponse`] |
//!
//! Endpoints that return plain JSON (`/ip`, `/health`, `/`, `/proxy`) go
//! through [`decode_json`] instead.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{ProxyError, TransportResponse};

/// A decoded `{success, message, ...payload}` reply.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Envelope {
    /// The `success` flag as sent. On a 2xx reply, absent means false.
    #[serde(default)]
    success: Option<bool>,
    /// Human-readable explanation, normally present on failure.
    #[serde(default)]
    message: Option<String>,
    /// Every other top-level field.
    #[serde(flatten)]
    payload: Map<String, Value>,
}

impl Envelope {
    /// Parses an envelope from a JSON body.
    ///
    /// # Errors
    ///
    /// [`ProxyError::MalformedResponse`] if the body is not a JSON object.
    pub fn parse(body: &[u8]) -> Result<Self, ProxyError> {
        serde_json::from_slice(body)
            .map_err(|e| ProxyError::malformed(format!("response is not an envelope: {e}")))
    }

    /// Decodes `response` and applies the success flag (see the module table).
    ///
    /// # Errors
    ///
    /// [`ProxyError::RemoteFailure`], [`ProxyError::HttpStatusFailure`], or
    /// [`ProxyError::MalformedResponse`].
    pub fn from_response(response: &TransportResponse) -> Result<Self, ProxyError> {
        let parsed = Self::parse(&response.body);
        if !response.is_success() {
            return match parsed {
                Ok(envelope) if envelope.success == Some(false) => {
                    Err(envelope.into_failure(response.status))
                }
                _ => Err(ProxyError::http_status(response.status, &response.body)),
            };
        }

        let envelope = parsed?;
        if envelope.is_success() {
            Ok(envelope)
        } else {
            Err(envelope.into_failure(response.status))
        }
    }

    /// Whether the proxy reported success.
    pub fn is_success(&self) -> bool {
        self.success == Some(true)
    }

    /// Removes and decodes a required payload field.
    ///
    /// # Errors
    ///
    /// [`ProxyError::MalformedResponse`] if the field is missing or has the
    /// wrong shape.
    pub fn take<T: DeserializeOwned>(&mut self, key: &str) -> Result<T, ProxyError> {
        self.take_optional(key)?
            .ok_or_else(|| ProxyError::malformed(format!("missing field '{key}'")))
    }

    /// Removes and decodes an optional payload field (`null` counts as absent).
    ///
    /// # Errors
    ///
    /// [`ProxyError::MalformedResponse`] if the field is present but has the
    /// wrong shape.
    pub fn take_optional<T: DeserializeOwned>(
        &mut self,
        key: &str,
    ) -> Result<Option<T>, ProxyError> {
        match self.payload.remove(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| ProxyError::malformed(format!("field '{key}': {e}"))),
        }
    }

    fn into_failure(self, status: u16) -> ProxyError {
        ProxyError::RemoteFailure {
            status,
            message: self.message,
        }
    }
}

/// Decodes a plain (non-envelope) JSON reply.
///
/// # Errors
///
/// [`ProxyError::HttpStatusFailure`] for non-2xx statuses,
/// [`ProxyError::MalformedResponse`] if the body does not decode as `T`.
pub fn decode_json<T: DeserializeOwned>(response: &TransportResponse) -> Result<T, ProxyError> {
    if !response.is_success() {
        return Err(ProxyError::http_status(response.status, &response.body));
    }
    serde_json::from_slice(&response.body)
        .map_err(|e| ProxyError::malformed(format!("unexpected response body: {e}")))
}
