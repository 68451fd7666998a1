//! Static-IP relay client.
//!
//! [`RelayClient`] wraps the proxy's plain-JSON endpoints: the outbound IP
//! lookup, health and metadata, and `/proxy`, which forwards an arbitrary
//! HTTP request to a target URL so that it leaves from the proxy's static
//! address.
//!
//! [`FunctionRelayClient`] drives a hosted relay function deployed in front of
//! the proxy: it posts `{targetUrl}` and unwraps the `data` field of the
//! `{success, data, message?}` envelope it answers with.
//!
//! ## Architectural Layer
//!
//! **Client.** Like the `sftp` crate, this crate depends only on the
//! [`proxy`] domain crate; HTTP details live behind [`proxy::Transport`].

use bytes::Bytes;
use proxy::{
    decode_json, routes, HealthReport, HttpMethod, IpReport, ProxyError, RequestBody,
    ServerInfo, Transport, TransportRequest,
};
use serde_json::Value;
use tracing::{debug, instrument, warn};

mod function;

pub use function::FunctionRelayClient;

/// Extra request options forwarded to the relayed target.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelayOptions {
    /// Headers added to the relayed request.
    pub headers: Vec<(String, String)>,
    /// Body of the relayed request.
    pub body: RequestBody,
}

impl RelayOptions {
    /// Options with no extra headers and no body.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sends `value` as a JSON body.
    #[must_use]
    pub fn json(mut self, value: Value) -> Self {
        self.body = RequestBody::Json(value);
        self
    }

    /// Sends `bytes` as a raw body.
    #[must_use]
    pub fn bytes(mut self, bytes: impl Into<Bytes>) -> Self {
        self.body = RequestBody::Bytes(bytes.into());
        self
    }
}

/// A client for the proxy's relay and metadata endpoints.
///
/// Stateless apart from the transport; every method is one HTTP call.
#[derive(Debug)]
pub struct RelayClient<T> {
    transport: T,
}

impl<T: Transport> RelayClient<T> {
    /// Creates a client over `transport`.
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Returns the proxy's outbound (static) IP address.
    ///
    /// # Errors
    ///
    /// [`ProxyError::HttpStatusFailure`], [`ProxyError::MalformedResponse`]
    /// (no `outbound_ip` field), or [`ProxyError::TransportFailure`].
    #[instrument(skip(self))]
    pub async fn static_ip(&self) -> Result<String, ProxyError> {
        let report: IpReport = self.fetch(routes::IP).await?;
        debug!(outbound_ip = %report.outbound_ip, "resolved static IP");
        Ok(report.outbound_ip)
    }

    /// Reads `GET /health`.
    ///
    /// # Errors
    ///
    /// As for [`RelayClient::static_ip`].
    #[instrument(skip(self))]
    pub async fn health(&self) -> Result<HealthReport, ProxyError> {
        self.fetch(routes::HEALTH).await
    }

    /// Reads the server metadata at `GET /`.
    ///
    /// # Errors
    ///
    /// As for [`RelayClient::static_ip`].
    #[instrument(skip(self))]
    pub async fn server_info(&self) -> Result<ServerInfo, ProxyError> {
        self.fetch(routes::SERVER_INFO).await
    }

    /// Sends `method url` through the proxy and returns the target's JSON reply.
    ///
    /// # Errors
    ///
    /// Any HTTP status outside 2xx, a non-JSON reply, or a transport failure.
    #[instrument(skip(self, options))]
    pub async fn proxy_request(
        &self,
        url: &str,
        method: HttpMethod,
        options: RelayOptions,
    ) -> Result<Value, ProxyError> {
        let mut request = TransportRequest::new(method, routes::PROXY)
            .query(routes::PROXY_URL_PARAM, url)
            .body(options.body);
        request.headers = options.headers;

        let result = match self.transport.send(request).await {
            Ok(response) => decode_json(&response),
            Err(error) => Err(error.into()),
        };
        if let Err(error) = &result {
            warn!(%error, "proxy request failed");
        }
        result
    }

    /// `GET url` through the proxy.
    ///
    /// # Errors
    ///
    /// As for [`RelayClient::proxy_request`].
    pub async fn get(&self, url: &str, options: RelayOptions) -> Result<Value, ProxyError> {
        self.proxy_request(url, HttpMethod::Get, options).await
    }

    /// `POST url` through the proxy.
    ///
    /// # Errors
    ///
    /// As for [`RelayClient::proxy_request`].
    pub async fn post(&self, url: &str, options: RelayOptions) -> Result<Value, ProxyError> {
        self.proxy_request(url, HttpMethod::Post, options).await
    }

    /// `PUT url` through the proxy.
    ///
    /// # Errors
    ///
    /// As for [`RelayClient::proxy_request`].
    pub async fn put(&self, url: &str, options: RelayOptions) -> Result<Value, ProxyError> {
        self.proxy_request(url, HttpMethod::Put, options).await
    }

    /// `DELETE url` through the proxy.
    ///
    /// # Errors
    ///
    /// As for [`RelayClient::proxy_request`].
    pub async fn delete(&self, url: &str, options: RelayOptions) -> Result<Value, ProxyError> {
        self.proxy_request(url, HttpMethod::Delete, options).await
    }

    async fn fetch<D: serde::de::DeserializeOwned>(&self, path: &str) -> Result<D, ProxyError> {
        let result = match self.transport.send(TransportRequest::get(path)).await {
            Ok(response) => decode_json(&response),
            Err(error) => Err(error.into()),
        };
        if let Err(error) = &result {
            warn!(path, %error, "proxy metadata request failed");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use proxy::testing::MockTransport;
    use proxy::TransportErrorKind;
    use serde_json::json;

    use super::*;

    fn client() -> (Arc<MockTransport>, RelayClient<Arc<MockTransport>>) {
        let mock = Arc::new(MockTransport::new());
        (Arc::clone(&mock), RelayClient::new(mock))
    }

    #[tokio::test]
    async fn static_ip_reads_outbound_ip() {
        let (mock, relay) = client();
        mock.push_json(200, json!({ "outbound_ip": "52.59.103.54" }));

        assert_eq!(relay.static_ip().await.unwrap(), "52.59.103.54");
        assert_eq!(mock.requests()[0].path, "/ip");
        assert_eq!(mock.requests()[0].method, HttpMethod::Get);
    }

    #[tokio::test]
    async fn static_ip_without_field_is_malformed() {
        let (mock, relay) = client();
        mock.push_json(200, json!({ "ip": "1.2.3.4" }));

        assert!(matches!(
            relay.static_ip().await,
            Err(ProxyError::MalformedResponse { .. })
        ));
    }

    #[tokio::test]
    async fn static_ip_reports_http_and_transport_failures() {
        let (mock, relay) = client();
        mock.push_raw(503, "Service Unavailable")
            .push_failure(TransportErrorKind::Timeout, "timed out");

        assert!(matches!(
            relay.static_ip().await,
            Err(ProxyError::HttpStatusFailure { status: 503, .. })
        ));
        assert!(matches!(
            relay.static_ip().await,
            Err(ProxyError::TransportFailure(_))
        ));
    }

    #[tokio::test]
    async fn proxy_request_passes_target_method_headers_and_body() {
        let (mock, relay) = client();
        mock.push_json(200, json!({ "id": 1, "title": "hello" }));

        let reply = relay
            .proxy_request(
                "https://jsonplaceholder.typicode.com/posts",
                HttpMethod::Post,
                RelayOptions::new()
                    .header("X-Api-Key", "k")
                    .json(json!({ "title": "hello" })),
            )
            .await
            .unwrap();

        assert_eq!(reply["id"], 1);
        let request = &mock.requests()[0];
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.path, "/proxy");
        assert_eq!(
            request.query_value("url"),
            Some("https://jsonplaceholder.typicode.com/posts")
        );
        assert_eq!(request.headers, vec![("X-Api-Key".into(), "k".into())]);
        assert_eq!(request.body, RequestBody::Json(json!({ "title": "hello" })));
    }

    #[tokio::test]
    async fn convenience_methods_fix_the_method() {
        let (mock, relay) = client();
        for _ in 0..4 {
            mock.push_json(200, json!({}));
        }

        relay.get("https://a", RelayOptions::new()).await.unwrap();
        relay.post("https://a", RelayOptions::new()).await.unwrap();
        relay.put("https://a", RelayOptions::new()).await.unwrap();
        relay.delete("https://a", RelayOptions::new()).await.unwrap();

        let methods: Vec<HttpMethod> = mock.requests().iter().map(|r| r.method).collect();
        assert_eq!(
            methods,
            [HttpMethod::Get, HttpMethod::Post, HttpMethod::Put, HttpMethod::Delete]
        );
    }

    #[tokio::test]
    async fn proxy_request_failure_is_an_error_not_a_value() {
        let (mock, relay) = client();
        mock.push_raw(200, "<html>not json</html>")
            .push_raw(404, "Not Found");

        assert!(matches!(
            relay.get("https://a", RelayOptions::new()).await,
            Err(ProxyError::MalformedResponse { .. })
        ));
        assert!(matches!(
            relay.get("https://a", RelayOptions::new()).await,
            Err(ProxyError::HttpStatusFailure { status: 404, .. })
        ));
    }

    #[tokio::test]
    async fn health_and_server_info_decode_metadata() {
        let (mock, relay) = client();
        mock.push_json(
            200,
            json!({ "status": "healthy", "uptime": 42.5, "features": ["http-proxy", "sftp"] }),
        )
        .push_json(
            200,
            json!({ "version": "2.0.0", "features": ["sftp"], "usage": { "static_ip": "52.59.103.54" } }),
        );

        let health = relay.health().await.unwrap();
        assert_eq!(health.status, "healthy");
        assert_eq!(health.features.len(), 2);

        let info = relay.server_info().await.unwrap();
        assert_eq!(info.version.as_deref(), Some("2.0.0"));
        assert_eq!(info.usage.static_ip.as_deref(), Some("52.59.103.54"));

        let paths: Vec<String> = mock.requests().into_iter().map(|r| r.path).collect();
        assert_eq!(paths, ["/health", "/"]);
    }
}
