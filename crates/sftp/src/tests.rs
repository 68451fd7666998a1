//! Tests for the SFTP bridge client: credential and connection preconditions,
//! envelope-driven outcomes, streamed downloads, multipart uploads, and
//! scoped cleanup.

use std::sync::Arc;

use bytes::Bytes;
use futures::FutureExt;
use proxy::testing::MockTransport;
use proxy::{
    ConnectRequest, FileKind, HttpMethod, ProxyError, RequestBody, TransportError,
    TransportErrorKind,
};
use secrecy::SecretString;
use serde_json::json;

use crate::SftpClient;

// =============================================================================
// Test Helpers
// =============================================================================

type MockClient = SftpClient<Arc<MockTransport>>;

fn password_request() -> ConnectRequest {
    ConnectRequest::new("sftp.example.com", "alice").with_password(SecretString::from("hunter2"))
}

fn unconnected() -> (Arc<MockTransport>, MockClient) {
    let mock = Arc::new(MockTransport::new());
    let client = SftpClient::new(Arc::clone(&mock));
    (mock, client)
}

async fn connected(id: &str) -> (Arc<MockTransport>, MockClient) {
    let (mock, mut client) = unconnected();
    mock.push_json(200, json!({ "success": true, "connectionId": id }));
    client.connect(&password_request()).await.unwrap();
    (mock, client)
}

fn explode() -> Result<(), ProxyError> {
    panic!("script failure inside scoped block")
}

// =============================================================================
// connect
// =============================================================================

#[tokio::test]
async fn connect_without_credential_fails_before_any_network_call() {
    let (mock, mut client) = unconnected();

    let error = client
        .connect(&ConnectRequest::new("h", "u"))
        .await
        .unwrap_err();

    assert!(matches!(error, ProxyError::InvalidArgument { .. }));
    assert!(!client.is_connected());
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn connect_stores_the_identifier_from_a_successful_envelope() {
    let (mock, mut client) = unconnected();
    mock.push_json(200, json!({ "success": true, "connectionId": "abc123" }));

    let id = client.connect(&password_request()).await.unwrap();

    assert_eq!(id.as_str(), "abc123");
    assert_eq!(client.connection_id().map(|id| id.as_str()), Some("abc123"));
    assert_eq!(client.connection().unwrap().host, "sftp.example.com");

    let requests = mock.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, HttpMethod::Post);
    assert_eq!(requests[0].path, "/sftp/connect");
    assert_eq!(
        requests[0].body,
        RequestBody::Json(json!({
            "host": "sftp.example.com",
            "username": "alice",
            "port": 22,
            "password": "hunter2",
        }))
    );
}

#[tokio::test]
async fn connect_sends_private_key_under_its_own_field() {
    let (mock, mut client) = unconnected();
    mock.push_json(200, json!({ "success": true, "connectionId": "k1" }));

    let request = ConnectRequest::new("h", "u")
        .with_port(2022)
        .with_private_key(SecretString::from("KEY"));
    client.connect(&request).await.unwrap();

    match &mock.requests()[0].body {
        RequestBody::Json(body) => {
            assert_eq!(body["privateKey"], "KEY");
            assert_eq!(body["port"], 2022);
            assert!(body.get("password").is_none());
        }
        other => panic!("unexpected body: {other:?}"),
    }
}

#[tokio::test]
async fn connect_failure_envelope_leaves_the_client_unconnected() {
    let (mock, mut client) = unconnected();
    mock.push_json(200, json!({ "success": false, "message": "bad credentials" }));

    let error = client.connect(&password_request()).await.unwrap_err();

    assert!(matches!(
        error,
        ProxyError::RemoteFailure { message: Some(ref m), .. } if m == "bad credentials"
    ));
    assert!(client.connection_id().is_none());
}

#[tokio::test]
async fn connect_http_and_transport_failures_are_reported_without_retry() {
    let (mock, mut client) = unconnected();
    mock.push_raw(502, "Bad Gateway")
        .push_failure(TransportErrorKind::Connect, "connection refused");

    let first = client.connect(&password_request()).await.unwrap_err();
    assert!(matches!(first, ProxyError::HttpStatusFailure { status: 502, .. }));

    let second = client.connect(&password_request()).await.unwrap_err();
    assert!(matches!(second, ProxyError::TransportFailure(_)));

    assert!(!client.is_connected());
    assert_eq!(mock.call_count(), 2);
}

#[tokio::test]
async fn connect_success_without_identifier_is_malformed() {
    let (mock, mut client) = unconnected();
    mock.push_json(200, json!({ "success": true }));

    let error = client.connect(&password_request()).await.unwrap_err();

    assert!(matches!(error, ProxyError::MalformedResponse { .. }));
    assert!(!client.is_connected());
}

#[tokio::test]
async fn connect_while_connected_is_rejected_and_keeps_the_session() {
    let (mock, mut client) = connected("first").await;

    let error = client.connect(&password_request()).await.unwrap_err();

    assert!(matches!(
        error,
        ProxyError::AlreadyConnected { ref connection_id } if connection_id.as_str() == "first"
    ));
    assert_eq!(client.connection_id().unwrap().as_str(), "first");
    assert_eq!(mock.call_count(), 1);
}

// =============================================================================
// state gating
// =============================================================================

#[tokio::test]
async fn operations_without_a_connection_never_touch_the_network() {
    let (mock, client) = unconnected();
    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().join("payload.bin");
    std::fs::write(&local, b"data").unwrap();

    assert!(matches!(
        client.list("/").await,
        Err(ProxyError::NotConnected)
    ));
    assert!(matches!(
        client.download("/remote/a.txt", Some(&dir.path().join("a.txt"))).await,
        Err(ProxyError::NotConnected)
    ));
    assert!(matches!(
        client.upload(&local, "/remote/").await,
        Err(ProxyError::NotConnected)
    ));

    assert_eq!(mock.call_count(), 0);
}

// =============================================================================
// list
// =============================================================================

#[tokio::test]
async fn list_targets_the_connection_and_passes_the_path() {
    let (mock, client) = connected("X").await;
    mock.push_json(
        200,
        json!({
            "success": true,
            "files": [
                { "name": "a.txt", "type": "file" },
                { "name": "inbox", "type": "directory" },
            ],
        }),
    );

    let files = client.list("/data").await.unwrap();

    assert_eq!(files.len(), 2);
    assert_eq!(files[0].name, "a.txt");
    assert_eq!(files[1].kind, FileKind::Directory);

    let request = &mock.requests()[1];
    assert_eq!(request.method, HttpMethod::Get);
    assert_eq!(request.path, "/sftp/list/X");
    assert_eq!(request.query_value("path"), Some("/data"));
}

#[tokio::test]
async fn list_distinguishes_empty_from_failed() {
    let (mock, client) = connected("X").await;
    mock.push_json(200, json!({ "success": true, "files": [] }))
        .push_json(200, json!({ "success": false }));

    let empty = client.list(".").await;
    assert!(matches!(empty, Ok(ref files) if files.is_empty()));

    let failed = client.list(".").await;
    assert!(matches!(failed, Err(ProxyError::RemoteFailure { .. })));
}

#[tokio::test]
async fn list_success_without_files_field_is_empty() {
    let (mock, client) = connected("X").await;
    mock.push_json(200, json!({ "success": true }));

    assert!(client.list(".").await.unwrap().is_empty());
}

// =============================================================================
// download
// =============================================================================

#[tokio::test]
async fn download_writes_every_chunk_to_the_destination() {
    let (mock, client) = connected("X").await;
    mock.push_stream(
        200,
        vec![Ok(Bytes::from("hello, ")), Ok(Bytes::from("world"))],
    );
    let dir = tempfile::tempdir().unwrap();
    let destination = dir.path().join("out.txt");

    let written = client
        .download("/remote/file.txt", Some(&destination))
        .await
        .unwrap();

    assert_eq!(written, destination);
    assert_eq!(std::fs::read_to_string(&destination).unwrap(), "hello, world");

    let request = &mock.requests()[1];
    assert_eq!(request.path, "/sftp/download/X");
    assert_eq!(request.query_value("path"), Some("/remote/file.txt"));
}

#[tokio::test]
async fn download_interrupted_mid_stream_leaves_the_partial_file() {
    let (mock, client) = connected("X").await;
    mock.push_stream(
        200,
        vec![
            Ok(Bytes::from("partial")),
            Err(TransportError::new(TransportErrorKind::Body, "connection reset")),
            Ok(Bytes::from("never written")),
        ],
    );
    let dir = tempfile::tempdir().unwrap();
    let destination = dir.path().join("out.txt");

    let error = client
        .download("/remote/file.txt", Some(&destination))
        .await
        .unwrap_err();

    assert!(matches!(error, ProxyError::TransportFailure(_)));
    assert_eq!(std::fs::read_to_string(&destination).unwrap(), "partial");
}

#[tokio::test]
async fn download_error_status_does_not_create_the_local_file() {
    let (mock, client) = connected("X").await;
    mock.push_json(404, json!({ "success": false, "message": "No such file" }));
    let dir = tempfile::tempdir().unwrap();
    let destination = dir.path().join("out.txt");

    let error = client
        .download("/remote/missing.txt", Some(&destination))
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        ProxyError::RemoteFailure { status: 404, message: Some(ref m) } if m == "No such file"
    ));
    assert!(!destination.exists());
}

#[tokio::test]
async fn download_without_derivable_name_fails_before_any_network_call() {
    let (mock, client) = connected("X").await;

    let error = client.download("/remote/dir/", None).await.unwrap_err();

    assert!(matches!(error, ProxyError::InvalidArgument { .. }));
    assert_eq!(mock.call_count(), 1);
}

// =============================================================================
// upload
// =============================================================================

#[tokio::test]
async fn upload_sends_file_and_destination_as_multipart() {
    let (mock, client) = connected("X").await;
    mock.push_json(200, json!({ "success": true, "message": "File uploaded" }));
    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().join("local_file.txt");
    std::fs::write(&local, b"payload").unwrap();

    client.upload(&local, "/remote/").await.unwrap();

    let request = &mock.requests()[1];
    assert_eq!(request.method, HttpMethod::Post);
    assert_eq!(request.path, "/sftp/upload/X");
    match &request.body {
        RequestBody::Multipart(form) => {
            assert_eq!(form.fields, vec![("path".to_string(), "/remote/".to_string())]);
            let file = form.file.as_ref().unwrap();
            assert_eq!(file.field, "file");
            assert_eq!(file.file_name, "local_file.txt");
            assert_eq!(file.content_type, "application/octet-stream");
            assert_eq!(file.content, Bytes::from("payload"));
        }
        other => panic!("unexpected body: {other:?}"),
    }
}

#[tokio::test]
async fn upload_of_missing_file_fails_before_any_network_call() {
    let (mock, client) = connected("X").await;
    let dir = tempfile::tempdir().unwrap();

    let error = client
        .upload(&dir.path().join("nope.txt"), "/remote/")
        .await
        .unwrap_err();

    assert!(matches!(error, ProxyError::NotFound { .. }));
    assert_eq!(mock.call_count(), 1);
}

#[tokio::test]
async fn upload_is_judged_by_the_envelope_flag() {
    let (mock, client) = connected("X").await;
    mock.push_json(200, json!({ "success": false, "message": "Permission denied" }));
    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().join("f.txt");
    std::fs::write(&local, b"x").unwrap();

    let error = client.upload(&local, "/readonly/").await.unwrap_err();

    assert!(matches!(error, ProxyError::RemoteFailure { .. }));
}

// =============================================================================
// disconnect
// =============================================================================

#[tokio::test]
async fn disconnect_without_connection_is_an_idempotent_no_op() {
    let (mock, mut client) = unconnected();

    client.disconnect().await.unwrap();
    client.disconnect().await.unwrap();

    assert!(!client.is_connected());
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn disconnect_twice_after_connect_calls_the_proxy_once() {
    let (mock, mut client) = connected("X").await;
    mock.push_json(200, json!({ "success": true }));

    client.disconnect().await.unwrap();
    client.disconnect().await.unwrap();

    assert!(client.connection_id().is_none());
    assert_eq!(mock.call_count(), 2);
    assert_eq!(mock.requests()[1].path, "/sftp/disconnect/X");
}

#[tokio::test]
async fn failed_disconnect_keeps_the_session() {
    let (mock, mut client) = connected("X").await;
    mock.push_json(200, json!({ "success": false, "message": "busy" }));

    assert!(client.disconnect().await.is_err());
    assert_eq!(client.connection_id().unwrap().as_str(), "X");
}

// =============================================================================
// scoped
// =============================================================================

#[tokio::test]
async fn scoped_returns_the_body_result_and_disconnects() {
    let (mock, mut client) = unconnected();
    mock.push_json(200, json!({ "success": true, "connectionId": "S" }))
        .push_json(200, json!({ "success": true, "files": [{ "name": "a", "type": "file" }] }))
        .push_json(200, json!({ "success": true }));

    let request = password_request();
    let files = client
        .scoped(|c| {
            Box::pin(async move {
                c.connect(&request).await?;
                c.list("/").await
            })
        })
        .await
        .unwrap();

    assert_eq!(files.len(), 1);
    assert!(!client.is_connected());
    assert_eq!(mock.requests()[2].path, "/sftp/disconnect/S");
}

#[tokio::test]
async fn scoped_results_need_not_be_send() {
    let (mock, mut client) = connected("R").await;
    mock.push_json(200, json!({ "success": true }));

    let shared = client
        .scoped(|c| {
            Box::pin(async move {
                let id = c.connection_id().map(|id| id.to_string());
                Ok::<_, ProxyError>(std::rc::Rc::new(id))
            })
        })
        .await
        .unwrap();

    assert_eq!(shared.as_deref(), Some("R"));
    assert!(!client.is_connected());
}

#[tokio::test]
async fn scoped_disconnects_exactly_once_when_the_body_fails() {
    let (mock, mut client) = connected("X").await;
    mock.push_json(200, json!({ "success": false, "message": "No such directory" }))
        .push_json(200, json!({ "success": true }));

    let error = client
        .scoped(|c| {
            Box::pin(async move {
                let files = c.list("/missing").await?;
                Ok(files.len())
            })
        })
        .await
        .unwrap_err();

    assert!(matches!(error, ProxyError::RemoteFailure { .. }));
    let disconnects: Vec<_> = mock
        .requests()
        .into_iter()
        .filter(|r| r.path.starts_with("/sftp/disconnect/"))
        .collect();
    assert_eq!(disconnects.len(), 1);
    assert_eq!(disconnects[0].path, "/sftp/disconnect/X");
    assert!(!client.is_connected());
}

#[tokio::test]
async fn scoped_disconnects_when_the_body_panics() {
    let (mock, mut client) = connected("X").await;
    mock.push_json(200, json!({ "success": true }));

    let outcome = std::panic::AssertUnwindSafe(
        client.scoped(|_client| Box::pin(async move { explode() })),
    )
    .catch_unwind()
    .await;

    assert!(outcome.is_err());
    assert_eq!(mock.call_count(), 2);
    assert_eq!(mock.requests()[1].path, "/sftp/disconnect/X");
    assert!(!client.is_connected());
}
