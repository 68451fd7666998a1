//! [`SftpClient`]: one remote SFTP session driven through the proxy.

use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};

use futures::future::BoxFuture;
use futures::FutureExt;
use proxy::{
    routes, ConnectRequest, ConnectionId, Envelope, FilePart, MultipartForm, OpenConnection,
    ProxyError, RemoteFileEntry, RequestBody, Timestamp, Transport, TransportRequest,
    TransportResponse,
};
use tracing::{debug, info, instrument, warn};

use crate::local;

/// Remote directory listed when the caller has no preference.
pub const DEFAULT_REMOTE_DIR: &str = ".";

/// Upper bound on the error body read back from a failed download.
const DOWNLOAD_ERROR_BODY_LIMIT: usize = 16 * 1024;

/// MIME type of uploaded file parts.
const UPLOAD_CONTENT_TYPE: &str = "application/octet-stream";

/// A client for the proxy's SFTP bridge.
///
/// Holds at most one open remote session. Lifecycle:
/// `Unconnected --connect--> Connected --disconnect--> Unconnected`; list,
/// download, and upload are valid only while connected and fail with
/// [`ProxyError::NotConnected`] otherwise, without touching the network.
///
/// Use [`SftpClient::scoped`] to guarantee the session is closed when a
/// block of work ends.
pub struct SftpClient<T: Transport> {
    transport: T,
    connection: Option<OpenConnection>,
}

impl<T: Transport> SftpClient<T> {
    /// Creates an unconnected client over `transport`.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            connection: None,
        }
    }

    /// The open session, if any.
    pub fn connection(&self) -> Option<&OpenConnection> {
        self.connection.as_ref()
    }

    /// Identifier of the open session, if any.
    pub fn connection_id(&self) -> Option<&ConnectionId> {
        self.connection.as_ref().map(|open| &open.id)
    }

    /// Whether a session is open.
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Opens an SFTP session to `request.host()` through the proxy.
    ///
    /// # Errors
    ///
    /// - [`ProxyError::AlreadyConnected`] if a session is already open.
    /// - [`ProxyError::InvalidArgument`] unless exactly one credential is set.
    /// - [`ProxyError::RemoteFailure`], [`ProxyError::HttpStatusFailure`],
    ///   [`ProxyError::MalformedResponse`], [`ProxyError::TransportFailure`]
    ///   when the proxy refuses or cannot be reached.
    ///
    /// On error no session is stored.
    #[instrument(
        skip_all,
        fields(host = %request.host(), username = %request.username(), port = request.port())
    )]
    pub async fn connect(&mut self, request: &ConnectRequest) -> Result<ConnectionId, ProxyError> {
        let result = self.try_connect(request).await;
        logged("connect", result)
    }

    async fn try_connect(&mut self, request: &ConnectRequest) -> Result<ConnectionId, ProxyError> {
        if let Some(open) = &self.connection {
            return Err(ProxyError::AlreadyConnected {
                connection_id: open.id.clone(),
            });
        }
        let payload = request.payload()?;

        let response = self
            .transport
            .send(TransportRequest::post(routes::SFTP_CONNECT).json(payload))
            .await?;
        let mut envelope = Envelope::from_response(&response)?;
        let id: ConnectionId = envelope.take("connectionId")?;

        info!(
            connection_id = %id,
            endpoint = self.transport.endpoint(),
            "connected through static IP proxy"
        );
        self.connection = Some(OpenConnection {
            id: id.clone(),
            host: request.host().to_string(),
            opened_at: Timestamp::now(),
        });
        Ok(id)
    }

    /// Lists the entries of remote directory `path`.
    ///
    /// An empty directory is `Ok(vec![])`; every failure is an `Err`.
    ///
    /// # Errors
    ///
    /// [`ProxyError::NotConnected`] without a session; otherwise the remote
    /// and transport variants of [`ProxyError`].
    #[instrument(skip(self))]
    pub async fn list(&self, path: &str) -> Result<Vec<RemoteFileEntry>, ProxyError> {
        let result = self.try_list(path).await;
        logged("list", result)
    }

    async fn try_list(&self, path: &str) -> Result<Vec<RemoteFileEntry>, ProxyError> {
        let id = self.require_connection()?;
        let request =
            TransportRequest::get(routes::sftp_list(id)).query(routes::PATH_PARAM, path);

        let response = self.transport.send(request).await?;
        let mut envelope = Envelope::from_response(&response)?;
        let files = envelope
            .take_optional::<Vec<RemoteFileEntry>>("files")?
            .unwrap_or_default();

        info!(count = files.len(), "listed remote directory");
        Ok(files)
    }

    /// Streams remote file `remote_path` to `local_path`.
    ///
    /// Without a `local_path`, the file is written to the current directory
    /// under the last segment of `remote_path`. Chunks are written as they
    /// arrive. If the stream breaks off, the partially written file is left
    /// in place: an `Err` means the local file may be incomplete.
    ///
    /// Returns the path written.
    ///
    /// # Errors
    ///
    /// [`ProxyError::NotConnected`], [`ProxyError::InvalidArgument`] (no
    /// derivable file name), [`ProxyError::LocalIo`], or the remote and
    /// transport variants.
    #[instrument(skip(self, local_path))]
    pub async fn download(
        &self,
        remote_path: &str,
        local_path: Option<&Path>,
    ) -> Result<PathBuf, ProxyError> {
        let result = self.try_download(remote_path, local_path).await;
        logged("download", result)
    }

    async fn try_download(
        &self,
        remote_path: &str,
        local_path: Option<&Path>,
    ) -> Result<PathBuf, ProxyError> {
        let id = self.require_connection()?;
        let destination = match local_path {
            Some(path) => path.to_path_buf(),
            None => local::local_name_for(remote_path)?,
        };

        let request = TransportRequest::get(routes::sftp_download(id))
            .query(routes::PATH_PARAM, remote_path);
        let response = self.transport.open_stream(request).await?;

        if !response.is_success() {
            let status = response.status;
            let body = response.collect_prefix(DOWNLOAD_ERROR_BODY_LIMIT).await?;
            let reply = TransportResponse::new(status, body);
            return Err(match Envelope::from_response(&reply) {
                Err(error) => error,
                Ok(_) => ProxyError::http_status(status, &reply.body),
            });
        }

        let bytes = local::write_stream(&destination, response.body).await?;
        info!(
            local_path = %destination.display(),
            bytes,
            "downloaded remote file"
        );
        Ok(destination)
    }

    /// Uploads local file `local_path` to remote path `remote_path`.
    ///
    /// Success is the `success` flag of the proxy's JSON reply.
    ///
    /// # Errors
    ///
    /// [`ProxyError::NotConnected`], [`ProxyError::NotFound`] (checked before
    /// any network call), [`ProxyError::LocalIo`], or the remote and
    /// transport variants.
    #[instrument(skip(self, local_path), fields(local_path = %local_path.display()))]
    pub async fn upload(&self, local_path: &Path, remote_path: &str) -> Result<(), ProxyError> {
        let result = self.try_upload(local_path, remote_path).await;
        logged("upload", result)
    }

    async fn try_upload(&self, local_path: &Path, remote_path: &str) -> Result<(), ProxyError> {
        let id = self.require_connection()?;
        let content = local::read_upload(local_path).await?;
        let size = content.len();

        let form = MultipartForm {
            fields: vec![(routes::PATH_PARAM.to_string(), remote_path.to_string())],
            file: Some(FilePart {
                field: routes::UPLOAD_FILE_FIELD.to_string(),
                file_name: local::upload_file_name(local_path),
                content_type: UPLOAD_CONTENT_TYPE.to_string(),
                content,
            }),
        };
        let request =
            TransportRequest::post(routes::sftp_upload(id)).body(RequestBody::Multipart(form));

        let response = self.transport.send(request).await?;
        Envelope::from_response(&response)?;

        info!(bytes = size, "uploaded local file");
        Ok(())
    }

    /// Closes the open session.
    ///
    /// Without a session this is a successful no-op, so calling it twice is
    /// safe. The stored session is cleared only when the proxy confirms; on
    /// failure it is kept so the caller can retry.
    ///
    /// # Errors
    ///
    /// The remote and transport variants of [`ProxyError`].
    #[instrument(skip(self), fields(connection_id))]
    pub async fn disconnect(&mut self) -> Result<(), ProxyError> {
        let result = self.try_disconnect().await;
        logged("disconnect", result)
    }

    async fn try_disconnect(&mut self) -> Result<(), ProxyError> {
        let Some(open) = &self.connection else {
            debug!("not connected; nothing to disconnect");
            return Ok(());
        };
        let id = open.id.clone();
        tracing::Span::current().record("connection_id", tracing::field::display(&id));

        let response = self
            .transport
            .send(TransportRequest::post(routes::sftp_disconnect(&id)))
            .await?;
        Envelope::from_response(&response)?;

        let session_ms = self.connection.take().map(|open| open.opened_at.elapsed_ms());
        info!(session_ms, "disconnected from SFTP server");
        Ok(())
    }

    /// Runs `body` and then disconnects, however `body` ends.
    ///
    /// The cleanup disconnect runs exactly once, after `body` returns `Ok`,
    /// returns `Err`, or panics, and closes whichever session is open at that
    /// moment. The body's result is returned (a panic is resumed); a failed
    /// cleanup is logged and leaves the session stored on the client.
    ///
    /// ```ignore
    /// let files = client
    ///     .scoped(|c| Box::pin(async move {
    ///         c.connect(&request).await?;
    ///         c.list("/").await
    ///     }))
    ///     .await?;
    /// ```
    ///
    /// # Errors
    ///
    /// Whatever `body` returns.
    pub async fn scoped<F, R>(&mut self, body: F) -> Result<R, ProxyError>
    where
        F: for<'c> FnOnce(&'c mut Self) -> BoxFuture<'c, Result<R, ProxyError>>,
    {
        let outcome = AssertUnwindSafe(body(&mut *self)).catch_unwind().await;

        if let Err(error) = self.disconnect().await {
            warn!(%error, "cleanup disconnect failed; remote session may still be open");
        }

        match outcome {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    fn require_connection(&self) -> Result<&ConnectionId, ProxyError> {
        self.connection_id().ok_or(ProxyError::NotConnected)
    }
}

impl<T: Transport> Drop for SftpClient<T> {
    fn drop(&mut self) {
        if let Some(open) = &self.connection {
            warn!(
                connection_id = %open.id,
                host = %open.host,
                "SFTP client dropped while connected; remote session was not closed"
            );
        }
    }
}

impl<T: Transport> std::fmt::Debug for SftpClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SftpClient")
            .field("endpoint", &self.transport.endpoint())
            .field("connection", &self.connection)
            .finish()
    }
}

fn logged<V>(operation: &'static str, result: Result<V, ProxyError>) -> Result<V, ProxyError> {
    if let Err(error) = &result {
        warn!(operation, %error, "SFTP operation failed");
    }
    result
}
