//! Local file-system side of download and upload.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use proxy::{ByteStream, ProxyError};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// Derives a local file name from the last segment of a remote path.
pub(crate) fn local_name_for(remote_path: &str) -> Result<PathBuf, ProxyError> {
    let name = remote_path.rsplit('/').next().unwrap_or_default();
    if name.is_empty() || name == "." || name == ".." {
        return Err(ProxyError::invalid_argument(
            "local_path",
            format!("cannot derive a local file name from '{remote_path}'"),
        ));
    }
    Ok(PathBuf::from(name))
}

/// Writes every chunk of `body` to `path` as it arrives.
///
/// The file is created (or truncated) first. If the stream breaks off, what
/// was received so far stays on disk and the transport error is returned.
pub(crate) async fn write_stream(
    path: &Path,
    mut body: Box<dyn ByteStream>,
) -> Result<u64, ProxyError> {
    let mut file = File::create(path)
        .await
        .map_err(|e| ProxyError::local_io(path, &e))?;

    let mut written = 0u64;
    while let Some(chunk) = body.next_chunk().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(error) => {
                if let Err(flush) = file.flush().await {
                    warn!(path = %path.display(), error = %flush, "flushing partial download failed");
                }
                return Err(error.into());
            }
        };
        file.write_all(&chunk)
            .await
            .map_err(|e| ProxyError::local_io(path, &e))?;
        written += chunk.len() as u64;
    }

    file.flush()
        .await
        .map_err(|e| ProxyError::local_io(path, &e))?;
    Ok(written)
}

/// Reads a file that is about to be uploaded.
///
/// Missing paths and non-regular files are [`ProxyError::NotFound`].
pub(crate) async fn read_upload(path: &Path) -> Result<Bytes, ProxyError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => {
            return Err(ProxyError::NotFound {
                path: path.to_path_buf(),
            })
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ProxyError::NotFound {
                path: path.to_path_buf(),
            })
        }
        Err(e) => return Err(ProxyError::local_io(path, &e)),
    }

    tokio::fs::read(path)
        .await
        .map(Bytes::from)
        .map_err(|e| ProxyError::local_io(path, &e))
}

/// File name announced in the multipart part for `path`.
pub(crate) fn upload_file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string())
}
