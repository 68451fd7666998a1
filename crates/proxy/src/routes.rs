//! Route table of the static-IP proxy service.
//!
//! Paths are relative to a [`crate::ProxyEndpoint`]. Routes that embed a
//! [`ConnectionId`] are functions; the identifier is percent-encoded as a
//! single path segment.

use crate::ConnectionId;

/// `GET`: server metadata (`version`, `features`, `usage`).
pub const SERVER_INFO: &str = "/";
/// `GET`: liveness (`status`, `uptime`, `features`).
pub const HEALTH: &str = "/health";
/// `GET`: the proxy's outbound address (`outbound_ip`).
pub const IP: &str = "/ip";
/// Any method: relays the request to the `url` query parameter.
pub const PROXY: &str = "/proxy";
/// `POST`: opens an SFTP session.
pub const SFTP_CONNECT: &str = "/sftp/connect";

/// Query parameter naming the relayed target on [`PROXY`].
pub const PROXY_URL_PARAM: &str = "url";
/// Query / form parameter naming a remote path on the SFTP routes.
pub const PATH_PARAM: &str = "path";
/// Multipart field carrying the file content on upload.
pub const UPLOAD_FILE_FIELD: &str = "file";

/// Path of a hosted relay function relative to its endpoint: the function
/// URL is the endpoint itself.
pub const FUNCTION_RELAY: &str = "";
/// JSON field naming the target URL in a function relay request.
pub const FUNCTION_TARGET_FIELD: &str = "targetUrl";
/// Envelope field carrying the target's reply in a function relay response.
pub const FUNCTION_DATA_FIELD: &str = "data";

/// `GET`: lists a remote directory.
pub fn sftp_list(id: &ConnectionId) -> String {
    format!("/sftp/list/{}", segment(id))
}

/// `GET`: streams a remote file.
pub fn sftp_download(id: &ConnectionId) -> String {
    format!("/sftp/download/{}", segment(id))
}

/// `POST`: uploads a multipart file.
pub fn sftp_upload(id: &ConnectionId) -> String {
    format!("/sftp/upload/{}", segment(id))
}

/// `POST`: closes the session.
pub fn sftp_disconnect(id: &ConnectionId) -> String {
    format!("/sftp/disconnect/{}", segment(id))
}

fn segment(id: &ConnectionId) -> std::borrow::Cow<'_, str> {
    urlencoding::encode(id.as_str())
}
