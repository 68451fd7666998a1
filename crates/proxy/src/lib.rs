//! Core domain for the static-IP proxy clients.
//!
//! This crate holds every concept shared by the SFTP bridge client and the
//! relay client: the response envelope contract, newtype identifiers, value
//! types, the error taxonomy, the proxy's route table, and the [`Transport`]
//! port through which clients reach the network.
//!
//! ## Architectural Layer
//!
//! **Domain + port definitions.** This crate has no I/O dependencies. It
//! defines *what* a client needs from the network; the `transport` crate
//! defines *how* (over `reqwest`).
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`ConnectionId`, `ClientName`, `RunId`) |
//! | [`types`] | Value types (`ProxyEndpoint`, `ConnectRequest`, `RemoteFileEntry`, reports) |
//! | [`envelope`] | `{success, message, ...}` decoding and status handling |
//! | [`errors`] | `ProxyError` taxonomy and `TransportError` |
//! | [`routes`] | Paths of the proxy's HTTP endpoints |
//! | [`transport`] | The `Transport` port trait and its request/response types |
//! | `testing` | `MockTransport` (feature `testing`) |

pub mod envelope;
pub mod errors;
pub mod identifiers;
pub mod routes;
pub mod transport;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use envelope::{decode_json, Envelope};
pub use errors::{ProxyError, TransportError, TransportErrorKind, MAX_BODY_EXCERPT};
pub use identifiers::{ClientName, ConnectionId, RunId};
pub use transport::{
    ByteStream, FilePart, MultipartForm, RequestBody, StreamingResponse, Transport,
    TransportRequest, TransportResponse, DOWNLOAD_CHUNK_SIZE,
};
pub use types::{
    ConnectRequest, FileKind, HealthReport, HttpMethod, IpReport, OpenConnection, ProxyEndpoint,
    RemoteFileEntry, ServerInfo, ServerUsage, Timestamp, DEFAULT_SFTP_PORT,
};
