//! SFTP bridge client for the static-IP proxy.
//!
//! [`SftpClient`] owns one [`proxy::Transport`] and at most one open remote
//! session, identified by the [`proxy::ConnectionId`] the proxy issues on
//! connect. Every operation is a single HTTP call whose reply is interpreted
//! through the envelope contract in [`proxy::envelope`].
//!
//! ## Architectural Layer
//!
//! **Client.** Sequencing, session state, and local file handling live here.
//! HTTP details live behind the transport; the route table and the error
//! taxonomy come from [`proxy`].

mod client;
mod local;

pub use client::{SftpClient, DEFAULT_REMOTE_DIR};

#[cfg(test)]
mod tests;
