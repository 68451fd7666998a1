//! Newtype domain identifiers.
//!
//! Every value with an identity is a distinct newtype wrapping a primitive, so
//! a [`ConnectionId`] can never be passed where a [`ClientName`] is expected
//! even though both are strings under the hood.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// An optional `valid_if = predicate` adds a check on top of non-blankness.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident $(, valid_if = $check:path)?
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty,
            /// only whitespace, or otherwise invalid for this identifier.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.trim().is_empty() $(|| !$check(&v))? { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = String;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value.clone()).ok_or_else(|| {
                    format!("{value:?} is not a valid {}", stringify!($name))
                })
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Identifiers: server-issued / configured strings
// ---------------------------------------------------------------------------

string_id! {
    /// Opaque, server-issued identifier naming one open SFTP-style session on
    /// the proxy.
    ///
    /// Returned by `POST /sftp/connect` and required in the path of every
    /// subsequent list, download, upload, and disconnect call. It is sent as
    /// one percent-encoded path segment, so `.` and `..` are rejected.
    ConnectionId, valid_if = is_path_segment
}

fn is_path_segment(value: &str) -> bool {
    value != "." && value != ".."
}

string_id! {
    /// Name this client announces to the proxy in its `User-Agent` header
    /// (e.g. `"StaticIP-SFTP-Client/1.0"`).
    ClientName
}

impl ClientName {
    /// The client name sent when none is configured.
    pub const DEFAULT: &'static str = "StaticIP-SFTP-Client/1.0";
}

impl Default for ClientName {
    fn default() -> Self {
        Self(Self::DEFAULT.to_string())
    }
}

// ---------------------------------------------------------------------------
// Identifiers: UUID-backed (internally generated)
// ---------------------------------------------------------------------------

/// Identifies one command-line invocation.
///
/// Generated fresh for every run and attached to the root span so all
/// requests issued by a single invocation can be correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    /// Generates a new random run identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
