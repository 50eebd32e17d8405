//! Shared types for the CRDT substrate: update origins and stored updates.

use serde::{Deserialize, Serialize};

/// Marks whether a transaction was made locally or received from a remote peer.
///
/// Every transaction against a [`super::Document`] carries one of these.
/// `Local` transactions are the ones a provider mirrors out to its external
/// view (e.g. the markdown-file provider writes a file); transactions with a
/// non-null `Remote` identifier are the product of applying a sync update and
/// are mirrored out too, but are never re-applied to the document that
/// produced them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    /// Originated from a local action call.
    Local,
    /// Received from a remote peer, identified by an opaque, provider-chosen string.
    Remote(String),
}

impl Origin {
    /// `true` for `Origin::Local`.
    pub fn is_local(&self) -> bool {
        matches!(self, Origin::Local)
    }

    /// The remote identifier, if this is a remote origin.
    pub fn remote_id(&self) -> Option<&str> {
        match self {
            Origin::Local => None,
            Origin::Remote(id) => Some(id),
        }
    }

    /// Encode as the wire token stored alongside persisted updates: `"local"`
    /// or `"remote:<id>"`. This is also the string yrs sees as the
    /// transaction origin (see [`super::doc::Document::transact`]).
    pub fn as_token(&self) -> String {
        match self {
            Origin::Local => "local".to_string(),
            Origin::Remote(id) => format!("remote:{id}"),
        }
    }

    /// Decode a wire token produced by [`Origin::as_token`].
    pub fn from_token(token: &str) -> Self {
        match token.strip_prefix("remote:") {
            Some(id) => Origin::Remote(id.to_string()),
            None => Origin::Local,
        }
    }
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_token())
    }
}

/// A CRDT update record, stored for history and sync purposes.
#[derive(Debug, Clone)]
pub struct CrdtUpdate {
    /// Unique, monotonically increasing identifier for this update.
    pub update_id: i64,
    /// Name of the document this update belongs to (the workspace id).
    pub doc_name: String,
    /// Binary yrs update data (v1 encoding).
    pub data: Vec<u8>,
    /// Unix timestamp when this update was recorded (milliseconds).
    pub timestamp: i64,
    /// Origin of this update.
    pub origin: Origin,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_round_trips_through_token() {
        let origin = Origin::Local;
        assert_eq!(origin.as_token(), "local");
        assert_eq!(Origin::from_token(&origin.as_token()), origin);
        assert!(origin.is_local());
    }

    #[test]
    fn remote_round_trips_through_token() {
        let origin = Origin::Remote("device-42".to_string());
        assert_eq!(origin.as_token(), "remote:device-42");
        assert_eq!(Origin::from_token(&origin.as_token()), origin);
        assert!(!origin.is_local());
        assert_eq!(origin.remote_id(), Some("device-42"));
    }
}
