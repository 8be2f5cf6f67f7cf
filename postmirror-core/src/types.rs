//! Domain types shared by the document source, the remote backends and the
//! reconciliation engine.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::front_matter::FrontMatter;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Identifier assigned by the remote store.
///
/// Opaque: it is only ever compared, cloned and handed back to the backend
/// that produced it. Nothing in this workspace parses it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The raw token, for handing back to the backend's wire format.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// The remote collection being reconciled.
///
/// At most one reconciliation may be in flight per scope; the engine does
/// not lock it, so callers must serialize runs against the same scope.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Scope {
    pub owner: String,
    pub repository: String,
}

impl Scope {
    pub fn new(owner: impl Into<String>, repository: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repository: repository.into(),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repository)
    }
}

/// A record as it exists in the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRecord {
    pub id: RecordId,
    pub title: String,
    pub body: String,
}

/// A local document, ready to be mirrored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Filename with the configured extension removed.
    pub title: String,
    /// Text uploaded as the record body.
    pub body: String,
    /// Parsed front matter, when the file carries a well-formed block.
    pub metadata: Option<FrontMatter>,
    /// Where the document was read from; diagnostics only.
    pub path: PathBuf,
}
