//! The remote-store contract and backend selection.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use postmirror_core::{Credential, RecordId, Scope, Settings};

use crate::error::RemoteError;
use crate::github::GithubDirectory;

/// Capability set the reconciliation engine needs from a remote store.
///
/// Every call is a single attempt and blocks until the store answers. The
/// caller owns concurrency; implementations must tolerate being invoked
/// from many threads at once against the same scope.
pub trait RemoteDirectory: Send + Sync {
    /// Identifiers of the records currently in `scope`.
    ///
    /// Implemented as count-then-fetch, so the result may be shorter or
    /// longer than the collection if it changes between the two reads.
    fn list_record_ids(&self, scope: &Scope) -> Result<Vec<RecordId>, RemoteError>;

    /// Create one record and return the identifier the store assigned.
    fn create_record(&self, scope: &Scope, title: &str, body: &str)
        -> Result<RecordId, RemoteError>;

    /// Delete one record. Returns the store's remaining record count for
    /// that record's collection; diagnostics only.
    fn delete_record(&self, id: &RecordId) -> Result<u64, RemoteError>;

    /// Owner to use when none was configured (the authenticated account).
    fn default_owner(&self) -> Result<String, RemoteError>;
}

/// Which remote store to mirror into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Github,
}

impl Backend {
    /// Build the directory for this backend from explicit settings.
    pub fn open(self, settings: &Settings, credential: Credential) -> Arc<dyn RemoteDirectory> {
        match self {
            Backend::Github => Arc::new(GithubDirectory::new(
                settings.endpoint.clone(),
                credential,
                settings.request_timeout(),
            )),
        }
    }
}

impl FromStr for Backend {
    type Err = RemoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "github" => Ok(Backend::Github),
            other => Err(RemoteError::UnknownBackend(other.to_owned())),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Github => write!(f, "github"),
        }
    }
}
