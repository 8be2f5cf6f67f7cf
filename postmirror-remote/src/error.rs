//! Error types for postmirror-remote.

use thiserror::Error;

use postmirror_core::{RecordId, Scope};

/// A failed remote operation, tagged with what was being attempted.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("failed to resolve repository owner: {0}")]
    Owner(#[source] ApiError),

    #[error("failed to list records in {scope}: {source}")]
    List {
        scope: Scope,
        #[source]
        source: ApiError,
    },

    #[error("failed to create record '{title}': {source}")]
    Create {
        title: String,
        #[source]
        source: ApiError,
    },

    #[error("failed to delete record {id}: {source}")]
    Delete {
        id: RecordId,
        #[source]
        source: ApiError,
    },

    #[error("unsupported backend '{0}'; expected: github")]
    UnknownBackend(String),
}

/// What went wrong talking to the store.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("credential rejected (HTTP 401)")]
    Unauthorized,

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("cannot decode response: {0}")]
    Decode(#[source] std::io::Error),

    #[error("GraphQL error: {0}")]
    GraphQl(String),

    #[error("response is missing `{0}`")]
    MissingData(&'static str),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("rejected by store: {0}")]
    Rejected(String),
}

impl From<ureq::Error> for ApiError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(401, _) => ApiError::Unauthorized,
            ureq::Error::Status(status, response) => ApiError::Http {
                status,
                body: response.into_string().unwrap_or_default(),
            },
            ureq::Error::Transport(transport) => ApiError::Transport(transport.to_string()),
        }
    }
}
