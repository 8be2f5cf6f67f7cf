//! Error types for postmirror-core.

use std::path::PathBuf;

use thiserror::Error;

/// Failures while enumerating or reading local documents.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The documents directory itself could not be enumerated.
    #[error("cannot list documents in {path}: {source}")]
    ListDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A single document could not be read; aborts the whole listing.
    #[error("cannot read document {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from loading `~/.postmirror/config.yaml`.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed YAML, with the file path and serde_yaml's line context.
    #[error("failed to parse settings at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A field parsed but holds a value the engine cannot run with.
    #[error("invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}

/// Credential problems; always fatal before any remote call is made.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no access token provided; pass --token or set {env_var}")]
    MissingToken { env_var: &'static str },
}

pub(crate) fn settings_io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SettingsError {
    SettingsError::Io {
        path: path.into(),
        source,
    }
}
