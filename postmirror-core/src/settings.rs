//! User settings at `~/.postmirror/config.yaml`.
//!
//! Every field is optional in the file; anything absent takes the default.
//! A missing file is the same as an empty one.
//!
//! # API pattern
//!
//! - `load_at(home)`: explicit home, used in tests with `TempDir`
//! - `load()`: derives home from `dirs::home_dir()`, delegates to `load_at`

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{settings_io_err, SettingsError};

pub const DEFAULT_ENDPOINT: &str = "https://api.github.com/graphql";

/// Runtime settings for a mirroring run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Repository whose issues mirror the documents.
    pub repository: String,
    /// Repository owner; `None` means the authenticated viewer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    pub documents_dir: PathBuf,
    /// Document filename extension, without the dot.
    pub extension: String,
    /// Upper bound on concurrent remote operations within one phase.
    pub max_in_flight: usize,
    pub request_timeout_secs: u64,
    pub endpoint: String,
    pub strip_front_matter: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            repository: "blog".to_owned(),
            owner: None,
            documents_dir: PathBuf::from("content/posts"),
            extension: "md".to_owned(),
            max_in_flight: 8,
            request_timeout_secs: 30,
            endpoint: DEFAULT_ENDPOINT.to_owned(),
            strip_front_matter: false,
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Reject values that would make a run meaningless or hang.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.max_in_flight == 0 {
            return Err(SettingsError::Invalid {
                field: "max_in_flight",
                reason: "must be at least 1".to_owned(),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(SettingsError::Invalid {
                field: "request_timeout_secs",
                reason: "must be at least 1".to_owned(),
            });
        }
        if self.extension.trim_start_matches('.').is_empty() {
            return Err(SettingsError::Invalid {
                field: "extension",
                reason: "must not be empty".to_owned(),
            });
        }
        if self.repository.trim().is_empty() {
            return Err(SettingsError::Invalid {
                field: "repository",
                reason: "must not be empty".to_owned(),
            });
        }
        Ok(())
    }
}

/// `<home>/.postmirror/config.yaml`. No I/O.
pub fn settings_path_at(home: &Path) -> PathBuf {
    home.join(".postmirror").join("config.yaml")
}

/// Load and validate settings from `<home>/.postmirror/config.yaml`.
pub fn load_at(home: &Path) -> Result<Settings, SettingsError> {
    let path = settings_path_at(home);
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no settings file, using defaults");
        return Ok(Settings::default());
    }

    let contents = std::fs::read_to_string(&path).map_err(|e| settings_io_err(&path, e))?;
    // An empty file deserializes as YAML null, not an empty mapping.
    if contents.trim().is_empty() {
        return Ok(Settings::default());
    }
    let settings: Settings =
        serde_yaml::from_str(&contents).map_err(|source| SettingsError::Parse {
            path: path.clone(),
            source,
        })?;
    settings.validate()?;
    Ok(settings)
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<Settings, SettingsError> {
    let home = dirs::home_dir().ok_or(SettingsError::HomeNotFound)?;
    load_at(&home)
}
