//! postmirror core library: domain types, local documents and settings.
//!
//! - [`types`]: newtypes and domain structs shared by every crate
//! - [`source`]: the [`DocumentSource`] contract and the directory-backed source
//! - [`front_matter`]: optional YAML / TOML metadata blocks
//! - [`settings`]: `~/.postmirror/config.yaml` load with defaults
//! - [`credential`]: explicit bearer token value
//! - [`error`]: [`SourceError`], [`SettingsError`], [`AuthError`]

pub mod credential;
pub mod error;
pub mod front_matter;
pub mod settings;
pub mod source;
pub mod types;

pub use credential::Credential;
pub use error::{AuthError, SettingsError, SourceError};
pub use front_matter::FrontMatter;
pub use settings::Settings;
pub use source::{title_from_filename, DocumentSource, MarkdownDirectory};
pub use types::{Document, RecordId, RemoteRecord, Scope};
