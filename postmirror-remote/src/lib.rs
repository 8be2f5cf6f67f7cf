//! # postmirror-remote
//!
//! The remote record store as seen by the reconciliation engine.
//!
//! [`RemoteDirectory`] is the whole capability set the engine needs. A
//! [`Backend`] value picks an implementation; [`GithubDirectory`] talks to the
//! GitHub GraphQL API and [`MemoryDirectory`] keeps records in-process.

pub mod directory;
pub mod error;
pub mod github;
pub mod memory;

pub use directory::{Backend, RemoteDirectory};
pub use error::{ApiError, RemoteError};
pub use github::GithubDirectory;
pub use memory::{MemoryDirectory, StoreEvent};
