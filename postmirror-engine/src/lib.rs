//! # postmirror-engine
//!
//! Wipe-and-recreate reconciliation of a remote scope against local documents.
//!
//! [`Reconciler::run`] lists the scope's records, deletes all of them, lists
//! the local documents and creates one record per document. Each phase fans
//! out through a [`TaskAggregator`] bounded to a fixed number of in-flight
//! operations, and every delete completes before the first create starts.
//!
//! Nothing is retried and nothing is rolled back: records deleted before a
//! phase fails stay deleted. Runs against the same scope must not overlap;
//! the engine does not lock the scope.

pub mod aggregator;
pub mod error;
pub mod reconciler;

pub use aggregator::{FanIn, TaskAggregator};
pub use error::{AggregateError, TaskFailure};
pub use reconciler::{Outcome, Phase, ReconciliationJob, Reconciler, RunSummary};
