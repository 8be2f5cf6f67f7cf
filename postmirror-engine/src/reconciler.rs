//! The reconciliation state machine.
//!
//! ```text
//! Idle → ListingRecords → Deleting → ListingDocuments → Creating → Completed
//!              │              │              │              │
//!              └──────────────┴──────┬───────┴──────────────┘
//!                                    ▼
//!                          Outcome::Failed(phase)
//! ```
//!
//! `Outcome::Failed` is the absorbing state; its [`AggregateError`] names the
//! phase the run stopped in.
//!
//! The delete set is fixed when `ListingRecords` ends and the create set when
//! `ListingDocuments` ends. `Deleting` is a barrier: all deletes report before
//! documents are even listed, and any delete failure ends the run.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

use postmirror_core::{Document, DocumentSource, RecordId, Scope};
use postmirror_remote::RemoteDirectory;

use crate::aggregator::TaskAggregator;
use crate::error::{AggregateError, TaskFailure};

/// Where a run is. A failed run reports the phase it stopped in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    ListingRecords,
    Deleting,
    ListingDocuments,
    Creating,
    Completed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::ListingRecords => "listing records",
            Phase::Deleting => "deleting",
            Phase::ListingDocuments => "listing documents",
            Phase::Creating => "creating",
            Phase::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// Snapshot a run works from. Lives only as long as the run.
#[derive(Debug, Clone)]
pub struct ReconciliationJob {
    pub scope: Scope,
    /// Records to delete, as listed at the start of the run.
    pub stale: Vec<RecordId>,
    /// Documents to create records for, as listed after the delete phase.
    pub documents: Vec<Document>,
}

/// What a completed run did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub scope: String,
    pub deleted: usize,
    pub created: Vec<RecordId>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u128,
}

/// Terminal result of [`Reconciler::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed(RunSummary),
    Failed(AggregateError),
}

impl Outcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed(_))
    }

    pub fn into_result(self) -> Result<RunSummary, AggregateError> {
        match self {
            Outcome::Completed(summary) => Ok(summary),
            Outcome::Failed(err) => Err(err),
        }
    }
}

/// Mirrors a [`DocumentSource`] into a [`RemoteDirectory`] scope.
pub struct Reconciler {
    remote: Arc<dyn RemoteDirectory>,
    source: Arc<dyn DocumentSource>,
    aggregator: TaskAggregator,
}

impl Reconciler {
    pub fn new(
        remote: Arc<dyn RemoteDirectory>,
        source: Arc<dyn DocumentSource>,
        aggregator: TaskAggregator,
    ) -> Self {
        Self {
            remote,
            source,
            aggregator,
        }
    }

    /// Delete every record in `scope`, then create one per local document.
    ///
    /// Never retries and never rolls back. The caller must make sure no other
    /// run targets the same scope concurrently.
    pub async fn run(&self, scope: &Scope) -> Outcome {
        let started_at = Utc::now();
        let clock = Instant::now();
        tracing::info!(scope = %scope, phase = %Phase::Idle, "reconciliation starting");

        let stale = match self.list_records(scope).await {
            Ok(ids) => ids,
            Err(err) => return fail(scope, err),
        };
        let mut job = ReconciliationJob {
            scope: scope.clone(),
            stale,
            documents: Vec::new(),
        };

        let deleted = match self.delete_all(&job).await {
            Ok(deleted) => deleted,
            Err(err) => return fail(scope, err),
        };

        job.documents = match self.list_documents(scope).await {
            Ok(documents) => documents,
            Err(err) => return fail(scope, err),
        };

        let created = match self.create_all(&job).await {
            Ok(created) => created,
            Err(err) => return fail(scope, err),
        };

        let summary = RunSummary {
            scope: scope.to_string(),
            deleted,
            created,
            started_at,
            duration_ms: clock.elapsed().as_millis(),
        };
        tracing::info!(
            scope = %scope,
            phase = %Phase::Completed,
            deleted = summary.deleted,
            created = summary.created.len(),
            duration_ms = summary.duration_ms,
            "reconciliation completed"
        );
        Outcome::Completed(summary)
    }

    /// Build the job a run would execute, without mutating anything.
    pub async fn plan(&self, scope: &Scope) -> Result<ReconciliationJob, AggregateError> {
        let stale = self.list_records(scope).await?;
        let documents = self.list_documents(scope).await?;
        Ok(ReconciliationJob {
            scope: scope.clone(),
            stale,
            documents,
        })
    }

    async fn list_records(&self, scope: &Scope) -> Result<Vec<RecordId>, AggregateError> {
        enter(scope, Phase::ListingRecords);
        let remote = Arc::clone(&self.remote);
        let owned = scope.clone();
        let ids = off_thread(Phase::ListingRecords, "list records", move || {
            remote.list_record_ids(&owned)
        })
        .await?;
        tracing::info!(scope = %scope, records = ids.len(), "listed remote records");
        Ok(ids)
    }

    async fn delete_all(&self, job: &ReconciliationJob) -> Result<usize, AggregateError> {
        enter(&job.scope, Phase::Deleting);
        let inputs = job
            .stale
            .iter()
            .map(|id| (id.to_string(), id.clone()))
            .collect();
        let remote = Arc::clone(&self.remote);
        let remaining = self
            .aggregator
            .run(inputs, move |id: RecordId| {
                let remaining = remote.delete_record(&id)?;
                tracing::debug!(record = %id, remaining, "record deleted");
                Ok::<_, postmirror_remote::RemoteError>(remaining)
            })
            .await
            .into_result(Phase::Deleting)?;
        Ok(remaining.len())
    }

    async fn list_documents(&self, scope: &Scope) -> Result<Vec<Document>, AggregateError> {
        enter(scope, Phase::ListingDocuments);
        let source = Arc::clone(&self.source);
        let documents =
            off_thread(Phase::ListingDocuments, "list documents", move || source.list()).await?;
        tracing::info!(scope = %scope, documents = documents.len(), "listed local documents");
        Ok(documents)
    }

    async fn create_all(&self, job: &ReconciliationJob) -> Result<Vec<RecordId>, AggregateError> {
        enter(&job.scope, Phase::Creating);
        let inputs = job
            .documents
            .iter()
            .map(|doc| (doc.title.clone(), (doc.title.clone(), doc.body.clone())))
            .collect();
        let remote = Arc::clone(&self.remote);
        let scope = job.scope.clone();
        self.aggregator
            .run(inputs, move |(title, body): (String, String)| {
                let id = remote.create_record(&scope, &title, &body)?;
                tracing::debug!(record = %id, title = %title, "record created");
                Ok::<_, postmirror_remote::RemoteError>(id)
            })
            .await
            .into_result(Phase::Creating)
    }
}

fn enter(scope: &Scope, phase: Phase) {
    tracing::info!(scope = %scope, phase = %phase, "entering phase");
}

fn fail(scope: &Scope, err: AggregateError) -> Outcome {
    tracing::error!(
        scope = %scope,
        phase = %err.phase,
        failures = err.failures.len(),
        succeeded = err.succeeded,
        "reconciliation failed"
    );
    Outcome::Failed(err)
}

/// Run one blocking call on the blocking pool; its failure fails `phase`.
async fn off_thread<T, E, F>(phase: Phase, task: &str, f: F) -> Result<T, AggregateError>
where
    T: Send + 'static,
    E: fmt::Display + Send + 'static,
    F: FnOnce() -> Result<T, E> + Send + 'static,
{
    let failure = match tokio::task::spawn_blocking(f).await {
        Ok(Ok(value)) => return Ok(value),
        Ok(Err(err)) => TaskFailure::new(task, err),
        Err(join_err) => TaskFailure::new(task, join_err),
    };
    Err(AggregateError::single(phase, failure))
}
