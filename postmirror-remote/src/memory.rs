//! In-process record store.
//!
//! Behaves like a remote store for the engine: ids are assigned by the store
//! and never reused, listing is count-then-fetch, and every call can run
//! concurrently. Failure injection, artificial latency and a journal of
//! mutations make phase ordering and partial failures observable.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use postmirror_core::{RecordId, RemoteRecord, Scope};

use crate::directory::RemoteDirectory;
use crate::error::{ApiError, RemoteError};

/// A mutation as the store observed it, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    DeleteStarted(RecordId),
    Deleted(RecordId),
    DeleteFailed(RecordId),
    CreateStarted(String),
    Created { id: RecordId, title: String },
    CreateFailed(String),
}

impl StoreEvent {
    pub fn is_delete(&self) -> bool {
        matches!(
            self,
            StoreEvent::DeleteStarted(_) | StoreEvent::Deleted(_) | StoreEvent::DeleteFailed(_)
        )
    }

    pub fn is_create(&self) -> bool {
        matches!(
            self,
            StoreEvent::CreateStarted(_) | StoreEvent::Created { .. } | StoreEvent::CreateFailed(_)
        )
    }
}

#[derive(Debug, Default)]
struct State {
    collections: BTreeMap<Scope, Vec<RemoteRecord>>,
    next_id: u64,
    journal: Vec<StoreEvent>,
    failing_deletes: HashSet<RecordId>,
    failing_creates: HashSet<String>,
    failing_list: bool,
    /// Records added (positive) or removed (negative) between count and fetch.
    listing_drift: i64,
    in_flight: usize,
    peak_in_flight: usize,
}

impl State {
    fn mint_id(&mut self) -> RecordId {
        self.next_id += 1;
        RecordId::from(format!("MEM_{}", self.next_id))
    }

    fn insert(&mut self, scope: &Scope, title: &str, body: &str) -> RecordId {
        let id = self.mint_id();
        self.collections
            .entry(scope.clone())
            .or_default()
            .push(RemoteRecord {
                id: id.clone(),
                title: title.to_owned(),
                body: body.to_owned(),
            });
        id
    }

    fn apply_drift(&mut self, scope: &Scope) {
        let drift = self.listing_drift;
        if drift > 0 {
            for n in 0..drift {
                self.insert(scope, &format!("drift-{n}"), "");
            }
        } else if drift < 0 {
            let records = self.collections.entry(scope.clone()).or_default();
            let keep = records.len().saturating_sub(drift.unsigned_abs() as usize);
            records.truncate(keep);
        }
    }
}

/// Records kept in memory, grouped by scope.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    owner: String,
    latency: Option<Duration>,
    state: Mutex<State>,
}

impl MemoryDirectory {
    /// An empty store whose authenticated account is `owner`.
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            ..Self::default()
        }
    }

    /// Every mutating call sleeps this long while counted as in flight.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Seed `scope` with records, returning their ids in order.
    pub fn seed<'a>(
        &self,
        scope: &Scope,
        records: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Vec<RecordId> {
        let mut state = self.lock();
        records
            .into_iter()
            .map(|(title, body)| state.insert(scope, title, body))
            .collect()
    }

    /// Make deleting `id` fail.
    pub fn fail_delete_of(&self, id: &RecordId) {
        self.lock().failing_deletes.insert(id.clone());
    }

    /// Make creating a record titled `title` fail.
    pub fn fail_create_of(&self, title: &str) {
        self.lock().failing_creates.insert(title.to_owned());
    }

    /// Make every listing fail.
    pub fn fail_listing(&self) {
        self.lock().failing_list = true;
    }

    /// Add (`delta > 0`) or remove (`delta < 0`) records between the count
    /// read and the fetch read of every listing.
    pub fn set_listing_drift(&self, delta: i64) {
        self.lock().listing_drift = delta;
    }

    /// Current records in `scope`.
    pub fn records(&self, scope: &Scope) -> Vec<RemoteRecord> {
        self.lock()
            .collections
            .get(scope)
            .cloned()
            .unwrap_or_default()
    }

    /// Every mutation so far, in order.
    pub fn journal(&self) -> Vec<StoreEvent> {
        self.lock().journal.clone()
    }

    /// Highest number of mutations observed running at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.lock().peak_in_flight
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self, event: StoreEvent) {
        let mut state = self.lock();
        state.journal.push(event);
        state.in_flight += 1;
        state.peak_in_flight = state.peak_in_flight.max(state.in_flight);
    }

    fn pause(&self) {
        if let Some(latency) = self.latency {
            std::thread::sleep(latency);
        }
    }
}

impl RemoteDirectory for MemoryDirectory {
    fn list_record_ids(&self, scope: &Scope) -> Result<Vec<RecordId>, RemoteError> {
        let mut state = self.lock();
        if state.failing_list {
            return Err(RemoteError::List {
                scope: scope.clone(),
                source: ApiError::Rejected("listing disabled".to_owned()),
            });
        }

        let reported = state.collections.get(scope).map_or(0, Vec::len);
        state.apply_drift(scope);
        let ids = state
            .collections
            .get(scope)
            .map(|records| {
                records
                    .iter()
                    .take(reported)
                    .map(|r| r.id.clone())
                    .collect()
            })
            .unwrap_or_default();
        Ok(ids)
    }

    fn create_record(&self, scope: &Scope, title: &str, body: &str) -> Result<RecordId, RemoteError> {
        self.begin(StoreEvent::CreateStarted(title.to_owned()));
        self.pause();

        let mut state = self.lock();
        state.in_flight -= 1;
        if state.failing_creates.contains(title) {
            state.journal.push(StoreEvent::CreateFailed(title.to_owned()));
            return Err(RemoteError::Create {
                title: title.to_owned(),
                source: ApiError::Rejected("create disabled for this title".to_owned()),
            });
        }

        let id = state.insert(scope, title, body);
        state.journal.push(StoreEvent::Created {
            id: id.clone(),
            title: title.to_owned(),
        });
        Ok(id)
    }

    fn delete_record(&self, id: &RecordId) -> Result<u64, RemoteError> {
        self.begin(StoreEvent::DeleteStarted(id.clone()));
        self.pause();

        let mut state = self.lock();
        state.in_flight -= 1;
        let delete_err = |source| RemoteError::Delete {
            id: id.clone(),
            source,
        };

        if state.failing_deletes.contains(id) {
            state.journal.push(StoreEvent::DeleteFailed(id.clone()));
            return Err(delete_err(ApiError::Rejected(
                "delete disabled for this record".to_owned(),
            )));
        }

        let found = state.collections.values_mut().find_map(|records| {
            let index = records.iter().position(|r| &r.id == id)?;
            records.remove(index);
            Some(records.len())
        });
        match found {
            Some(remaining) => {
                state.journal.push(StoreEvent::Deleted(id.clone()));
                Ok(remaining as u64)
            }
            None => {
                state.journal.push(StoreEvent::DeleteFailed(id.clone()));
                Err(delete_err(ApiError::NotFound(format!("record {id}"))))
            }
        }
    }

    fn default_owner(&self) -> Result<String, RemoteError> {
        Ok(self.owner.clone())
    }
}
