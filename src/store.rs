//! Shared record store with optimistic mutations.
//!
//! `RecordStore::mutate` is the one path every write goes through:
//! apply the change locally, await the server, then either reconcile with
//! the server's record or undo exactly what this mutation changed.
//!
//! The lock is never held across an await, so several mutations can be in
//! flight at once and complete in any order. Completions for a record that
//! has since disappeared are dropped, as are completions arriving after the
//! owner called [`RecordStore::unmount`].
//!
//! Overlapping edits of one record share a flight: the last server-confirmed
//! version is kept as its base, and only when the last outstanding edit
//! settles does the record fall back to that base on failure.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::collection::{self, Identified};
use crate::error::ClientError;
use crate::models::RecordId;

/// Local change applied before the server confirms it.
#[derive(Debug, Clone)]
pub enum Change<T> {
    /// Replace an existing record in place (edit, toggle).
    Replace(T),
    /// Prepend a placeholder carrying a provisional id (create).
    Insert(T),
    /// Remove a record (delete).
    Remove(RecordId),
    /// No local change (fire-and-report calls).
    Nothing,
}

/// Result of a mutation whose request completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<R> {
    /// The response was applied to the store.
    Applied(R),
    /// The store no longer cared: the owner unmounted or the record vanished.
    Discarded,
    /// The server created the record, but its placeholder was withdrawn
    /// while the request was in flight. The caller owns undoing it remotely.
    Withdrawn(R),
}

impl<R> Outcome<R> {
    pub fn applied(self) -> Option<R> {
        match self {
            Outcome::Applied(value) => Some(value),
            Outcome::Discarded | Outcome::Withdrawn(_) => None,
        }
    }
}

/// What to do on failure to undo one mutation.
enum Undo<T> {
    /// Fall back to the flight's confirmed base once no edit is outstanding.
    Flight { generation: u64, sent: T },
    /// Re-insert a removed record at its old position, unless it came back.
    Reinsert { index: usize, record: T },
    /// Drop a placeholder.
    Discard(RecordId),
    Nothing,
}

struct Pending<T> {
    undo: Undo<T>,
    /// Record that must still be present for the response to matter.
    target: Option<RecordId>,
}

/// Outstanding edits of one record.
struct Flight<T> {
    /// Last version the server confirmed.
    base: T,
    base_generation: u64,
    latest: u64,
    /// Edits not yet settled.
    generations: HashSet<u64>,
}

struct Shared<T> {
    records: Vec<T>,
    flights: HashMap<RecordId, Flight<T>>,
    next_generation: u64,
    /// Placeholders whose create is still in flight.
    inserting: HashSet<RecordId>,
    withdrawn: HashSet<RecordId>,
}

#[derive(Clone)]
pub struct RecordStore<T> {
    shared: Arc<Mutex<Shared<T>>>,
    alive: Arc<AtomicBool>,
    next_provisional: Arc<AtomicI64>,
}

impl<T: Identified> Default for RecordStore<T> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<T: Identified> RecordStore<T> {
    pub fn new(records: Vec<T>) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                records,
                flights: HashMap::new(),
                next_generation: 0,
                inserting: HashSet::new(),
                withdrawn: HashSet::new(),
            })),
            alive: Arc::new(AtomicBool::new(true)),
            next_provisional: Arc::new(AtomicI64::new(-1)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Shared<T>>, ClientError> {
        self.shared.lock().map_err(|_| ClientError::LockPoisoned)
    }

    /// Snapshot of the current records.
    pub fn records(&self) -> Result<Vec<T>, ClientError> {
        Ok(self.lock()?.records.clone())
    }

    pub fn get(&self, id: RecordId) -> Result<Option<T>, ClientError> {
        Ok(collection::find(&self.lock()?.records, id).cloned())
    }

    pub fn contains(&self, id: RecordId) -> Result<bool, ClientError> {
        Ok(collection::position(&self.lock()?.records, id).is_some())
    }

    pub fn len(&self) -> usize {
        self.lock().map(|shared| shared.records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replace everything with a fresh server listing. Ignored once unmounted.
    pub fn replace_all(&self, records: Vec<T>) -> Result<(), ClientError> {
        if !self.is_alive() {
            return Ok(());
        }
        let mut shared = self.lock()?;
        let Shared {
            records: current,
            flights,
            ..
        } = &mut *shared;
        for (id, flight) in flights.iter_mut() {
            if let Some(fresh) = collection::find(&records, *id) {
                flight.base = fresh.clone();
            }
        }
        *current = records;
        Ok(())
    }

    /// Apply a pure transformation to the records (e.g. a local cascade).
    pub fn update<F>(&self, f: F) -> Result<(), ClientError>
    where
        F: FnOnce(&[T]) -> Vec<T>,
    {
        let mut shared = self.lock()?;
        let next = f(&shared.records);
        shared.records = next;
        Ok(())
    }

    /// Next provisional id for an optimistic placeholder. Always negative.
    pub fn provisional_id(&self) -> RecordId {
        RecordId(self.next_provisional.fetch_sub(1, Ordering::Relaxed))
    }

    /// Pull a placeholder whose create is still in flight. Returns false if
    /// no such create is pending. The create then completes as
    /// [`Outcome::Withdrawn`].
    pub fn withdraw(&self, id: RecordId) -> Result<bool, ClientError> {
        let mut shared = self.lock()?;
        if !shared.inserting.remove(&id) {
            return Ok(false);
        }
        shared.withdrawn.insert(id);
        let next = collection::apply_optimistic_removal(&shared.records, id);
        shared.records = next;
        Ok(true)
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Stop applying results. Requests already in flight still complete,
    /// but their responses are dropped.
    pub fn unmount(&self) {
        self.alive.store(false, Ordering::Release);
    }

    /// Apply `change` locally, await `request`, then reconcile or roll back.
    ///
    /// On success, `reconcile` may return the server's version of the record,
    /// which replaces the placeholder or previous version. On failure the
    /// change is undone and the error returned, unless the response is stale
    /// (owner unmounted or target record gone), in which case it is dropped.
    pub async fn mutate<R, Fut, F>(
        &self,
        change: Change<T>,
        request: Fut,
        reconcile: F,
    ) -> Result<Outcome<R>, ClientError>
    where
        Fut: Future<Output = Result<R, ClientError>>,
        F: FnOnce(&R) -> Option<T>,
    {
        let pending = self.apply(change)?;
        let result = request.await;

        if !self.is_alive() {
            tracing::debug!("Store unmounted, dropping mutation result");
            return Ok(Outcome::Discarded);
        }

        let mut shared = self.lock()?;
        let shared = &mut *shared;

        if let Undo::Discard(placeholder) = pending.undo {
            shared.inserting.remove(&placeholder);
            if shared.withdrawn.remove(&placeholder) {
                tracing::debug!(%placeholder, "Create finished after its placeholder was withdrawn");
                return Ok(match result {
                    Ok(value) => Outcome::Withdrawn(value),
                    Err(_) => Outcome::Discarded,
                });
            }
        }

        if let Undo::Flight { generation, sent } = pending.undo {
            let server = match &result {
                Ok(value) => Some(reconcile(value).unwrap_or(sent)),
                Err(_) => None,
            };
            return Self::settle_flight(shared, generation, server, result);
        }

        if let Some(target) = pending.target {
            if collection::position(&shared.records, target).is_none() {
                tracing::debug!(%target, "Record gone before response arrived, ignoring");
                return Ok(Outcome::Discarded);
            }
        }

        match result {
            Ok(value) => {
                if let Some(record) = reconcile(&value) {
                    let next = match pending.target {
                        Some(target) => collection::replace_record(&shared.records, target, record),
                        None => collection::merge_server_record(&shared.records, record),
                    };
                    shared.records = next;
                }
                Ok(Outcome::Applied(value))
            }
            Err(err) => {
                Self::rollback(&mut shared.records, pending.undo);
                tracing::warn!(error = %err, "Mutation rejected, local change rolled back");
                Err(err)
            }
        }
    }

    /// Finish one edit of a record that may have others outstanding.
    ///
    /// A success moves the base forward (never backward). The newest edit
    /// shows its server version right away; once the last edit settles the
    /// record is reset to the base, so a failure can only ever restore a
    /// version the server confirmed.
    fn settle_flight<R>(
        shared: &mut Shared<T>,
        generation: u64,
        server: Option<T>,
        result: Result<R, ClientError>,
    ) -> Result<Outcome<R>, ClientError> {
        let Some((&target, flight)) = shared
            .flights
            .iter_mut()
            .find(|(_, flight)| flight.generations.contains(&generation))
        else {
            return Ok(Outcome::Discarded);
        };
        flight.generations.remove(&generation);
        if let Some(record) = &server {
            if generation > flight.base_generation {
                flight.base = record.clone();
                flight.base_generation = generation;
            }
        }
        let settled = flight.generations.is_empty();
        let newest = generation == flight.latest;
        let base = flight.base.clone();
        if settled {
            shared.flights.remove(&target);
        }

        if collection::position(&shared.records, target).is_none() {
            tracing::debug!(%target, "Record gone before response arrived, ignoring");
            return Ok(Outcome::Discarded);
        }

        match result {
            Ok(value) => {
                if settled {
                    shared.records = collection::merge_server_record(&shared.records, base);
                } else if let (true, Some(record)) = (newest, server) {
                    shared.records = collection::merge_server_record(&shared.records, record);
                }
                Ok(Outcome::Applied(value))
            }
            Err(err) => {
                if settled {
                    shared.records = collection::merge_server_record(&shared.records, base);
                    tracing::warn!(error = %err, %target, "Edit rejected, restored last confirmed version");
                } else {
                    tracing::warn!(error = %err, %target, "Edit rejected, newer edit still pending");
                }
                Err(err)
            }
        }
    }

    fn apply(&self, change: Change<T>) -> Result<Pending<T>, ClientError> {
        let mut shared = self.lock()?;
        let shared = &mut *shared;
        let pending = match change {
            Change::Replace(record) => {
                let id = record.id();
                let Some(current) = collection::find(&shared.records, id).cloned() else {
                    return Ok(Pending {
                        undo: Undo::Nothing,
                        target: Some(id),
                    });
                };
                shared.next_generation += 1;
                let generation = shared.next_generation;
                let flight = shared.flights.entry(id).or_insert_with(|| Flight {
                    base: current,
                    base_generation: 0,
                    latest: 0,
                    generations: HashSet::new(),
                });
                flight.latest = generation;
                flight.generations.insert(generation);
                shared.records = collection::merge_server_record(&shared.records, record.clone());
                Pending {
                    undo: Undo::Flight {
                        generation,
                        sent: record,
                    },
                    target: Some(id),
                }
            }
            Change::Insert(record) => {
                let id = record.id();
                shared.inserting.insert(id);
                shared.records = collection::insert_server_record(&shared.records, record);
                Pending {
                    undo: Undo::Discard(id),
                    target: Some(id),
                }
            }
            Change::Remove(id) => {
                let undo = match collection::position(&shared.records, id) {
                    Some(index) => Undo::Reinsert {
                        index,
                        record: shared.records[index].clone(),
                    },
                    None => Undo::Nothing,
                };
                shared.records = collection::apply_optimistic_removal(&shared.records, id);
                Pending { undo, target: None }
            }
            Change::Nothing => Pending {
                undo: Undo::Nothing,
                target: None,
            },
        };
        Ok(pending)
    }

    fn rollback(records: &mut Vec<T>, undo: Undo<T>) {
        match undo {
            Undo::Reinsert { index, record } => {
                if collection::position(records, record.id()).is_none() {
                    let index = index.min(records.len());
                    records.insert(index, record);
                }
            }
            Undo::Discard(id) => {
                let next = collection::apply_optimistic_removal(records, id);
                *records = next;
            }
            Undo::Flight { .. } | Undo::Nothing => {}
        }
    }
}
