//! Process-wide job registry.
//!
//! A concurrent map from job id to [`Job`]. Keys are only ever added; jobs
//! live for the lifetime of the registry. Each entry also keeps the
//! background task's `JoinHandle` for lifecycle bookkeeping (awaiting or
//! aborting on shutdown). Cancellation never goes through the handle; it is
//! delivered by the job's token.

use crate::job::Job;
use dashmap::DashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

struct RegistryEntry {
    job: Arc<Job>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

/// Concurrent, append-only job map.
#[derive(Default)]
pub struct JobRegistry {
    jobs: DashMap<Uuid, RegistryEntry>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job. Returns `false` (and leaves the map untouched) if the
    /// id is already present.
    pub fn insert(&self, job: Arc<Job>) -> bool {
        use dashmap::mapref::entry::Entry;
        match self.jobs.entry(job.id()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(RegistryEntry {
                    job,
                    handle: Mutex::new(None),
                });
                true
            }
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<Arc<Job>> {
        self.jobs.get(id).map(|e| Arc::clone(&e.job))
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.jobs.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Remember the background task for `id`.
    pub fn attach_handle(&self, id: &Uuid, handle: JoinHandle<()>) {
        if let Some(entry) = self.jobs.get(id) {
            *entry.handle.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        }
    }

    /// Take the background task handle, leaving `None` behind.
    pub fn take_handle(&self, id: &Uuid) -> Option<JoinHandle<()>> {
        self.jobs
            .get(id)
            .and_then(|e| e.handle.lock().unwrap_or_else(PoisonError::into_inner).take())
    }

    /// Abort every background task that is still attached. Returns how many
    /// were still running.
    pub fn abort_all(&self) -> usize {
        let mut aborted = 0;
        for entry in self.jobs.iter() {
            let guard = entry.handle.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(handle) = guard.as_ref() {
                if !handle.is_finished() {
                    handle.abort();
                    aborted += 1;
                }
            }
        }
        debug!("Aborted {} in-flight job tasks", aborted);
        aborted
    }
}
