//! Job Registry
//!
//! Thread-safe store of live jobs keyed by id. The registry owns id
//! assignment: ids start at 1 and are handed out under the write lock, so
//! assignment order matches insertion order.

use lunar_core::domain::job::{JobStatus, SortBy};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

use crate::error::JobError;
use crate::execution::job::Job;

#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<u64, Arc<Job>>>,
    last_id: AtomicU64,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<u64, Arc<Job>>> {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<u64, Arc<Job>>> {
        self.jobs.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts or replaces a job
    ///
    /// A job without an id gets the next one; a job that already has an id
    /// overwrites the entry stored under it.
    pub fn save(&self, job: Arc<Job>) -> Result<Arc<Job>, JobError> {
        let mut jobs = self.write();

        let id = match job.id() {
            Some(id) => id,
            None => {
                let id = self.last_id.fetch_add(1, Ordering::SeqCst) + 1;
                job.assign_id(id)?;
                debug!("Assigned id {} to new job", id);
                id
            }
        };

        jobs.insert(id, Arc::clone(&job));
        Ok(job)
    }

    pub fn get_one(&self, id: u64) -> Result<Arc<Job>, JobError> {
        self.read().get(&id).cloned().ok_or(JobError::NotFound(id))
    }

    /// Returns the live jobs, optionally filtered by status and sorted
    ///
    /// Jobs keep changing after this returns; snapshot them for a
    /// consistent view.
    pub fn find_all(&self, status: Option<JobStatus>, sort_by: Option<SortBy>) -> Vec<Arc<Job>> {
        let mut jobs: Vec<Arc<Job>> = self.read().values().cloned().collect();

        if let Some(status) = status {
            jobs.retain(|job| job.status() == status);
        }

        match sort_by {
            Some(SortBy::IdDesc) => jobs.sort_by_key(|job| std::cmp::Reverse(job.id())),
            Some(SortBy::ScheduledDesc) => {
                jobs.sort_by_key(|job| std::cmp::Reverse((job.scheduled_at(), job.id())))
            }
            None => {}
        }

        jobs
    }

    /// Removes a job; does nothing if it isn't stored
    pub fn delete(&self, job: &Job) {
        if let Some(id) = job.id() {
            self.write().remove(&id);
        }
    }

    /// Clears every job and restarts ids at 1
    pub fn delete_all(&self) {
        let mut jobs = self.write();
        jobs.clear();
        self.last_id.store(0, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
