//! Job Service
//!
//! Business logic for creating, inspecting, cancelling and deleting jobs.
//! Everything handed out to callers is a snapshot; live jobs never leave
//! the service.

use lunar_core::domain::job::{JobStatus, Property, SortBy};
use lunar_core::dto::job::{JobSnapshot, sort_snapshots};
use lunar_lua::ScriptEngine;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::JobError;
use crate::execution::{JobFactory, WorkerPool};
use crate::repository::JobRegistry;

pub struct JobService {
    registry: Arc<JobRegistry>,
    factory: JobFactory,
    pool: WorkerPool,
    engine: Arc<dyn ScriptEngine>,
}

impl JobService {
    pub fn new(registry: Arc<JobRegistry>, pool: WorkerPool, engine: Arc<dyn ScriptEngine>) -> Self {
        Self {
            registry,
            factory: JobFactory::new(),
            pool,
            engine,
        }
    }

    /// Validates, registers and schedules a fragment
    ///
    /// Returns as soon as the job is submitted. Code that fails validation is
    /// never registered.
    pub fn create_and_run(&self, code: &str) -> Result<JobSnapshot, JobError> {
        self.engine.validate(code).map_err(|e| {
            debug!("Refusing code fragment: {}", e);
            JobError::CannotExecute(e.to_string())
        })?;

        let job = self.registry.save(self.factory.create_new(code))?;

        if let Err(e) = job.submit(&self.pool, Arc::clone(&self.engine)) {
            warn!("Failed to submit job {:?}: {}", job.id(), e);
            self.registry.delete(&job);
            return Err(e);
        }

        info!("Job created: {:?}", job.id());
        Ok(job.snapshot())
    }

    /// Lists snapshots of every job, filtered and sorted after snapshotting
    pub fn list(&self, status: Option<JobStatus>, sort_by: SortBy) -> Vec<JobSnapshot> {
        let mut snapshots: Vec<JobSnapshot> = self
            .registry
            .find_all(None, None)
            .iter()
            .map(|job| job.snapshot())
            .collect();

        if let Some(status) = status {
            snapshots.retain(|snapshot| snapshot.status == status);
        }
        sort_snapshots(&mut snapshots, sort_by);

        snapshots
    }

    pub fn get_one(&self, id: u64) -> Result<JobSnapshot, JobError> {
        Ok(self.registry.get_one(id)?.snapshot())
    }

    pub fn cancel(&self, id: u64) -> Result<JobSnapshot, JobError> {
        let job = self.registry.get_one(id)?;

        if !job.cancel() {
            return Err(JobError::CannotCancel {
                id,
                status: job.status(),
            });
        }

        Ok(job.snapshot())
    }

    /// Cancels a job if it is still active and removes it
    pub fn delete(&self, id: u64) -> Result<(), JobError> {
        let job = self.registry.get_one(id)?;

        if job.cancel() {
            debug!("Job {} cancelled before deletion", id);
        }
        self.registry.delete(&job);

        info!("Job deleted: {}", id);
        Ok(())
    }

    /// Returns one detail property of a job as plain text
    pub fn get_detail(&self, id: u64, property: &str) -> Result<String, JobError> {
        let job = self.registry.get_one(id)?;
        let property: Property = property
            .parse()
            .map_err(|_| JobError::NoSuchProperty(property.to_string()))?;

        Ok(job.snapshot().detail(property))
    }

    /// LuaLS stubs for the globals scripts can use
    pub fn stubs(&self) -> String {
        self.engine.stubs()
    }
}
