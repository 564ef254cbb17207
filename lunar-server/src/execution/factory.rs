//! Job factory

use std::sync::Arc;

use crate::execution::job::Job;

/// Builds new jobs from raw code text
///
/// Performs no validation; the service checks code with the engine before
/// asking for a job.
#[derive(Debug, Clone, Copy, Default)]
pub struct JobFactory;

impl JobFactory {
    pub fn new() -> Self {
        Self
    }

    /// Creates a job in CREATED state with no id bound
    pub fn create_new(&self, code: impl Into<String>) -> Arc<Job> {
        Arc::new(Job::new(code))
    }
}
