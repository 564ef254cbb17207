//! Job DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::job::{FailureInfo, JobStatus, Property, SortBy};

/// Request to create and run a new job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJob {
    #[serde(alias = "scriptBody")]
    pub code: String,
}

/// Immutable point-in-time copy of a job
///
/// A live job keeps mutating on its worker thread. Anything that needs a
/// consistent view (listing, sorting, serialization) works on snapshots so
/// later changes never leak into data that was already handed out.
///
/// Code, output logs and failure details are not serialized; they are served
/// individually through [`JobSnapshot::detail`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub id: Option<u64>,
    pub status: JobStatus,
    #[serde(skip_serializing, default)]
    pub code: String,
    pub scheduled_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub result_value: Option<String>,
    #[serde(skip_serializing, default)]
    pub stdout: String,
    #[serde(skip_serializing, default)]
    pub stderr: String,
    #[serde(skip_serializing, default)]
    pub failure_info: Option<FailureInfo>,
    pub cancellable: bool,
}

impl JobSnapshot {
    /// Returns the plain-text value of a detail property
    ///
    /// A missing failure renders as an empty string.
    pub fn detail(&self, property: Property) -> String {
        match property {
            Property::Code => self.code.clone(),
            Property::Stdout => self.stdout.clone(),
            Property::Stderr => self.stderr.clone(),
            Property::FailureInfo => self
                .failure_info
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
        }
    }
}

/// Sorts snapshots in place, newest first
pub fn sort_snapshots(snapshots: &mut [JobSnapshot], sort_by: SortBy) {
    match sort_by {
        SortBy::IdDesc => snapshots.sort_by(|a, b| b.id.cmp(&a.id)),
        SortBy::ScheduledDesc => {
            snapshots.sort_by(|a, b| b.scheduled_at.cmp(&a.scheduled_at).then(b.id.cmp(&a.id)))
        }
    }
}
