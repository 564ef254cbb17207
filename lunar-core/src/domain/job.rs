//! Job domain types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Lifecycle status of a code-execution job
///
/// CREATED -> SUBMITTED -> RUNNING -> {SUCCESSFUL, UNSUCCESSFUL, REJECTED},
/// with CANCELLED reachable from SUBMITTED or RUNNING.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Created,
    Submitted,
    Running,
    Successful,
    Unsuccessful,
    Rejected,
    Cancelled,
}

impl JobStatus {
    /// Returns true when no further transition can happen
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Successful
                | JobStatus::Unsuccessful
                | JobStatus::Rejected
                | JobStatus::Cancelled
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Created => "CREATED",
            JobStatus::Submitted => "SUBMITTED",
            JobStatus::Running => "RUNNING",
            JobStatus::Successful => "SUCCESSFUL",
            JobStatus::Unsuccessful => "UNSUCCESSFUL",
            JobStatus::Rejected => "REJECTED",
            JobStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CREATED" => Ok(JobStatus::Created),
            "SUBMITTED" => Ok(JobStatus::Submitted),
            "RUNNING" => Ok(JobStatus::Running),
            "SUCCESSFUL" => Ok(JobStatus::Successful),
            "UNSUCCESSFUL" => Ok(JobStatus::Unsuccessful),
            "REJECTED" => Ok(JobStatus::Rejected),
            "CANCELLED" => Ok(JobStatus::Cancelled),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown job status: {0}")]
pub struct UnknownStatus(pub String);

/// Ordering applied when listing jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortBy {
    /// Highest id first
    #[serde(rename = "BY_ID_DESC", alias = "ID")]
    IdDesc,
    /// Most recently scheduled first
    #[serde(rename = "BY_SCHEDULED_DESC", alias = "SCHEDULED_TIME")]
    ScheduledDesc,
}

/// Detail property of a job that can be fetched as plain text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Property {
    Code,
    Stdout,
    Stderr,
    FailureInfo,
}

impl FromStr for Property {
    type Err = UnknownProperty;

    /// Parses a property tag, ignoring case
    ///
    /// The older path tags (`scriptbody`, `executionlog`, `errorlog`,
    /// `exceptioninfo`) map onto the same properties.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "code" | "scriptbody" => Ok(Property::Code),
            "stdout" | "executionlog" => Ok(Property::Stdout),
            "stderr" | "errorlog" => Ok(Property::Stderr),
            "failure_info" | "failureinfo" | "exceptioninfo" => Ok(Property::FailureInfo),
            _ => Err(UnknownProperty(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no such property: {0}")]
pub struct UnknownProperty(pub String);

/// Category of the error that terminated an execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The fragment failed to parse
    Syntax,
    /// The fragment raised an error while running
    Runtime,
    /// The fragment exceeded its memory allowance
    Memory,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Syntax => f.write_str("syntax"),
            FailureKind::Runtime => f.write_str("runtime"),
            FailureKind::Memory => f.write_str("memory"),
        }
    }
}

/// Structured description of the error that ended a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureInfo {
    pub kind: FailureKind,
    pub message: String,
}

impl FailureInfo {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for FailureInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error: {}", self.kind, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(!JobStatus::Created.is_terminal());
        assert!(!JobStatus::Submitted.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Successful.is_terminal());
        assert!(JobStatus::Unsuccessful.is_terminal());
        assert!(JobStatus::Rejected.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_status_parse_ignores_case() {
        assert_eq!("running".parse::<JobStatus>(), Ok(JobStatus::Running));
        assert_eq!("CANCELLED".parse::<JobStatus>(), Ok(JobStatus::Cancelled));
        assert!("finished".parse::<JobStatus>().is_err());
    }

    #[test]
    fn test_status_serializes_screaming_case() {
        let json = serde_json::to_string(&JobStatus::Unsuccessful).unwrap();
        assert_eq!(json, "\"UNSUCCESSFUL\"");
        assert_eq!(JobStatus::Unsuccessful.to_string(), "UNSUCCESSFUL");
    }

    #[test]
    fn test_property_parse() {
        assert_eq!("STDOUT".parse::<Property>(), Ok(Property::Stdout));
        assert_eq!("failure_info".parse::<Property>(), Ok(Property::FailureInfo));
        assert_eq!("ScriptBody".parse::<Property>(), Ok(Property::Code));
        assert_eq!("errorlog".parse::<Property>(), Ok(Property::Stderr));

        let err = "result".parse::<Property>().unwrap_err();
        assert_eq!(err, UnknownProperty("result".to_string()));
        assert_eq!(err.to_string(), "no such property: result");
    }

    #[test]
    fn test_sort_by_accepts_legacy_names() {
        let sort: SortBy = serde_json::from_str("\"BY_ID_DESC\"").unwrap();
        assert_eq!(sort, SortBy::IdDesc);
        let sort: SortBy = serde_json::from_str("\"SCHEDULED_TIME\"").unwrap();
        assert_eq!(sort, SortBy::ScheduledDesc);
    }

    #[test]
    fn test_failure_info_display() {
        let info = FailureInfo::new(FailureKind::Runtime, "attempt to call a nil value");
        assert_eq!(info.to_string(), "runtime error: attempt to call a nil value");
    }
}
