//! Service Module
//!
//! Business logic layer between the HTTP API and the execution core.

pub mod job;

pub use job::JobService;
