//! Lunar Server
//!
//! Runs untrusted Lua fragments on a bounded worker pool and keeps track of
//! every execution for the lifetime of the process.
//!
//! Architecture:
//! - Execution: the live `Job` state machine, its factory, output buffers and
//!   the worker pool that runs jobs
//! - Repository: in-memory registry that owns id assignment
//! - Service: create / list / cancel / delete orchestration over snapshots
//! - API: thin axum adapter over the service

pub mod api;
pub mod config;
pub mod error;
pub mod execution;
pub mod repository;
pub mod service;
