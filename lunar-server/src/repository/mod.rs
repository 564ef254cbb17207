//! Repository Module
//!
//! In-memory storage for jobs. Nothing is persisted; the registry lives for
//! the lifetime of the process.

pub mod job;

pub use job::JobRegistry;
