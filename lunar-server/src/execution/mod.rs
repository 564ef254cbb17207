//! Job execution
//!
//! The live job state machine and everything it needs to run:
//! output buffers, the factory and the worker pool.

pub mod factory;
pub mod job;
pub mod output;
pub mod pool;

pub use factory::JobFactory;
pub use job::Job;
pub use output::OutputBuffer;
pub use pool::{TaskHandle, WorkerPool};
