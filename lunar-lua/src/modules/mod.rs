//! Built-in Lunar modules for Lua scripts
//!
//! Modules are generic over small sink traits so that the server can route
//! script output into per-job buffers while tests capture it in memory.

pub mod console;

pub use console::{ConsoleModule, ConsoleOutput, OutputSink};
