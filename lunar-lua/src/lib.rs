//! Lunar Lua Infrastructure
//!
//! The script engine behind the Lunar execution service. It includes:
//! - A restricted Lua sandbox
//! - Module trait and registry for Lua modules
//! - The `console` module that routes script output into sinks
//! - The `ScriptEngine` capability (validate / execute) and its Lua implementation
//! - Cooperative cancellation tokens

pub mod cancel;
pub mod engine;
pub mod module;
pub mod modules;
pub mod sandbox;

pub use cancel::CancelToken;
pub use engine::{
    EngineFailure, LuaEngine, LuaEngineConfig, NO_VALUE, ScriptEngine, ValidationError,
};
pub use module::{LunarModule, ModuleError, ModuleRegistry};
pub use modules::{ConsoleModule, ConsoleOutput, OutputSink};
pub use sandbox::create_sandbox;
