//! Core domain types
//!
//! Enumerations and value types describing a code-execution job. They carry
//! no behavior beyond parsing and formatting, and are shared between the
//! script engine and the server.

pub mod job;
