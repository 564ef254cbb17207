//! Data Transfer Objects
//!
//! Thread-independent, immutable copies of live jobs used for listing and
//! serialization, plus request payloads.

pub mod job;
