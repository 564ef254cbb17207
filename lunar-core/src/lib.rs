//! Lunar Core
//!
//! Core types shared by the Lunar execution service.
//!
//! This crate contains:
//! - Domain types: job status, sorting and detail-property tags, failure info
//! - DTOs: immutable job snapshots and the create request

pub mod domain;
pub mod dto;
