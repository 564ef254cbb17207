//! API Module
//!
//! HTTP API layer for the execution service.
//! Each submodule handles endpoints for a specific domain.

pub mod error;
pub mod health;
pub mod job;
pub mod stubs;

use axum::{
    Router,
    routing::{delete, get},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::service::JobService;

/// Create the main API router with all endpoints
pub fn create_router(service: Arc<JobService>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // LuaLS stubs
        .route("/stubs", get(stubs::get_stubs))
        // Execution endpoints
        .route("/executions", get(job::list_jobs).post(job::create_job))
        .route(
            "/executions/{id}",
            get(job::get_job).delete(job::delete_job),
        )
        .route("/executions/{id}/cancel", delete(job::cancel_job))
        .route("/executions/{id}/{property}", get(job::get_job_detail))
        // Add state and middleware
        .with_state(service)
        .layer(TraceLayer::new_for_http())
}
