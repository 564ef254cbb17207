//! Stubs API endpoint
//!
//! Serves Lua Language Server definitions for the globals available to
//! submitted fragments, for editor completion.

use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
};
use std::sync::Arc;

use crate::service::JobService;

/// GET /stubs
pub async fn get_stubs(State(service): State<Arc<JobService>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/x-lua; charset=utf-8")],
        service.stubs(),
    )
}
