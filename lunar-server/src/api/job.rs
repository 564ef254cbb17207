//! Job API Handlers
//!
//! HTTP endpoints for code executions.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use lunar_core::domain::job::{JobStatus, SortBy};
use lunar_core::dto::job::{CreateJob, JobSnapshot};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::error::ApiResult;
use crate::service::JobService;

/// POST /executions
/// Validate a code fragment and schedule it
pub async fn create_job(
    State(service): State<Arc<JobService>>,
    Json(req): Json<CreateJob>,
) -> ApiResult<(StatusCode, Json<JobSnapshot>)> {
    tracing::info!("Creating execution ({} bytes of code)", req.code.len());

    let snapshot = service.create_and_run(&req.code)?;
    Ok((StatusCode::CREATED, Json(snapshot)))
}

/// GET /executions
/// List executions
///
/// Query parameters:
/// - `status` (optional): only executions currently in this status
/// - `sort_by` (optional): `BY_ID_DESC` (default) or `BY_SCHEDULED_DESC`
pub async fn list_jobs(
    State(service): State<Arc<JobService>>,
    Query(params): Query<ListJobsQuery>,
) -> Json<Vec<JobSnapshot>> {
    tracing::debug!(
        "Listing executions (status: {:?}, sort_by: {:?})",
        params.status,
        params.sort_by
    );

    let sort_by = params.sort_by.unwrap_or(SortBy::IdDesc);
    Json(service.list(params.status, sort_by))
}

/// GET /executions/{id}
pub async fn get_job(
    State(service): State<Arc<JobService>>,
    Path(id): Path<u64>,
) -> ApiResult<Json<JobSnapshot>> {
    tracing::debug!("Getting execution: {}", id);

    Ok(Json(service.get_one(id)?))
}

/// DELETE /executions/{id}/cancel
pub async fn cancel_job(
    State(service): State<Arc<JobService>>,
    Path(id): Path<u64>,
) -> ApiResult<Json<JobSnapshot>> {
    tracing::info!("Cancelling execution: {}", id);

    Ok(Json(service.cancel(id)?))
}

/// DELETE /executions/{id}
/// Cancel an execution if still active, then forget it
pub async fn delete_job(
    State(service): State<Arc<JobService>>,
    Path(id): Path<u64>,
) -> ApiResult<StatusCode> {
    tracing::info!("Deleting execution: {}", id);

    service.delete(id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /executions/{id}/{property}
/// Plain-text detail: code, stdout, stderr or failure_info
pub async fn get_job_detail(
    State(service): State<Arc<JobService>>,
    Path((id, property)): Path<(u64, String)>,
) -> ApiResult<String> {
    tracing::debug!("Getting {} of execution {}", property, id);

    Ok(service.get_detail(id, &property)?)
}

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    pub status: Option<JobStatus>,
    pub sort_by: Option<SortBy>,
}
