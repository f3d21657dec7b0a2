use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use super::AppState;
use crate::error::JobError;
use crate::progress::{CompletionReport, JobRecord, ProgressReport};
use crate::service::EnrichmentRequest;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartJobResponse {
    pub job_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CallbackResponse {
    pub success: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollParams {
    pub job_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub jobs: JobCounts,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JobCounts {
    pub processing: usize,
    pub complete: usize,
    pub error: usize,
}

/// Parses a JSON body, reporting malformed input as a client error.
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body)
        .map_err(|e| ApiError(JobError::invalid(format!("Invalid request body: {}", e))))
}

pub(crate) async fn start_job_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<StartJobResponse>, ApiError> {
    let request: EnrichmentRequest = parse_body(&body)?;
    let job_id = state.service.start_job(request).await?;
    Ok(Json(StartJobResponse { job_id }))
}

pub(crate) async fn poll_job_handler(
    State(state): State<AppState>,
    params: Result<Query<PollParams>, QueryRejection>,
) -> Result<Json<JobRecord>, ApiError> {
    let Query(params) = params
        .map_err(|e| ApiError(JobError::invalid(format!("Invalid query string: {}", e.body_text()))))?;
    let record = state.service.poll(params.job_id.as_deref())?;
    Ok(Json(record))
}

pub(crate) async fn progress_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<CallbackResponse>, ApiError> {
    let report: ProgressReport = parse_body(&body)?;
    state.service.record_progress(report)?;
    Ok(Json(CallbackResponse { success: true }))
}

pub(crate) async fn completion_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<CallbackResponse>, ApiError> {
    let report: CompletionReport = parse_body(&body)?;
    state.service.record_completion(report)?;
    Ok(Json(CallbackResponse { success: true }))
}

pub(crate) async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let (processing, complete, error) = state.service.store().counts();
    Json(HealthResponse {
        status: "ok".to_string(),
        jobs: JobCounts {
            processing,
            complete,
            error,
        },
    })
}
