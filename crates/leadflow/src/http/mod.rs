//! HTTP surface: submission, polling and the runner callbacks.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn;
use axum::routing::{get, post};
use axum::Router;

use crate::service::EnrichmentService;

pub mod error;
pub mod handlers;
mod request_tracing;

pub use error::ApiError;
pub use handlers::{CallbackResponse, HealthResponse, JobCounts, StartJobResponse};

/// Path of the submission and poll endpoint.
pub const ENRICH_PATH: &str = "/api/enrich";
pub const PROGRESS_PATH: &str = "/api/enrich/progress";
pub const COMPLETE_PATH: &str = "/api/enrich/complete";
pub const HEALTH_PATH: &str = "/health";

/// Lists of a few thousand profile URLs fit comfortably.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<EnrichmentService>,
}

impl AppState {
    pub fn new(service: Arc<EnrichmentService>) -> Self {
        Self { service }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            ENRICH_PATH,
            post(handlers::start_job_handler).get(handlers::poll_job_handler),
        )
        .route(PROGRESS_PATH, post(handlers::progress_handler))
        .route(COMPLETE_PATH, post(handlers::completion_handler))
        .route(HEALTH_PATH, get(handlers::health_handler))
        .layer(from_fn(request_tracing::request_tracing_middleware))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}
