//! Job lifecycle operations behind the HTTP endpoints.
//!
//! Submission is a two-phase protocol: the runner trigger is awaited first and
//! only an accepted trigger creates a job. After that the runner drives the job
//! through the progress and completion callbacks.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{info_span, Instrument};
use uuid::Uuid;

use crate::error::JobError;
use crate::progress::{
    ApplyOutcome, CompletionReport, JobRecord, ProgressReport, FALLBACK_TOTAL,
};
use crate::runner::{EnrichmentPayload, EnrichmentSource, TriggerRequest, WorkflowRunner};
use crate::secrets::ApiKeys;
use crate::store::JobStore;

/// Body of a new enrichment submission.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentRequest {
    #[serde(default)]
    pub source: Option<EnrichmentSource>,
    #[serde(default)]
    pub data: Option<EnrichmentPayload>,
    #[serde(default)]
    pub use_free_credit: Option<bool>,
    /// Address the runner notifies when the result is ready.
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub api_keys: Option<ApiKeys>,
}

pub struct EnrichmentService {
    store: Arc<JobStore>,
    runner: Arc<dyn WorkflowRunner>,
    free_tier_keys: ApiKeys,
}

impl EnrichmentService {
    pub fn new(store: Arc<JobStore>, runner: Arc<dyn WorkflowRunner>, free_tier_keys: ApiKeys) -> Self {
        Self {
            store,
            runner,
            free_tier_keys,
        }
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    /// Validates a submission, triggers the runner and seeds the job.
    ///
    /// Returns the new job id. On `UpstreamTriggerFailed` no job exists.
    pub async fn start_job(&self, request: EnrichmentRequest) -> Result<String, JobError> {
        let data = match request.data {
            Some(data) if !data.is_empty() => data,
            _ => return Err(JobError::invalid("No data provided")),
        };

        let use_free_credit = request.use_free_credit.unwrap_or(false);
        let api_keys = if use_free_credit {
            self.free_tier_keys.duplicate()
        } else {
            request
                .api_keys
                .ok_or_else(|| JobError::invalid("API keys required for paid tier"))?
        };
        let source = request
            .source
            .ok_or_else(|| JobError::invalid("Source is required"))?;

        let job_id = Uuid::new_v4().to_string();
        let total = data.item_count().unwrap_or(FALLBACK_TOTAL);
        let trigger = TriggerRequest {
            job_id: job_id.clone(),
            source,
            data,
            api_keys,
            email: request.email.filter(|e| !e.trim().is_empty()),
            use_free_credit,
        };

        let span = info_span!("enrich.start", job_id = %job_id, source = %trigger.source);
        async {
            if let Err(e) = self.runner.trigger(&trigger).await {
                log::error!("Workflow trigger for job {} failed: {}", job_id, e);
                return Err(JobError::UpstreamTriggerFailed(e.to_string()));
            }

            self.store.create(&job_id, JobRecord::new(&job_id, total))?;
            log::info!(
                "Started job {} ({}, total {}, free tier: {})",
                job_id,
                trigger.source,
                total,
                use_free_credit
            );
            Ok::<_, JobError>(job_id.clone())
        }
        .instrument(span)
        .await
    }

    /// Applies a progress callback from the runner.
    pub fn record_progress(&self, report: ProgressReport) -> Result<JobRecord, JobError> {
        let (job_id, update) = report.into_parts()?;
        let _span = info_span!("enrich.progress", job_id = %job_id).entered();

        let (outcome, record) = self
            .store
            .update(&job_id, |job| job.apply_progress(&update))
            .inspect_err(|_| log::warn!("Progress callback for unknown job {}", job_id))?;

        match (outcome, &update.error) {
            (ApplyOutcome::IgnoredTerminal, _) => log::warn!(
                "Ignoring progress for job {} which is already {}",
                job_id,
                record.status
            ),
            (_, Some(error)) => {
                log::warn!("Job {} failed during {}: {}", job_id, record.step, error)
            }
            (_, None) => log::debug!(
                "Job {}: {} {}/{} ({}%)",
                job_id,
                record.step,
                record.processed,
                record.total,
                record.percentage
            ),
        }

        Ok(record)
    }

    /// Applies the completion callback from the runner.
    pub fn record_completion(&self, report: CompletionReport) -> Result<JobRecord, JobError> {
        let (job_id, update) = report.into_parts()?;
        let _span = info_span!("enrich.complete", job_id = %job_id).entered();

        let (outcome, record) = self
            .store
            .update(&job_id, |job| job.apply_completion(&update))
            .inspect_err(|_| log::warn!("Completion callback for unknown job {}", job_id))?;

        if outcome == ApplyOutcome::ReappliedTerminal {
            log::warn!("Duplicate completion for job {}, overwriting", job_id);
        }
        match &record.error {
            Some(error) => log::warn!("Job {} finished with error: {}", job_id, error),
            None => log::info!("Job {} complete", job_id),
        }

        Ok(record)
    }

    /// Looks up a job for the poller.
    pub fn poll(&self, job_id: Option<&str>) -> Result<JobRecord, JobError> {
        let job_id = job_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(JobError::job_id_required)?;
        self.store.get(job_id).ok_or_else(JobError::job_not_found)
    }
}
