//! Job progress records and the transitions the workflow runner drives.

use serde::{Deserialize, Serialize};

use crate::error::JobError;

/// Placeholder `total` for submissions whose size is unknown up front,
/// such as a single search URL that expands into many leads downstream.
pub const FALLBACK_TOTAL: u64 = 5000;

/// Stage of the external enrichment workflow.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStep {
    Scraping,
    #[serde(alias = "prospeo_enrichment")]
    Enrichment,
    #[serde(alias = "reoon_verification")]
    Verification,
    Filtering,
}

impl std::fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineStep::Scraping => write!(f, "Scraping"),
            PipelineStep::Enrichment => write!(f, "Enriching"),
            PipelineStep::Verification => write!(f, "Verifying"),
            PipelineStep::Filtering => write!(f, "Filtering"),
        }
    }
}

/// Status of a job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Processing,
    Complete,
    Error,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Error)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Complete => write!(f, "complete"),
            JobStatus::Error => write!(f, "error"),
        }
    }
}

/// Summary the runner reports once the result file is ready.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentStats {
    pub deliverable: u64,
    pub invalid: u64,
    /// Percentage of deliverable leads, 0-100.
    pub success_rate: u32,
}

/// Progress of one enrichment job as seen by the poller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    /// Unique job identifier.
    pub job_id: String,
    /// Overall job status.
    pub status: JobStatus,
    /// Current workflow stage.
    pub step: PipelineStep,
    /// Items finished so far.
    pub processed: u64,
    /// Expected item count.
    pub total: u64,
    /// Completion percentage, 0-100.
    pub percentage: u8,
    /// Result file location (set on completion).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    /// Deliverability summary (set on completion).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<EnrichmentStats>,
    /// Error message (set on failure).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of applying an update to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The record moved as requested.
    Applied,
    /// The record was already terminal and the update was dropped.
    IgnoredTerminal,
    /// The record was already terminal and the terminal patch was written again.
    ReappliedTerminal,
}

impl JobRecord {
    /// Creates the initial record for a freshly triggered job.
    pub fn new(job_id: &str, total: u64) -> Self {
        Self {
            job_id: job_id.to_string(),
            status: JobStatus::Processing,
            step: PipelineStep::Scraping,
            processed: 0,
            total,
            percentage: 0,
            download_url: None,
            stats: None,
            error: None,
        }
    }

    /// Returns true if this job is finished (complete or error).
    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    /// Applies an incremental progress report.
    ///
    /// Reports for a finished job are dropped; there is no way back to
    /// `processing`.
    pub fn apply_progress(&mut self, update: &ProgressUpdate) -> ApplyOutcome {
        if self.is_finished() {
            return ApplyOutcome::IgnoredTerminal;
        }

        if let Some(step) = update.step {
            self.step = step;
        }
        if let Some(processed) = update.processed {
            self.processed = processed;
        }
        if let Some(total) = update.total {
            self.total = total;
        }
        if let (Some(processed), Some(total)) = (update.processed, update.total) {
            // total == 0 is rejected by `ProgressUpdate::validate`
            if let Ok(percentage) = compute_percentage(processed, total) {
                self.percentage = percentage;
            }
        }

        if let Some(error) = &update.error {
            self.status = JobStatus::Error;
            self.error = Some(error.clone());
        }

        ApplyOutcome::Applied
    }

    /// Applies the terminal report.
    ///
    /// Unlike progress, a repeated completion is written again (last write wins).
    pub fn apply_completion(&mut self, update: &CompletionUpdate) -> ApplyOutcome {
        let outcome = if self.is_finished() {
            ApplyOutcome::ReappliedTerminal
        } else {
            ApplyOutcome::Applied
        };

        match &update.error {
            Some(error) => {
                self.status = JobStatus::Error;
                self.error = Some(error.clone());
                self.download_url = None;
                self.stats = None;
            }
            None => {
                self.status = JobStatus::Complete;
                self.percentage = 100;
                self.error = None;
                if update.download_url.is_some() {
                    self.download_url = update.download_url.clone();
                }
                if update.stats.is_some() {
                    self.stats = update.stats.clone();
                }
            }
        }

        outcome
    }
}

/// `round(processed / total * 100)`, rounding half up and capped at 100.
pub fn compute_percentage(processed: u64, total: u64) -> Result<u8, JobError> {
    if total == 0 {
        return Err(JobError::invalid("total must be greater than zero"));
    }
    let processed = processed as u128;
    let total = total as u128;
    let rounded = (processed * 100 + total / 2) / total;
    Ok(rounded.min(100) as u8)
}

/// Incremental progress reported by the workflow runner.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub step: Option<PipelineStep>,
    pub processed: Option<u64>,
    pub total: Option<u64>,
    pub error: Option<String>,
}

impl ProgressUpdate {
    pub fn validate(&self) -> Result<(), JobError> {
        if self.total == Some(0) {
            return Err(JobError::invalid("total must be greater than zero"));
        }
        Ok(())
    }
}

/// Terminal report from the workflow runner.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionUpdate {
    pub download_url: Option<String>,
    pub stats: Option<EnrichmentStats>,
    pub error: Option<String>,
}

/// Body of a progress callback.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressReport {
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub step: Option<PipelineStep>,
    #[serde(default)]
    pub processed: Option<u64>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ProgressReport {
    /// Splits the report into its job id and the update to apply.
    pub fn into_parts(self) -> Result<(String, ProgressUpdate), JobError> {
        let job_id = require_job_id(self.job_id)?;
        let update = ProgressUpdate {
            step: self.step,
            processed: self.processed,
            total: self.total,
            error: non_empty(self.error),
        };
        update.validate()?;
        Ok((job_id, update))
    }
}

/// Body of a completion callback.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionReport {
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub stats: Option<EnrichmentStats>,
    #[serde(default)]
    pub error: Option<String>,
}

impl CompletionReport {
    pub fn into_parts(self) -> Result<(String, CompletionUpdate), JobError> {
        let job_id = require_job_id(self.job_id)?;
        let update = CompletionUpdate {
            download_url: self.download_url,
            stats: self.stats,
            error: non_empty(self.error),
        };
        Ok((job_id, update))
    }
}

fn require_job_id(job_id: Option<String>) -> Result<String, JobError> {
    match job_id {
        Some(id) if !id.trim().is_empty() => Ok(id),
        _ => Err(JobError::job_id_required()),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}
