//! Progress protocol for enrichment jobs.
//!
//! A job starts in `processing`, receives any number of progress reports from
//! the workflow runner and ends with exactly one completion report.

pub mod job_progress;

pub use job_progress::{
    compute_percentage, ApplyOutcome, CompletionReport, CompletionUpdate, EnrichmentStats,
    JobRecord, JobStatus, PipelineStep, ProgressReport, ProgressUpdate, FALLBACK_TOTAL,
};
