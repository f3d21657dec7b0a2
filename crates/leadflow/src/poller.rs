//! Client side of the progress protocol.
//!
//! Polls the job endpoint until the job reaches a terminal state. Stopping the
//! poller does not stop the workflow; the runner keeps going and the job can
//! still be polled later.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

use crate::http::ENRICH_PATH;
use crate::progress::{JobRecord, JobStatus};

/// Poll interval used by the browser UI.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum PollError {
    /// The job itself reported an error.
    #[error("{0}")]
    JobFailed(String),

    /// The poll endpoint answered with a non-success status.
    #[error("Failed to fetch progress ({status}): {message}")]
    Http { status: u16, message: String },

    #[error("Failed to poll progress: {0}")]
    Transport(String),

    #[error("Gave up after {attempts} polls")]
    GaveUp { attempts: u32 },

    #[error("Failed to create HTTP client: {0}")]
    Client(String),
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

pub struct JobPoller {
    client: Client,
    base_url: String,
    interval: Duration,
    max_attempts: Option<u32>,
}

impl JobPoller {
    /// Creates a poller for the service at `base_url` (e.g. `http://127.0.0.1:3000`).
    pub fn new(base_url: &str) -> Result<Self, PollError> {
        let client = Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PollError::Client(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: None,
        })
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Limits the number of polls before giving up.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Fetches the job's current record once.
    pub async fn fetch(&self, job_id: &str) -> Result<JobRecord, PollError> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, ENRICH_PATH))
            .query(&[("jobId", job_id)])
            .send()
            .await
            .map_err(|e| PollError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .map(|body| body.error)
                .unwrap_or_else(|_| "Failed to fetch progress".to_string());
            return Err(PollError::Http {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<JobRecord>()
            .await
            .map_err(|e| PollError::Transport(e.to_string()))
    }

    /// Polls until the job completes.
    ///
    /// `on_progress` sees every record fetched, including the final one. An
    /// error-status job and any failed poll both end the loop with an error.
    pub async fn wait_for_completion<F>(
        &self,
        job_id: &str,
        mut on_progress: F,
    ) -> Result<JobRecord, PollError>
    where
        F: FnMut(&JobRecord),
    {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let record = self.fetch(job_id).await?;
            on_progress(&record);

            match record.status {
                JobStatus::Complete => return Ok(record),
                JobStatus::Error => {
                    return Err(PollError::JobFailed(
                        record
                            .error
                            .unwrap_or_else(|| "Unknown error occurred".to_string()),
                    ))
                }
                JobStatus::Processing => {}
            }

            if self.max_attempts.is_some_and(|max| attempts >= max) {
                return Err(PollError::GaveUp { attempts });
            }
            tokio::time::sleep(self.interval).await;
        }
    }
}
