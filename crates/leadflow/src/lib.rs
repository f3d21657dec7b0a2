pub mod config;
pub mod error;
pub mod http;
pub mod poller;
pub mod progress;
pub mod runner;
pub mod secrets;
pub mod service;
pub mod store;

pub use config::{load_config, load_config_from_str, ServerConfig, MAX_FREE_CREDITS};
pub use error::{ConfigError, JobError, LeadflowError};
pub use http::{build_router, ApiError, AppState};
pub use poller::{JobPoller, PollError};
pub use progress::{
    CompletionReport, EnrichmentStats, JobRecord, JobStatus, PipelineStep, ProgressReport,
};
pub use runner::{
    EnrichmentPayload, EnrichmentSource, RunnerError, TriggerRequest, WebhookRunner,
    WorkflowRunner,
};
pub use secrets::{ApiKeys, FreeTierKeySources, SecretError, SecretSource};
pub use service::{EnrichmentRequest, EnrichmentService};
pub use store::{ExpirySweeper, JobStore, StoredJob};
