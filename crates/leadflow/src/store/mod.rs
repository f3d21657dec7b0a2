//! Job storage and eviction.

pub mod job_store;
pub mod sweeper;

pub use job_store::{JobStore, StoredJob};
pub use sweeper::ExpirySweeper;
