//! In-memory job store.
//!
//! Records live for the lifetime of the process, or until the expiry sweeper
//! evicts them. Losing them on restart is acceptable: the runner's callbacks
//! for an unknown id fail with `NotFound`.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Duration, Utc};

use crate::error::JobError;
use crate::progress::{JobRecord, JobStatus};

/// A record plus the bookkeeping the store needs for eviction.
#[derive(Debug, Clone)]
pub struct StoredJob {
    pub record: JobRecord,
    /// When the job was created.
    pub created_at: DateTime<Utc>,
    /// Last time a callback touched the job.
    pub updated_at: DateTime<Utc>,
}

impl StoredJob {
    fn new(record: JobRecord, now: DateTime<Utc>) -> Self {
        Self {
            record,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Process-wide job store.
///
/// A single `RwLock` guards the whole map. `update` holds the write lock for
/// the full read-modify-write, so concurrent callbacks for one job never lose
/// each other's changes.
pub struct JobStore {
    jobs: RwLock<HashMap<String, StoredJob>>,
}

impl JobStore {
    /// Creates an empty job store.
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, StoredJob>> {
        match self.jobs.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, StoredJob>> {
        match self.jobs.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Inserts a new job. Fails if the id is already taken.
    pub fn create(&self, job_id: &str, initial: JobRecord) -> Result<(), JobError> {
        let mut jobs = self.write();
        if jobs.contains_key(job_id) {
            return Err(JobError::Internal(format!("duplicate job id {}", job_id)));
        }
        jobs.insert(job_id.to_string(), StoredJob::new(initial, Utc::now()));
        Ok(())
    }

    /// Returns a copy of the job's current record.
    pub fn get(&self, job_id: &str) -> Option<JobRecord> {
        self.read().get(job_id).map(|job| job.record.clone())
    }

    #[cfg(test)]
    fn get_stored(&self, job_id: &str) -> Option<StoredJob> {
        self.read().get(job_id).cloned()
    }

    /// Patches an existing job in place and returns the patch result and the
    /// updated record.
    ///
    /// Never inserts: an unknown id yields `NotFound`.
    pub fn update<T, F>(&self, job_id: &str, patch: F) -> Result<(T, JobRecord), JobError>
    where
        F: FnOnce(&mut JobRecord) -> T,
    {
        let mut jobs = self.write();
        let job = jobs.get_mut(job_id).ok_or_else(JobError::job_not_found)?;
        let result = patch(&mut job.record);
        job.updated_at = Utc::now();
        Ok((result, job.record.clone()))
    }

    /// Removes a job. Returns whether it existed.
    pub fn delete(&self, job_id: &str) -> bool {
        self.write().remove(job_id).is_some()
    }

    /// Drops every job.
    pub fn clear(&self) {
        self.write().clear();
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Returns the count of jobs by status: (processing, complete, error).
    pub fn counts(&self) -> (usize, usize, usize) {
        let jobs = self.read();
        let mut processing = 0;
        let mut complete = 0;
        let mut error = 0;

        for job in jobs.values() {
            match job.record.status {
                JobStatus::Processing => processing += 1,
                JobStatus::Complete => complete += 1,
                JobStatus::Error => error += 1,
            }
        }

        (processing, complete, error)
    }

    /// Evicts jobs not touched for longer than `ttl`. Returns the number removed.
    pub fn evict_expired(&self, ttl: Duration, now: DateTime<Utc>) -> usize {
        let mut jobs = self.write();
        let before = jobs.len();
        jobs.retain(|_, job| now - job.updated_at <= ttl);
        before - jobs.len()
    }
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}
