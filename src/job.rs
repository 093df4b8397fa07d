//! Job progress ledger: in-memory, bounded, shared between the bulk workers
//! and progress queries.
//!
//! Records are copy-on-write: readers hold cheap `Arc` snapshots while the
//! worker swaps in updated clones under a short write lock. Terminal records
//! are evicted after a TTL so an always-on process cannot grow without bound.

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Default maximum number of retained job records.
const DEFAULT_CAPACITY: usize = 1024;

/// Default retention for terminal (completed/failed) records.
const DEFAULT_TTL_SECS: i64 = 3600;

/// Lifecycle state of a bulk job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Accepted, worker not yet dispatching.
    Starting,
    /// Worker is iterating recipients.
    Sending,
    /// All recipients processed.
    Completed,
    /// Aborted by a fatal error or cancellation.
    Failed,
}

impl JobStatus {
    /// Terminal states are eligible for TTL eviction.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Per-recipient delivery outcome, appended as the worker progresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipientOutcome {
    /// Recipient address the message was sent to.
    pub email: String,
    /// Provider message id on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// Failure description on error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Suggested fix, when the error has a known remediation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
    /// When the attempt finished.
    pub timestamp: DateTime<Utc>,
}

impl RecipientOutcome {
    pub fn success(email: impl Into<String>, message_id: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            message_id: Some(message_id.into()),
            error: None,
            remediation: None,
            timestamp: Utc::now(),
        }
    }

    pub fn failure(
        email: impl Into<String>,
        error: impl Into<String>,
        remediation: Option<String>,
    ) -> Self {
        Self {
            email: email.into(),
            message_id: None,
            error: Some(error.into()),
            remediation,
            timestamp: Utc::now(),
        }
    }
}

/// Snapshot of one bulk job's progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    /// Engine-assigned job id.
    pub job_id: String,
    /// Opaque owner identity; progress queries must present the same value.
    pub owner_id: String,
    /// Total recipients in the job.
    pub total: usize,
    /// Count of successful sends so far.
    pub sent: usize,
    /// Count of failed sends so far.
    pub failed: usize,
    /// Address currently being processed, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<String>,
    /// Lifecycle state.
    pub status: JobStatus,
    /// Per-recipient outcomes in dispatch order.
    pub results: Vec<RecipientOutcome>,
    /// Job-level error, set when the job aborts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Job-level remediation hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
    /// When the job was accepted.
    pub started_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn new(job_id: impl Into<String>, owner_id: impl Into<String>, total: usize) -> Self {
        Self {
            job_id: job_id.into(),
            owner_id: owner_id.into(),
            total,
            sent: 0,
            failed: 0,
            current: None,
            status: JobStatus::Starting,
            results: Vec::new(),
            error: None,
            remediation: None,
            started_at: Utc::now(),
        }
    }
}

struct JobEntry {
    record: Arc<JobRecord>,
    cancelled: Arc<AtomicBool>,
}

/// Bounded in-memory store of job records.
pub struct JobLedger {
    jobs: RwLock<HashMap<String, JobEntry>>,
    capacity: usize,
    ttl: Duration,
}

impl Default for JobLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl JobLedger {
    pub fn new() -> Self {
        Self::with_limits(
            DEFAULT_CAPACITY,
            Duration::seconds(DEFAULT_TTL_SECS),
        )
    }

    /// Create a ledger with an explicit record cap and terminal-record TTL.
    pub fn with_limits(capacity: usize, ttl: Duration) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            capacity,
            ttl,
        }
    }

    /// Insert a new record, pruning expired and over-capacity entries first.
    pub fn insert(&self, record: JobRecord) {
        let mut jobs = self.jobs.write();
        Self::prune(&mut jobs, self.capacity, self.ttl);
        jobs.insert(
            record.job_id.clone(),
            JobEntry {
                record: Arc::new(record),
                cancelled: Arc::new(AtomicBool::new(false)),
            },
        );
    }

    /// Apply a mutation to a job's record, publishing a fresh snapshot.
    ///
    /// Returns false if the job is unknown (evicted or never inserted).
    pub fn update(&self, job_id: &str, mutate: impl FnOnce(&mut JobRecord)) -> bool {
        let mut jobs = self.jobs.write();
        match jobs.get_mut(job_id) {
            Some(entry) => {
                let mut record = (*entry.record).clone();
                mutate(&mut record);
                entry.record = Arc::new(record);
                true
            }
            None => false,
        }
    }

    /// Current snapshot of a job, if it is still retained.
    pub fn snapshot(&self, job_id: &str) -> Option<Arc<JobRecord>> {
        self.jobs.read().get(job_id).map(|e| Arc::clone(&e.record))
    }

    /// Request cancellation. The worker observes the flag between sends.
    /// Returns false if the job is unknown.
    pub fn cancel(&self, job_id: &str) -> bool {
        match self.jobs.read().get(job_id) {
            Some(entry) => {
                entry.cancelled.store(true, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    /// Whether cancellation has been requested for a job.
    pub fn is_cancelled(&self, job_id: &str) -> bool {
        self.jobs
            .read()
            .get(job_id)
            .map(|e| e.cancelled.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    /// Number of retained records.
    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }

    fn prune(jobs: &mut HashMap<String, JobEntry>, capacity: usize, ttl: Duration) {
        let now = Utc::now();
        jobs.retain(|_, entry| {
            !(entry.record.status.is_terminal() && now - entry.record.started_at > ttl)
        });

        // Still at capacity: evict the oldest terminal records. Running jobs
        // are never evicted.
        while jobs.len() >= capacity {
            let oldest = jobs
                .iter()
                .filter(|(_, e)| e.record.status.is_terminal())
                .min_by_key(|(_, e)| e.record.started_at)
                .map(|(id, _)| id.clone());
            match oldest {
                Some(id) => {
                    jobs.remove(&id);
                }
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_publishes_new_snapshot() {
        let ledger = JobLedger::new();
        ledger.insert(JobRecord::new("job-1", "owner", 3));

        let before = ledger.snapshot("job-1").unwrap();
        assert_eq!(before.sent, 0);

        assert!(ledger.update("job-1", |r| {
            r.sent += 1;
            r.status = JobStatus::Sending;
        }));

        // The earlier snapshot is unchanged; a fresh one sees the update.
        assert_eq!(before.sent, 0);
        let after = ledger.snapshot("job-1").unwrap();
        assert_eq!(after.sent, 1);
        assert_eq!(after.status, JobStatus::Sending);
    }

    #[test]
    fn unknown_job_update_returns_false() {
        let ledger = JobLedger::new();
        assert!(!ledger.update("missing", |_| {}));
        assert!(ledger.snapshot("missing").is_none());
        assert!(!ledger.cancel("missing"));
    }

    #[test]
    fn cancellation_flag_round_trips() {
        let ledger = JobLedger::new();
        ledger.insert(JobRecord::new("job-1", "owner", 1));
        assert!(!ledger.is_cancelled("job-1"));
        assert!(ledger.cancel("job-1"));
        assert!(ledger.is_cancelled("job-1"));
    }

    #[test]
    fn expired_terminal_records_are_pruned_on_insert() {
        let ledger = JobLedger::with_limits(16, Duration::seconds(0));
        let mut done = JobRecord::new("done", "owner", 1);
        done.status = JobStatus::Completed;
        done.started_at = Utc::now() - Duration::seconds(5);
        ledger.insert(done);

        let mut running = JobRecord::new("running", "owner", 1);
        running.status = JobStatus::Sending;
        running.started_at = Utc::now() - Duration::seconds(5);
        ledger.insert(running);

        ledger.insert(JobRecord::new("fresh", "owner", 1));
        assert!(ledger.snapshot("done").is_none());
        // Running jobs survive pruning regardless of age.
        assert!(ledger.snapshot("running").is_some());
        assert!(ledger.snapshot("fresh").is_some());
    }

    #[test]
    fn capacity_evicts_oldest_terminal_record() {
        let ledger = JobLedger::with_limits(2, Duration::hours(1));
        let mut old = JobRecord::new("old", "owner", 1);
        old.status = JobStatus::Completed;
        old.started_at = Utc::now() - Duration::minutes(10);
        ledger.insert(old);

        let mut newer = JobRecord::new("newer", "owner", 1);
        newer.status = JobStatus::Completed;
        ledger.insert(newer);

        ledger.insert(JobRecord::new("incoming", "owner", 1));
        assert!(ledger.snapshot("old").is_none());
        assert!(ledger.snapshot("newer").is_some());
        assert!(ledger.snapshot("incoming").is_some());
        assert_eq!(ledger.len(), 2);
    }
}
