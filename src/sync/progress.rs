//! In-process job progress tracking and single-flight enforcement.
//!
//! One [`ProgressTracker`] exists per [`JobKind`]. Starting a job claims the
//! tracker via [`ProgressTracker::try_start`]; the returned [`JobGuard`] is
//! the only handle that can mutate progress, and dropping it marks the job
//! finished. Readers get cloned snapshots and never block a running job.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use crate::error::SyncError;
use crate::sync::JobKind;

#[derive(Debug, Clone)]
struct JobProgress {
    started_at: DateTime<Utc>,
    total_chunks: u64,
    completed_chunks: u64,
    current_chunk_info: Option<String>,
    total_records_synced: u64,
    errors: Vec<String>,
}

/// Point-in-time view of a tracker, safe to serialize into API responses.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ProgressSnapshot {
    /// Whether a job of this kind is currently running
    pub is_running: bool,
    /// Kind of the running job, when one is active
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_kind: Option<JobKind>,
    /// Total units of work the job announced
    pub total_chunks: u64,
    /// Units of work finished successfully; failed units show up in `errors`
    pub completed_chunks: u64,
    /// Completion percentage in `[0, 100]`
    pub progress_percentage: f64,
    /// Human-readable description of the unit currently in flight
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_chunk_info: Option<String>,
    /// Records written so far
    pub total_records_synced: u64,
    /// Errors recorded so far; the job keeps running past these
    pub errors: Vec<String>,
    /// Start time of the running job
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// Linear extrapolation of the finish time from chunk throughput
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_completion: Option<DateTime<Utc>>,
}

/// Progress state for one job kind.
#[derive(Debug)]
pub struct ProgressTracker {
    kind: JobKind,
    inner: Mutex<Option<JobProgress>>,
}

impl ProgressTracker {
    pub fn new(kind: JobKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            inner: Mutex::new(None),
        })
    }

    /// Claim the tracker for a new run.
    ///
    /// Fails with [`SyncError::JobAlreadyRunning`] while a previous guard is
    /// alive, which is what makes concurrent trigger requests observable as
    /// HTTP 409 without mutating any state.
    pub fn try_start(self: &Arc<Self>) -> Result<JobGuard, SyncError> {
        let mut inner = self.inner.lock().expect("progress lock poisoned");
        if inner.is_some() {
            return Err(SyncError::JobAlreadyRunning(self.kind));
        }
        *inner = Some(JobProgress {
            started_at: Utc::now(),
            total_chunks: 0,
            completed_chunks: 0,
            current_chunk_info: None,
            total_records_synced: 0,
            errors: Vec::new(),
        });
        info!(job = %self.kind, "Job started");
        Ok(JobGuard {
            tracker: Arc::clone(self),
        })
    }

    /// Current state, idle defaults when no job is running.
    pub fn snapshot(&self) -> ProgressSnapshot {
        let inner = self.inner.lock().expect("progress lock poisoned");
        match inner.as_ref() {
            None => ProgressSnapshot::default(),
            Some(progress) => {
                let percentage = if progress.total_chunks == 0 {
                    0.0
                } else {
                    progress.completed_chunks as f64 / progress.total_chunks as f64 * 100.0
                };
                let estimated_completion = if progress.completed_chunks > 0
                    && progress.completed_chunks < progress.total_chunks
                {
                    let elapsed = Utc::now() - progress.started_at;
                    let per_chunk = elapsed / progress.completed_chunks as i32;
                    Some(progress.started_at + per_chunk * progress.total_chunks as i32)
                } else {
                    None
                };
                ProgressSnapshot {
                    is_running: true,
                    job_kind: Some(self.kind),
                    total_chunks: progress.total_chunks,
                    completed_chunks: progress.completed_chunks,
                    progress_percentage: percentage,
                    current_chunk_info: progress.current_chunk_info.clone(),
                    total_records_synced: progress.total_records_synced,
                    errors: progress.errors.clone(),
                    started_at: Some(progress.started_at),
                    estimated_completion,
                }
            }
        }
    }

    fn update(&self, f: impl FnOnce(&mut JobProgress)) {
        let mut inner = self.inner.lock().expect("progress lock poisoned");
        if let Some(progress) = inner.as_mut() {
            f(progress);
        }
    }
}

/// Exclusive handle on a running job's progress.
///
/// Dropping the guard releases the tracker so the next trigger succeeds,
/// whether the job finished cleanly or panicked out of its task.
#[derive(Debug)]
pub struct JobGuard {
    tracker: Arc<ProgressTracker>,
}

impl JobGuard {
    pub fn kind(&self) -> JobKind {
        self.tracker.kind
    }

    /// Announce how many units of work the job will process.
    pub fn set_total_chunks(&self, total: u64) {
        self.tracker.update(|p| p.total_chunks = total);
    }

    /// Mark a new unit of work as in flight.
    pub fn start_chunk(&self, info: String) {
        self.tracker.update(|p| p.current_chunk_info = Some(info));
    }

    /// Mark the in-flight unit successfully finished.
    pub fn complete_chunk(&self) {
        self.tracker.update(|p| {
            p.completed_chunks += 1;
            p.current_chunk_info = None;
        });
    }

    /// Add to the running record total.
    pub fn add_records(&self, count: u64) {
        self.tracker.update(|p| p.total_records_synced += count);
    }

    /// Record a non-fatal error; the job continues.
    pub fn record_error(&self, message: String) {
        self.tracker.update(|p| p.errors.push(message));
    }

    /// Mark the in-flight unit failed. It does not count as completed.
    pub fn fail_chunk(&self, message: String) {
        self.tracker.update(|p| {
            p.errors.push(message);
            p.current_chunk_info = None;
        });
    }
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        let mut inner = self.tracker.inner.lock().expect("progress lock poisoned");
        if let Some(progress) = inner.take() {
            info!(
                job = %self.tracker.kind,
                completed_chunks = progress.completed_chunks,
                total_records = progress.total_records_synced,
                errors = progress.errors.len(),
                "Job finished"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_start_is_rejected_while_guard_alive() {
        let tracker = ProgressTracker::new(JobKind::HistoricalBackfill);
        let guard = tracker.try_start().unwrap();

        let err = tracker.try_start().unwrap_err();
        assert!(matches!(
            err,
            SyncError::JobAlreadyRunning(JobKind::HistoricalBackfill)
        ));

        drop(guard);
        assert!(tracker.try_start().is_ok());
    }

    #[test]
    fn rejected_start_does_not_touch_progress() {
        let tracker = ProgressTracker::new(JobKind::IncrementalSync);
        let guard = tracker.try_start().unwrap();
        guard.set_total_chunks(4);
        guard.complete_chunk();

        let _ = tracker.try_start().unwrap_err();

        let snapshot = tracker.snapshot();
        assert!(snapshot.is_running);
        assert_eq!(snapshot.total_chunks, 4);
        assert_eq!(snapshot.completed_chunks, 1);
    }

    #[test]
    fn snapshot_reports_percentage_and_errors() {
        let tracker = ProgressTracker::new(JobKind::HistoricalBackfill);
        let guard = tracker.try_start().unwrap();
        guard.set_total_chunks(4);
        guard.start_chunk("2023-01-01 to 2023-01-31".into());
        guard.complete_chunk();
        guard.add_records(150);
        guard.record_error("chunk 2 failed".into());

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.progress_percentage, 25.0);
        assert_eq!(snapshot.total_records_synced, 150);
        assert_eq!(snapshot.errors, vec!["chunk 2 failed".to_string()]);
        assert!(snapshot.current_chunk_info.is_none());

        drop(guard);
        assert!(!tracker.snapshot().is_running);
    }
}
