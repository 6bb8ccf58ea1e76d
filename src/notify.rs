//! Job completion notifications.
//!
//! Jobs run detached from the HTTP request that triggered them, so their
//! outcome is pushed through a [`NotificationDispatcher`] at completion. The
//! default dispatcher emits structured log events; alternate channels plug in
//! behind the same trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use tracing::{error, info};

use crate::sync::{JobKind, SyncRunResult};

/// Completion report for one finished job.
#[derive(Debug, Clone)]
pub struct JobResult {
    pub kind: JobKind,
    pub result: SyncRunResult,
    pub finished_at: DateTime<Utc>,
}

impl JobResult {
    pub fn new(kind: JobKind, result: SyncRunResult) -> Self {
        Self {
            kind,
            result,
            finished_at: Utc::now(),
        }
    }

    /// One-line summary for notification channels.
    pub fn summary(&self) -> String {
        if self.result.success {
            format!(
                "{} completed: {} changes in {:.1}s",
                self.kind, self.result.total_changes, self.result.duration_seconds
            )
        } else {
            format!(
                "{} finished with {} error(s): {} changes in {:.1}s",
                self.kind,
                self.result.errors.len(),
                self.result.total_changes,
                self.result.duration_seconds
            )
        }
    }
}

/// Sink for job completion reports.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(&self, result: &JobResult);
}

/// Dispatcher that reports outcomes as structured log events.
pub struct TracingDispatcher;

#[async_trait]
impl NotificationDispatcher for TracingDispatcher {
    async fn dispatch(&self, result: &JobResult) {
        let status = if result.result.success { "success" } else { "failure" };
        counter!("sync_jobs_total", "kind" => result.kind.to_string(), "status" => status)
            .increment(1);

        if result.result.success {
            info!(
                job = %result.kind,
                total_changes = result.result.total_changes,
                duration_seconds = result.result.duration_seconds,
                "{}",
                result.summary()
            );
        } else {
            error!(
                job = %result.kind,
                total_changes = result.result.total_changes,
                errors = ?result.result.errors,
                duration_seconds = result.result.duration_seconds,
                "{}",
                result.summary()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_distinguishes_success_from_failure() {
        let ok = JobResult::new(
            JobKind::IncrementalSync,
            SyncRunResult {
                success: true,
                total_changes: 12,
                duration_seconds: 3.5,
                ..Default::default()
            },
        );
        assert!(ok.summary().contains("completed"));
        assert!(ok.summary().contains("12 changes"));

        let failed = JobResult::new(
            JobKind::HistoricalBackfill,
            SyncRunResult {
                success: false,
                errors: vec!["chunk 2: timeout".into()],
                ..Default::default()
            },
        );
        assert!(failed.summary().contains("1 error(s)"));
    }
}
