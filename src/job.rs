//! The job entity and its state machine.
//!
//! ```text
//! Pending ──▶ Running ──┬──▶ Completed   (archive set)
//!                       ├──▶ Failed      (error message set)
//!                       └──▶ Cancelled   (nothing retained)
//! ```
//!
//! All mutable fields live behind one mutex so a status reader always sees a
//! consistent composite: `Completed` is never observable without its archive.
//! The lock is only held for the field update itself, never across I/O or
//! rasterisation. Cancellation is a [`CancellationToken`] handed to the
//! background task; requesting it does not touch the state lock.
//!
//! Reaching a terminal state is also broadcast on a `watch` channel so any
//! number of callers can await the outcome.

use crate::config::OutputFormat;
use bytes::Bytes;
use serde::Serialize;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// `true` for the three final states.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time copy of a job's observable fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSnapshot {
    pub id: Uuid,
    pub status: JobStatus,
    pub total_pages: usize,
    pub completed_pages: usize,
    pub cancel_requested: bool,
    pub error: Option<String>,
    pub has_archive: bool,
}

#[derive(Debug)]
struct JobState {
    status: JobStatus,
    total_pages: Option<usize>,
    completed_pages: usize,
    result_archive: Option<Bytes>,
    error_message: Option<String>,
}

/// One tracked batch conversion.
#[derive(Debug)]
pub struct Job {
    id: Uuid,
    input_urls: Vec<String>,
    output_format: OutputFormat,
    package_as_archive: bool,
    cancel: CancellationToken,
    state: Mutex<JobState>,
    finished: watch::Sender<bool>,
}

impl Job {
    /// Create a `Pending` job with a fresh random id.
    pub fn new(input_urls: Vec<String>, output_format: OutputFormat, package_as_archive: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            input_urls,
            output_format,
            package_as_archive,
            cancel: CancellationToken::new(),
            state: Mutex::new(JobState {
                status: JobStatus::Pending,
                total_pages: None,
                completed_pages: 0,
                result_archive: None,
                error_message: None,
            }),
            finished: watch::Sender::new(false),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn input_urls(&self) -> &[String] {
        &self.input_urls
    }

    pub fn output_format(&self) -> OutputFormat {
        self.output_format
    }

    pub fn package_as_archive(&self) -> bool {
        self.package_as_archive
    }

    fn lock(&self) -> MutexGuard<'_, JobState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Cancellation ─────────────────────────────────────────────────────

    /// Token handed to the background task for cooperative checks.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Raise the cancel flag. Idempotent; has no effect on a terminal job
    /// beyond setting the flag.
    pub fn request_cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }

    // ── Reads ────────────────────────────────────────────────────────────

    pub fn status(&self) -> JobStatus {
        self.lock().status
    }

    pub fn snapshot(&self) -> JobSnapshot {
        let state = self.lock();
        JobSnapshot {
            id: self.id,
            status: state.status,
            total_pages: state.total_pages.unwrap_or(0),
            completed_pages: state.completed_pages,
            cancel_requested: self.cancel.is_cancelled(),
            error: state.error_message.clone(),
            has_archive: state.result_archive.is_some(),
        }
    }

    /// The finished archive; `Some` only while `Completed`.
    pub fn archive(&self) -> Option<Bytes> {
        let state = self.lock();
        match state.status {
            JobStatus::Completed => state.result_archive.clone(),
            _ => None,
        }
    }

    // ── Transitions (background task only) ───────────────────────────────

    /// Pending → Running. Returns `false` if the job had already left Pending.
    pub fn start(&self) -> bool {
        let mut state = self.lock();
        if state.status != JobStatus::Pending {
            return false;
        }
        state.status = JobStatus::Running;
        true
    }

    /// Publish the total page count. Accepted once, while Running.
    pub fn set_total_pages(&self, total: usize) -> bool {
        let mut state = self.lock();
        if state.status != JobStatus::Running || state.total_pages.is_some() {
            warn!(job_id = %self.id, "ignoring repeated or late total_pages update");
            return false;
        }
        state.total_pages = Some(total);
        true
    }

    /// Count one rendered page. Returns the new completed count.
    ///
    /// Ignored outside Running or once the count has reached the total.
    pub fn record_page(&self) -> usize {
        let mut state = self.lock();
        if state.status != JobStatus::Running {
            return state.completed_pages;
        }
        if let Some(total) = state.total_pages {
            if state.completed_pages >= total {
                warn!(job_id = %self.id, total, "page count already at total");
                return state.completed_pages;
            }
        }
        state.completed_pages += 1;
        state.completed_pages
    }

    /// Running → Completed, storing the archive in the same critical section.
    pub fn complete(&self, archive: Bytes) -> bool {
        self.finish(JobStatus::Completed, |s| s.result_archive = Some(archive))
    }

    /// → Failed with a (sanitised) message.
    pub fn fail(&self, message: impl Into<String>) -> bool {
        let message = message.into();
        self.finish(JobStatus::Failed, |s| s.error_message = Some(message))
    }

    /// → Cancelled. No archive is retained.
    pub fn mark_cancelled(&self) -> bool {
        self.finish(JobStatus::Cancelled, |_| {})
    }

    fn finish(&self, to: JobStatus, apply: impl FnOnce(&mut JobState)) -> bool {
        let mut state = self.lock();
        if state.status.is_terminal() {
            warn!(job_id = %self.id, from = %state.status, to = %to, "rejected transition out of terminal state");
            return false;
        }
        apply(&mut state);
        state.status = to;
        drop(state);
        self.finished.send_replace(true);
        true
    }

    /// Resolve once the job has reached a terminal state.
    pub async fn finished(&self) {
        let mut rx = self.finished.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|done| *done).await;
    }
}
