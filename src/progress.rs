//! Observer trait for job lifecycle events.
//!
//! Inject an [`Arc<dyn JobObserver>`] via
//! [`crate::service::ConversionService::with_observer`] to receive events as
//! background jobs progress. Callbacks run inline on the job's task, after
//! the corresponding state update is already visible to status readers, so
//! they should return quickly.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdf2img::JobObserver;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use uuid::Uuid;
//!
//! #[derive(Default)]
//! struct PageCounter(AtomicUsize);
//!
//! impl JobObserver for PageCounter {
//!     fn on_page_complete(&self, _job: Uuid, _done: usize, _total: usize) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//! ```

use crate::job::JobStatus;
use std::sync::Arc;
use uuid::Uuid;

/// Called by the job runner as each job advances.
///
/// All methods default to no-ops.
pub trait JobObserver: Send + Sync {
    /// Page counting finished; `total_pages` has been published.
    fn on_job_start(&self, job_id: Uuid, total_pages: usize) {
        let _ = (job_id, total_pages);
    }

    /// One page was rendered, archived and counted.
    fn on_page_complete(&self, job_id: Uuid, completed_pages: usize, total_pages: usize) {
        let _ = (job_id, completed_pages, total_pages);
    }

    /// The job reached a terminal state.
    fn on_job_finished(&self, job_id: Uuid, status: JobStatus) {
        let _ = (job_id, status);
    }
}

/// Default observer.
pub struct NoopObserver;

impl JobObserver for NoopObserver {}

pub type SharedObserver = Arc<dyn JobObserver>;
