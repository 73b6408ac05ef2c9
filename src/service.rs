//! Job orchestration: submission, status, cancellation, download and the
//! background runner.
//!
//! ## Why one task per job?
//!
//! Submission must return in near-constant time no matter how many URLs are
//! in the batch. Each job therefore gets its own Tokio task; the request path
//! only validates, registers and spawns. Status and cancel calls touch the
//! job's fields through short critical sections and never wait on the task.
//!
//! ## Cooperative cancellation
//!
//! The runner checks the job's [`CancellationToken`] before each fetch,
//! before each document's page loop and before each page render. A fetch or
//! render already in flight is allowed to finish first; partial output is
//! dropped and the job moves to `Cancelled`.
//!
//! Rendering, zip compression and progress updates for one document all run
//! on a single blocking-pool call through [`ArchiveSink`]; the page-level
//! checkpoint lives in the sink.

use crate::config::{OutputFormat, ServiceConfig};
use crate::error::{sanitize_message, ApiError, Pdf2ImgError};
use crate::job::{Job, JobSnapshot};
use crate::pipeline::archive::ArchiveBuilder;
use crate::pipeline::count::count_pages;
use crate::pipeline::fetch::{Fetcher, HttpFetcher};
use crate::pipeline::render::{
    self, entry_name, unique_base_names, PageSink, PdfiumEngine, RasterEngine,
};
use crate::pipeline::FetchedDocument;
use crate::progress::{NoopObserver, SharedObserver};
use crate::registry::JobRegistry;
use bytes::Bytes;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A validated-shape submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    pub input_urls: Vec<String>,
    pub output_format: OutputFormat,
    pub package_as_archive: bool,
}

impl JobRequest {
    pub fn new(input_urls: Vec<String>) -> Self {
        Self {
            input_urls,
            output_format: OutputFormat::default(),
            package_as_archive: true,
        }
    }
}

/// How a job's pipeline ended when it did not fail.
enum JobOutcome {
    Completed(Bytes),
    Cancelled,
}

/// Everything a background task needs, cloned out of the service.
#[derive(Clone)]
struct JobContext {
    config: ServiceConfig,
    fetcher: Arc<dyn Fetcher>,
    engine: Arc<dyn RasterEngine>,
    observer: SharedObserver,
}

/// Entry point for the status/cancel/download surface.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
pub struct ConversionService {
    config: ServiceConfig,
    registry: JobRegistry,
    fetcher: Arc<dyn Fetcher>,
    engine: Arc<dyn RasterEngine>,
    observer: SharedObserver,
}

impl ConversionService {
    /// Assemble a service from explicit collaborators.
    pub fn new(config: ServiceConfig, fetcher: Arc<dyn Fetcher>, engine: Arc<dyn RasterEngine>) -> Self {
        Self {
            config,
            registry: JobRegistry::new(),
            fetcher,
            engine,
            observer: Arc::new(NoopObserver),
        }
    }

    /// Production wiring: reqwest fetcher + pdfium engine.
    pub fn with_defaults(config: ServiceConfig) -> Result<Self, Pdf2ImgError> {
        let fetcher = HttpFetcher::new(config.download_timeout())?;
        Ok(Self::new(config, Arc::new(fetcher), Arc::new(PdfiumEngine::new())))
    }

    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Validate, register and launch a job. Returns immediately.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn submit(&self, request: JobRequest) -> Result<Uuid, ApiError> {
        self.validate(&request)?;
        if !request.package_as_archive {
            debug!("zip=false requested; results are still packaged as a zip archive");
        }

        let job = loop {
            let candidate = Arc::new(Job::new(
                request.input_urls.clone(),
                request.output_format,
                request.package_as_archive,
            ));
            if self.registry.insert(Arc::clone(&candidate)) {
                break candidate;
            }
        };
        let id = job.id();

        let ctx = JobContext {
            config: self.config.clone(),
            fetcher: Arc::clone(&self.fetcher),
            engine: Arc::clone(&self.engine),
            observer: Arc::clone(&self.observer),
        };
        let handle = tokio::spawn(run_job(job, ctx));
        self.registry.attach_handle(&id, handle);

        info!(
            job_id = %id,
            documents = request.input_urls.len(),
            format = %request.output_format,
            "Job submitted"
        );
        Ok(id)
    }

    fn validate(&self, request: &JobRequest) -> Result<(), ApiError> {
        if request.input_urls.is_empty() {
            return Err(ApiError::InvalidRequest("inputUrls must not be empty".into()));
        }
        if request.input_urls.len() > self.config.max_urls_per_job {
            return Err(ApiError::InvalidRequest(format!(
                "at most {} URLs per job, got {}",
                self.config.max_urls_per_job,
                request.input_urls.len()
            )));
        }
        for raw in &request.input_urls {
            let parsed = url::Url::parse(raw)
                .map_err(|e| ApiError::InvalidRequest(format!("invalid URL '{raw}': {e}")))?;
            if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
                return Err(ApiError::InvalidRequest(format!(
                    "invalid URL '{raw}': expected an absolute http(s) URL"
                )));
            }
        }
        Ok(())
    }

    fn lookup(&self, task_id: &str) -> Result<Arc<Job>, ApiError> {
        let not_found = || ApiError::NotFound {
            task_id: task_id.to_string(),
        };
        let id = Uuid::parse_str(task_id).map_err(|_| not_found())?;
        self.registry.get(&id).ok_or_else(not_found)
    }

    /// Pure read of the job's current fields.
    pub fn status(&self, task_id: &str) -> Result<JobSnapshot, ApiError> {
        Ok(self.lookup(task_id)?.snapshot())
    }

    /// Raise the cancel flag. Succeeds for any known id, in any state.
    pub fn cancel(&self, task_id: &str) -> Result<(), ApiError> {
        let job = self.lookup(task_id)?;
        if !job.cancel_requested() {
            info!(job_id = %job.id(), status = %job.status(), "Cancellation requested");
        }
        job.request_cancel();
        Ok(())
    }

    /// The finished archive, available only once the job is `Completed`.
    pub fn download(&self, task_id: &str) -> Result<Bytes, ApiError> {
        self.lookup(task_id)?.archive().ok_or_else(|| ApiError::NotReady {
            task_id: task_id.to_string(),
        })
    }

    /// Wait until the job is terminal and return its final snapshot.
    ///
    /// Any number of callers may wait on the same job. A task that ends
    /// abnormally (panic or abort) fails the job so no waiter hangs.
    pub async fn wait(&self, task_id: &str) -> Result<JobSnapshot, ApiError> {
        let job = self.lookup(task_id)?;
        if let Some(handle) = self.registry.take_handle(&job.id()) {
            if let Err(e) = handle.await {
                warn!(job_id = %job.id(), "Job task ended abnormally: {}", e);
                job.fail(sanitize_message(&format!(
                    "Internal error: job task ended abnormally: {e}"
                )));
            }
        }
        job.finished().await;
        Ok(job.snapshot())
    }

    /// Abort all in-flight job tasks. Used on server shutdown.
    pub fn shutdown(&self) -> usize {
        self.registry.abort_all()
    }
}

/// Background task body: Pending → Running → terminal.
async fn run_job(job: Arc<Job>, ctx: JobContext) {
    let id = job.id();
    if !job.start() {
        return;
    }
    let started = Instant::now();
    info!(job_id = %id, documents = job.input_urls().len(), "Job started");

    // Cancelled by the user (through the parent) or by the time limit.
    let stop = job.cancellation_token().child_token();
    let work = execute(&job, &stop, &ctx);
    let outcome = match ctx.config.job_timeout() {
        Some(limit) => match tokio::time::timeout(limit, work).await {
            Ok(result) => result,
            Err(_) => {
                stop.cancel();
                Err(Pdf2ImgError::JobTimeout {
                    secs: limit.as_secs(),
                })
            }
        },
        None => work.await,
    };

    match outcome {
        Ok(JobOutcome::Completed(archive)) => {
            let size = archive.len();
            job.complete(archive);
            info!(job_id = %id, bytes = size, "Archive ready");
        }
        Ok(JobOutcome::Cancelled) => {
            job.mark_cancelled();
            info!(job_id = %id, "Job cancelled at checkpoint");
        }
        Err(e) => {
            warn!(job_id = %id, error = %e, "Job failed");
            job.fail(sanitize_message(&e.to_string()));
        }
    }

    let snapshot = job.snapshot();
    info!(
        job_id = %id,
        status = %snapshot.status,
        completed = snapshot.completed_pages,
        total = snapshot.total_pages,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Job finished"
    );
    ctx.observer.on_job_finished(id, snapshot.status);
}

/// Fetch → count → render → archive, with cancellation checkpoints.
async fn execute(
    job: &Arc<Job>,
    cancel: &CancellationToken,
    ctx: &JobContext,
) -> Result<JobOutcome, Pdf2ImgError> {
    let id = job.id();

    // ── Step 1: Fetch ────────────────────────────────────────────────────
    let names = unique_base_names(job.input_urls().iter().map(String::as_str));
    let mut documents = Vec::with_capacity(names.len());
    for (url, name) in job.input_urls().iter().zip(names) {
        if cancel.is_cancelled() {
            return Ok(JobOutcome::Cancelled);
        }
        let bytes = ctx.fetcher.fetch(url).await?;
        documents.push(FetchedDocument {
            url: url.clone(),
            name,
            bytes,
        });
    }

    // ── Step 2: Count ────────────────────────────────────────────────────
    let counts = count_pages(&ctx.engine, &documents).await?;
    job.set_total_pages(counts.total);
    info!(job_id = %id, total_pages = counts.total, "Page count published");
    ctx.observer.on_job_start(id, counts.total);

    // ── Step 3: Render + archive ─────────────────────────────────────────
    let mut archive = ArchiveBuilder::new();
    for (doc, &pages) in documents.iter().zip(&counts.per_document) {
        if cancel.is_cancelled() {
            return Ok(JobOutcome::Cancelled);
        }
        let sink = ArchiveSink {
            job: Arc::clone(job),
            observer: Arc::clone(&ctx.observer),
            cancel: cancel.clone(),
            archive,
            name: doc.name.clone(),
            format: job.output_format(),
            pages,
            total: counts.total,
            written: 0,
            failure: None,
        };
        let sink = render::render_document(
            Arc::clone(&ctx.engine),
            doc,
            ctx.config.render_scale,
            job.output_format(),
            sink,
        )
        .await?;

        if let Some(e) = sink.failure {
            return Err(e);
        }
        if sink.written < pages {
            return Ok(JobOutcome::Cancelled);
        }
        archive = sink.archive;
    }

    // ── Step 4: Finish archive ───────────────────────────────────────────
    let bytes = tokio::task::spawn_blocking(move || archive.finish())
        .await
        .map_err(|e| Pdf2ImgError::Internal(format!("Archive task panicked: {}", e)))??;
    Ok(JobOutcome::Completed(bytes))
}

/// Per-document page consumer: compresses each page into the job's archive
/// and publishes progress, on the rendering thread.
struct ArchiveSink {
    job: Arc<Job>,
    observer: SharedObserver,
    cancel: CancellationToken,
    archive: ArchiveBuilder,
    name: String,
    format: OutputFormat,
    pages: usize,
    total: usize,
    written: usize,
    failure: Option<Pdf2ImgError>,
}

impl PageSink for ArchiveSink {
    fn accept(&mut self, index: usize, image: Vec<u8>) -> ControlFlow<()> {
        // Cancelled while this page was rendering: drop it.
        if self.cancel.is_cancelled() {
            return ControlFlow::Break(());
        }
        let entry = entry_name(&self.name, index, self.format);
        if let Err(e) = self.archive.add_entry(&entry, &image) {
            self.failure = Some(e);
            return ControlFlow::Break(());
        }
        self.written += 1;

        let id = self.job.id();
        let done = self.job.record_page();
        debug!(job_id = %id, "{}: page {}/{} ({} of {} overall)", self.name, index + 1, self.pages, done, self.total);
        self.observer.on_page_complete(id, done, self.total);

        // Checkpoint before the next page.
        if self.cancel.is_cancelled() {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }
}
