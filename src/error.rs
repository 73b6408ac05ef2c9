//! Error types for the edgequake-pdf2img library.
//!
//! Two distinct error types reflect two distinct failure surfaces:
//!
//! * [`Pdf2ImgError`]: **Job-fatal**: something inside a job's background
//!   pipeline (download, page count, rasterisation, packaging) failed. The
//!   runner catches it, records a sanitised summary on the job and moves the
//!   job to `Failed`. It never reaches the request path or other jobs.
//!
//! * [`ApiError`]: **Request-boundary**: the caller asked for something that
//!   cannot be served (unknown task id, archive not ready, malformed
//!   submission). Returned directly to the client; nothing is retried.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Upper bound on the length of an error summary stored on a job.
pub const MAX_ERROR_MESSAGE_LEN: usize = 512;

/// All job-fatal errors raised by the conversion pipeline.
#[derive(Debug, Error)]
pub enum Pdf2ImgError {
    // ── Fetch errors ──────────────────────────────────────────────────────
    /// Transport failure or non-success HTTP status.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Document errors ───────────────────────────────────────────────────
    /// Bytes could not be parsed as a supported document.
    #[error("Document '{document}' is not a readable PDF: {detail}")]
    CorruptPdf { document: String, detail: String },

    /// The rasterisation engine failed on a specific page (1-indexed).
    #[error("Rasterisation failed for '{document}' page {page}: {detail}")]
    RasterisationFailed {
        document: String,
        page: usize,
        detail: String,
    },

    // ── Packaging errors ──────────────────────────────────────────────────
    /// Writing the zip container failed.
    #[error("Archive packaging failed: {0}")]
    ArchiveFailed(String),

    // ── Liveness ──────────────────────────────────────────────────────────
    /// The job ran past its configured wall-clock limit.
    #[error("Job exceeded its time limit of {secs}s")]
    JobTimeout { secs: u64 },

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy."
    )]
    PdfiumBindingFailed(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (e.g. a blocking render task panicked).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<zip::result::ZipError> for Pdf2ImgError {
    fn from(e: zip::result::ZipError) -> Self {
        Pdf2ImgError::ArchiveFailed(e.to_string())
    }
}

/// Errors surfaced to the client at the status/cancel/download boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// No job is registered under this id.
    #[error("task '{task_id}' not found")]
    NotFound { task_id: String },

    /// The job exists but has no archive to hand out (yet, or ever).
    #[error("task '{task_id}' is not ready for download")]
    NotReady { task_id: String },

    /// The submission failed validation.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Collapse whitespace (including the multi-line hints some errors carry)
/// and cap the length so the summary is safe to hand out over the status API.
pub fn sanitize_message(raw: &str) -> String {
    let collapsed = WHITESPACE_RUN.replace_all(raw.trim(), " ");
    if collapsed.chars().count() <= MAX_ERROR_MESSAGE_LEN {
        return collapsed.into_owned();
    }
    let mut out: String = collapsed.chars().take(MAX_ERROR_MESSAGE_LEN - 1).collect();
    out.push('\u{2026}');
    out
}
