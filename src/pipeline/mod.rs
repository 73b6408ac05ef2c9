//! Pipeline stages for batch PDF-to-image conversion.
//!
//! Each submodule implements exactly one step; the job runner in
//! [`crate::service`] sequences them and owns cancellation and progress.
//!
//! ## Data Flow
//!
//! ```text
//! fetch ──▶ count ──▶ render ──▶ archive
//! (reqwest)  (pdfium)  (pdfium)   (zip)
//! ```
//!
//! 1. [`fetch`]  : download every URL (timeout, redirects, single attempt)
//! 2. [`count`]  : parse each document and sum page counts
//! 3. [`render`] : rasterise page by page on the blocking pool and name
//!    each entry deterministically
//! 4. [`archive`]: deflate named entries into one zip blob

pub mod archive;
pub mod count;
pub mod fetch;
pub mod render;

use bytes::Bytes;

/// A downloaded source document.
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    /// URL as submitted.
    pub url: String,
    /// Unique base name used as the archive folder for this document.
    pub name: String,
    pub bytes: Bytes,
}
