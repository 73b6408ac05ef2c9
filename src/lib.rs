//! # edgequake-pdf2img
//!
//! Convert batches of remote PDF documents into page images, packaged as a
//! zip archive, behind an asynchronous job API.
//!
//! Rendering is the easy part (pdfium does it). This crate is about the job
//! around it: a submission becomes a tracked, cancellable unit of work with
//! well-defined state transitions, observable progress and clean failure
//! reporting, while status polls and cancel requests run concurrently with
//! the background worker.
//!
//! ## Pipeline Overview
//!
//! ```text
//! POST /convert ──▶ Job (Pending) ──▶ background task (Running)
//!                                      │
//!                                      ├─ 1. Fetch    download every URL (reqwest)
//!                                      ├─ 2. Count    open each PDF, publish totalPages
//!                                      ├─ 3. Render   page by page at 2× (pdfium, spawn_blocking)
//!                                      └─ 4. Archive  deflate entries into one zip
//!                                      │
//!                                      ▼
//!                          Completed │ Failed │ Cancelled
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2img::{create_router, AppState, ConversionService, ServiceConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServiceConfig::default();
//!     let addr = config.bind_addr;
//!     let service = Arc::new(ConversionService::with_defaults(config)?);
//!     let app = create_router(AppState::new(service));
//!     let listener = tokio::net::TcpListener::bind(addr).await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `server` | on      | Enables the `pdf2img-server` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod job;
pub mod pipeline;
pub mod progress;
pub mod registry;
pub mod server;
pub mod service;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{OutputFormat, ServiceConfig, ServiceConfigBuilder};
pub use error::{ApiError, Pdf2ImgError};
pub use job::{Job, JobSnapshot, JobStatus};
pub use pipeline::fetch::{Fetcher, HttpFetcher};
pub use pipeline::render::{PageSink, PdfiumEngine, RasterEngine};
pub use progress::{JobObserver, NoopObserver};
pub use registry::JobRegistry;
pub use server::{create_router, AppState};
pub use service::{ConversionService, JobRequest};
