//! Page rasterisation and archive-entry naming.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async contexts.
//! Every engine call is moved onto Tokio's blocking pool so a long render
//! never stalls status or cancel requests for other jobs.
//!
//! A document is loaded once and its pages are rendered in order on a single
//! blocking call. Each encoded page is handed to a [`PageSink`], which runs on
//! the same blocking thread and decides whether the next page is rendered.
//!
//! ## Naming
//!
//! Entries are `{base}/page-{NNN}.{ext}`: `base` is the URL's final path
//! segment without its extension, `NNN` the 1-indexed page number within
//! that document, zero-padded to three digits. Leading dots are stripped
//! from `base` so no entry can resolve outside the extraction folder.

use crate::config::OutputFormat;
use crate::error::Pdf2ImgError;
use crate::pipeline::FetchedDocument;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::collections::HashSet;
use std::io::Cursor;
use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Base name used when a URL has no usable final path segment.
pub const FALLBACK_BASE_NAME: &str = "document";

/// Decodes documents and rasterises single pages.
///
/// Implementations are synchronous and may block; callers run them on the
/// blocking pool.
pub trait RasterEngine: Send + Sync {
    /// Parse `bytes` and return the number of pages.
    fn page_count(&self, document: &str, bytes: &[u8]) -> Result<usize, Pdf2ImgError>;

    /// Load the document once and rasterise its pages in order at `scale`×,
    /// handing each encoded page to `sink`. Stops as soon as the sink breaks.
    fn render_pages(
        &self,
        document: &str,
        bytes: &[u8],
        scale: f32,
        format: OutputFormat,
        sink: &mut dyn PageSink,
    ) -> Result<(), Pdf2ImgError>;
}

/// Receives rendered pages on the blocking thread.
pub trait PageSink: Send {
    /// Accept page `index` (0-based). `Break` stops rendering.
    fn accept(&mut self, index: usize, image: Vec<u8>) -> ControlFlow<()>;
}

/// [`RasterEngine`] backed by pdfium, bound through `pdfium-auto`.
///
/// pdfium keeps process-global state, so calls are serialised through an
/// internal mutex.
#[derive(Debug, Default)]
pub struct PdfiumEngine {
    guard: Mutex<()>,
}

impl PdfiumEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn bind() -> Result<Pdfium, Pdf2ImgError> {
        pdfium_auto::bind_pdfium_silent()
            .map_err(|e| Pdf2ImgError::PdfiumBindingFailed(e.to_string()))
    }
}

fn check_magic(document: &str, bytes: &[u8]) -> Result<(), Pdf2ImgError> {
    if bytes.len() < 4 || &bytes[..4] != b"%PDF" {
        let head: Vec<u8> = bytes.iter().take(4).copied().collect();
        return Err(Pdf2ImgError::CorruptPdf {
            document: document.to_string(),
            detail: format!("missing %PDF header, first bytes: {head:?}"),
        });
    }
    Ok(())
}

impl RasterEngine for PdfiumEngine {
    fn page_count(&self, document: &str, bytes: &[u8]) -> Result<usize, Pdf2ImgError> {
        check_magic(document, bytes)?;
        let _lock = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        let pdfium = Self::bind()?;

        let pdf = pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(|e| Pdf2ImgError::CorruptPdf {
                document: document.to_string(),
                detail: format!("{:?}", e),
            })?;

        let total = pdf.pages().len() as usize;
        debug!("'{}' has {} pages", document, total);
        Ok(total)
    }

    fn render_pages(
        &self,
        document: &str,
        bytes: &[u8],
        scale: f32,
        format: OutputFormat,
        sink: &mut dyn PageSink,
    ) -> Result<(), Pdf2ImgError> {
        check_magic(document, bytes)?;
        let _lock = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        let pdfium = Self::bind()?;

        let pdf = pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(|e| Pdf2ImgError::CorruptPdf {
                document: document.to_string(),
                detail: format!("{:?}", e),
            })?;

        let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);
        let pages = pdf.pages();
        for (index, page) in pages.iter().enumerate() {
            let raster_err = |detail: String| Pdf2ImgError::RasterisationFailed {
                document: document.to_string(),
                page: index + 1,
                detail,
            };

            let bitmap = page
                .render_with_config(&render_config)
                .map_err(|e| raster_err(format!("{:?}", e)))?;
            let image = bitmap.as_image();
            debug!(
                "Rendered '{}' page {} → {}x{} px",
                document,
                index + 1,
                image.width(),
                image.height()
            );

            let encoded = encode_image(&image, format)
                .map_err(|e| raster_err(format!("encoding failed: {e}")))?;
            if sink.accept(index, encoded).is_break() {
                debug!("'{}': stopped after page {}", document, index + 1);
                break;
            }
        }
        Ok(())
    }
}

/// Encode a rasterised page in the requested format.
///
/// JPEG has no alpha channel, so RGBA bitmaps are flattened to RGB first.
pub fn encode_image(img: &DynamicImage, format: OutputFormat) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    match format {
        OutputFormat::Png => img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?,
        OutputFormat::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8())
            .write_to(&mut Cursor::new(&mut buf), format.image_format())?,
    }
    Ok(buf)
}

/// Run [`RasterEngine::page_count`] on the blocking pool.
pub async fn page_count(
    engine: Arc<dyn RasterEngine>,
    doc: &FetchedDocument,
) -> Result<usize, Pdf2ImgError> {
    let name = doc.name.clone();
    let bytes = doc.bytes.clone();
    tokio::task::spawn_blocking(move || engine.page_count(&name, &bytes))
        .await
        .map_err(|e| Pdf2ImgError::Internal(format!("Page-count task panicked: {}", e)))?
}

/// Run [`RasterEngine::render_pages`] on the blocking pool and hand the
/// sink back once the document is done.
pub async fn render_document<S>(
    engine: Arc<dyn RasterEngine>,
    doc: &FetchedDocument,
    scale: f32,
    format: OutputFormat,
    mut sink: S,
) -> Result<S, Pdf2ImgError>
where
    S: PageSink + 'static,
{
    let name = doc.name.clone();
    let bytes = doc.bytes.clone();
    tokio::task::spawn_blocking(move || {
        engine
            .render_pages(&name, &bytes, scale, format, &mut sink)
            .map(|()| sink)
    })
    .await
    .map_err(|e| Pdf2ImgError::Internal(format!("Render task panicked: {}", e)))?
}

/// Derive a document base name from the URL's final path segment.
pub fn document_base_name(url: &str) -> String {
    let segment = url::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut s| s.next_back().map(str::to_string))
        })
        .unwrap_or_default();

    let stem = match segment.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => segment.as_str(),
    };

    let cleaned: String = stem
        .trim_start_matches('.')
        .chars()
        .map(|c| if c == '\\' || c.is_control() { '_' } else { c })
        .collect();

    if cleaned.is_empty() {
        FALLBACK_BASE_NAME.to_string()
    } else {
        cleaned
    }
}

/// Base names for a batch, in order, with `-2`, `-3`, … appended to repeats
/// so that archive entries never collide.
pub fn unique_base_names<'a>(urls: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut used: HashSet<String> = HashSet::new();
    let mut out = Vec::new();
    for url in urls {
        let base = document_base_name(url);
        let mut candidate = base.clone();
        let mut n = 1;
        while used.contains(&candidate) {
            n += 1;
            candidate = format!("{base}-{n}");
        }
        used.insert(candidate.clone());
        out.push(candidate);
    }
    out
}

/// Archive entry name for page `index` (0-based) of a document.
pub fn entry_name(base: &str, index: usize, format: OutputFormat) -> String {
    format!("{}/page-{:03}.{}", base, index + 1, format.extension())
}
