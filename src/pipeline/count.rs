//! Page counting: open every fetched document once before rendering.
//!
//! The job's `totalPages` is published from this result before the first
//! page is rendered, so progress always has a meaningful denominator.

use crate::error::Pdf2ImgError;
use crate::pipeline::render::{self, RasterEngine};
use crate::pipeline::FetchedDocument;
use std::sync::Arc;
use tracing::debug;

/// Per-document page counts, in submission order, plus their sum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCounts {
    pub per_document: Vec<usize>,
    pub total: usize,
}

/// Validate every document and count its pages.
///
/// The first unparseable document aborts the count with its decode error.
pub async fn count_pages(
    engine: &Arc<dyn RasterEngine>,
    documents: &[FetchedDocument],
) -> Result<PageCounts, Pdf2ImgError> {
    let mut per_document = Vec::with_capacity(documents.len());
    for doc in documents {
        let pages = render::page_count(Arc::clone(engine), doc).await?;
        debug!("{} → {} pages", doc.url, pages);
        per_document.push(pages);
    }
    let total = per_document.iter().sum();
    Ok(PageCounts {
        per_document,
        total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputFormat;
    use crate::pipeline::render::PageSink;
    use bytes::Bytes;

    /// Treats the first byte as the page count; `0xFF` is unparseable.
    struct ByteCountEngine;

    impl RasterEngine for ByteCountEngine {
        fn page_count(&self, document: &str, bytes: &[u8]) -> Result<usize, Pdf2ImgError> {
            match bytes.first() {
                Some(0xFF) | None => Err(Pdf2ImgError::CorruptPdf {
                    document: document.to_string(),
                    detail: "bad header".into(),
                }),
                Some(n) => Ok(*n as usize),
            }
        }

        fn render_pages(
            &self,
            _document: &str,
            _bytes: &[u8],
            _scale: f32,
            _format: OutputFormat,
            _sink: &mut dyn PageSink,
        ) -> Result<(), Pdf2ImgError> {
            Ok(())
        }
    }

    fn doc(name: &str, first: u8) -> FetchedDocument {
        FetchedDocument {
            url: format!("https://x.test/{name}.pdf"),
            name: name.to_string(),
            bytes: Bytes::from(vec![first]),
        }
    }

    #[tokio::test]
    async fn sums_pages_in_order() {
        let engine: Arc<dyn RasterEngine> = Arc::new(ByteCountEngine);
        let counts = count_pages(&engine, &[doc("a", 3), doc("b", 5)]).await.unwrap();
        assert_eq!(counts.per_document, vec![3, 5]);
        assert_eq!(counts.total, 8);
    }

    #[tokio::test]
    async fn corrupt_document_fails_count() {
        let engine: Arc<dyn RasterEngine> = Arc::new(ByteCountEngine);
        let err = count_pages(&engine, &[doc("a", 3), doc("broken", 0xFF)])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("broken"), "got: {err}");
    }
}
