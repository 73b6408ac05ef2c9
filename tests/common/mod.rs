//! Shared stubs for the integration tests.
//!
//! Documents are fake: the first byte of a body is its page count, and
//! `0xFF` marks an unparseable document. Rendered "images" are the bytes of
//! `"{document}:{page_index}"`.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use edgequake_pdf2img::{
    ConversionService, Fetcher, JobObserver, OutputFormat, PageSink, Pdf2ImgError,
    RasterEngine, ServiceConfig,
};
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

pub const CORRUPT: u8 = 0xFF;

pub fn url(name: &str) -> String {
    format!("https://docs.test/files/{name}.pdf")
}

/// In-memory fetcher keyed by URL.
#[derive(Default)]
pub struct StubFetcher {
    bodies: HashMap<String, Result<Bytes, u16>>,
    delay: Option<Duration>,
    gate: Option<Arc<Semaphore>>,
    calls: Mutex<Vec<String>>,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve a document with `pages` pages at `url(name)`.
    pub fn document(mut self, name: &str, pages: u8) -> Self {
        self.bodies.insert(url(name), Ok(Bytes::from(vec![pages])));
        self
    }

    /// Serve an HTTP error status at `url(name)`.
    pub fn status(mut self, name: &str, status: u16) -> Self {
        self.bodies.insert(url(name), Err(status));
        self
    }

    /// Sleep (Tokio time) before answering each request.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Block every request until a permit is available on `gate`.
    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, Pdf2ImgError> {
        self.calls.lock().unwrap().push(url.to_string());
        if let Some(gate) = &self.gate {
            let permit = gate.acquire().await.expect("gate closed");
            permit.forget();
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.bodies.get(url) {
            Some(Ok(bytes)) => Ok(bytes.clone()),
            Some(Err(status)) => Err(Pdf2ImgError::DownloadFailed {
                url: url.to_string(),
                reason: format!("HTTP {status}"),
            }),
            None => Err(Pdf2ImgError::DownloadFailed {
                url: url.to_string(),
                reason: "HTTP 404 Not Found".into(),
            }),
        }
    }
}

/// Fake rasteriser: never touches pdfium.
#[derive(Default)]
pub struct StubEngine {
    failing_pages: HashSet<(String, usize)>,
    render_delay: Option<Duration>,
    loads: Arc<AtomicUsize>,
}

impl StubEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make page `index` (0-based) of `document` fail to render.
    pub fn fail_on(mut self, document: &str, index: usize) -> Self {
        self.failing_pages.insert((document.to_string(), index));
        self
    }

    /// Shared count of `render_pages` calls (one per document load).
    pub fn load_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.loads)
    }

    /// Block the rendering thread for `delay` on every page.
    pub fn render_delay(mut self, delay: Duration) -> Self {
        self.render_delay = Some(delay);
        self
    }
}

impl RasterEngine for StubEngine {
    fn page_count(&self, document: &str, bytes: &[u8]) -> Result<usize, Pdf2ImgError> {
        match bytes.first() {
            Some(&CORRUPT) | None => Err(Pdf2ImgError::CorruptPdf {
                document: document.to_string(),
                detail: "not a PDF".into(),
            }),
            Some(&n) => Ok(n as usize),
        }
    }

    fn render_pages(
        &self,
        document: &str,
        bytes: &[u8],
        _scale: f32,
        _format: OutputFormat,
        sink: &mut dyn PageSink,
    ) -> Result<(), Pdf2ImgError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let pages = self.page_count(document, bytes)?;
        for index in 0..pages {
            if let Some(delay) = self.render_delay {
                std::thread::sleep(delay);
            }
            if self.failing_pages.contains(&(document.to_string(), index)) {
                return Err(Pdf2ImgError::RasterisationFailed {
                    document: document.to_string(),
                    page: index + 1,
                    detail: "stub failure".into(),
                });
            }
            let image = format!("{document}:{index}").into_bytes();
            if sink.accept(index, image).is_break() {
                break;
            }
        }
        Ok(())
    }
}

pub fn service(fetcher: StubFetcher, engine: StubEngine) -> ConversionService {
    service_with_config(ServiceConfig::default(), fetcher, engine)
}

pub fn service_with_config(
    config: ServiceConfig,
    fetcher: StubFetcher,
    engine: StubEngine,
) -> ConversionService {
    ConversionService::new(config, Arc::new(fetcher), Arc::new(engine))
}

/// Entry names of a zip archive, in archive order.
pub fn entry_names(archive: &[u8]) -> Vec<String> {
    let mut zip = zip::ZipArchive::new(Cursor::new(archive.to_vec())).expect("valid zip");
    (0..zip.len())
        .map(|i| zip.by_index(i).expect("entry").name().to_string())
        .collect()
}

/// Content of one named entry.
pub fn entry_content(archive: &[u8], name: &str) -> String {
    use std::io::Read;
    let mut zip = zip::ZipArchive::new(Cursor::new(archive.to_vec())).expect("valid zip");
    let mut out = String::new();
    zip.by_name(name)
        .expect("entry exists")
        .read_to_string(&mut out)
        .expect("utf-8 entry");
    out
}

/// Observer that records `(completed, total)` pairs and start totals.
#[derive(Default)]
pub struct RecordingObserver {
    pub starts: Mutex<Vec<usize>>,
    pub pages: Mutex<Vec<(usize, usize)>>,
    pub finished: Mutex<Vec<String>>,
}

impl JobObserver for RecordingObserver {
    fn on_job_start(&self, _job_id: uuid::Uuid, total_pages: usize) {
        self.starts.lock().unwrap().push(total_pages);
    }

    fn on_page_complete(&self, _job_id: uuid::Uuid, completed: usize, total: usize) {
        self.pages.lock().unwrap().push((completed, total));
    }

    fn on_job_finished(&self, _job_id: uuid::Uuid, status: edgequake_pdf2img::JobStatus) {
        self.finished.lock().unwrap().push(status.to_string());
    }
}
