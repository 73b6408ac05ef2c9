//! Configuration types for the conversion service.
//!
//! All service behaviour is controlled through [`ServiceConfig`], built via
//! its [`ServiceConfigBuilder`]. Setters clamp obviously-out-of-range values;
//! `build()` rejects the combinations that cannot be clamped into something
//! sensible.

use crate::error::Pdf2ImgError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Configuration for the conversion service.
///
/// # Example
/// ```rust
/// use edgequake_pdf2img::ServiceConfig;
///
/// let config = ServiceConfig::builder()
///     .download_timeout_secs(30)
///     .render_scale(3.0)
///     .job_timeout_secs(600)
///     .build()
///     .unwrap();
/// assert_eq!(config.render_scale, 3.0);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Address the HTTP server listens on. Default: `127.0.0.1:8000`.
    pub bind_addr: SocketAddr,

    /// Per-URL download timeout in seconds. Default: 60.
    pub download_timeout_secs: u64,

    /// Magnification applied to both page axes when rasterising. Range:
    /// 0.25–8.0. Default: 2.0.
    pub render_scale: f32,

    /// Maximum number of URLs accepted in a single submission. Default: 100.
    pub max_urls_per_job: usize,

    /// Optional wall-clock limit for a whole job. Default: none.
    pub job_timeout_secs: Option<u64>,

    /// Chunk size used when streaming an archive to the client. Default: 64 KiB.
    pub download_chunk_size: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8000)),
            download_timeout_secs: 60,
            render_scale: 2.0,
            max_urls_per_job: 100,
            job_timeout_secs: None,
            download_chunk_size: 64 * 1024,
        }
    }
}

impl ServiceConfig {
    /// Create a new builder for `ServiceConfig`.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    pub fn job_timeout(&self) -> Option<Duration> {
        self.job_timeout_secs.map(Duration::from_secs)
    }
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.config.bind_addr = addr;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn render_scale(mut self, scale: f32) -> Self {
        self.config.render_scale = scale.clamp(0.25, 8.0);
        self
    }

    pub fn max_urls_per_job(mut self, n: usize) -> Self {
        self.config.max_urls_per_job = n.max(1);
        self
    }

    pub fn job_timeout_secs(mut self, secs: u64) -> Self {
        self.config.job_timeout_secs = Some(secs);
        self
    }

    pub fn download_chunk_size(mut self, bytes: usize) -> Self {
        self.config.download_chunk_size = bytes.max(1024);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServiceConfig, Pdf2ImgError> {
        let c = &self.config;
        if c.download_timeout_secs == 0 {
            return Err(Pdf2ImgError::InvalidConfig(
                "Download timeout must be ≥ 1s".into(),
            ));
        }
        if c.job_timeout_secs == Some(0) {
            return Err(Pdf2ImgError::InvalidConfig(
                "Job timeout must be ≥ 1s when set".into(),
            ));
        }
        if !c.render_scale.is_finite() {
            return Err(Pdf2ImgError::InvalidConfig(format!(
                "Render scale must be finite, got {}",
                c.render_scale
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Encoded image format produced for every page.
///
/// PNG is the default: lossless output keeps rendered text crisp. JPEG is
/// offered for photo-heavy documents where archive size matters more.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    Jpeg,
}

impl OutputFormat {
    /// File extension used for archive entries.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
        }
    }

    pub fn image_format(&self) -> image::ImageFormat {
        match self {
            OutputFormat::Png => image::ImageFormat::Png,
            OutputFormat::Jpeg => image::ImageFormat::Jpeg,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Png => f.write_str("png"),
            OutputFormat::Jpeg => f.write_str("jpeg"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    /// Parse a case-insensitive format name (`png`, `jpeg`, `jpg`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(OutputFormat::Png),
            "jpeg" | "jpg" => Ok(OutputFormat::Jpeg),
            other => Err(format!(
                "unsupported output format '{other}' (expected png or jpeg)"
            )),
        }
    }
}
