//! HTTP server binary for edgequake-pdf2img.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ServiceConfig`, makes sure pdfium is available and serves the router.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdf2img::{create_router, AppState, ConversionService, ServiceConfig};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Serve on the default address (127.0.0.1:8000)
  pdf2img-server

  # Listen on all interfaces, 3× render scale, 10-minute job limit
  pdf2img-server --bind 0.0.0.0:8080 --scale 3 --job-timeout 600

API:
  POST /convert                   {"inputUrls": [...], "outputFormat": "png", "zip": true}
  GET  /tasks/{taskId}            status, totalPages, completedPages, downloadUrl | error
  POST /tasks/{taskId}/cancel     {"ok": true}
  GET  /tasks/{taskId}/download   application/zip

ENVIRONMENT VARIABLES:
  RUST_LOG                Tracing filter (overrides --verbose)
  PDFIUM_LIB_PATH         Path to an existing libpdfium (skips auto-download)
  PDFIUM_AUTO_CACHE_DIR   Override the default pdfium cache directory
"#;

/// Serve batch PDF-to-image conversion jobs over HTTP.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2img-server",
    version,
    about = "Serve batch PDF-to-image conversion jobs over HTTP",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Address to listen on.
    #[arg(long, env = "PDF2IMG_BIND", default_value = "127.0.0.1:8000")]
    bind: SocketAddr,

    /// Per-URL download timeout in seconds.
    #[arg(long, env = "PDF2IMG_DOWNLOAD_TIMEOUT", default_value_t = 60)]
    download_timeout: u64,

    /// Page magnification on both axes (0.25–8.0).
    #[arg(long, env = "PDF2IMG_SCALE", default_value_t = 2.0)]
    scale: f32,

    /// Maximum number of URLs per job.
    #[arg(long, env = "PDF2IMG_MAX_URLS", default_value_t = 100)]
    max_urls: usize,

    /// Wall-clock limit for a whole job, in seconds. Unlimited when unset.
    #[arg(long, env = "PDF2IMG_JOB_TIMEOUT")]
    job_timeout: Option<u64>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2IMG_VERBOSE")]
    verbose: bool,
}

fn build_config(cli: &Cli) -> Result<ServiceConfig> {
    let mut builder = ServiceConfig::builder()
        .bind_addr(cli.bind)
        .download_timeout_secs(cli.download_timeout)
        .render_scale(cli.scale)
        .max_urls_per_job(cli.max_urls);
    if let Some(secs) = cli.job_timeout {
        builder = builder.job_timeout_secs(secs);
    }
    builder.build().context("Invalid server configuration")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "edgequake_pdf2img=debug,tower_http=debug,info"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli)?;

    // ── Ensure PDFium engine is available ────────────────────────────────
    if !pdfium_auto::is_pdfium_cached() {
        tracing::info!("Downloading PDFium engine (first run)…");
        tokio::task::block_in_place(|| pdfium_auto::ensure_pdfium_library(None))
            .context("Failed to download PDFium engine")?;
    }

    // ── Serve ────────────────────────────────────────────────────────────
    let service = Arc::new(
        ConversionService::with_defaults(config.clone()).context("Failed to build service")?,
    );
    let app = create_router(AppState::new(Arc::clone(&service)));

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    tracing::info!(
        "Listening on {} (scale {}×, download timeout {}s)",
        config.bind_addr,
        config.render_scale,
        config.download_timeout_secs
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    let aborted = service.shutdown();
    tracing::info!("Server stopped ({} in-flight jobs aborted)", aborted);
    Ok(())
}

/// Resolve on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl-C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
