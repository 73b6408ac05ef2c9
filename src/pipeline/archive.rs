//! Zip packaging of rendered pages.
//!
//! Entries are deflated into the output buffer as they arrive, in arrival
//! order. Only the compressed output accumulates; the raw page image is
//! dropped as soon as it has been written.

use crate::error::Pdf2ImgError;
use bytes::Bytes;
use std::io::{Cursor, Write};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// MIME type of the finished archive.
pub const ARCHIVE_CONTENT_TYPE: &str = "application/zip";

/// Incremental zip writer for one job.
pub struct ArchiveBuilder {
    writer: ZipWriter<Cursor<Vec<u8>>>,
    options: SimpleFileOptions,
    entries: usize,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self {
            writer: ZipWriter::new(Cursor::new(Vec::new())),
            options: SimpleFileOptions::default().compression_method(CompressionMethod::Deflated),
            entries: 0,
        }
    }

    /// Append one named entry.
    pub fn add_entry(&mut self, name: &str, data: &[u8]) -> Result<(), Pdf2ImgError> {
        self.writer.start_file(name, self.options)?;
        self.writer
            .write_all(data)
            .map_err(|e| Pdf2ImgError::ArchiveFailed(format!("writing '{name}': {e}")))?;
        self.entries += 1;
        debug!("Archived {} ({} bytes)", name, data.len());
        Ok(())
    }

    /// Number of entries written so far.
    pub fn len(&self) -> usize {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    /// Write the central directory and return the archive bytes.
    pub fn finish(self) -> Result<Bytes, Pdf2ImgError> {
        let cursor = self.writer.finish()?;
        Ok(Bytes::from(cursor.into_inner()))
    }
}

impl Default for ArchiveBuilder {
    fn default() -> Self {
        Self::new()
    }
}
