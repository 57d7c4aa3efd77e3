//! Output management module
//!
//! The writer is the only component that touches the output file. It appends
//! candidates until the next line would push the file past the byte limit,
//! then raises the cancellation signal and drains the queue without writing.

use crate::cancel::CancelSignal;
use crate::error::{ExpandError, ExpandResult};
use crate::progress::PipelineStats;
use crate::task::ResultItem;

use crossbeam_channel::Receiver;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Write buffer size (1MB)
pub const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;

/// Flush whenever the written total crosses a multiple of this (10MB)
const FLUSH_EVERY: u64 = 10 * 1024 * 1024;

/// What the writer did over the whole run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WriterReport {
    /// Output size when the writer opened the file
    pub start_size: u64,
    /// Output size after the last accepted line
    pub final_size: u64,
    /// Lines appended during this run
    pub lines_written: u64,
    /// Items dropped because the run was already cancelled
    pub lines_dropped: u64,
    /// True if this writer stopped the run at the byte limit
    pub limit_reached: bool,
}

/// Size-bounded append-only output file
pub struct OutputWriter {
    writer: BufWriter<File>,
    path: PathBuf,
    limit: u64,
    written: u64,
    start_size: u64,
}

impl OutputWriter {
    /// Open `path` for appending; the byte budget starts at its current size
    pub fn open(path: &Path, limit: u64, buffer_size: usize) -> ExpandResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| ExpandError::OutputOpen {
                path: path.to_path_buf(),
                source,
            })?;
        let start_size = file.metadata()?.len();

        Ok(Self {
            writer: BufWriter::with_capacity(buffer_size, file),
            path: path.to_path_buf(),
            limit,
            written: start_size,
            start_size,
        })
    }

    /// Append `line` if it fits under the limit
    ///
    /// Returns `Ok(false)`, writing nothing, when the line would overflow.
    pub fn try_write(&mut self, line: &str) -> ExpandResult<bool> {
        let bytes = line.as_bytes();
        let would_be = self.written.saturating_add(bytes.len() as u64);
        if would_be > self.limit {
            return Ok(false);
        }

        self.writer.write_all(bytes)?;
        let before = self.written;
        self.written = would_be;

        if before / FLUSH_EVERY != would_be / FLUSH_EVERY {
            self.writer.flush()?;
        }
        Ok(true)
    }

    /// Flush the buffer to disk
    pub fn flush(&mut self) -> ExpandResult<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Bytes in the file, including what was there before the run
    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    pub fn start_size(&self) -> u64 {
        self.start_size
    }

    /// Consume the result queue until every producer has finished
    ///
    /// `producers` is the number of `Finished` markers to wait for. The loop
    /// also ends if every sender has been dropped.
    pub fn run(
        mut self,
        results: Receiver<ResultItem>,
        producers: usize,
        cancel: CancelSignal,
        stats: Arc<PipelineStats>,
    ) -> ExpandResult<WriterReport> {
        let mut report = WriterReport {
            start_size: self.start_size,
            ..WriterReport::default()
        };
        let mut finished = 0usize;

        while finished < producers {
            let item = match results.recv() {
                Ok(item) => item,
                Err(_) => break,
            };

            let line = match item {
                ResultItem::Finished => {
                    finished += 1;
                    continue;
                }
                ResultItem::Line(line) => line,
            };

            if cancel.is_cancelled() {
                report.lines_dropped += 1;
                continue;
            }

            let accepted = match self.try_write(&line) {
                Ok(accepted) => accepted,
                Err(e) => {
                    cancel.cancel();
                    log::error!("Write to {:?} failed: {}", self.path, e);
                    return Err(e);
                }
            };

            if !accepted {
                cancel.cancel();
                report.limit_reached = true;
                report.lines_dropped += 1;
                log::info!(
                    "Output limit reached at {} bytes, stopping",
                    self.written
                );
                continue;
            }

            let newlines = memchr::memchr_iter(b'\n', line.as_bytes()).count() as u64;
            if newlines > 0 {
                stats.lines_appended.fetch_add(newlines, Ordering::Relaxed);
                report.lines_written += newlines;
            }
        }

        self.flush()?;
        report.final_size = self.written;
        Ok(report)
    }
}

impl Drop for OutputWriter {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

/// Size of an existing output file, or 0 if it does not exist yet
pub fn existing_size(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// Ensure the output file's parent directory exists
pub fn ensure_output_dir(path: &Path) -> ExpandResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
