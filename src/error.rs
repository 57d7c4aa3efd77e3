//! Error types for the expansion pipeline
//!
//! Configuration problems are fatal and surface before any work starts.
//! Running out of byte budget or being interrupted are not errors; they end
//! the run through the cancellation signal instead.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for pipeline operations
pub type ExpandResult<T> = Result<T, ExpandError>;

/// Errors that can occur while configuring or running the pipeline
#[derive(Error, Debug)]
pub enum ExpandError {
    #[error("Invalid size '{0}' (use K/M/G suffix or raw bytes)")]
    InvalidSize(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Cannot open input file {path:?}: {source}")]
    InputOpen { path: PathBuf, source: io::Error },
    #[error("Cannot open output file {path:?}: {source}")]
    OutputOpen { path: PathBuf, source: io::Error },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Result queue closed before the worker finished")]
    ResultQueueClosed,
    #[error("{0} thread panicked")]
    ThreadPanicked(String),
}
