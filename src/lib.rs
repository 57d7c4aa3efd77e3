//! # Digit Expand
//!
//! Parallel, size-bounded, streaming expansion of digit runs in wordlists.
//!
//! ## Features
//!
//! - **Digit-run expansion**: `DESKTOP1234` becomes `DESKTOP0000` .. `DESKTOP9999`,
//!   every run zero-padded to its original width
//! - **Pattern deduplication**: lines with the same shape (`DESKTOP####`) are expanded once
//! - **Chunked parallelism**: huge expansion spaces are split into index ranges
//!   and generated by several workers at once
//! - **Hard size limit**: the output never grows past the configured byte ceiling
//! - **Backpressure**: bounded queues keep memory flat regardless of expansion size
//! - **Encoding detection**: input is transcoded to UTF-8, malformed bytes replaced
//!
//! ## Usage
//!
//! ```bash
//! # Expand hostnames into candidates.txt, 10G cap
//! digit-expand -i hosts.txt -o candidates.txt
//!
//! # 500MB cap, 8 workers, at most 10,000 variants per line
//! digit-expand -i hosts.txt -o candidates.txt -L 500M -w 8 --max-line 10000
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use digit_expand::processor::{Processor, ProcessorConfig};
//! use std::path::Path;
//!
//! let config = ProcessorConfig {
//!     limit_bytes: 64 * 1024 * 1024,
//!     workers: 4,
//!     ..ProcessorConfig::default()
//! };
//!
//! let processor = Processor::new(config);
//! let summary = processor
//!     .process(Path::new("hosts.txt"), Path::new("candidates.txt"))
//!     .unwrap();
//! println!("{} lines appended", summary.lines_appended);
//! ```

pub mod cancel;
pub mod cli;
pub mod dedup;
pub mod encoding;
pub mod error;
pub mod feeder;
pub mod index;
pub mod output;
pub mod pattern;
pub mod processor;
pub mod progress;
pub mod task;
pub mod worker;

pub use cancel::CancelSignal;
pub use cli::Args;
pub use error::{ExpandError, ExpandResult};
pub use pattern::{analyze, combination_count, Pattern};
pub use processor::{Processor, ProcessorConfig, RunSummary};
