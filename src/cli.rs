//! Command-line interface definition for digit-expand
//!
//! Provides argument parsing and size-string handling.

use crate::error::{ExpandError, ExpandResult};
use clap::Parser;
use std::path::PathBuf;

/// Parallel, streaming expansion of digit runs in names
///
/// Every run of digits in an input line is replaced by all zero-padded values
/// of the same width. Output is appended and capped at a byte limit.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "digit-expand",
    author = "m0h1nd4",
    version,
    about = "Parallel, size-bounded expansion of digit runs in wordlists",
    long_about = r#"
╔══════════════════════════════════════════════════════════════════════════════╗
║                            DIGIT-EXPAND v1.0.0                               ║
║                   Parallel, Streaming Digit-Run Expansion                    ║
║                         For Penetration Testing                              ║
╚══════════════════════════════════════════════════════════════════════════════╝

Expands every run of digits in each input line into all values of the same
width (DESKTOP1234 -> DESKTOP0000 .. DESKTOP9999). Lines sharing a shape are
expanded once. Huge expansion spaces are split into chunks and generated in
parallel. The output file is appended to and never grows past --limit.

EXAMPLES:
    # Expand hostnames, default 10G cap
    digit-expand -i hosts.txt -o candidates.txt

    # Stop at 500MB, 8 workers
    digit-expand -i hosts.txt -o candidates.txt -L 500M -w 8

    # At most 10,000 variants per line, no raw input lines in the output
    digit-expand -i hosts.txt -o candidates.txt --max-line 10000 --no-emit-originals

    # Progress every 1000 input lines, diagnostics on
    digit-expand -i hosts.txt -o candidates.txt --progress-every 1000 -v
"#,
    after_help = "For more information, visit: https://github.com/m0h1nd4/digit-expand"
)]
pub struct Args {
    /// Input file (one name per line)
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Output file (appended to)
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,

    /// Maximum output size: raw bytes or K/M/G suffix
    #[arg(short = 'L', long, value_name = "SIZE", default_value = "10G")]
    pub limit: String,

    /// Number of worker threads (default: CPUs - 1)
    #[arg(short, long, value_name = "NUM")]
    pub workers: Option<usize>,

    /// Cap on expansions per input line
    #[arg(long, value_name = "NUM", default_value_t = 1_000_000)]
    pub max_line: u64,

    /// Split a line into chunks when its estimated expansions reach this
    #[arg(long, value_name = "NUM", default_value_t = 1_000_000)]
    pub chunk_threshold: u64,

    /// Expansions per chunk
    #[arg(long, value_name = "NUM", default_value_t = 100_000)]
    pub chunk_size: u64,

    /// Report progress every N input lines (0 = off)
    #[arg(long, value_name = "NUM", default_value_t = 0)]
    pub progress_every: u64,

    /// Log slow tasks, chunking, truncation and dedup decisions
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Seconds after which a task counts as slow
    #[arg(long, value_name = "SECS", default_value_t = 3.0)]
    pub slow_threshold: f64,

    /// Expand every line, even if its digit pattern was already expanded
    #[arg(long, default_value_t = false)]
    pub no_pattern_dedup: bool,

    /// Do not copy the raw input lines to the output
    #[arg(long, default_value_t = false)]
    pub no_emit_originals: bool,

    /// Quiet mode - no banner, spinner or summary
    #[arg(short, long, default_value_t = false)]
    pub quiet: bool,
}

impl Args {
    /// Parse the output limit to bytes
    pub fn parse_limit(&self) -> ExpandResult<u64> {
        parse_size(&self.limit)
    }
}

/// Parse human-readable size string to bytes
///
/// Accepts raw bytes or a K/M/G suffix (binary multiples), optionally
/// followed by `B`: `1048576`, `512K`, `10G`, `64MB`.
pub fn parse_size(size_str: &str) -> ExpandResult<u64> {
    let normalized = size_str.trim().to_uppercase();
    let trimmed = normalized.strip_suffix('B').unwrap_or(&normalized);

    let (num_str, multiplier) = if let Some(n) = trimmed.strip_suffix('G') {
        (n, 1024 * 1024 * 1024)
    } else if let Some(n) = trimmed.strip_suffix('M') {
        (n, 1024 * 1024)
    } else if let Some(n) = trimmed.strip_suffix('K') {
        (n, 1024)
    } else {
        (trimmed, 1)
    };

    let invalid = || ExpandError::InvalidSize(size_str.to_string());
    let num_str = num_str.trim();
    if num_str.is_empty() || !num_str.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let num: u64 = num_str.parse().map_err(|_| invalid())?;
    num.checked_mul(multiplier).ok_or_else(invalid)
}
