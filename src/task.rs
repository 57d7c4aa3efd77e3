//! Work items passed between the pipeline stages

use crate::index::IndexSpace;
use crate::pattern::Pattern;
use std::sync::Arc;

/// Pattern plus its precomputed index space, shared by all chunks of one line
#[derive(Debug)]
pub struct ExpansionPlan {
    pub pattern: Pattern,
    pub space: IndexSpace,
}

impl ExpansionPlan {
    pub fn new(pattern: Pattern) -> Self {
        let space = IndexSpace::for_pattern(&pattern);
        Self { pattern, space }
    }
}

/// Contiguous sub-range `[start, start + count)` of one line's expansion space
#[derive(Debug, Clone)]
pub struct ChunkTask {
    pub plan: Arc<ExpansionPlan>,
    pub start: u64,
    pub count: u64,
    /// Source line, for diagnostics
    pub label: Arc<str>,
}

/// Task queue item
#[derive(Debug, Clone)]
pub enum Task {
    /// Expand a whole line, at most `cap` candidates
    Line { line: String, cap: u64 },
    /// Expand one chunk of a split line
    Chunk(ChunkTask),
    /// One per worker; ends its receive loop
    Shutdown,
}

impl Task {
    /// Short description for log messages
    pub fn label(&self) -> String {
        match self {
            Task::Line { line, .. } => format!("'{}'", line),
            Task::Chunk(chunk) => format!(
                "'{}' [{}..{})",
                chunk.label,
                chunk.start,
                chunk.start.saturating_add(chunk.count)
            ),
            Task::Shutdown => "shutdown".to_string(),
        }
    }
}

/// Result queue item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultItem {
    /// Newline-terminated candidate
    Line(String),
    /// A worker has finished its receive loop
    Finished,
}

/// Split `[0, total)` into consecutive ranges of at most `chunk_size`
///
/// Yields `(start, count)` pairs with no gaps or overlaps. A zero chunk
/// size is treated as one.
pub fn chunk_ranges(total: u64, chunk_size: u64) -> ChunkRanges {
    ChunkRanges {
        next: 0,
        total,
        chunk_size: chunk_size.max(1),
    }
}

/// Number of chunks [`chunk_ranges`] will yield
pub fn chunk_count(total: u64, chunk_size: u64) -> u64 {
    let chunk_size = chunk_size.max(1);
    total / chunk_size + u64::from(total % chunk_size != 0)
}

/// Iterator returned by [`chunk_ranges`]
#[derive(Debug, Clone)]
pub struct ChunkRanges {
    next: u64,
    total: u64,
    chunk_size: u64,
}

impl Iterator for ChunkRanges {
    type Item = (u64, u64);

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.total {
            return None;
        }
        let start = self.next;
        let count = self.chunk_size.min(self.total - start);
        self.next = start + count;
        Some((start, count))
    }
}
