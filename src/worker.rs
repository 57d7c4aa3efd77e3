//! Expansion workers
//!
//! Each worker pulls one task at a time from the task queue, renders its
//! candidates and pushes them onto the result queue. Cancellation is checked
//! before every emitted line so a full output stops generation mid-chunk.

use crate::cancel::CancelSignal;
use crate::error::{ExpandError, ExpandResult};
use crate::index::{IndexSpace, RangeExpander};
use crate::pattern::Pattern;
use crate::task::{ResultItem, Task};

use crossbeam_channel::{Receiver, Sender};
use std::time::{Duration, Instant};

/// Per-worker counters, returned when the thread exits
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerStats {
    pub tasks_completed: u64,
    pub lines_emitted: u64,
    pub slow_tasks: u64,
}

/// Expand one task, handing every rendered line to `emit`
///
/// Returns the number of lines emitted. Stops early, without error, once
/// `cancel` is set.
pub fn expand_task<F>(task: &Task, cancel: &CancelSignal, mut emit: F) -> ExpandResult<u64>
where
    F: FnMut(String) -> ExpandResult<()>,
{
    match task {
        Task::Line { line, cap } => {
            let pattern = Pattern::analyze(line);
            if !pattern.is_expandable() {
                if cancel.is_cancelled() {
                    return Ok(0);
                }
                emit(format!("{}\n", line))?;
                return Ok(1);
            }
            let space = IndexSpace::for_pattern(&pattern);
            let total = (*cap).min(pattern.combination_count());
            emit_range(RangeExpander::new(&pattern, &space, 0, total), cancel, emit)
        }
        Task::Chunk(chunk) => {
            let plan = &chunk.plan;
            let expander = RangeExpander::new(&plan.pattern, &plan.space, chunk.start, chunk.count);
            emit_range(expander, cancel, emit)
        }
        Task::Shutdown => Ok(0),
    }
}

fn emit_range<F>(expander: RangeExpander<'_>, cancel: &CancelSignal, mut emit: F) -> ExpandResult<u64>
where
    F: FnMut(String) -> ExpandResult<()>,
{
    let mut emitted = 0u64;
    for line in expander {
        if cancel.is_cancelled() {
            break;
        }
        emit(line)?;
        emitted += 1;
    }
    Ok(emitted)
}

/// Posts the worker's `Finished` marker however the loop ends
struct FinishGuard<'a> {
    results: &'a Sender<ResultItem>,
}

impl Drop for FinishGuard<'_> {
    fn drop(&mut self) {
        // writer may already be gone
        let _ = self.results.send(ResultItem::Finished);
    }
}

/// A single worker's receive loop
pub struct Worker {
    pub id: usize,
    pub tasks: Receiver<Task>,
    pub results: Sender<ResultItem>,
    pub cancel: CancelSignal,
    pub slow_threshold: Duration,
}

impl Worker {
    /// Run until a shutdown sentinel, cancellation, or a closed task queue
    pub fn run(self) -> ExpandResult<WorkerStats> {
        let _finish = FinishGuard {
            results: &self.results,
        };
        let mut stats = WorkerStats::default();

        for task in self.tasks.iter() {
            if matches!(task, Task::Shutdown) || self.cancel.is_cancelled() {
                break;
            }

            let started = Instant::now();
            let results = &self.results;
            let emitted = expand_task(&task, &self.cancel, |line| {
                results
                    .send(ResultItem::Line(line))
                    .map_err(|_| ExpandError::ResultQueueClosed)
            });

            let emitted = match emitted {
                Ok(n) => n,
                Err(e) => {
                    self.cancel.cancel();
                    log::error!("worker {}: {}", self.id, e);
                    return Err(e);
                }
            };

            stats.tasks_completed += 1;
            stats.lines_emitted += emitted;

            let elapsed = started.elapsed();
            if elapsed >= self.slow_threshold {
                stats.slow_tasks += 1;
                log::debug!(
                    "[slow] {}: {} lines in {:.2}s (worker {})",
                    task.label(),
                    emitted,
                    elapsed.as_secs_f64(),
                    self.id
                );
            }
        }

        Ok(stats)
    }
}
