//! Feeder: turns input lines into expansion tasks
//!
//! Runs on the coordinator thread. It owns the seen-patterns set, so
//! deduplication needs no locking.

use crate::cancel::CancelSignal;
use crate::dedup::{create_deduplicator, PatternDeduplicator};
use crate::pattern::Pattern;
use crate::processor::ProcessorConfig;
use crate::progress::{PipelineStats, ProgressReporter};
use crate::task::{chunk_count, chunk_ranges, ChunkTask, ExpansionPlan, ResultItem, Task};

use crossbeam_channel::Sender;
use std::sync::Arc;

/// What happened to one input line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedOutcome {
    /// No digit runs; nothing to expand
    Literal,
    /// Shape already scheduled by an earlier line
    Duplicate,
    /// Expansion capped at zero candidates
    Empty,
    /// Scheduled as one line task
    LineTask,
    /// Split into this many chunk tasks
    Chunked(u64),
    /// Cancelled, or a downstream queue closed; feeding must stop
    Stopped,
}

/// Splits input lines into line and chunk tasks
pub struct Feeder {
    config: Arc<ProcessorConfig>,
    dedup: Box<dyn PatternDeduplicator>,
    tasks: Sender<Task>,
    results: Sender<ResultItem>,
    cancel: CancelSignal,
    stats: Arc<PipelineStats>,
}

impl Feeder {
    pub fn new(
        config: Arc<ProcessorConfig>,
        tasks: Sender<Task>,
        results: Sender<ResultItem>,
        cancel: CancelSignal,
        stats: Arc<PipelineStats>,
    ) -> Self {
        let dedup = create_deduplicator(config.pattern_dedup);
        Self {
            config,
            dedup,
            tasks,
            results,
            cancel,
            stats,
        }
    }

    /// Feed every line, then send one shutdown sentinel per worker
    ///
    /// Returns the number of input lines consumed.
    pub fn run<I>(mut self, lines: I, reporter: &mut ProgressReporter) -> u64
    where
        I: IntoIterator<Item = String>,
    {
        let mut fed = 0;

        for line in lines {
            if self.cancel.is_cancelled() {
                break;
            }

            let outcome = self.feed_line(&line);
            fed = self.stats.add_line();
            reporter.on_line(fed);

            if outcome == FeedOutcome::Stopped {
                break;
            }
        }

        self.shutdown();
        fed
    }

    /// Process one input line
    pub fn feed_line(&mut self, line: &str) -> FeedOutcome {
        if self.config.emit_originals {
            if self.results.send(ResultItem::Line(format!("{}\n", line))).is_err() {
                log::warn!("Result queue closed, stopping input");
                return FeedOutcome::Stopped;
            }
            self.stats.add_original();
        }

        let pattern = Pattern::analyze(line);
        if !pattern.is_expandable() {
            return FeedOutcome::Literal;
        }

        if !self.dedup.insert(&pattern) {
            log::debug!("[dedup] skip expansion for '{}' (pattern {})", line, pattern.shape());
            self.stats.add_skipped_pattern();
            return FeedOutcome::Duplicate;
        }

        let estimate = pattern.combination_count();
        if estimate > self.config.max_line {
            log::debug!(
                "[truncate] '{}': combos≈{} -> capped at {}",
                line,
                estimate,
                self.config.max_line
            );
            self.stats.add_truncated();
        }

        let total_emit = estimate.min(self.config.max_line);
        if total_emit == 0 {
            return FeedOutcome::Empty;
        }

        if total_emit < self.config.chunk_threshold || self.config.workers <= 1 {
            let task = Task::Line {
                line: line.to_string(),
                cap: self.config.max_line,
            };
            if !self.submit(task) {
                return FeedOutcome::Stopped;
            }
            self.stats.add_line_task();
            return FeedOutcome::LineTask;
        }

        self.submit_chunks(line, pattern, total_emit)
    }

    fn submit_chunks(&mut self, line: &str, pattern: Pattern, total_emit: u64) -> FeedOutcome {
        let chunks = chunk_count(total_emit, self.config.chunk_size);
        log::debug!(
            "[chunk] '{}': total={}, chunks={} (size≈{}), pattern={}",
            line,
            total_emit,
            chunks,
            self.config.chunk_size,
            pattern.shape()
        );

        let plan = Arc::new(ExpansionPlan::new(pattern));
        let label: Arc<str> = Arc::from(line);
        let mut submitted = 0;

        for (start, count) in chunk_ranges(total_emit, self.config.chunk_size) {
            let task = Task::Chunk(ChunkTask {
                plan: Arc::clone(&plan),
                start,
                count,
                label: Arc::clone(&label),
            });
            if !self.submit(task) {
                self.stats.add_chunk_tasks(submitted);
                return FeedOutcome::Stopped;
            }
            submitted += 1;
        }

        self.stats.add_chunk_tasks(submitted);
        FeedOutcome::Chunked(submitted)
    }

    /// Blocking send that gives up once the run is cancelled
    fn submit(&self, task: Task) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        if self.tasks.send(task).is_err() {
            log::warn!("Task queue closed, stopping input");
            return false;
        }
        true
    }

    /// One sentinel per worker; a closed queue means the workers are gone already
    fn shutdown(self) {
        log::debug!("Feeder done: {} patterns scheduled for expansion", self.dedup.len());
        for _ in 0..self.config.workers {
            if self.tasks.send(Task::Shutdown).is_err() {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::{bounded, Receiver};

    struct Harness {
        feeder: Feeder,
        tasks: Receiver<Task>,
        results: Receiver<ResultItem>,
        cancel: CancelSignal,
        stats: Arc<PipelineStats>,
    }

    fn harness(config: ProcessorConfig) -> Harness {
        let (task_tx, task_rx) = bounded(1024);
        let (result_tx, result_rx) = bounded(1024);
        let cancel = CancelSignal::new();
        let stats = Arc::new(PipelineStats::new());
        let feeder = Feeder::new(
            Arc::new(config),
            task_tx,
            result_tx,
            cancel.clone(),
            Arc::clone(&stats),
        );
        Harness {
            feeder,
            tasks: task_rx,
            results: result_rx,
            cancel,
            stats,
        }
    }

    fn config(workers: usize) -> ProcessorConfig {
        ProcessorConfig {
            workers,
            ..ProcessorConfig::default()
        }
    }

    #[test]
    fn test_dedup_by_shape() {
        let mut h = harness(config(4));

        assert_eq!(h.feeder.feed_line("HOST1234"), FeedOutcome::LineTask);
        assert_eq!(h.feeder.feed_line("HOST0007"), FeedOutcome::Duplicate);

        let tasks: Vec<_> = h.tasks.try_iter().collect();
        assert_eq!(tasks.len(), 1);
        assert_eq!(h.stats.get_patterns_skipped(), 1);

        // originals are never deduplicated
        let originals: Vec<_> = h.results.try_iter().collect();
        assert_eq!(
            originals,
            vec![
                ResultItem::Line("HOST1234\n".to_string()),
                ResultItem::Line("HOST0007\n".to_string()),
            ]
        );
    }

    #[test]
    fn test_dedup_disabled() {
        let mut h = harness(ProcessorConfig {
            pattern_dedup: false,
            ..config(4)
        });

        assert_eq!(h.feeder.feed_line("HOST1234"), FeedOutcome::LineTask);
        assert_eq!(h.feeder.feed_line("HOST0007"), FeedOutcome::LineTask);
        assert_eq!(h.tasks.try_iter().count(), 2);
    }

    #[test]
    fn test_literal_line() {
        let mut h = harness(config(2));
        assert_eq!(h.feeder.feed_line("hello"), FeedOutcome::Literal);
        assert_eq!(h.tasks.try_iter().count(), 0);
        assert_eq!(
            h.results.try_iter().collect::<Vec<_>>(),
            vec![ResultItem::Line("hello\n".to_string())]
        );
    }

    #[test]
    fn test_no_emit_originals() {
        let mut h = harness(ProcessorConfig {
            emit_originals: false,
            ..config(2)
        });
        h.feeder.feed_line("hello");
        h.feeder.feed_line("a1");
        assert_eq!(h.results.try_iter().count(), 0);
    }

    #[test]
    fn test_chunking_covers_range() {
        let mut h = harness(ProcessorConfig {
            chunk_threshold: 1000,
            chunk_size: 300,
            ..config(4)
        });

        assert_eq!(h.feeder.feed_line("pc1234"), FeedOutcome::Chunked(34));

        let mut next = 0;
        for task in h.tasks.try_iter() {
            match task {
                Task::Chunk(chunk) => {
                    assert_eq!(chunk.start, next);
                    next += chunk.count;
                    assert_eq!(chunk.plan.space.total(), 10_000);
                    assert_eq!(&*chunk.label, "pc1234");
                }
                other => panic!("unexpected task {:?}", other),
            }
        }
        assert_eq!(next, 10_000);
        assert_eq!(h.stats.get_chunk_tasks(), 34);
    }

    #[test]
    fn test_chunking_respects_cap() {
        let mut h = harness(ProcessorConfig {
            chunk_threshold: 10,
            chunk_size: 40,
            max_line: 100,
            ..config(3)
        });

        assert_eq!(h.feeder.feed_line("x123456"), FeedOutcome::Chunked(3));
        let counts: Vec<u64> = h
            .tasks
            .try_iter()
            .map(|t| match t {
                Task::Chunk(c) => c.count,
                _ => 0,
            })
            .collect();
        assert_eq!(counts, vec![40, 40, 20]);
        assert_eq!(h.stats.get_lines_truncated(), 1);
    }

    #[test]
    fn test_single_worker_never_chunks() {
        let mut h = harness(ProcessorConfig {
            chunk_threshold: 10,
            chunk_size: 5,
            ..config(1)
        });

        assert_eq!(h.feeder.feed_line("x12345"), FeedOutcome::LineTask);
        match h.tasks.try_recv().unwrap() {
            Task::Line { line, cap } => {
                assert_eq!(line, "x12345");
                assert_eq!(cap, 1_000_000);
            }
            other => panic!("unexpected task {:?}", other),
        }
    }

    #[test]
    fn test_zero_cap_schedules_nothing() {
        let mut h = harness(ProcessorConfig {
            max_line: 0,
            ..config(2)
        });
        assert_eq!(h.feeder.feed_line("a1"), FeedOutcome::Empty);
        assert_eq!(h.tasks.try_iter().count(), 0);
    }

    #[test]
    fn test_cancelled_feeder_stops() {
        let mut h = harness(config(2));
        h.cancel.cancel();
        assert_eq!(h.feeder.feed_line("a1"), FeedOutcome::Stopped);
        assert_eq!(h.tasks.try_iter().count(), 0);
    }

    #[test]
    fn test_run_sends_sentinels() {
        let h = harness(config(3));
        let stats = Arc::clone(&h.stats);
        let mut reporter = ProgressReporter::new(0, Arc::clone(&stats), true);

        let fed = h.feeder.run(
            vec!["a1".to_string(), "b".to_string()],
            &mut reporter,
        );
        assert_eq!(fed, 2);

        let tasks: Vec<_> = h.tasks.try_iter().collect();
        assert_eq!(tasks.len(), 4);
        assert_eq!(
            tasks.iter().filter(|t| matches!(t, Task::Shutdown)).count(),
            3
        );
        assert_eq!(stats.get_lines_read(), 2);
    }
}
