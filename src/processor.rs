//! Core processing engine
//!
//! Wires the feeder, the worker pool and the writer together:
//!
//! ```text
//! Feeder ──(task queue)──▶ Workers ──(result queue)──▶ Writer ──▶ output file
//! ```
//!
//! Both queues are bounded, so a slow disk throttles the workers and, through
//! them, the feeder.

use crate::cancel::CancelSignal;
use crate::cli::Args;
use crate::encoding::LineReader;
use crate::error::{ExpandError, ExpandResult};
use crate::feeder::Feeder;
use crate::output::{ensure_output_dir, existing_size, OutputWriter, WriterReport, DEFAULT_BUFFER_SIZE};
use crate::progress::{print_warning, PipelineStats, ProgressReporter};
use crate::task::{ResultItem, Task};
use crate::worker::{Worker, WorkerStats};

use crossbeam_channel::bounded;
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime};

/// How long an interrupted run waits for its threads before detaching them
const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

const JOIN_POLL: Duration = Duration::from_millis(10);

/// Processor configuration
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Output byte ceiling
    pub limit_bytes: u64,
    pub workers: usize,
    /// Maximum expansions per input line
    pub max_line: u64,
    /// Estimated expansions at which a line is split into chunks
    pub chunk_threshold: u64,
    /// Linear-index span of one chunk task
    pub chunk_size: u64,
    /// Report progress every N input lines (0 = off)
    pub progress_every: u64,
    pub slow_threshold: Duration,
    pub pattern_dedup: bool,
    pub emit_originals: bool,
    pub task_queue_capacity: usize,
    pub result_queue_capacity: usize,
    pub buffer_size: usize,
    pub quiet: bool,
    pub verbose: bool,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            limit_bytes: 10 * 1024 * 1024 * 1024,
            workers: default_workers(),
            max_line: 1_000_000,
            chunk_threshold: 1_000_000,
            chunk_size: 100_000,
            progress_every: 0,
            slow_threshold: Duration::from_secs(3),
            pattern_dedup: true,
            emit_originals: true,
            task_queue_capacity: 4000,
            result_queue_capacity: 8192,
            buffer_size: DEFAULT_BUFFER_SIZE,
            quiet: false,
            verbose: false,
        }
    }
}

/// One less than the CPU count, at least one
pub fn default_workers() -> usize {
    num_cpus::get().saturating_sub(1).max(1)
}

impl ProcessorConfig {
    pub fn from_args(args: &Args) -> ExpandResult<Self> {
        let slow_threshold = Duration::try_from_secs_f64(args.slow_threshold).map_err(|_| {
            ExpandError::Config(format!(
                "slow threshold must be a non-negative number of seconds, got {}",
                args.slow_threshold
            ))
        })?;

        let config = Self {
            limit_bytes: args.parse_limit()?,
            workers: args.workers.unwrap_or_else(default_workers),
            max_line: args.max_line,
            chunk_threshold: args.chunk_threshold,
            chunk_size: args.chunk_size,
            progress_every: args.progress_every,
            slow_threshold,
            pattern_dedup: !args.no_pattern_dedup,
            emit_originals: !args.no_emit_originals,
            quiet: args.quiet,
            verbose: args.verbose,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> ExpandResult<()> {
        if self.workers == 0 {
            return Err(ExpandError::Config("worker count must be at least 1".into()));
        }
        if self.chunk_size == 0 {
            return Err(ExpandError::Config("chunk size must be at least 1".into()));
        }
        if self.limit_bytes == 0 {
            return Err(ExpandError::Config("output limit must be greater than 0".into()));
        }
        if self.task_queue_capacity == 0 || self.result_queue_capacity == 0 {
            return Err(ExpandError::Config("queue capacities must be at least 1".into()));
        }
        if self.buffer_size == 0 {
            return Err(ExpandError::Config("buffer size must be at least 1".into()));
        }
        Ok(())
    }
}

/// Outcome of one run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub started_at: SystemTime,
    pub finished_at: SystemTime,
    pub elapsed: Duration,
    pub lines_read: u64,
    pub lines_appended: u64,
    /// Input lines written verbatim
    pub originals_emitted: u64,
    pub start_size: u64,
    pub end_size: u64,
    pub patterns_skipped: u64,
    pub lines_truncated: u64,
    pub line_tasks: u64,
    pub chunk_tasks: u64,
    pub limit_reached: bool,
    pub interrupted: bool,
}

impl RunSummary {
    /// Appended lines per input line
    pub fn expansion_factor(&self) -> f64 {
        if self.lines_read > 0 {
            self.lines_appended as f64 / self.lines_read as f64
        } else {
            0.0
        }
    }

    pub fn lines_per_second(&self) -> f64 {
        let elapsed = self.elapsed.as_secs_f64();
        if elapsed > 0.0 {
            self.lines_appended as f64 / elapsed
        } else {
            0.0
        }
    }
}

/// Main processor
///
/// A processor drives exactly one run: `process` and `process_lines` consume
/// it, so its cancel signal and counters always describe that run.
pub struct Processor {
    config: Arc<ProcessorConfig>,
    cancel: CancelSignal,
    stats: Arc<PipelineStats>,
}

impl Processor {
    pub fn new(config: ProcessorConfig) -> Self {
        Self {
            config: Arc::new(config),
            cancel: CancelSignal::new(),
            stats: Arc::new(PipelineStats::new()),
        }
    }

    /// Handle for stopping the run from outside, e.g. a Ctrl-C handler
    pub fn cancel_signal(&self) -> CancelSignal {
        self.cancel.clone()
    }

    /// Live counters of the run, readable while it is in progress
    pub fn stats(&self) -> Arc<PipelineStats> {
        Arc::clone(&self.stats)
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Expand every line of `input` into `output`
    pub fn process(self, input: &Path, output: &Path) -> ExpandResult<RunSummary> {
        let reader = LineReader::open(input)?;
        let lines = reader.map_while(|line| match line {
            Ok(line) => Some(line),
            Err(e) => {
                log::warn!("Stopped reading input: {}", e);
                None
            }
        });
        self.process_lines(lines, output)
    }

    /// Expand lines from any source, bounded or not, into `output`
    pub fn process_lines<I>(self, lines: I, output: &Path) -> ExpandResult<RunSummary>
    where
        I: IntoIterator<Item = String>,
    {
        self.config.validate()?;

        let started_at = SystemTime::now();
        let started = Instant::now();

        ensure_output_dir(output)?;
        let start_size = existing_size(output);
        if start_size >= self.config.limit_bytes {
            if !self.config.quiet {
                print_warning(&format!(
                    "Output already at/over limit ({} bytes), nothing to do",
                    start_size
                ));
            }
            return Ok(self.summary(started_at, started, WriterReport {
                start_size,
                final_size: start_size,
                ..WriterReport::default()
            }, start_size));
        }

        let writer = OutputWriter::open(output, self.config.limit_bytes, self.config.buffer_size)?;
        let workers = self.config.workers;

        let (task_tx, task_rx) = bounded::<Task>(self.config.task_queue_capacity);
        let (result_tx, result_rx) = bounded::<ResultItem>(self.config.result_queue_capacity);

        let writer_handle = {
            let cancel = self.cancel.clone();
            let stats = Arc::clone(&self.stats);
            thread::Builder::new()
                .name("expand-writer".to_string())
                .spawn(move || writer.run(result_rx, workers, cancel, stats))?
        };

        let mut worker_handles = Vec::with_capacity(workers);
        for id in 0..workers {
            let worker = Worker {
                id,
                tasks: task_rx.clone(),
                results: result_tx.clone(),
                cancel: self.cancel.clone(),
                slow_threshold: self.config.slow_threshold,
            };
            let spawned = thread::Builder::new()
                .name(format!("expand-worker-{}", id))
                .spawn(move || worker.run());
            match spawned {
                Ok(handle) => worker_handles.push(handle),
                Err(e) => {
                    self.cancel.cancel();
                    drop(task_tx);
                    drop(result_tx);
                    // the writer waits for `workers` markers; closing every sender releases it
                    drop(task_rx);
                    let mut deadline = JoinDeadline::new(self.cancel.clone(), JOIN_TIMEOUT);
                    join_workers(worker_handles, &mut deadline);
                    if deadline.wait(&writer_handle) {
                        let _ = writer_handle.join();
                    }
                    return Err(e.into());
                }
            }
        }

        // Disconnection is driven by the threads that still hold clones
        drop(task_rx);

        let mut reporter = ProgressReporter::new(
            self.config.progress_every,
            Arc::clone(&self.stats),
            self.config.quiet,
        );
        let feeder = Feeder::new(
            Arc::clone(&self.config),
            task_tx,
            result_tx,
            self.cancel.clone(),
            Arc::clone(&self.stats),
        );
        feeder.run(lines, &mut reporter);
        reporter.finish();

        // Normal runs always end: every worker posts its marker and the writer
        // counts them. Once cancelled, all remaining joins share one deadline.
        let mut deadline = JoinDeadline::new(self.cancel.clone(), JOIN_TIMEOUT);
        let worker_error = join_workers(worker_handles, &mut deadline);
        let report = self.join_writer(writer_handle, start_size, &mut deadline)?;

        if let Some(e) = worker_error {
            return Err(e);
        }

        let end_size = existing_size(output).max(report.final_size);
        Ok(self.summary(started_at, started, report, end_size))
    }

    fn join_writer(
        &self,
        handle: JoinHandle<ExpandResult<WriterReport>>,
        start_size: u64,
        deadline: &mut JoinDeadline,
    ) -> ExpandResult<WriterReport> {
        if !deadline.wait(&handle) {
            log::warn!("Writer did not stop within {:?}, detaching it", JOIN_TIMEOUT);
            return Ok(WriterReport {
                start_size,
                final_size: start_size,
                lines_written: self.stats.get_lines_appended(),
                ..WriterReport::default()
            });
        }

        handle
            .join()
            .map_err(|_| ExpandError::ThreadPanicked("writer".to_string()))?
    }

    fn summary(
        &self,
        started_at: SystemTime,
        started: Instant,
        report: WriterReport,
        end_size: u64,
    ) -> RunSummary {
        let stats = &self.stats;
        RunSummary {
            started_at,
            finished_at: SystemTime::now(),
            elapsed: started.elapsed(),
            lines_read: stats.get_lines_read(),
            lines_appended: stats.get_lines_appended(),
            originals_emitted: stats.get_originals_emitted(),
            start_size: report.start_size,
            end_size,
            patterns_skipped: stats.get_patterns_skipped(),
            lines_truncated: stats.get_lines_truncated(),
            line_tasks: stats.get_line_tasks(),
            chunk_tasks: stats.get_chunk_tasks(),
            limit_reached: report.limit_reached,
            interrupted: self.cancel.is_cancelled() && !report.limit_reached,
        }
    }
}

/// Shared wait budget for joining the pipeline threads
///
/// Waits are unbounded while the run is live. From the first moment a wait
/// sees the run cancelled, every remaining wait counts against one deadline.
struct JoinDeadline {
    cancel: CancelSignal,
    timeout: Duration,
    deadline: Option<Instant>,
}

impl JoinDeadline {
    fn new(cancel: CancelSignal, timeout: Duration) -> Self {
        Self {
            cancel,
            timeout,
            deadline: None,
        }
    }

    /// True once the thread has finished; false if the deadline passed first
    fn wait<T>(&mut self, handle: &JoinHandle<T>) -> bool {
        while !handle.is_finished() {
            if self.cancel.is_cancelled() {
                let timeout = self.timeout;
                let deadline = *self.deadline.get_or_insert_with(|| Instant::now() + timeout);
                if Instant::now() >= deadline {
                    return false;
                }
            }
            thread::sleep(JOIN_POLL);
        }
        true
    }
}

/// Join every worker; the first failure is returned, the rest are logged.
/// Workers still running when the deadline passes are detached.
fn join_workers(
    handles: Vec<JoinHandle<ExpandResult<WorkerStats>>>,
    deadline: &mut JoinDeadline,
) -> Option<ExpandError> {
    let mut first_error = None;
    let mut totals = WorkerStats::default();

    for (id, handle) in handles.into_iter().enumerate() {
        if !deadline.wait(&handle) {
            log::warn!("Worker {} did not stop within {:?}, detaching it", id, JOIN_TIMEOUT);
            continue;
        }
        let result = match handle.join() {
            Ok(result) => result,
            Err(_) => Err(ExpandError::ThreadPanicked(format!("worker {}", id))),
        };
        match result {
            Ok(stats) => {
                totals.tasks_completed += stats.tasks_completed;
                totals.lines_emitted += stats.lines_emitted;
                totals.slow_tasks += stats.slow_tasks;
            }
            Err(e) => {
                if first_error.is_none() {
                    first_error = Some(e);
                } else {
                    log::warn!("{}", e);
                }
            }
        }
    }

    log::debug!(
        "Workers done: {} tasks, {} lines generated, {} slow",
        totals.tasks_completed,
        totals.lines_emitted,
        totals.slow_tasks
    );
    first_error
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ProcessorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.limit_bytes, 10 * 1024 * 1024 * 1024);
        assert_eq!(config.max_line, 1_000_000);
        assert_eq!(config.chunk_threshold, 1_000_000);
        assert_eq!(config.chunk_size, 100_000);
        assert!(config.workers >= 1);
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let bad = [
            ProcessorConfig { workers: 0, ..ProcessorConfig::default() },
            ProcessorConfig { chunk_size: 0, ..ProcessorConfig::default() },
            ProcessorConfig { limit_bytes: 0, ..ProcessorConfig::default() },
            ProcessorConfig { task_queue_capacity: 0, ..ProcessorConfig::default() },
        ];
        for config in bad {
            assert!(matches!(config.validate(), Err(ExpandError::Config(_))));
        }
    }

    #[test]
    fn test_summary_rates() {
        let summary = RunSummary {
            started_at: SystemTime::now(),
            finished_at: SystemTime::now(),
            elapsed: Duration::from_secs(2),
            lines_read: 4,
            lines_appended: 400,
            originals_emitted: 4,
            start_size: 0,
            end_size: 0,
            patterns_skipped: 0,
            lines_truncated: 0,
            line_tasks: 0,
            chunk_tasks: 0,
            limit_reached: false,
            interrupted: false,
        };
        assert_eq!(summary.expansion_factor(), 100.0);
        assert_eq!(summary.lines_per_second(), 200.0);
    }

    #[test]
    fn test_join_deadline_waits_for_live_run() {
        let cancel = CancelSignal::new();
        let mut deadline = JoinDeadline::new(cancel, Duration::from_millis(20));

        let handle = thread::spawn(|| thread::sleep(Duration::from_millis(100)));
        assert!(deadline.wait(&handle));
        handle.join().unwrap();
    }

    #[test]
    fn test_join_deadline_bounds_cancelled_run() {
        let cancel = CancelSignal::new();
        let mut deadline = JoinDeadline::new(cancel.clone(), Duration::from_millis(50));

        let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(0);
        let stuck = thread::spawn(move || {
            let _ = release_rx.recv();
        });
        cancel.cancel();

        let started = Instant::now();
        assert!(!deadline.wait(&stuck));
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert!(started.elapsed() < Duration::from_secs(2));

        // the budget is spent: later waits give up at once
        let started = Instant::now();
        assert!(!deadline.wait(&stuck));
        assert!(started.elapsed() < Duration::from_millis(50));

        drop(release_tx);
        stuck.join().unwrap();
    }

    #[test]
    fn test_join_workers_detaches_stuck_worker() {
        let cancel = CancelSignal::new();
        cancel.cancel();
        let mut deadline = JoinDeadline::new(cancel, Duration::from_millis(20));

        let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(0);
        let done = thread::spawn(|| -> ExpandResult<WorkerStats> { Ok(WorkerStats::default()) });
        let stuck = thread::spawn(move || -> ExpandResult<WorkerStats> {
            let _ = release_rx.recv();
            Ok(WorkerStats::default())
        });

        assert!(join_workers(vec![done, stuck], &mut deadline).is_none());
        drop(release_tx);
    }

    #[test]
    fn test_processor_counters_belong_to_one_run() {
        let dir = tempfile::TempDir::new().unwrap();
        let out_path = dir.path().join("out.txt");

        let processor = Processor::new(ProcessorConfig {
            workers: 2,
            quiet: true,
            ..ProcessorConfig::default()
        });
        let stats = processor.stats();
        let summary = processor
            .process_lines(vec!["a1".to_string(), "plain".to_string()], &out_path)
            .unwrap();

        assert_eq!(stats.get_lines_read(), 2);
        assert_eq!(summary.originals_emitted, 2);
        assert_eq!(summary.lines_appended, 12);

        // a fresh processor starts from zero and is not cancelled
        let again = Processor::new(ProcessorConfig {
            workers: 2,
            quiet: true,
            ..ProcessorConfig::default()
        });
        assert!(!again.cancel_signal().is_cancelled());
        let summary = again
            .process_lines(vec!["b1".to_string()], &out_path)
            .unwrap();
        assert_eq!(summary.lines_read, 1);
        assert_eq!(summary.lines_appended, 11);
    }
}
