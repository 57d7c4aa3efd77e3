//! Progress display module
//!
//! Shared run counters, periodic progress reports and the end-of-run summary,
//! styled with the same green terminal theme as the rest of the tool.

use crate::processor::RunSummary;

use bytesize::ByteSize;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Print the application banner
pub fn print_banner() {
    let banner = r#"
╔══════════════════════════════════════════════════════════════════════════════╗
║                                                                              ║
║   ██████╗ ██╗ ██████╗ ██╗████████╗    ███████╗██╗  ██╗██████╗               ║
║   ██╔══██╗██║██╔════╝ ██║╚══██╔══╝    ██╔════╝╚██╗██╔╝██╔══██╗              ║
║   ██║  ██║██║██║  ███╗██║   ██║       █████╗   ╚███╔╝ ██████╔╝              ║
║   ██║  ██║██║██║   ██║██║   ██║       ██╔══╝   ██╔██╗ ██╔═══╝               ║
║   ██████╔╝██║╚██████╔╝██║   ██║       ███████╗██╔╝ ██╗██║                   ║
║   ╚═════╝ ╚═╝ ╚═════╝ ╚═╝   ╚═╝       ╚══════╝╚═╝  ╚═╝╚═╝                   ║
║                                                                              ║
║                Parallel, Size-Bounded Digit-Run Expansion                    ║
║                         For Penetration Testing                              ║
║                                                              v1.0.0          ║
╚══════════════════════════════════════════════════════════════════════════════╝
"#;

    println!("{}", banner.green());
}

/// Print a section header
pub fn print_header(text: &str) {
    println!("\n{} {}", "▶".green(), text.green().bold());
}

/// Print an info message
pub fn print_info(text: &str) {
    println!("  {} {}", "ℹ".cyan(), text);
}

/// Print a warning message
pub fn print_warning(text: &str) {
    println!("  {} {}", "⚠".yellow(), text.yellow());
}

/// Print an error message
pub fn print_error(text: &str) {
    eprintln!("  {} {}", "✖".red(), text.red());
}

/// Create a styled spinner for indeterminate progress
pub fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();

    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ "),
    );

    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));

    pb
}

/// Counters shared by the pipeline roles
///
/// `lines_appended` is written only by the writer; everything else only by
/// the feeder.
#[derive(Debug)]
pub struct PipelineStats {
    pub lines_read: AtomicU64,
    pub lines_appended: AtomicU64,
    pub originals_emitted: AtomicU64,
    pub patterns_skipped: AtomicU64,
    pub lines_truncated: AtomicU64,
    pub line_tasks: AtomicU64,
    pub chunk_tasks: AtomicU64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self {
            lines_read: AtomicU64::new(0),
            lines_appended: AtomicU64::new(0),
            originals_emitted: AtomicU64::new(0),
            patterns_skipped: AtomicU64::new(0),
            lines_truncated: AtomicU64::new(0),
            line_tasks: AtomicU64::new(0),
            chunk_tasks: AtomicU64::new(0),
        }
    }

    pub fn add_line(&self) -> u64 {
        self.lines_read.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn add_original(&self) {
        self.originals_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_skipped_pattern(&self) {
        self.patterns_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_truncated(&self) {
        self.lines_truncated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_line_task(&self) {
        self.line_tasks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_chunk_tasks(&self, count: u64) {
        self.chunk_tasks.fetch_add(count, Ordering::Relaxed);
    }

    pub fn get_lines_read(&self) -> u64 {
        self.lines_read.load(Ordering::Relaxed)
    }

    pub fn get_lines_appended(&self) -> u64 {
        self.lines_appended.load(Ordering::Relaxed)
    }

    pub fn get_originals_emitted(&self) -> u64 {
        self.originals_emitted.load(Ordering::Relaxed)
    }

    pub fn get_patterns_skipped(&self) -> u64 {
        self.patterns_skipped.load(Ordering::Relaxed)
    }

    pub fn get_lines_truncated(&self) -> u64 {
        self.lines_truncated.load(Ordering::Relaxed)
    }

    pub fn get_line_tasks(&self) -> u64 {
        self.line_tasks.load(Ordering::Relaxed)
    }

    pub fn get_chunk_tasks(&self) -> u64 {
        self.chunk_tasks.load(Ordering::Relaxed)
    }
}

impl Default for PipelineStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Periodic progress reports, every `every` input lines
///
/// Rates are measured over the window since the previous report.
pub struct ProgressReporter {
    every: u64,
    stats: Arc<PipelineStats>,
    bar: ProgressBar,
    last_at: Instant,
    last_in: u64,
    last_out: u64,
}

impl ProgressReporter {
    /// `every == 0` disables reporting. A spinner is shown unless `quiet`.
    pub fn new(every: u64, stats: Arc<PipelineStats>, quiet: bool) -> Self {
        let bar = if every == 0 || quiet {
            ProgressBar::hidden()
        } else {
            create_spinner("Expanding...")
        };

        Self {
            every,
            stats,
            bar,
            last_at: Instant::now(),
            last_in: 0,
            last_out: 0,
        }
    }

    /// Called after each input line with the running input count
    pub fn on_line(&mut self, lines_read: u64) {
        if self.every == 0 || lines_read % self.every != 0 {
            return;
        }
        let message = self.report(lines_read);
        if self.bar.is_hidden() {
            log::info!("{}", message);
        } else {
            self.bar.set_message(message);
        }
    }

    /// Build a report line and start a new window
    pub fn report(&mut self, lines_read: u64) -> String {
        self.report_at(lines_read, Instant::now())
    }

    fn report_at(&mut self, lines_read: u64, now: Instant) -> String {
        let appended = self.stats.get_lines_appended();
        let window = now.duration_since(self.last_at).as_secs_f64();

        let (rate_in, rate_out) = if window > 0.0 {
            (
                lines_read.saturating_sub(self.last_in) as f64 / window,
                appended.saturating_sub(self.last_out) as f64 / window,
            )
        } else {
            (0.0, 0.0)
        };

        self.last_at = now;
        self.last_in = lines_read;
        self.last_out = appended;

        format!(
            "progress: in={} out≈{} ({:.0} in/s, {:.0} out/s)",
            format_number(lines_read),
            format_number(appended),
            rate_in,
            rate_out
        )
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

/// Print the end-of-run summary
pub fn print_summary(summary: &RunSummary) {
    println!();
    println!("{}", "═".repeat(60).green());
    println!("{}", "                     EXPANSION COMPLETE".green().bold());
    println!("{}", "═".repeat(60).green());
    println!();

    println!("  {} {}", "Start time:      ".green(),
        humantime::format_rfc3339_seconds(summary.started_at));
    println!("  {} {}", "End time:        ".green(),
        humantime::format_rfc3339_seconds(summary.finished_at));
    println!("  {} {}", "Elapsed:         ".green(), format_duration(summary.elapsed));
    println!();

    println!("  {} {}", "Input lines:     ".green(), format_number(summary.lines_read));
    println!("  {} {}", "Originals:       ".green(), format_number(summary.originals_emitted));
    println!("  {} {}", "Lines appended:  ".green().bold(),
        format_number(summary.lines_appended).green().bold());
    if summary.lines_read > 0 {
        println!("  {} {:.2}x per input line", "Expansion factor:".green(),
            summary.expansion_factor());
    }
    println!("  {} {} → {} (Δ {})", "Output size:     ".green(),
        ByteSize(summary.start_size),
        ByteSize(summary.end_size),
        ByteSize(summary.end_size.saturating_sub(summary.start_size)));
    println!();

    println!("  {} {}", "Line tasks:      ".green(), format_number(summary.line_tasks));
    println!("  {} {}", "Chunk tasks:     ".green(), format_number(summary.chunk_tasks));
    println!("  {} {}", "Dedup skips:     ".yellow(), format_number(summary.patterns_skipped));
    println!("  {} {}", "Truncated lines: ".yellow(), format_number(summary.lines_truncated));
    println!("  {} {:.0} lines/sec", "Throughput:      ".green(), summary.lines_per_second());

    if summary.limit_reached {
        println!();
        println!("  {} {}", "⚠".yellow(), "Output size limit reached".yellow());
    }
    if summary.interrupted {
        println!();
        println!("  {} {}", "⚠".yellow(), "Interrupted before the input was exhausted".yellow());
    }

    println!();
    println!("{}", "═".repeat(60).green());
}

/// Format a number with thousand separators
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::new();
    let chars: Vec<char> = s.chars().collect();

    for (i, c) in chars.iter().enumerate() {
        if i > 0 && (chars.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }

    result
}

/// Format duration as human-readable string
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();

    if secs < 60 {
        format!("{:.2}s", duration.as_secs_f64())
    } else if secs < 3600 {
        let mins = secs / 60;
        let secs = secs % 60;
        format!("{}m {}s", mins, secs)
    } else {
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        format!("{}h {}m", hours, mins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(123), "123");
        assert_eq!(format_number(1234), "1,234");
        assert_eq!(format_number(1234567), "1,234,567");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
        assert_eq!(format_duration(Duration::from_secs(3661)), "1h 1m");
    }

    #[test]
    fn test_stats() {
        let stats = PipelineStats::new();

        assert_eq!(stats.add_line(), 1);
        assert_eq!(stats.add_line(), 2);
        stats.add_skipped_pattern();
        stats.add_chunk_tasks(7);
        stats.add_original();
        stats.lines_appended.fetch_add(40, Ordering::Relaxed);

        assert_eq!(stats.get_lines_read(), 2);
        assert_eq!(stats.get_patterns_skipped(), 1);
        assert_eq!(stats.get_chunk_tasks(), 7);
        assert_eq!(stats.get_originals_emitted(), 1);
        assert_eq!(stats.get_lines_appended(), 40);
    }

    #[test]
    fn test_reporter_windows() {
        let stats = Arc::new(PipelineStats::new());
        let mut reporter = ProgressReporter::new(10, Arc::clone(&stats), true);

        let t0 = reporter.last_at;

        stats.lines_appended.fetch_add(500, Ordering::Relaxed);
        let first = reporter.report_at(10, t0 + Duration::from_secs(1));
        assert!(first.contains("in=10"));
        assert!(first.contains("out≈500"));
        assert!(first.contains("(10 in/s, 500 out/s)"), "{}", first);

        // 10 more lines and 1000 more outputs over the next 2s; a cumulative
        // rate would read 7 in/s here
        stats.lines_appended.fetch_add(1000, Ordering::Relaxed);
        let second = reporter.report_at(20, t0 + Duration::from_secs(3));
        assert!(second.contains("in=20"));
        assert!(second.contains("out≈1,500"));
        assert!(second.contains("(5 in/s, 500 out/s)"), "{}", second);

        // an empty window reports zero rates
        let third = reporter.report_at(20, t0 + Duration::from_secs(3));
        assert!(third.contains("(0 in/s, 0 out/s)"), "{}", third);

        reporter.finish();
    }
}
