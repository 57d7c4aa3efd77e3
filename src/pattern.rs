//! Pattern analysis module
//!
//! Splits a line into literal segments and digit runs. The resulting
//! [`Pattern`] doubles as the deduplication key: `DESKTOP1234` and
//! `DESKTOP0001` produce the same pattern.

use std::fmt::Write;

/// Sentinel returned by [`combination_count`] once the product leaves `u64` range
pub const SATURATED: u64 = u64::MAX;

/// Segment decomposition of a line
///
/// Invariant: `segments.len() == run_lengths.len() + 1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pattern {
    segments: Vec<String>,
    run_lengths: Vec<usize>,
}

impl Pattern {
    /// Decompose a line into segments and digit runs
    ///
    /// Only ASCII `0-9` form digit runs. Other Unicode decimal digits, such
    /// as Arabic-Indic or fullwidth digits, stay in the literal segments.
    pub fn analyze(line: &str) -> Self {
        let mut segments = Vec::new();
        let mut run_lengths = Vec::new();
        let bytes = line.as_bytes();
        let mut seg_start = 0;
        let mut i = 0;

        while i < bytes.len() {
            if bytes[i].is_ascii_digit() {
                let run_start = i;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                // ASCII digits are single bytes, so these are char boundaries
                segments.push(line[seg_start..run_start].to_string());
                run_lengths.push(i - run_start);
                seg_start = i;
            } else {
                i += 1;
            }
        }
        segments.push(line[seg_start..].to_string());

        Self { segments, run_lengths }
    }

    /// Literal text around the digit runs
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Length of each digit run, left to right
    pub fn run_lengths(&self) -> &[usize] {
        &self.run_lengths
    }

    /// Lines without digit runs have nothing to expand
    pub fn is_expandable(&self) -> bool {
        !self.run_lengths.is_empty()
    }

    /// Size of this pattern's expansion space (saturating)
    pub fn combination_count(&self) -> u64 {
        combination_count(&self.run_lengths)
    }

    /// Human-readable shape, e.g. `DESKTOP####-XY##`
    pub fn shape(&self) -> String {
        let mut out = String::new();
        for (segment, &len) in self.segments.iter().zip(&self.run_lengths) {
            out.push_str(segment);
            out.extend(std::iter::repeat('#').take(len));
        }
        if let Some(tail) = self.segments.last() {
            out.push_str(tail);
        }
        out
    }

    /// Append one candidate built from per-run values to `buf`
    ///
    /// Each value is zero-padded to the matching entry of `widths`, normally
    /// the pad widths of the pattern's [`IndexSpace`](crate::index::IndexSpace).
    pub fn render_into(&self, values: &[u64], widths: &[usize], buf: &mut String) {
        debug_assert_eq!(values.len(), self.run_lengths.len());
        debug_assert_eq!(widths.len(), self.run_lengths.len());
        for ((segment, &width), value) in self.segments.iter().zip(widths).zip(values) {
            buf.push_str(segment);
            let _ = write!(buf, "{:0width$}", value, width = width);
        }
        if let Some(tail) = self.segments.last() {
            buf.push_str(tail);
        }
    }
}

/// Decompose a line into segments and digit runs
pub fn analyze(line: &str) -> Pattern {
    Pattern::analyze(line)
}

/// Product of `10^len` over all runs
///
/// Advisory only. Returns [`SATURATED`] as soon as a factor or the running
/// product overflows, so pathological lines cannot stall estimation.
pub fn combination_count(run_lengths: &[usize]) -> u64 {
    let mut total: u64 = 1;
    for &len in run_lengths {
        let radix = match u32::try_from(len).ok().and_then(|l| 10u64.checked_pow(l)) {
            Some(r) => r,
            None => return SATURATED,
        };
        total = match total.checked_mul(radix) {
            Some(t) => t,
            None => return SATURATED,
        };
    }
    total
}
