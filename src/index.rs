//! Mixed-radix index space over a pattern's digit runs
//!
//! Each run of length `L` is one digit of radix `10^L`. The rightmost run is
//! least significant. All quantities saturate at `u64::MAX`; callers only
//! ever hand in linear indices below `u64::MAX`, and for those a saturated
//! stride is larger than the index and a saturated radix is larger than any
//! quotient, so decoding stays exact.

use crate::pattern::Pattern;

/// Per-run radices, strides and pad widths
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpace {
    radices: Vec<u64>,
    strides: Vec<u64>,
    widths: Vec<usize>,
    total: u64,
}

fn radix_for(len: usize) -> u64 {
    u32::try_from(len)
        .ok()
        .and_then(|l| 10u64.checked_pow(l))
        .unwrap_or(u64::MAX)
}

impl IndexSpace {
    /// Precompute radices, strides (right to left) and widths
    pub fn build(run_lengths: &[usize]) -> Self {
        let radices: Vec<u64> = run_lengths.iter().map(|&len| radix_for(len)).collect();

        let n = radices.len();
        let mut strides = vec![1u64; n];
        for i in (0..n.saturating_sub(1)).rev() {
            strides[i] = strides[i + 1].saturating_mul(radices[i + 1]);
        }

        let total = radices.iter().fold(1u64, |acc, &r| acc.saturating_mul(r));

        Self {
            radices,
            strides,
            widths: run_lengths.to_vec(),
            total,
        }
    }

    pub fn for_pattern(pattern: &Pattern) -> Self {
        Self::build(pattern.run_lengths())
    }

    pub fn radices(&self) -> &[u64] {
        &self.radices
    }

    pub fn strides(&self) -> &[u64] {
        &self.strides
    }

    /// Zero-pad width of each run
    pub fn widths(&self) -> &[usize] {
        &self.widths
    }

    /// Number of combinations (saturating)
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Linear index -> per-run values
    pub fn decode(&self, idx: u64) -> Vec<u64> {
        self.radices
            .iter()
            .zip(&self.strides)
            .map(|(&radix, &stride)| (idx / stride) % radix)
            .collect()
    }

    /// Per-run values -> linear index
    ///
    /// Returns `None` if a value is out of range for its run or the index
    /// does not fit in `u64`.
    pub fn encode(&self, values: &[u64]) -> Option<u64> {
        if values.len() != self.radices.len() {
            return None;
        }
        let mut idx: u64 = 0;
        for ((&value, &radix), &stride) in values.iter().zip(&self.radices).zip(&self.strides) {
            if value >= radix {
                return None;
            }
            idx = idx.checked_add(value.checked_mul(stride)?)?;
        }
        Some(idx)
    }

    /// Odometer positioned at `start`
    pub fn odometer_at(&self, start: u64) -> Odometer<'_> {
        Odometer {
            values: self.decode(start),
            radices: &self.radices,
        }
    }
}

/// Counter over run values; the rightmost run turns fastest
#[derive(Debug, Clone)]
pub struct Odometer<'a> {
    values: Vec<u64>,
    radices: &'a [u64],
}

impl<'a> Odometer<'a> {
    pub fn values(&self) -> &[u64] {
        &self.values
    }

    /// Advance by one, carrying leftwards. Wraps to all zeros after the last tuple.
    pub fn step(&mut self) {
        for k in (0..self.values.len()).rev() {
            self.values[k] += 1;
            if self.values[k] < self.radices[k] {
                return;
            }
            self.values[k] = 0;
        }
    }
}

/// Lazy renderer for the candidates in `[start, start + count)`
///
/// Restartable from any `start`; not rewindable.
pub struct RangeExpander<'a> {
    pattern: &'a Pattern,
    widths: &'a [usize],
    odometer: Odometer<'a>,
    remaining: u64,
}

impl<'a> RangeExpander<'a> {
    pub fn new(pattern: &'a Pattern, space: &'a IndexSpace, start: u64, count: u64) -> Self {
        Self {
            pattern,
            widths: space.widths(),
            odometer: space.odometer_at(start),
            remaining: count,
        }
    }
}

impl Iterator for RangeExpander<'_> {
    type Item = String;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let mut line = String::new();
        self.pattern
            .render_into(self.odometer.values(), self.widths, &mut line);
        line.push('\n');
        self.odometer.step();
        Some(line)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match usize::try_from(self.remaining) {
            Ok(n) => (n, Some(n)),
            Err(_) => (usize::MAX, None),
        }
    }
}
