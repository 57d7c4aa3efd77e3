//! Pattern-shape deduplication
//!
//! Only *expansions* are deduplicated: once a pattern such as `DESKTOP####`
//! has been scheduled, later lines with the same shape are not expanded
//! again. The set lives on the feeder thread and is never shared.

use crate::pattern::Pattern;
use ahash::RandomState;
use hashbrown::HashSet;

/// Trait for pattern deduplication strategies
pub trait PatternDeduplicator: Send {
    /// Record a pattern. Returns true if it has not been seen before.
    fn insert(&mut self, pattern: &Pattern) -> bool;

    /// Number of patterns scheduled for expansion
    fn len(&self) -> usize;
}

/// In-memory set of seen patterns
pub struct PatternSet {
    set: HashSet<Pattern, RandomState>,
}

impl PatternSet {
    pub fn new() -> Self {
        Self {
            set: HashSet::with_hasher(RandomState::new()),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            set: HashSet::with_capacity_and_hasher(capacity, RandomState::new()),
        }
    }
}

impl Default for PatternSet {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternDeduplicator for PatternSet {
    fn insert(&mut self, pattern: &Pattern) -> bool {
        if self.set.contains(pattern) {
            return false;
        }
        self.set.insert(pattern.clone())
    }

    fn len(&self) -> usize {
        self.set.len()
    }
}

/// Deduplicator used with `--no-pattern-dedup`: every pattern is new
pub struct NoOpDeduplicator {
    count: usize,
}

impl NoOpDeduplicator {
    pub fn new() -> Self {
        Self { count: 0 }
    }
}

impl Default for NoOpDeduplicator {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternDeduplicator for NoOpDeduplicator {
    fn insert(&mut self, _pattern: &Pattern) -> bool {
        self.count += 1;
        true
    }

    fn len(&self) -> usize {
        self.count
    }
}

/// Factory for the feeder's deduplicator
pub fn create_deduplicator(enabled: bool) -> Box<dyn PatternDeduplicator> {
    if enabled {
        Box::new(PatternSet::with_capacity(1024))
    } else {
        Box::new(NoOpDeduplicator::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_set() {
        let mut dedup = PatternSet::new();

        assert!(dedup.insert(&Pattern::analyze("HOST1234")));
        assert!(!dedup.insert(&Pattern::analyze("HOST0007"))); // same shape
        assert!(dedup.insert(&Pattern::analyze("HOST12")));
        assert!(dedup.insert(&Pattern::analyze("NODE1234")));

        assert_eq!(dedup.len(), 3);
        assert!(!dedup.insert(&Pattern::analyze("NODE9999")));
        assert!(dedup.insert(&Pattern::analyze("NODE1")));
    }

    #[test]
    fn test_noop_deduplicator() {
        let mut dedup = NoOpDeduplicator::new();

        assert!(dedup.insert(&Pattern::analyze("HOST1234")));
        assert!(dedup.insert(&Pattern::analyze("HOST0007")));

        assert_eq!(dedup.len(), 2);
    }

    #[test]
    fn test_factory() {
        let mut enabled = create_deduplicator(true);
        assert_eq!(enabled.len(), 0);
        assert!(enabled.insert(&Pattern::analyze("a1")));
        assert!(!enabled.insert(&Pattern::analyze("a2")));

        let mut disabled = create_deduplicator(false);
        assert!(disabled.insert(&Pattern::analyze("a1")));
        assert!(disabled.insert(&Pattern::analyze("a2")));
    }
}
