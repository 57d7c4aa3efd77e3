//! Shared cancellation flag
//!
//! Set by the writer when the byte ceiling is reached or by the interrupt
//! handler. Once set it stays set for the rest of the run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cloneable handle to a level-triggered stop flag
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    flag: Arc<AtomicBool>,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag. Returns true if this call was the one that set it.
    pub fn cancel(&self) -> bool {
        !self.flag.swap(true, Ordering::SeqCst)
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_is_shared_and_sticky() {
        let signal = CancelSignal::new();
        let clone = signal.clone();

        assert!(!signal.is_cancelled());
        assert!(clone.cancel());
        assert!(signal.is_cancelled());

        // second cancel is a no-op
        assert!(!signal.cancel());
        assert!(clone.is_cancelled());
    }
}
