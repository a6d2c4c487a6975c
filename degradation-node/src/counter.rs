use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide cumulative request count.
///
/// Every access goes through a single atomic so concurrent probes never lose
/// an increment and each one captures a distinct post-increment value.
#[derive(Debug, Default)]
pub struct RequestCounter {
    value: AtomicU64,
}

impl RequestCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment and return the value owned by this caller
    pub fn increment(&self) -> u64 {
        self.value.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Current value
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::SeqCst)
    }

    /// Reset to zero, returning the value observed just before the reset
    pub fn reset(&self) -> u64 {
        self.value.swap(0, Ordering::SeqCst)
    }
}
