use std::sync::atomic::{AtomicU32, Ordering};

/// Consecutive search failures since the last success or acquisition attempt
#[derive(Debug, Default)]
pub struct FailureCounter(AtomicU32);

impl FailureCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }

    /// Returns the new count
    pub fn increment(&self) -> u32 {
        self.0.fetch_add(1, Ordering::SeqCst).saturating_add(1)
    }

    pub fn reset(&self) {
        self.0.store(0, Ordering::SeqCst);
    }

    pub fn reached(&self, threshold: u32) -> bool {
        self.get() >= threshold
    }
}
