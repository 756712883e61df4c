//! Broker running-state flags

use std::sync::atomic::{AtomicBool, Ordering};

/// Shared health latches consulted by the produce path.
///
/// The index-unwritable latch is monotonic: once raised it stays raised
/// for the process lifetime, and the broker serves index reads only.
#[derive(Debug, Default)]
pub struct RunningFlags {
    index_unwritable: AtomicBool,
}

impl RunningFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_index_writable(&self) -> bool {
        !self.index_unwritable.load(Ordering::Acquire)
    }

    pub fn mark_index_unwritable(&self) {
        self.index_unwritable.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_unwritable_latch() {
        let flags = RunningFlags::new();
        assert!(flags.is_index_writable());

        flags.mark_index_unwritable();
        assert!(!flags.is_index_writable());

        // latch does not reset
        flags.mark_index_unwritable();
        assert!(!flags.is_index_writable());
    }
}
