//! Time source port.
//!
//! Abstracted so the engines can be driven by deterministic time in tests.

use std::sync::atomic::{AtomicU64, Ordering};

/// Milliseconds on the time source's own scale.
pub type Timestamp = u64;

/// Time source for timeouts and deadlines.
pub trait TimeSource: Send + Sync {
    /// Returns the current timestamp in milliseconds.
    fn now(&self) -> Timestamp;
}

/// Wall-clock time source (milliseconds since the Unix epoch).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as Timestamp
    }
}

/// Manually advanced time source.
#[derive(Debug, Default)]
pub struct ManualTimeSource {
    time: AtomicU64,
}

impl ManualTimeSource {
    pub fn new(initial: Timestamp) -> Self {
        Self {
            time: AtomicU64::new(initial),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.time.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set(&self, time: Timestamp) {
        self.time.store(time, Ordering::SeqCst);
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> Timestamp {
        self.time.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_time_source() {
        let now = SystemTimeSource.now();
        // after Jan 1, 2020 in ms
        assert!(now > 1_577_836_800_000);
    }

    #[test]
    fn test_manual_time_source() {
        let source = ManualTimeSource::new(1000);
        assert_eq!(source.now(), 1000);

        source.advance(500);
        assert_eq!(source.now(), 1500);

        source.set(3000);
        assert_eq!(source.now(), 3000);
    }
}
