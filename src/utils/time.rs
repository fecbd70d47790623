use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

/// return millisecond since the unix epoch
///
/// A wall clock set before 1970 reads as 0 rather than panicking.
pub fn timestamp_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Millisecond stamp source that never goes backwards.
///
/// The wall clock may step back (NTP adjustments, manual changes); every
/// stamp handed out is `max(now, previous stamp)`, so stamps are
/// non-decreasing for everyone sharing the same clock.
#[derive(Debug, Default)]
pub struct SyncClock {
    last: AtomicU64,
}

impl SyncClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next stamp, never smaller than any stamp returned before.
    pub fn stamp(&self) -> u64 {
        self.observe(timestamp_millis())
    }

    /// Feed an externally observed time into the clock and return the
    /// resulting stamp.
    pub fn observe(
        &self,
        millis: u64,
    ) -> u64 {
        let prev = self.last.fetch_max(millis, Ordering::AcqRel);
        prev.max(millis)
    }

    /// Most recent stamp, 0 before the first one.
    pub fn last(&self) -> u64 {
        self.last.load(Ordering::Acquire)
    }
}
