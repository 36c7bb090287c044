//! Router counters.

use std::time::Duration;

/// Counters exposed by the event router.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouterMetrics {
    /// Envelopes dispatched to a handler without error
    pub processed_count: u64,
    /// Exact duplicates dropped by the dedup window
    pub dropped_count: u64,
    /// Frames that failed validation plus handler failures
    pub error_count: u64,
    /// Envelopes for threads that are neither active nor being switched to
    pub ignored_count: u64,
    total_processing_time: Duration,
    timed_routes: u64,
}

impl RouterMetrics {
    pub(crate) fn record_route(&mut self, elapsed: Duration, ok: bool) {
        self.total_processing_time += elapsed;
        self.timed_routes += 1;
        if ok {
            self.processed_count += 1;
        } else {
            self.error_count += 1;
        }
    }

    /// Mean wall time of non-duplicate routes.
    pub fn average_processing_time(&self) -> Duration {
        if self.timed_routes == 0 {
            return Duration::ZERO;
        }
        let nanos = self.total_processing_time.as_nanos() / u128::from(self.timed_routes);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}
