//! Time-bucketed success/failure counter over a sliding interval (spec.md §4.3).

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
struct Bucket {
    /// Start of the interval this bucket represents.
    t_start: Instant,
    requests: u64,
    failures: u64,
}

/// A sliding window of `N` equal-width time buckets spanning interval `W`.
/// `record` evicts any bucket whose `t_start` has aged out of the window,
/// then writes into the bucket covering "now". All operations take a single
/// mutex; the critical section is a handful of arithmetic ops.
pub struct RollingWindow {
    interval: Duration,
    bucket_width: Duration,
    bucket_count: usize,
    buckets: Mutex<VecDeque<Bucket>>,
}

impl RollingWindow {
    /// `interval` W, partitioned into `bucket_count` (N, default 10 per
    /// spec.md §4.3) equal-width buckets.
    #[must_use]
    pub fn new(interval: Duration, bucket_count: usize) -> Self {
        assert!(bucket_count > 0, "bucket_count must be positive");
        Self {
            interval,
            bucket_width: interval / bucket_count as u32,
            bucket_count,
            buckets: Mutex::new(VecDeque::with_capacity(bucket_count)),
        }
    }

    /// Default 60s window over 10 buckets (spec.md §4.3 default).
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(Duration::from_secs(60), 10)
    }

    /// Record a single request outcome. `is_failure = true` records a
    /// failure; otherwise a success (both bump `requests`).
    pub fn record(&self, is_failure: bool) {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().unwrap();
        self.evict_stale(&mut buckets, now);

        let needs_new_bucket = match buckets.back() {
            Some(b) => now.duration_since(b.t_start) >= self.bucket_width,
            None => true,
        };

        if needs_new_bucket {
            if buckets.len() == self.bucket_count {
                buckets.pop_front();
            }
            buckets.push_back(Bucket {
                t_start: now,
                requests: 0,
                failures: 0,
            });
        }

        let bucket = buckets.back_mut().expect("just ensured a bucket exists");
        bucket.requests += 1;
        if is_failure {
            bucket.failures += 1;
        }
    }

    fn evict_stale(&self, buckets: &mut VecDeque<Bucket>, now: Instant) {
        while let Some(front) = buckets.front() {
            if now.duration_since(front.t_start) >= self.interval {
                buckets.pop_front();
            } else {
                break;
            }
        }
    }

    /// Sum of `requests` over all live buckets.
    #[must_use]
    pub fn total_count(&self) -> u64 {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().unwrap();
        self.evict_stale(&mut buckets, now);
        buckets.iter().map(|b| b.requests).sum()
    }

    /// Sum of `failures` over all live buckets.
    #[must_use]
    pub fn failure_count(&self) -> u64 {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().unwrap();
        self.evict_stale(&mut buckets, now);
        buckets.iter().map(|b| b.failures).sum()
    }

    /// `total_count() - failure_count()`.
    #[must_use]
    pub fn success_count(&self) -> u64 {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().unwrap();
        self.evict_stale(&mut buckets, now);
        let total: u64 = buckets.iter().map(|b| b.requests).sum();
        let failures: u64 = buckets.iter().map(|b| b.failures).sum();
        total - failures
    }

    /// `failure_count() / total_count()`, or `0.0` when empty.
    #[must_use]
    pub fn failure_rate(&self) -> f64 {
        let total = self.total_count();
        if total == 0 {
            0.0
        } else {
            self.failure_count() as f64 / total as f64
        }
    }

    /// Discard all recorded data (used when a breaker transitions to
    /// half-open or closed and must start counting fresh).
    pub fn reset(&self) {
        self.buckets.lock().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn empty_window_reports_zero() {
        let w = RollingWindow::new(Duration::from_millis(100), 10);
        assert_eq!(w.total_count(), 0);
        assert_eq!(w.failure_count(), 0);
        assert_eq!(w.success_count(), 0);
        assert_eq!(w.failure_rate(), 0.0);
    }

    #[test]
    fn records_successes_and_failures() {
        let w = RollingWindow::new(Duration::from_secs(60), 10);
        w.record(false);
        w.record(true);
        w.record(true);
        assert_eq!(w.total_count(), 3);
        assert_eq!(w.failure_count(), 2);
        assert_eq!(w.success_count(), 1);
        assert!((w.failure_rate() - (2.0 / 3.0)).abs() < 1e-9);
    }

    #[test]
    fn evicts_stale_buckets_after_window_elapses() {
        let w = RollingWindow::new(Duration::from_millis(50), 5);
        w.record(true);
        assert_eq!(w.total_count(), 1);

        sleep(Duration::from_millis(80));
        // After t > W wall-clock with no recording, GetTotalCount() = 0
        // (spec.md §8 rolling-window bound law).
        assert_eq!(w.total_count(), 0);
        assert_eq!(w.failure_count(), 0);
    }

    #[test]
    fn reset_clears_all_buckets() {
        let w = RollingWindow::with_defaults();
        w.record(true);
        w.record(false);
        w.reset();
        assert_eq!(w.total_count(), 0);
    }
}
