//! Rolling failure-rate window.
//!
//! The window is a queue of time buckets. A bucket is opened when an outcome
//! arrives after the previous bucket's width has passed; buckets older than
//! the window are dropped before every read or write.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

/// Totals over the live part of the window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HealthCounts {
    pub total: u64,
    pub failures: u64,
}

impl HealthCounts {
    /// Failure share in whole percent (0 when empty).
    pub fn error_percentage(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        (self.failures * 100 / self.total) as u32
    }
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    start: Instant,
    successes: u64,
    failures: u64,
}

#[derive(Debug)]
pub struct RollingWindow {
    window: Duration,
    bucket_width: Duration,
    buckets: VecDeque<Bucket>,
}

impl RollingWindow {
    pub fn new(window: Duration, bucket_count: u32) -> Self {
        let bucket_count = bucket_count.max(1);
        Self {
            window,
            bucket_width: window / bucket_count,
            buckets: VecDeque::with_capacity(bucket_count as usize + 1),
        }
    }

    pub fn record_success(&mut self, now: Instant) {
        self.bump(now, false);
    }

    pub fn record_failure(&mut self, now: Instant) {
        self.bump(now, true);
    }

    pub fn counts(&mut self, now: Instant) -> HealthCounts {
        self.expire(now);
        self.buckets.iter().fold(HealthCounts::default(), |acc, b| HealthCounts {
            total: acc.total + b.successes + b.failures,
            failures: acc.failures + b.failures,
        })
    }

    pub fn reset(&mut self) {
        self.buckets.clear();
    }

    fn bump(&mut self, now: Instant, failed: bool) {
        self.expire(now);

        let fresh = self
            .buckets
            .back()
            .map_or(true, |b| now.duration_since(b.start) >= self.bucket_width);
        if fresh {
            self.buckets.push_back(Bucket {
                start: now,
                successes: 0,
                failures: 0,
            });
        }

        if let Some(bucket) = self.buckets.back_mut() {
            if failed {
                bucket.failures += 1;
            } else {
                bucket.successes += 1;
            }
        }
    }

    fn expire(&mut self, now: Instant) {
        while let Some(front) = self.buckets.front() {
            if now.duration_since(front.start) >= self.window {
                self.buckets.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_percentage() {
        assert_eq!(HealthCounts::default().error_percentage(), 0);
        assert_eq!(HealthCounts { total: 4, failures: 1 }.error_percentage(), 25);
        assert_eq!(HealthCounts { total: 3, failures: 3 }.error_percentage(), 100);
    }

    #[test]
    fn test_counts_within_window() {
        let start = Instant::now();
        let mut window = RollingWindow::new(Duration::from_secs(10), 10);

        window.record_success(start);
        window.record_failure(start + Duration::from_millis(500));
        window.record_failure(start + Duration::from_millis(1500));

        let counts = window.counts(start + Duration::from_secs(2));
        assert_eq!(counts, HealthCounts { total: 3, failures: 2 });
    }

    #[test]
    fn test_old_buckets_expire() {
        let start = Instant::now();
        let mut window = RollingWindow::new(Duration::from_secs(10), 10);

        window.record_failure(start);
        window.record_failure(start + Duration::from_secs(5));
        window.record_success(start + Duration::from_secs(9));

        // The first bucket has aged out.
        let counts = window.counts(start + Duration::from_secs(11));
        assert_eq!(counts, HealthCounts { total: 2, failures: 1 });

        let counts = window.counts(start + Duration::from_secs(30));
        assert_eq!(counts.total, 0);
    }

    #[test]
    fn test_reset() {
        let now = Instant::now();
        let mut window = RollingWindow::new(Duration::from_secs(1), 4);
        window.record_failure(now);
        window.reset();
        assert_eq!(window.counts(now).total, 0);
    }
}
