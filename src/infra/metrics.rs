//! Lock-free metrics for booking API calls
//!
//! Uses atomics so the HTTP client can record from any task without a lock.
//! `report()` swaps the per-interval counters to get a consistent snapshot.
//!
//! All atomics use Relaxed ordering. These are statistical counters only and
//! must not drive control flow.

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Exponential bucket boundaries (milliseconds)
/// Buckets: ≤25, ≤50, ≤100, ≤200, ≤400, ≤800, ≤1600, ≤3200, ≤6400, >6400
const BUCKET_BOUNDS: [u64; 9] = [25, 50, 100, 200, 400, 800, 1600, 3200, 6400];
const NUM_BUCKETS: usize = 10;

/// Compute bucket index for a latency value using binary search
#[inline]
fn bucket_index(latency_ms: u64) -> usize {
    BUCKET_BOUNDS.partition_point(|&bound| bound < latency_ms)
}

/// Update an atomic max value using compare-and-swap loop
#[inline]
fn update_atomic_max(atomic_max: &AtomicU64, new_value: u64) {
    let mut current_max = atomic_max.load(Ordering::Relaxed);
    while new_value > current_max {
        match atomic_max.compare_exchange_weak(
            current_max,
            new_value,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(actual) => current_max = actual,
        }
    }
}

/// Swap all buckets to zero and return their values
#[inline]
fn swap_buckets(buckets: &[AtomicU64; NUM_BUCKETS]) -> [u64; NUM_BUCKETS] {
    let mut result = [0u64; NUM_BUCKETS];
    for (i, bucket) in buckets.iter().enumerate() {
        result[i] = bucket.swap(0, Ordering::Relaxed);
    }
    result
}

/// Compute percentile from histogram buckets
/// Returns the upper bound of the bucket containing the percentile
fn percentile_from_buckets(buckets: &[u64; NUM_BUCKETS], percentile: f64) -> u64 {
    let total: u64 = buckets.iter().sum();
    if total == 0 {
        return 0;
    }

    // At least one sample must be covered, else an empty first bucket matches
    let target = ((total as f64 * percentile).ceil() as u64).max(1);
    let mut cumulative = 0u64;

    // Upper bounds for each bucket (last bucket uses 2x the previous bound)
    const BUCKET_UPPER_BOUNDS: [u64; NUM_BUCKETS] =
        [25, 50, 100, 200, 400, 800, 1600, 3200, 6400, 12800];

    for (i, &count) in buckets.iter().enumerate() {
        cumulative += count;
        if cumulative >= target {
            return BUCKET_UPPER_BOUNDS[i];
        }
    }
    BUCKET_UPPER_BOUNDS[NUM_BUCKETS - 1]
}

/// Lock-free API call metrics collector
pub struct ApiMetrics {
    /// Requests that reached a final outcome (monotonic)
    requests_total: AtomicU64,
    /// Requests that ended in an error (monotonic)
    failures_total: AtomicU64,
    /// Extra attempts made for transient failures (monotonic)
    retries_total: AtomicU64,
    /// Requests since last report (reset on report)
    requests_since_report: AtomicU64,
    /// Sum of latencies in milliseconds (reset on report)
    latency_sum_ms: AtomicU64,
    /// Max latency in milliseconds (reset on report)
    latency_max_ms: AtomicU64,
    /// Latency histogram buckets (reset on report)
    latency_buckets: [AtomicU64; NUM_BUCKETS],
}

impl Default for ApiMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ApiMetrics {
    pub fn new() -> Self {
        Self {
            requests_total: AtomicU64::new(0),
            failures_total: AtomicU64::new(0),
            retries_total: AtomicU64::new(0),
            requests_since_report: AtomicU64::new(0),
            latency_sum_ms: AtomicU64::new(0),
            latency_max_ms: AtomicU64::new(0),
            latency_buckets: Default::default(),
        }
    }

    /// Record a finished request (all attempts included)
    #[inline]
    pub fn record_request(&self, latency_ms: u64, success: bool) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        self.requests_since_report.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.failures_total.fetch_add(1, Ordering::Relaxed);
        }
        self.latency_sum_ms.fetch_add(latency_ms, Ordering::Relaxed);
        update_atomic_max(&self.latency_max_ms, latency_ms);
        self.latency_buckets[bucket_index(latency_ms)].fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_retry(&self) {
        self.retries_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn requests_total(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn failures_total(&self) -> u64 {
        self.failures_total.load(Ordering::Relaxed)
    }

    pub fn retries_total(&self) -> u64 {
        self.retries_total.load(Ordering::Relaxed)
    }

    /// Snapshot and reset the per-interval counters
    pub fn report(&self) -> ApiMetricsSummary {
        let requests = self.requests_since_report.swap(0, Ordering::Relaxed);
        let latency_sum = self.latency_sum_ms.swap(0, Ordering::Relaxed);
        let latency_max = self.latency_max_ms.swap(0, Ordering::Relaxed);
        let buckets = swap_buckets(&self.latency_buckets);

        let avg_latency_ms = if requests > 0 { latency_sum / requests } else { 0 };

        ApiMetricsSummary {
            requests_total: self.requests_total(),
            failures_total: self.failures_total(),
            retries_total: self.retries_total(),
            requests_interval: requests,
            avg_latency_ms,
            max_latency_ms: latency_max,
            p50_latency_ms: percentile_from_buckets(&buckets, 0.50),
            p99_latency_ms: percentile_from_buckets(&buckets, 0.99),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiMetricsSummary {
    pub requests_total: u64,
    pub failures_total: u64,
    pub retries_total: u64,
    pub requests_interval: u64,
    pub avg_latency_ms: u64,
    pub max_latency_ms: u64,
    pub p50_latency_ms: u64,
    pub p99_latency_ms: u64,
}

impl ApiMetricsSummary {
    pub fn log(&self) {
        info!(
            requests_total = %self.requests_total,
            failures_total = %self.failures_total,
            retries_total = %self.retries_total,
            requests = %self.requests_interval,
            avg_ms = %self.avg_latency_ms,
            max_ms = %self.max_latency_ms,
            p50_ms = %self.p50_latency_ms,
            p99_ms = %self.p99_latency_ms,
            "api_metrics"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_index() {
        assert_eq!(bucket_index(0), 0);
        assert_eq!(bucket_index(25), 0);
        assert_eq!(bucket_index(26), 1);
        assert_eq!(bucket_index(6400), 8);
        assert_eq!(bucket_index(10_000), 9);
    }

    #[test]
    fn test_report_resets_interval_counters() {
        let metrics = ApiMetrics::new();
        metrics.record_request(10, true);
        metrics.record_request(300, false);
        metrics.record_retry();

        let summary = metrics.report();
        assert_eq!(summary.requests_total, 2);
        assert_eq!(summary.failures_total, 1);
        assert_eq!(summary.retries_total, 1);
        assert_eq!(summary.requests_interval, 2);
        assert_eq!(summary.avg_latency_ms, 155);
        assert_eq!(summary.max_latency_ms, 300);
        assert_eq!(summary.p50_latency_ms, 25);

        let second = metrics.report();
        assert_eq!(second.requests_interval, 0);
        assert_eq!(second.requests_total, 2);
        assert_eq!(second.p50_latency_ms, 0);
    }

    #[test]
    fn test_percentiles_single_sample() {
        let metrics = ApiMetrics::new();
        metrics.record_request(300, true);

        let summary = metrics.report();
        assert_eq!(summary.p50_latency_ms, 400);
        assert_eq!(summary.p99_latency_ms, 400);
        assert_eq!(summary.max_latency_ms, 300);
    }

    #[test]
    fn test_percentile_skips_empty_leading_buckets() {
        let mut buckets = [0u64; NUM_BUCKETS];
        buckets[3] = 1;
        buckets[6] = 1;
        assert_eq!(percentile_from_buckets(&buckets, 0.5), 200);
        assert_eq!(percentile_from_buckets(&buckets, 0.99), 1600);
    }
}
