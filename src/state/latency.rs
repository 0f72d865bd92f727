//! Per-listing resolution time for one enrichment run.
//!
//! A sample starts when a worker takes a listing off the queue and stops when
//! the resolver hands back its terminal result. It covers discovery, one or two
//! price extractions and any per-call timeout that fired in between. Listings
//! cut off by the batch deadline never finish, so they leave no sample.

use std::sync::Mutex;
use std::time::Duration;

use hdrhistogram::Histogram;

/// Upper bound on a recorded sample: one hour, in microseconds.
const MAX_SAMPLE_US: u64 = 3_600_000_000;

/// Resolution-time quantiles in microseconds. All `None` when nothing resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Percentiles {
    pub p50_us: Option<u64>,
    pub p95_us: Option<u64>,
    pub p99_us: Option<u64>,
}

/// Workers record concurrently; the enricher reads once after the join barrier.
pub struct ResolutionLatency {
    histogram: Mutex<Histogram<u64>>,
}

impl ResolutionLatency {
    pub fn new() -> Self {
        let histogram =
            Histogram::new_with_bounds(1, MAX_SAMPLE_US, 3).expect("valid histogram bounds");
        Self { histogram: Mutex::new(histogram) }
    }

    /// Sub-microsecond resolutions count as 1us; anything past an hour is clamped.
    pub fn record(&self, elapsed: Duration) {
        let us = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX).clamp(1, MAX_SAMPLE_US);
        if let Ok(mut h) = self.histogram.lock() {
            let _ = h.record(us);
        }
    }

    /// Number of listings that reached a result through a worker.
    pub fn samples(&self) -> u64 {
        self.histogram.lock().map(|h| h.len()).unwrap_or(0)
    }

    pub fn percentiles(&self) -> Percentiles {
        match self.histogram.lock() {
            Ok(h) if h.len() > 0 => Percentiles {
                p50_us: Some(h.value_at_quantile(0.50)),
                p95_us: Some(h.value_at_quantile(0.95)),
                p99_us: Some(h.value_at_quantile(0.99)),
            },
            _ => Percentiles::default(),
        }
    }
}

impl Default for ResolutionLatency {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_resolutions_means_no_percentiles() {
        let latency = ResolutionLatency::new();
        assert_eq!(latency.samples(), 0);
        assert_eq!(latency.percentiles(), Percentiles::default());
    }

    #[test]
    fn quantiles_track_recorded_resolutions() {
        let latency = ResolutionLatency::new();
        for ms in 1..=100 {
            latency.record(Duration::from_millis(ms));
        }
        assert_eq!(latency.samples(), 100);

        let p = latency.percentiles();
        let p50 = p.p50_us.unwrap();
        let p99 = p.p99_us.unwrap();
        assert!((49_000..=51_000).contains(&p50), "p50={p50}");
        assert!((98_000..=100_100).contains(&p99), "p99={p99}");
        assert!(p.p95_us.unwrap() <= p99);
    }

    #[test]
    fn out_of_range_samples_are_clamped() {
        let latency = ResolutionLatency::new();
        latency.record(Duration::ZERO);
        latency.record(Duration::from_secs(10 * 3600));
        assert_eq!(latency.samples(), 2);
        assert!(latency.percentiles().p99_us.unwrap() >= MAX_SAMPLE_US - MAX_SAMPLE_US / 1000);
    }
}
