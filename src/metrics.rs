//! Ambient metrics: tick-broadcast latency and collection duration
//! (SPEC_FULL.md §B.6).
//!
//! Grounded in the teacher's use of `hdrhistogram` for its response-time
//! tracker: a thin wrapper that records samples under a lock and exposes a
//! plain snapshot, with no Prometheus/HTTP exporter since transport is out
//! of scope here.

use hdrhistogram::Histogram;
use serde::Serialize;
use std::sync::Mutex;
use std::time::Duration;

/// Records broadcast and collection latencies as they happen.
///
/// Uses a single `hdrhistogram::Histogram` per tracked operation, matching
/// the teacher's choice of library for its own `response_time_tracker`
/// rather than a naive running-average.
pub struct EngineMetrics {
    broadcast_latency_us: Mutex<Histogram<u64>>,
    collection_duration_us: Mutex<Histogram<u64>>,
}

impl EngineMetrics {
    /// `sigfig = 3` matches the teacher's histogram precision choice.
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        Self {
            broadcast_latency_us: Mutex::new(
                Histogram::new(3).expect("histogram bounds are valid"),
            ),
            collection_duration_us: Mutex::new(
                Histogram::new(3).expect("histogram bounds are valid"),
            ),
        }
    }

    pub fn record_broadcast_latency(&self, elapsed: Duration) {
        let micros = elapsed.as_micros().min(u128::from(u64::MAX)) as u64;
        if let Ok(mut hist) = self.broadcast_latency_us.lock() {
            let _ = hist.record(micros);
        }
    }

    pub fn record_collection_duration(&self, elapsed: Duration) {
        let micros = elapsed.as_micros().min(u128::from(u64::MAX)) as u64;
        if let Ok(mut hist) = self.collection_duration_us.lock() {
            let _ = hist.record(micros);
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> EngineMetricsSnapshot {
        let broadcast = self
            .broadcast_latency_us
            .lock()
            .map(|hist| HistogramSnapshot::from(&*hist))
            .unwrap_or_default();
        let collection = self
            .collection_duration_us
            .lock()
            .map(|hist| HistogramSnapshot::from(&*hist))
            .unwrap_or_default();

        EngineMetricsSnapshot {
            broadcast_latency_us: broadcast,
            collection_duration_us: collection,
        }
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Plain, serializable view over a histogram's percentiles — what gets
/// logged or printed, never exported over the wire.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct HistogramSnapshot {
    pub count: u64,
    pub min: u64,
    pub max: u64,
    pub mean: f64,
    pub p50: u64,
    pub p95: u64,
    pub p99: u64,
}

impl From<&Histogram<u64>> for HistogramSnapshot {
    fn from(hist: &Histogram<u64>) -> Self {
        Self {
            count: hist.len(),
            min: hist.min(),
            max: hist.max(),
            mean: hist.mean(),
            p50: hist.value_at_quantile(0.50),
            p95: hist.value_at_quantile(0.95),
            p99: hist.value_at_quantile(0.99),
        }
    }
}

/// A point-in-time view of the engine's ambient metrics.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct EngineMetricsSnapshot {
    pub broadcast_latency_us: HistogramSnapshot,
    pub collection_duration_us: HistogramSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_recorded_samples() {
        let metrics = EngineMetrics::new();
        metrics.record_broadcast_latency(Duration::from_micros(100));
        metrics.record_broadcast_latency(Duration::from_micros(200));
        metrics.record_collection_duration(Duration::from_millis(5));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.broadcast_latency_us.count, 2);
        assert_eq!(snapshot.collection_duration_us.count, 1);
        assert!(snapshot.broadcast_latency_us.max >= 200);
    }

    #[test]
    fn empty_metrics_snapshot_is_zeroed() {
        let metrics = EngineMetrics::new();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.broadcast_latency_us.count, 0);
        assert_eq!(snapshot.collection_duration_us.count, 0);
    }
}
