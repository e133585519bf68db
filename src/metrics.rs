//! Metrics Aggregator
//!
//! Process-wide request/prediction counters. Every operation takes the
//! same lock, so each call is atomic with respect to the others.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use crate::scoring::Label;

#[derive(Debug)]
pub struct MetricsAggregator {
    started: Instant,
    start_time: DateTime<Utc>,
    state: Mutex<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    total_requests: u64,
    total_predictions: u64,
    predictions_by_class: BTreeMap<Label, u64>,
    total_latency: Duration,
    error_count: u64,
}

/// Derived read-only view for `/metrics`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub start_time: DateTime<Utc>,
    pub uptime_seconds: f64,
    pub total_requests: u64,
    pub total_predictions: u64,
    pub predictions_by_class: BTreeMap<String, u64>,
    pub total_latency_ms: f64,
    pub error_count: u64,
    pub average_latency_ms: f64,
    pub throughput_per_second: f64,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            start_time: Utc::now(),
            state: Mutex::new(Counters::default()),
        }
    }

    /// One request carrying one prediction
    pub fn record_single(&self, label: Label, latency: Duration) {
        self.record_batch(&[label], latency);
    }

    /// One request, however many predictions it carried
    pub fn record_batch(&self, labels: &[Label], latency: Duration) {
        let mut state = self.state.lock();
        state.total_requests += 1;
        state.total_predictions += labels.len() as u64;
        for label in labels {
            *state.predictions_by_class.entry(*label).or_insert(0) += 1;
        }
        state.total_latency += latency;
    }

    pub fn record_error(&self) {
        self.state.lock().error_count += 1;
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.snapshot_at(Instant::now())
    }

    fn snapshot_at(&self, now: Instant) -> MetricsSnapshot {
        let state = self.state.lock();
        let uptime = now.saturating_duration_since(self.started).as_secs_f64();
        let total_latency_ms = state.total_latency.as_secs_f64() * 1000.0;

        let average_latency_ms = if state.total_requests > 0 {
            total_latency_ms / state.total_requests as f64
        } else {
            0.0
        };
        let throughput_per_second = if uptime > 0.0 {
            state.total_predictions as f64 / uptime
        } else {
            0.0
        };

        MetricsSnapshot {
            start_time: self.start_time,
            uptime_seconds: uptime,
            total_requests: state.total_requests,
            total_predictions: state.total_predictions,
            predictions_by_class: state
                .predictions_by_class
                .iter()
                .map(|(label, count)| (label.as_str().to_string(), *count))
                .collect(),
            total_latency_ms,
            error_count: state.error_count,
            average_latency_ms,
            throughput_per_second,
        }
    }
}

impl Default for MetricsAggregator {
    fn default() -> Self {
        Self::new()
    }
}
