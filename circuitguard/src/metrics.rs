//! Exact counters for engine activity.

use serde::Serialize;
use std::time::Duration;

/// Accumulator owned by one engine instance.
#[derive(Debug, Clone, Default)]
pub struct Metrics {
    total_validations: u64,
    cache_hits: u64,
    cache_misses: u64,
    catalog_runs: u64,
    rule_evaluations: u64,
    total_time: Duration,
    last_validation_time: Option<Duration>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// A `validate_circuit` call answered from the cache.
    pub fn record_hit(&mut self, elapsed: Duration) {
        self.total_validations += 1;
        self.cache_hits += 1;
        self.record_time(elapsed);
    }

    /// A `validate_circuit` call that ran the catalog over `rules` rules.
    pub fn record_miss(&mut self, rules: usize, elapsed: Duration) {
        self.total_validations += 1;
        self.cache_misses += 1;
        self.catalog_runs += 1;
        self.rule_evaluations += rules as u64;
        self.record_time(elapsed);
    }

    fn record_time(&mut self, elapsed: Duration) {
        self.total_time += elapsed;
        self.last_validation_time = Some(elapsed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_validations: self.total_validations,
            cache_hits: self.cache_hits,
            cache_misses: self.cache_misses,
            catalog_runs: self.catalog_runs,
            rule_evaluations: self.rule_evaluations,
            total_time: self.total_time,
            last_validation_time: self.last_validation_time,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Read-only copy of the counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub total_validations: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub catalog_runs: u64,
    pub rule_evaluations: u64,
    pub total_time: Duration,
    pub last_validation_time: Option<Duration>,
}

impl MetricsSnapshot {
    /// Share of validations served from the cache, 0.0 when nothing ran yet.
    pub fn hit_rate(&self) -> f64 {
        if self.total_validations == 0 {
            0.0
        } else {
            self.cache_hits as f64 / self.total_validations as f64
        }
    }

    pub fn average_time(&self) -> Duration {
        if self.total_validations == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(self.total_time.as_secs_f64() / self.total_validations as f64)
        }
    }
}
