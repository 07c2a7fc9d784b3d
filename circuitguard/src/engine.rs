//! Validation engine: runs the rule catalog and caches results by the
//! content of a circuit rather than its identity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::{debug, info};

use crate::circuit::{CircuitRecord, IntoFieldValue};
use crate::config::EngineConfig;
use crate::error::CircuitGuardError;
use crate::input::{self, InputCheck};
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::rules::{NonConformity, RuleCatalog, Severity};
use crate::tables::ReferenceTables;

/// Outcome of validating one circuit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    /// Sorted CRITICAL first, then WARNING, then INFO.
    pub non_conformities: Vec<NonConformity>,
    pub stats: ValidationStats,
    /// Highest severity among the findings.
    pub overall: Option<Severity>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationStats {
    pub critical: usize,
    pub warning: usize,
    pub info: usize,
}

impl ValidationResult {
    /// Deduplicate by rule code, sort by severity and derive validity.
    pub fn from_findings(findings: Vec<NonConformity>) -> Self {
        let mut seen = HashSet::new();
        let mut non_conformities: Vec<NonConformity> = findings
            .into_iter()
            .filter(|f| seen.insert(f.code.clone()))
            .collect();
        non_conformities.sort_by(|a, b| b.severity.rank().cmp(&a.severity.rank()));

        let stats = issues_to_stats(&non_conformities);
        let overall = non_conformities.first().map(|f| f.severity);
        Self {
            is_valid: !non_conformities.iter().any(|f| f.severity.invalidates()),
            non_conformities,
            stats,
            overall,
        }
    }

    pub fn has_critical(&self) -> bool {
        self.stats.critical > 0
    }

    pub fn total_issues(&self) -> usize {
        self.stats.critical + self.stats.warning + self.stats.info
    }
}

fn issues_to_stats(findings: &[NonConformity]) -> ValidationStats {
    let mut stats = ValidationStats::default();
    for finding in findings {
        match finding.severity {
            Severity::Critical => stats.critical += 1,
            Severity::Warning => stats.warning += 1,
            Severity::Info => stats.info += 1,
        }
    }
    stats
}

/// A validated circuit inside an aggregate report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitResult {
    pub circuit_id: String,
    #[serde(flatten)]
    pub result: ValidationResult,
}

/// Roll-up over a full circuit set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateReport {
    pub circuit_results: Vec<CircuitResult>,
    pub total_circuits: usize,
    pub valid_circuits: usize,
    pub circuits_with_issues: usize,
    /// Circuits with at least one CRITICAL finding.
    pub critical_issues: usize,
}

impl AggregateReport {
    pub fn from_results(circuit_results: Vec<CircuitResult>) -> Self {
        let total_circuits = circuit_results.len();
        let valid_circuits = circuit_results.iter().filter(|c| c.result.is_valid).count();
        let critical_issues = circuit_results
            .iter()
            .filter(|c| c.result.has_critical())
            .count();
        Self {
            circuit_results,
            total_circuits,
            valid_circuits,
            circuits_with_issues: total_circuits - valid_circuits,
            critical_issues,
        }
    }
}

/// Cache key built from the fields the catalog reads.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub result: ValidationResult,
    pub computed_at: DateTime<Utc>,
    sequence: u64,
}

#[derive(Default)]
struct ResultCache {
    entries: HashMap<Fingerprint, CacheEntry>,
    next_sequence: u64,
}

impl ResultCache {
    fn insert(&mut self, fingerprint: Fingerprint, result: ValidationResult, bound: Option<usize>) {
        if let Some(max) = bound {
            if max == 0 {
                return;
            }
            while self.entries.len() >= max {
                let Some(oldest) = self
                    .entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.sequence)
                    .map(|(key, _)| key.clone())
                else {
                    break;
                };
                self.entries.remove(&oldest);
                debug!("Evicted cache entry {}", oldest.as_str());
            }
        }
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.entries.insert(
            fingerprint,
            CacheEntry {
                result,
                computed_at: Utc::now(),
                sequence,
            },
        );
    }
}

/// Runs the rule catalog against circuits. Owns its cache and metrics; two
/// engines never share either.
pub struct ValidationEngine {
    catalog: RuleCatalog,
    tables: ReferenceTables,
    relevant_fields: Vec<&'static str>,
    max_cache_entries: Option<usize>,
    cache: Mutex<ResultCache>,
    metrics: Mutex<Metrics>,
}

impl ValidationEngine {
    pub fn new(tables: ReferenceTables) -> Self {
        Self::with_catalog(RuleCatalog::with_default_rules(), tables)
    }

    pub fn with_catalog(catalog: RuleCatalog, tables: ReferenceTables) -> Self {
        let relevant_fields = catalog.relevant_fields();
        Self {
            catalog,
            tables,
            relevant_fields,
            max_cache_entries: None,
            cache: Mutex::new(ResultCache::default()),
            metrics: Mutex::new(Metrics::new()),
        }
    }

    /// Build from configuration: loads override tables, drops disabled rules
    /// and applies the cache bound.
    pub fn from_config(config: &EngineConfig) -> Result<Self, CircuitGuardError> {
        let tables = config.load_tables()?;
        let catalog = RuleCatalog::with_default_rules().without(&config.disabled_rules);
        Ok(Self::with_catalog(catalog, tables).with_max_cache_entries(config.max_cache_entries))
    }

    pub fn with_max_cache_entries(mut self, max: Option<usize>) -> Self {
        self.max_cache_entries = max;
        self
    }

    pub fn catalog(&self) -> &RuleCatalog {
        &self.catalog
    }

    pub fn tables(&self) -> &ReferenceTables {
        &self.tables
    }

    pub fn fingerprint(&self, circuit: &CircuitRecord) -> Fingerprint {
        let mut key = String::new();
        for field in &self.relevant_fields {
            if let Some(value) = circuit.normalized(field) {
                key.push_str(&format!("{field}={value:?};"));
            }
        }
        Fingerprint(key)
    }

    /// Validate one circuit, answering from the cache when the relevant
    /// fields were seen before.
    pub fn validate_circuit(&self, circuit_id: &str, circuit: &CircuitRecord) -> ValidationResult {
        let started = Instant::now();
        let fingerprint = self.fingerprint(circuit);

        let cached = self
            .lock_cache()
            .entries
            .get(&fingerprint)
            .map(|entry| entry.result.clone());
        if let Some(result) = cached {
            self.lock_metrics().record_hit(started.elapsed());
            debug!("Cache hit for circuit {}", circuit_id);
            return result;
        }

        let findings = self.catalog.evaluate(circuit, &self.tables);
        let result = ValidationResult::from_findings(findings);
        self.lock_cache()
            .insert(fingerprint, result.clone(), self.max_cache_entries);
        self.lock_metrics()
            .record_miss(self.catalog.len(), started.elapsed());
        debug!(
            "Validated circuit {}: {} finding(s), valid={}",
            circuit_id,
            result.non_conformities.len(),
            result.is_valid
        );
        result
    }

    /// Single-field check for immediate feedback. Independent of the cache.
    pub fn validate_input_value(&self, field: &str, raw: impl IntoFieldValue) -> InputCheck {
        input::validate_input_value(field, raw, &self.tables)
    }

    /// Validate every circuit (through the cache) and roll up the counts.
    pub fn validate_all_circuits(&self, circuits: &[CircuitRecord]) -> AggregateReport {
        let results = circuits
            .iter()
            .map(|circuit| CircuitResult {
                circuit_id: circuit.id.clone(),
                result: self.validate_circuit(&circuit.id, circuit),
            })
            .collect();
        AggregateReport::from_results(results)
    }

    /// Cached entry for a circuit, if any. Does not count as a validation.
    pub fn cached(&self, circuit: &CircuitRecord) -> Option<CacheEntry> {
        let fingerprint = self.fingerprint(circuit);
        self.lock_cache().entries.get(&fingerprint).cloned()
    }

    pub fn cache_len(&self) -> usize {
        self.lock_cache().entries.len()
    }

    /// Drop every cached result. Metrics are kept.
    pub fn clear_cache(&self) {
        let mut cache = self.lock_cache();
        let cleared = cache.entries.len();
        cache.entries.clear();
        info!("Cleared {} cached validation result(s)", cleared);
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.lock_metrics().snapshot()
    }

    pub fn reset_metrics(&self) {
        self.lock_metrics().reset();
        info!("Validation metrics reset");
    }

    fn lock_cache(&self) -> MutexGuard<'_, ResultCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_metrics(&self) -> MutexGuard<'_, Metrics> {
        self.metrics.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ValidationEngine {
    fn default() -> Self {
        Self::new(ReferenceTables::builtin())
    }
}
