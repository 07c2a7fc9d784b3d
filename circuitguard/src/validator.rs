//! Engine and debouncer wired together for a protocol form.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::circuit::{CircuitRecord, IntoFieldValue};
use crate::config::EngineConfig;
use crate::debounce::{ValidationCallback, ValidationDebouncer, DEFAULT_DEBOUNCE};
use crate::engine::{AggregateReport, ValidationEngine, ValidationResult};
use crate::error::CircuitGuardError;
use crate::input::InputCheck;
use crate::metrics::MetricsSnapshot;

/// Convenience front end used by one form: debounced, immediate and batch
/// validation over a single engine.
pub struct CircuitValidator {
    engine: Arc<ValidationEngine>,
    debouncer: ValidationDebouncer,
}

impl CircuitValidator {
    pub fn new(config: &EngineConfig) -> Result<Self, CircuitGuardError> {
        let engine = Arc::new(ValidationEngine::from_config(config)?);
        Ok(Self::with_engine(engine, config.debounce_delay()))
    }

    pub fn with_engine(engine: Arc<ValidationEngine>, delay: Duration) -> Self {
        let debouncer = ValidationDebouncer::new(engine.clone(), delay);
        Self { engine, debouncer }
    }

    pub fn engine(&self) -> &Arc<ValidationEngine> {
        &self.engine
    }

    pub fn debouncer(&self) -> &ValidationDebouncer {
        &self.debouncer
    }

    /// Debounced validation keyed by circuit id.
    pub fn validate(
        &self,
        key: &str,
        circuit: CircuitRecord,
        callback: Option<ValidationCallback>,
    ) -> impl Future<Output = Result<ValidationResult, CircuitGuardError>> + Send + 'static {
        self.debouncer.schedule_validation(key, circuit, callback)
    }

    pub fn validate_immediate(&self, circuit: &CircuitRecord) -> ValidationResult {
        self.engine.validate_circuit(&circuit.id, circuit)
    }

    pub fn validate_all(&self, circuits: &[CircuitRecord]) -> AggregateReport {
        self.engine.validate_all_circuits(circuits)
    }

    pub fn validate_field(&self, field: &str, raw: impl IntoFieldValue) -> InputCheck {
        self.engine.validate_input_value(field, raw)
    }

    /// Handle one edit from the form: check the field, and only when it is
    /// acceptable apply it and schedule the whole-circuit validation.
    pub fn validate_live(
        &self,
        key: &str,
        field: &str,
        raw: impl IntoFieldValue,
        mut circuit: CircuitRecord,
    ) -> Result<impl Future<Output = Result<ValidationResult, CircuitGuardError>> + Send + 'static, InputCheck>
    {
        let raw = raw.into_field_value();
        let check = self.validate_field(field, &raw);
        if !check.valid {
            return Err(check);
        }
        circuit.set(field, raw);
        Ok(self.debouncer.schedule_validation(key, circuit, None))
    }

    pub fn cancel(&self, key: &str) -> bool {
        self.debouncer.cancel_validation(key)
    }

    pub fn cancel_all(&self) -> usize {
        self.debouncer.cancel_all()
    }

    pub fn is_pending(&self, key: &str) -> bool {
        self.debouncer.is_pending(key)
    }

    pub fn pending_count(&self) -> usize {
        self.debouncer.pending_count()
    }

    pub fn clear_cache(&self) {
        self.engine.clear_cache();
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.engine.metrics()
    }

    pub fn reset_metrics(&self) {
        self.engine.reset_metrics();
    }
}

impl Default for CircuitValidator {
    fn default() -> Self {
        Self::with_engine(Arc::new(ValidationEngine::default()), DEFAULT_DEBOUNCE)
    }
}
