//! Rule catalog for circuit measurements.
//!
//! Every check is an independent [`Rule`] that looks at one circuit and the
//! reference tables and reports at most one [`NonConformity`]. Rules never
//! fail: a measurement that is missing makes the rule not applicable, and a
//! measurement that cannot be read is reported once by the format check.

mod checks;

pub use checks::{
    CableAmpacityRule, DifferentialCurrentRule, InsulationResistanceRule, LoopImpedanceRule,
    MeasurementFormatRule, NominalValuesRule, ProtectionCoordinationRule, RcdTripRule,
    VoltageDropRule,
};

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::circuit::CircuitRecord;
use crate::tables::ReferenceTables;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    /// Display rank, higher sorts first.
    pub fn rank(self) -> u8 {
        match self {
            Severity::Info => 1,
            Severity::Warning => 2,
            Severity::Critical => 3,
        }
    }

    /// Whether a finding of this severity makes a circuit invalid.
    pub fn invalidates(self) -> bool {
        matches!(self, Severity::Warning | Severity::Critical)
    }

    pub fn label(self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Category {
    Cable,
    Protection,
    VoltageDrop,
    Insulation,
    Rcd,
    Supply,
    Data,
}

/// A single rule violation found on one circuit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NonConformity {
    pub code: String,
    pub name: String,
    pub category: Category,
    pub severity: Severity,
    pub message: String,
    pub actual: Option<f64>,
    pub limit: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub affected_fields: Vec<String>,
}

impl NonConformity {
    pub fn new(rule: &dyn Rule, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            code: rule.code().to_string(),
            name: rule.name().to_string(),
            category: rule.category(),
            severity,
            message: message.into(),
            actual: None,
            limit: None,
            unit: None,
            affected_fields: Vec::new(),
        }
    }

    pub fn measured(mut self, actual: f64, limit: Option<f64>, unit: &str) -> Self {
        self.actual = Some(actual);
        self.limit = limit;
        self.unit = Some(unit.to_string());
        self
    }

    pub fn affecting(mut self, fields: &[&str]) -> Self {
        self.affected_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }
}

pub trait Rule: Send + Sync {
    /// Stable identifier, e.g. `CABLE_AMPACITY`.
    fn code(&self) -> &'static str;
    fn name(&self) -> &'static str;
    fn category(&self) -> Category;
    fn description(&self) -> &'static str;
    /// Circuit fields this rule reads. Drives the cache fingerprint.
    fn fields(&self) -> &'static [&'static str];
    fn evaluate(&self, circuit: &CircuitRecord, tables: &ReferenceTables) -> Option<NonConformity>;
}

/// Ordered set of rules run against every circuit.
#[derive(Clone)]
pub struct RuleCatalog {
    rules: Vec<Arc<dyn Rule>>,
}

impl RuleCatalog {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn with_default_rules() -> Self {
        let mut catalog = Self::new();
        catalog.add_rule(Arc::new(CableAmpacityRule));
        catalog.add_rule(Arc::new(ProtectionCoordinationRule));
        catalog.add_rule(Arc::new(VoltageDropRule));
        catalog.add_rule(Arc::new(InsulationResistanceRule));
        catalog.add_rule(Arc::new(DifferentialCurrentRule));
        catalog.add_rule(Arc::new(RcdTripRule));
        catalog.add_rule(Arc::new(LoopImpedanceRule));
        catalog.add_rule(Arc::new(NominalValuesRule));
        catalog.add_rule(Arc::new(MeasurementFormatRule));
        catalog
    }

    pub fn add_rule(&mut self, rule: Arc<dyn Rule>) {
        self.rules.push(rule);
    }

    /// Drop rules whose code is listed (case-insensitive).
    pub fn without(mut self, codes: &[String]) -> Self {
        self.rules
            .retain(|rule| !codes.iter().any(|c| c.eq_ignore_ascii_case(rule.code())));
        self
    }

    pub fn rules(&self) -> &[Arc<dyn Rule>] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Union of the fields read by all rules, sorted.
    pub fn relevant_fields(&self) -> Vec<&'static str> {
        self.rules
            .iter()
            .flat_map(|rule| rule.fields().iter().copied())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Run every rule and collect the findings in catalog order.
    pub fn evaluate(&self, circuit: &CircuitRecord, tables: &ReferenceTables) -> Vec<NonConformity> {
        self.rules
            .iter()
            .filter_map(|rule| rule.evaluate(circuit, tables))
            .collect()
    }
}

impl Default for RuleCatalog {
    fn default() -> Self {
        Self::with_default_rules()
    }
}
