//! CircuitGuard - measurement validation for electrical installation protocols
//!
//! This library checks the measurements recorded for each circuit of an
//! inspection protocol against installation rules: cable ampacity,
//! protection coordination, voltage drop, insulation resistance, RCD
//! behaviour and more. Results are cached by the content of a circuit, so
//! re-validating unchanged data is cheap, and a per-circuit debouncer keeps
//! live editing responsive.
//!
//! # Quick Start
//!
//! ```no_run
//! use circuitguard::{fields, CircuitRecord, ValidationEngine};
//!
//! let engine = ValidationEngine::default();
//! let circuit = CircuitRecord::new("SK-1")
//!     .with(fields::CURRENT, 16)
//!     .with(fields::CABLE_GAUGE, "NYM-J 3x1,5")
//!     .with(fields::PROTECTION_CURRENT, 16);
//!
//! let result = engine.validate_circuit(&circuit.id, &circuit);
//! for finding in &result.non_conformities {
//!     println!("{}: {}", finding.severity, finding.message);
//! }
//! ```
//!
//! # Features
//!
//! - **Rule catalog**: nine checks with CRITICAL / WARNING / INFO findings
//! - **Content cache**: results keyed by the fields the rules read
//! - **Debounced validation**: one engine call per burst of edits
//! - **Field checks**: keystroke-level type and range validation

pub mod circuit;
pub mod config;
pub mod debounce;
pub mod engine;
pub mod error;
pub mod input;
pub mod metrics;
pub mod rules;
pub mod tables;
pub mod validator;

// Re-export main types
pub use circuit::{fields, CircuitRecord, Reading};
pub use config::EngineConfig;
pub use debounce::{ValidationCallback, ValidationDebouncer, DEFAULT_DEBOUNCE};
pub use engine::{
    AggregateReport, CacheEntry, CircuitResult, Fingerprint, ValidationEngine, ValidationResult,
    ValidationStats,
};
pub use error::CircuitGuardError;
pub use input::InputCheck;
pub use metrics::MetricsSnapshot;
pub use rules::{Category, NonConformity, Rule, RuleCatalog, Severity};
pub use tables::ReferenceTables;
pub use validator::CircuitValidator;

/// Load circuits from a JSON file: either an array of circuits or an object
/// with a `circuits` array.
pub fn load_circuits(path: &std::path::Path) -> Result<Vec<CircuitRecord>, CircuitGuardError> {
    let content = std::fs::read_to_string(path)?;
    parse_circuits(&content)
}

/// Parse circuits from JSON text, accepting the same shapes as [`load_circuits`].
pub fn parse_circuits(json: &str) -> Result<Vec<CircuitRecord>, CircuitGuardError> {
    #[derive(serde::Deserialize)]
    #[serde(untagged)]
    enum Document {
        List(Vec<CircuitRecord>),
        Protocol { circuits: Vec<CircuitRecord> },
    }

    let document: Document = serde_json::from_str(json)?;
    match document {
        Document::List(circuits) | Document::Protocol { circuits } => Ok(circuits),
    }
}

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        fields, CircuitGuardError, CircuitRecord, CircuitValidator, EngineConfig, NonConformity,
        ReferenceTables, Severity, ValidationEngine, ValidationResult,
    };
}
