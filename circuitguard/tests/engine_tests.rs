//! Integration tests for whole-circuit validation and the aggregate report

use circuitguard::prelude::*;
use circuitguard::{load_circuits, AggregateReport, RuleCatalog};
use serde_json::json;
use std::path::PathBuf;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn report_for(name: &str) -> AggregateReport {
    let circuits = load_circuits(&fixture_path(name)).expect("Should load fixture");
    ValidationEngine::default().validate_all_circuits(&circuits)
}

#[test]
fn test_valid_protocol_has_no_findings() {
    let report = report_for("valid_circuits.json");

    assert_eq!(report.total_circuits, 3);
    assert_eq!(report.valid_circuits, 3);
    assert_eq!(report.circuits_with_issues, 0);
    for circuit in &report.circuit_results {
        assert!(
            circuit.result.non_conformities.is_empty(),
            "{} should be clean, got {:?}",
            circuit.circuit_id,
            circuit.result.non_conformities
        );
    }
}

#[test]
fn test_mixed_protocol_counts() {
    let report = report_for("mixed_circuits.json");

    assert_eq!(report.total_circuits, 5);
    assert_eq!(report.valid_circuits, 2);
    assert_eq!(report.circuits_with_issues, 3);
    assert_eq!(report.critical_issues, 1);

    let ids: Vec<_> = report
        .circuit_results
        .iter()
        .map(|c| c.circuit_id.as_str())
        .collect();
    assert_eq!(ids, vec!["SK-1", "SK-2", "SK-3", "SK-4", "SK-5"]);
}

#[test]
fn test_mixed_protocol_findings() {
    let report = report_for("mixed_circuits.json");
    let codes = |index: usize| -> Vec<String> {
        report.circuit_results[index]
            .result
            .non_conformities
            .iter()
            .map(|f| f.code.clone())
            .collect()
    };

    let overloaded = &report.circuit_results[1].result;
    assert_eq!(overloaded.stats.critical, 2);
    assert!(codes(1).contains(&"CABLE_AMPACITY".to_string()));
    assert!(codes(1).contains(&"PROTECTION_COORDINATION".to_string()));

    assert_eq!(codes(2), vec!["INSULATION_RESISTANCE"]);
    assert_eq!(report.circuit_results[2].result.overall, Some(Severity::Warning));

    // Non-standard breaker rating is informational only.
    assert!(report.circuit_results[3].result.is_valid);
    assert_eq!(report.circuit_results[3].result.overall, Some(Severity::Info));

    assert_eq!(codes(4), vec!["MEASUREMENT_FORMAT"]);
    let format = &report.circuit_results[4].result.non_conformities[0];
    assert_eq!(format.affected_fields, vec!["current".to_string()]);
}

#[test]
fn test_findings_sorted_by_severity() {
    let engine = ValidationEngine::default();
    let circuit = CircuitRecord::new("SK-1")
        .with(fields::CURRENT, 16)
        .with(fields::CABLE_GAUGE, "1.5")
        .with(fields::RISO, 1.5)
        .with(fields::NOMINAL_FREQUENCY, 55);

    let result = engine.validate_circuit("SK-1", &circuit);
    let severities: Vec<Severity> = result.non_conformities.iter().map(|f| f.severity).collect();

    assert_eq!(
        severities,
        vec![Severity::Critical, Severity::Warning, Severity::Info]
    );
    assert_eq!(result.stats.critical, 1);
    assert_eq!(result.stats.warning, 1);
    assert_eq!(result.stats.info, 1);
}

#[test]
fn test_repeat_protocol_served_from_cache() {
    let circuits = load_circuits(&fixture_path("mixed_circuits.json")).unwrap();
    let engine = ValidationEngine::default();

    let first = engine.validate_all_circuits(&circuits);
    let second = engine.validate_all_circuits(&circuits);
    assert_eq!(first, second);

    let metrics = engine.metrics();
    assert_eq!(metrics.total_validations, 10);
    assert_eq!(metrics.cache_misses, 5);
    assert_eq!(metrics.cache_hits, 5);
    assert_eq!(metrics.rule_evaluations, 5 * engine.catalog().len() as u64);
}

#[test]
fn test_cache_ignores_circuit_identity() {
    let engine = ValidationEngine::default();
    let kitchen = CircuitRecord::new("SK-1")
        .with(fields::CURRENT, 10)
        .with("room", "Küche");
    let bath = CircuitRecord::new("SK-9")
        .with(fields::CURRENT, "10 A")
        .with("room", "Bad");

    engine.validate_circuit(&kitchen.id, &kitchen);
    engine.validate_circuit(&bath.id, &bath);

    assert_eq!(engine.cache_len(), 1);
    assert_eq!(engine.metrics().cache_hits, 1);
}

#[test]
fn test_custom_tables_change_verdict() {
    let config = EngineConfig {
        tables_path: Some(fixture_path("custom_tables.json")),
        ..EngineConfig::default()
    };
    let engine = ValidationEngine::from_config(&config).expect("Should load tables");
    let circuit = CircuitRecord::new("SK-1")
        .with(fields::CURRENT, 16)
        .with(fields::CABLE_GAUGE, "1.5")
        .with(fields::PROTECTION_CURRENT, 16);

    // 17.5 A for method C carries the 16 A load.
    assert!(engine.validate_circuit("SK-1", &circuit).is_valid);
    assert!(!ValidationEngine::default()
        .validate_circuit("SK-1", &circuit)
        .is_valid);
    assert_eq!(engine.tables().constants.voltage_drop_limit_percent, 4.0);
}

#[test]
fn test_custom_catalog() {
    let catalog = RuleCatalog::with_default_rules()
        .without(&["MEASUREMENT_FORMAT".to_string()]);
    let engine = ValidationEngine::with_catalog(catalog, ReferenceTables::builtin());
    let circuit = CircuitRecord::new("SK-1").with(fields::CURRENT, "abc");

    assert!(engine.validate_circuit("SK-1", &circuit).is_valid);
    assert_eq!(engine.catalog().len(), 8);
}

#[test]
fn test_field_checks_do_not_touch_cache() {
    let engine = ValidationEngine::default();

    assert!(engine.validate_input_value(fields::CURRENT, &json!("16")).valid);
    assert!(!engine.validate_input_value(fields::CURRENT, &json!("sixteen")).valid);
    assert!(!engine
        .validate_input_value(fields::PROTECTION_CHARACTERISTIC, &json!("X"))
        .valid);

    assert_eq!(engine.cache_len(), 0);
    assert_eq!(engine.metrics().total_validations, 0);
}

#[test]
fn test_prefixed_units_reach_the_rules() {
    let engine = ValidationEngine::default();

    let insulation = CircuitRecord::new("SK-1").with(fields::RISO, "800 kΩ");
    let result = engine.validate_circuit("SK-1", &insulation);
    assert!(!result.is_valid);
    let finding = &result.non_conformities[0];
    assert_eq!(finding.code, "INSULATION_RESISTANCE");
    assert_eq!(finding.severity, Severity::Critical);
    assert!((finding.actual.unwrap() - 0.8).abs() < 1e-9);

    let rcd = CircuitRecord::new("SK-2").with(fields::RCD_TRIP_TIME, "0.5 s");
    let result = engine.validate_circuit("SK-2", &rcd);
    assert_eq!(result.non_conformities[0].code, "RCD_TRIP");
    assert_eq!(result.non_conformities[0].actual, Some(500.0));

    let wrong_unit = CircuitRecord::new("SK-3").with(fields::CURRENT, "16 V");
    let result = engine.validate_circuit("SK-3", &wrong_unit);
    assert_eq!(result.non_conformities[0].code, "MEASUREMENT_FORMAT");
}

#[test]
fn test_non_finite_measurements_are_reported() {
    let engine = ValidationEngine::default();
    let circuit = CircuitRecord::new("SK-1")
        .with(fields::CURRENT, f64::NAN)
        .with(fields::CABLE_GAUGE, "1.5");

    let result = engine.validate_circuit("SK-1", &circuit);
    assert_eq!(result.non_conformities.len(), 1);
    assert_eq!(result.non_conformities[0].code, "MEASUREMENT_FORMAT");
    assert_eq!(result.non_conformities[0].affected_fields, vec!["current".to_string()]);

    assert!(!engine.validate_input_value(fields::CURRENT, f64::INFINITY).valid);
    assert!(!engine.validate_input_value(fields::RISO, f64::NEG_INFINITY).valid);
}

#[test]
fn test_result_json_shape() {
    let engine = ValidationEngine::default();
    let circuit = CircuitRecord::new("SK-1")
        .with(fields::CURRENT, 16)
        .with(fields::CABLE_GAUGE, "1.5");
    let report = engine.validate_all_circuits(&[circuit]);

    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["totalCircuits"], 1);
    assert_eq!(value["criticalIssues"], 1);

    let first = &value["circuitResults"][0];
    assert_eq!(first["circuitId"], "SK-1");
    assert_eq!(first["isValid"], false);
    assert_eq!(first["nonConformities"][0]["severity"], "CRITICAL");
    assert_eq!(first["nonConformities"][0]["code"], "CABLE_AMPACITY");
}

#[test]
fn test_missing_fixture_is_io_error() {
    let result = load_circuits(&fixture_path("does_not_exist.json"));
    assert!(matches!(result, Err(CircuitGuardError::Io(_))));
}
