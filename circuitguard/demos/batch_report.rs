//! Validate a whole protocol file and print a per-circuit report.
//! Run with: cargo run --example batch_report [path/to/circuits.json]

use circuitguard::prelude::*;
use circuitguard::load_circuits;
use std::path::Path;

fn main() -> Result<(), CircuitGuardError> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "tests/fixtures/mixed_circuits.json".to_string());
    let path = Path::new(&path);

    if !path.exists() {
        eprintln!("File not found: {}", path.display());
        eprintln!("Usage: cargo run --example batch_report [path/to/circuits.json]");
        std::process::exit(1);
    }

    let circuits = load_circuits(path)?;
    let engine = ValidationEngine::default();
    let report = engine.validate_all_circuits(&circuits);

    println!("Protocol: {}", path.display());
    println!(
        "{} circuit(s), {} valid, {} with issues, {} critical",
        report.total_circuits,
        report.valid_circuits,
        report.circuits_with_issues,
        report.critical_issues
    );

    for circuit in &report.circuit_results {
        let status = if circuit.result.is_valid { "ok" } else { "FAIL" };
        println!("\n{} [{}]", circuit.circuit_id, status);
        for finding in &circuit.result.non_conformities {
            println!("  [{}] {}", finding.severity, finding.message);
        }
    }

    if report.critical_issues > 0 {
        std::process::exit(1);
    }
    Ok(())
}
