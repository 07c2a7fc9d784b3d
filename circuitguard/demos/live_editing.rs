//! Simulate an inspector typing into a protocol form.
//! Run with: cargo run --example live_editing

use circuitguard::prelude::*;
use serde_json::json;
use std::time::Duration;

const KEYSTROKES: [&str; 4] = ["1", "16", "16x", "16 A"];

#[tokio::main]
async fn main() -> Result<(), CircuitGuardError> {
    let validator = CircuitValidator::new(&EngineConfig::default())?;
    let mut circuit = CircuitRecord::new("SK-1")
        .with(fields::CABLE_GAUGE, "NYM-J 3x1,5")
        .with(fields::PROTECTION_CURRENT, 16);

    let mut pending = Vec::new();
    for keystroke in KEYSTROKES {
        match validator.validate_live("SK-1", fields::CURRENT, json!(keystroke), circuit.clone()) {
            Ok(result) => {
                circuit.set(fields::CURRENT, keystroke);
                println!("'{}' accepted, validation scheduled", keystroke);
                pending.push(result);
            }
            Err(check) => {
                println!(
                    "'{}' rejected: {}",
                    keystroke,
                    check.error.unwrap_or_default()
                );
            }
        }
        tokio::time::sleep(Duration::from_millis(80)).await;
    }

    let mut last = None;
    for result in pending {
        last = Some(result.await?);
    }
    if let Some(result) = last {
        println!("\nValid: {}", result.is_valid);
        for finding in &result.non_conformities {
            println!("  [{}] {}", finding.severity, finding.message);
        }
    }

    let metrics = validator.metrics();
    println!(
        "\nEngine ran {} time(s) for {} keystroke(s)",
        metrics.cache_misses,
        KEYSTROKES.len()
    );
    Ok(())
}
