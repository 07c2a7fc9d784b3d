//! Keystroke-level checks for a single protocol field.
//!
//! These run on every edit, before any whole-circuit validation is
//! scheduled, and never touch the engine cache.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::circuit::{accepted_units, fields, read_value, IntoFieldValue, Reading};
use crate::tables::ReferenceTables;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputCheck {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InputCheck {
    pub fn ok() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }

    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(error.into()),
        }
    }
}

/// Plausible input range for a numeric field.
struct FieldRange {
    field: &'static str,
    label: &'static str,
    unit: &'static str,
    min: f64,
    max: f64,
    /// Zero is not a meaningful rating for this field.
    exclusive_min: bool,
}

const RANGES: &[FieldRange] = &[
    FieldRange { field: fields::CURRENT, label: "Current", unit: "A", min: 0.0, max: 1000.0, exclusive_min: false },
    FieldRange { field: fields::DISTANCE, label: "Distance", unit: "m", min: 0.0, max: 10_000.0, exclusive_min: false },
    FieldRange { field: fields::PROTECTION_CURRENT, label: "Protection rating", unit: "A", min: 0.0, max: 1000.0, exclusive_min: true },
    FieldRange { field: fields::RISO, label: "Insulation resistance", unit: "MΩ", min: 0.0, max: 10_000.0, exclusive_min: false },
    FieldRange { field: fields::RISO_OHNE, label: "Insulation resistance", unit: "MΩ", min: 0.0, max: 10_000.0, exclusive_min: false },
    FieldRange { field: fields::RISO_MIT, label: "Insulation resistance", unit: "MΩ", min: 0.0, max: 10_000.0, exclusive_min: false },
    FieldRange { field: fields::DIFFERENZSTROM, label: "Differential current", unit: "mA", min: 0.0, max: 1000.0, exclusive_min: false },
    FieldRange { field: fields::RCD_RESIDUAL_CURRENT, label: "RCD residual current", unit: "mA", min: 0.0, max: 1000.0, exclusive_min: true },
    FieldRange { field: fields::RCD_TRIP_TIME, label: "RCD trip time", unit: "ms", min: 0.0, max: 5000.0, exclusive_min: false },
    FieldRange { field: fields::RCD_TRIP_CURRENT, label: "RCD trip current", unit: "mA", min: 0.0, max: 1000.0, exclusive_min: false },
    FieldRange { field: fields::LOOP_IMPEDANCE, label: "Loop impedance", unit: "Ω", min: 0.0, max: 100.0, exclusive_min: false },
    FieldRange { field: fields::VOLTAGE_DROP, label: "Voltage drop", unit: "%", min: 0.0, max: 100.0, exclusive_min: false },
];

/// Check one raw field value for type, range and accepted-set membership.
///
/// Blank values are valid (nothing measured yet) and unknown field names are
/// accepted unchecked. Non-finite floats are rejected like unreadable text.
pub fn validate_input_value(
    field: &str,
    raw: impl IntoFieldValue,
    tables: &ReferenceTables,
) -> InputCheck {
    let raw = raw.into_field_value();
    if field == fields::PROTECTION_CHARACTERISTIC {
        return check_characteristic(&raw, tables);
    }

    let value = match read_value(field, &raw) {
        Reading::Missing => return InputCheck::ok(),
        Reading::Invalid(text) => {
            if !fields::NUMERIC.contains(&field) {
                return InputCheck::ok();
            }
            return InputCheck::invalid(unreadable_message(field, &text));
        }
        Reading::Value(v) => v,
    };

    let constants = &tables.constants;
    match field {
        fields::CABLE_GAUGE => {
            if tables.cables.contains(value) {
                InputCheck::ok()
            } else {
                InputCheck::invalid(format!("{} mm² is not a known cable cross-section", value))
            }
        }
        fields::NOMINAL_VOLTAGE => {
            if constants.is_accepted_voltage(value) {
                InputCheck::ok()
            } else {
                InputCheck::invalid(format!(
                    "Nominal voltage must be one of {} V",
                    join_values(&constants.accepted_voltages)
                ))
            }
        }
        fields::NOMINAL_FREQUENCY => {
            if constants.is_accepted_frequency(value) {
                InputCheck::ok()
            } else {
                InputCheck::invalid(format!(
                    "Nominal frequency must be one of {} Hz",
                    join_values(&constants.accepted_frequencies)
                ))
            }
        }
        _ => match RANGES.iter().find(|r| r.field == field) {
            Some(range) => check_range(range, value),
            None => InputCheck::ok(),
        },
    }
}

fn unreadable_message(field: &str, text: &str) -> String {
    let units: Vec<&str> = accepted_units(field)
        .iter()
        .map(|(suffix, _)| *suffix)
        .collect();
    if units.is_empty() {
        format!("'{}' is not a valid number", text)
    } else {
        format!(
            "'{}' is not a valid number (accepted units: {})",
            text,
            units.join(", ")
        )
    }
}

fn check_range(range: &FieldRange, value: f64) -> InputCheck {
    let below = if range.exclusive_min {
        value <= range.min
    } else {
        value < range.min
    };
    if below || value > range.max {
        let lower = if range.exclusive_min { "above" } else { "at least" };
        return InputCheck::invalid(format!(
            "{} must be {} {} {} and at most {} {}",
            range.label, lower, range.min, range.unit, range.max, range.unit
        ));
    }
    InputCheck::ok()
}

fn check_characteristic(raw: &Value, tables: &ReferenceTables) -> InputCheck {
    let code = match raw {
        Value::Null => return InputCheck::ok(),
        Value::String(s) if s.trim().is_empty() => return InputCheck::ok(),
        Value::String(s) => s.trim(),
        _ => return InputCheck::invalid("Trip characteristic must be a letter code"),
    };
    if tables.protection.magnetic_multiple(code).is_some() {
        InputCheck::ok()
    } else {
        let known: Vec<&str> = tables
            .protection
            .characteristics
            .iter()
            .map(|c| c.code.as_str())
            .collect();
        InputCheck::invalid(format!(
            "Unknown trip characteristic '{}', expected one of {}",
            code,
            known.join(", ")
        ))
    }
}

fn join_values(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
