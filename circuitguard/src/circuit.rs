//! Circuit records and tolerant field access.
//!
//! A circuit arrives from the protocol form as a flat map of named values.
//! Values may be JSON numbers or free text typed by an inspector ("16 A",
//! "1,5 mm²", "NYM-J 3x2,5", "800 kΩ"), so every numeric access goes through
//! [`Reading`], which separates "no data" from "data we cannot use" and
//! scales prefixed units to the field's canonical unit.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Field names understood by the rule catalog.
pub mod fields {
    pub const CURRENT: &str = "current";
    pub const CABLE_GAUGE: &str = "cableGauge";
    pub const DISTANCE: &str = "distance";
    pub const PROTECTION_CURRENT: &str = "protectionCurrent";
    pub const PROTECTION_CHARACTERISTIC: &str = "protectionCharacteristic";
    pub const NOMINAL_VOLTAGE: &str = "nominalVoltage";
    pub const NOMINAL_FREQUENCY: &str = "nominalFrequency";
    pub const RISO: &str = "riso";
    pub const RISO_OHNE: &str = "risoOhne";
    pub const RISO_MIT: &str = "risoMit";
    pub const DIFFERENZSTROM: &str = "differenzstrom";
    pub const RCD_RESIDUAL_CURRENT: &str = "rcdResidualCurrent";
    pub const RCD_TRIP_TIME: &str = "rcdTripTime";
    pub const RCD_TRIP_CURRENT: &str = "rcdTripCurrent";
    pub const LOOP_IMPEDANCE: &str = "zs";
    pub const VOLTAGE_DROP: &str = "voltageDrop";

    /// Fields holding a non-negative physical quantity.
    pub const NUMERIC: &[&str] = &[
        CURRENT,
        CABLE_GAUGE,
        DISTANCE,
        PROTECTION_CURRENT,
        NOMINAL_VOLTAGE,
        NOMINAL_FREQUENCY,
        RISO,
        RISO_OHNE,
        RISO_MIT,
        DIFFERENZSTROM,
        RCD_RESIDUAL_CURRENT,
        RCD_TRIP_TIME,
        RCD_TRIP_CURRENT,
        LOOP_IMPEDANCE,
        VOLTAGE_DROP,
    ];

    /// Fields holding a short code rather than a number.
    pub const TEXT: &[&str] = &[PROTECTION_CHARACTERISTIC];
}

/// Unit suffixes a group of fields accepts, with the factor to the group's
/// canonical unit (the first entry). Suffixes are compared lowercase, so
/// the field decides between prefixes that differ only in case: `MΩ` for
/// insulation, `mΩ` for loop impedance.
struct FieldUnits {
    fields: &'static [&'static str],
    units: &'static [(&'static str, f64)],
}

const FIELD_UNITS: &[FieldUnits] = &[
    FieldUnits {
        fields: &[fields::CURRENT, fields::PROTECTION_CURRENT],
        units: &[("a", 1.0), ("ma", 1e-3), ("ka", 1e3)],
    },
    FieldUnits {
        fields: &[
            fields::DIFFERENZSTROM,
            fields::RCD_RESIDUAL_CURRENT,
            fields::RCD_TRIP_CURRENT,
        ],
        units: &[("ma", 1.0), ("a", 1e3)],
    },
    FieldUnits {
        fields: &[fields::DISTANCE],
        units: &[("m", 1.0), ("km", 1e3)],
    },
    FieldUnits {
        fields: &[fields::CABLE_GAUGE],
        units: &[("mm²", 1.0), ("mm2", 1.0), ("qmm", 1.0), ("mm", 1.0)],
    },
    FieldUnits {
        fields: &[fields::NOMINAL_VOLTAGE],
        units: &[("v", 1.0), ("kv", 1e3)],
    },
    FieldUnits {
        fields: &[fields::NOMINAL_FREQUENCY],
        units: &[("hz", 1.0)],
    },
    FieldUnits {
        fields: &[fields::RISO, fields::RISO_OHNE, fields::RISO_MIT],
        units: &[
            ("mω", 1.0),
            ("mohm", 1.0),
            ("gω", 1e3),
            ("gohm", 1e3),
            ("kω", 1e-3),
            ("kohm", 1e-3),
            ("ω", 1e-6),
            ("ohm", 1e-6),
        ],
    },
    FieldUnits {
        fields: &[fields::RCD_TRIP_TIME],
        units: &[("ms", 1.0), ("s", 1e3)],
    },
    FieldUnits {
        fields: &[fields::LOOP_IMPEDANCE],
        units: &[
            ("ω", 1.0),
            ("ohm", 1.0),
            ("mω", 1e-3),
            ("mohm", 1e-3),
            ("kω", 1e3),
            ("kohm", 1e3),
        ],
    },
    FieldUnits {
        fields: &[fields::VOLTAGE_DROP],
        units: &[("%", 1.0)],
    },
];

/// Unit suffixes accepted for `field`, canonical unit first. Empty for
/// fields without a unit table.
pub fn accepted_units(field: &str) -> &'static [(&'static str, f64)] {
    FIELD_UNITS
        .iter()
        .find(|group| group.fields.contains(&field))
        .map(|group| group.units)
        .unwrap_or(&[])
}

/// Placeholders inspectors type for "not measured".
const NO_DATA_MARKERS: &[&str] = &["-", "--", "/", "n/a", "k.a."];

/// Outcome of reading one numeric field.
#[derive(Debug, Clone, PartialEq)]
pub enum Reading {
    /// Absent, null, blank or a "not measured" placeholder.
    Missing,
    /// A finite number in the field's canonical unit.
    Value(f64),
    /// Present but unusable; carries the raw text.
    Invalid(String),
}

impl Reading {
    pub fn value(&self) -> Option<f64> {
        match self {
            Reading::Value(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Reading::Invalid(_))
    }
}

/// Conversion into a stored field value.
///
/// Unlike `Into<Value>`, non-finite floats are kept as their text
/// (`"NaN"`, `"inf"`) instead of collapsing to `null`, so they read back as
/// [`Reading::Invalid`] rather than as a missing measurement.
pub trait IntoFieldValue {
    fn into_field_value(self) -> Value;
}

impl IntoFieldValue for Value {
    fn into_field_value(self) -> Value {
        self
    }
}

impl IntoFieldValue for &Value {
    fn into_field_value(self) -> Value {
        self.clone()
    }
}

impl IntoFieldValue for f64 {
    fn into_field_value(self) -> Value {
        if self.is_finite() {
            Value::from(self)
        } else {
            Value::String(self.to_string())
        }
    }
}

impl IntoFieldValue for f32 {
    fn into_field_value(self) -> Value {
        f64::from(self).into_field_value()
    }
}

impl IntoFieldValue for &str {
    fn into_field_value(self) -> Value {
        Value::from(self)
    }
}

impl IntoFieldValue for String {
    fn into_field_value(self) -> Value {
        Value::String(self)
    }
}

impl IntoFieldValue for bool {
    fn into_field_value(self) -> Value {
        Value::Bool(self)
    }
}

macro_rules! integer_field_value {
    ($($ty:ty),*) => {
        $(
            impl IntoFieldValue for $ty {
                fn into_field_value(self) -> Value {
                    Value::from(self)
                }
            }
        )*
    };
}

integer_field_value!(i8, i16, i32, i64, u8, u16, u32, u64, usize);

/// Circuit ids are strings, but protocol exports often number circuits.
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "circuit id must be a string or number, got {}",
            other
        ))),
    }
}

/// One circuit of an inspection protocol.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CircuitRecord {
    #[serde(default, deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl CircuitRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style setter.
    pub fn with(mut self, field: &str, value: impl IntoFieldValue) -> Self {
        self.set(field, value);
        self
    }

    pub fn set(&mut self, field: &str, value: impl IntoFieldValue) {
        self.fields
            .insert(field.to_string(), value.into_field_value());
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Read a numeric field in its canonical unit. Negative values are
    /// reported as invalid since every quantity in a protocol is a magnitude.
    pub fn reading(&self, field: &str) -> Reading {
        let Some(raw) = self.fields.get(field) else {
            return Reading::Missing;
        };
        match read_value(field, raw) {
            Reading::Value(v) if v < 0.0 => Reading::Invalid(raw_text(raw)),
            other => other,
        }
    }

    /// Shorthand for the usable value of a numeric field.
    pub fn number(&self, field: &str) -> Option<f64> {
        self.reading(field).value()
    }

    /// Trimmed, uppercased text of a code field such as the trip characteristic.
    pub fn code(&self, field: &str) -> Option<String> {
        match self.fields.get(field)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_uppercase()),
            _ => None,
        }
    }

    /// Canonical form of a field for fingerprinting. `None` when the field
    /// carries no data, so absent, null and blank values hash alike.
    pub fn normalized(&self, field: &str) -> Option<String> {
        if fields::TEXT.contains(&field) {
            return self.code(field);
        }
        match self.reading(field) {
            Reading::Missing => None,
            Reading::Value(v) => Some(format!("{v}")),
            Reading::Invalid(raw) => Some(format!("!{raw}")),
        }
    }
}

fn raw_text(raw: &Value) -> String {
    match raw {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Read a raw value of `field`: cable designations for the gauge, a
/// quantity with an optional unit for everything else.
pub fn read_value(field: &str, raw: &Value) -> Reading {
    if field == fields::CABLE_GAUGE {
        parse_gauge(raw)
    } else {
        parse_quantity(field, raw)
    }
}

/// Parse a JSON value holding a quantity of `field`, tolerating units and
/// decimal commas.
pub fn parse_quantity(field: &str, raw: &Value) -> Reading {
    match raw {
        Value::Null => Reading::Missing,
        Value::Number(n) => match n.as_f64() {
            Some(v) if v.is_finite() => Reading::Value(v),
            _ => Reading::Invalid(n.to_string()),
        },
        Value::String(s) => parse_number_text(field, s),
        other => Reading::Invalid(other.to_string()),
    }
}

/// Parse a cable cross-section. Accepts bare numbers, `mm²` suffixes and
/// designations with a core count such as `NYM-J 3x1,5`.
pub fn parse_gauge(raw: &Value) -> Reading {
    let Value::String(s) = raw else {
        return parse_quantity(fields::CABLE_GAUGE, raw);
    };
    let lower = s.trim().to_lowercase();
    let section = match lower.rfind(['x', '×']) {
        Some(pos) => {
            let sep_len = lower[pos..].chars().next().map_or(1, char::len_utf8);
            &lower[pos + sep_len..]
        }
        None => lower.as_str(),
    };
    match parse_number_text(fields::CABLE_GAUGE, section) {
        Reading::Invalid(_) => Reading::Invalid(s.clone()),
        other => other,
    }
}

/// Parse free text into a value of `field`: `"16"`, `"16 A"`, `"1,5"`,
/// `"800 kΩ"`. The unit must be one the field accepts and is scaled to the
/// field's canonical unit; any other unit makes the text invalid.
pub fn parse_number_text(field: &str, text: &str) -> Reading {
    let trimmed = text.trim();
    if trimmed.is_empty() || NO_DATA_MARKERS.contains(&trimmed.to_lowercase().as_str()) {
        return Reading::Missing;
    }

    // Meters print ">999" when the reading is above their range.
    let bounded = trimmed.strip_prefix('>').unwrap_or(trimmed).trim_start();
    let normalized = bounded.replace(',', ".");
    let split = normalized
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E')))
        .map(|(i, _)| i)
        .unwrap_or(normalized.len());
    let (number, unit) = normalized.split_at(split);
    let unit = unit.trim().to_lowercase();

    let factor = if unit.is_empty() {
        1.0
    } else {
        match accepted_units(field).iter().find(|(suffix, _)| *suffix == unit) {
            Some((_, factor)) => *factor,
            None => return Reading::Invalid(trimmed.to_string()),
        }
    };

    match number.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Reading::Value(v * factor),
        _ => Reading::Invalid(trimmed.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_number_text_units_and_commas() {
        assert_eq!(parse_number_text(fields::CURRENT, "16"), Reading::Value(16.0));
        assert_eq!(parse_number_text(fields::CURRENT, " 16 A "), Reading::Value(16.0));
        assert_eq!(parse_number_text(fields::CURRENT, "1,5"), Reading::Value(1.5));
        assert_eq!(parse_number_text(fields::LOOP_IMPEDANCE, "0.45Ω"), Reading::Value(0.45));
        assert_eq!(parse_number_text(fields::RISO, "250 MΩ"), Reading::Value(250.0));
        assert_eq!(parse_number_text(fields::VOLTAGE_DROP, "3,2 %"), Reading::Value(3.2));
        assert_eq!(parse_number_text(fields::RISO, ">999 MΩ"), Reading::Value(999.0));
    }

    #[test]
    fn test_prefixed_units_scale_to_canonical_unit() {
        let close = |reading: Reading, expected: f64| match reading {
            Reading::Value(v) => assert!((v - expected).abs() < 1e-9, "{v} != {expected}"),
            other => panic!("expected {expected}, got {other:?}"),
        };

        close(parse_number_text(fields::RISO, "800 kΩ"), 0.8);
        close(parse_number_text(fields::RISO_OHNE, "1,2 GΩ"), 1200.0);
        close(parse_number_text(fields::RISO_MIT, "500000 Ohm"), 0.5);
        close(parse_number_text(fields::RCD_TRIP_TIME, "0.5 s"), 500.0);
        close(parse_number_text(fields::RCD_TRIP_TIME, "28 ms"), 28.0);
        close(parse_number_text(fields::DISTANCE, "2 km"), 2000.0);
        close(parse_number_text(fields::CURRENT, "16 mA"), 0.016);
        close(parse_number_text(fields::PROTECTION_CURRENT, "0,1 kA"), 100.0);
        close(parse_number_text(fields::DIFFERENZSTROM, "0.03 A"), 30.0);
        close(parse_number_text(fields::RCD_TRIP_CURRENT, "18 mA"), 18.0);
        close(parse_number_text(fields::LOOP_IMPEDANCE, "350 mΩ"), 0.35);
        close(parse_number_text(fields::NOMINAL_VOLTAGE, "0,4 kV"), 400.0);
    }

    #[test]
    fn test_unit_foreign_to_field_is_invalid() {
        assert!(parse_number_text(fields::CURRENT, "16 V").is_invalid());
        assert!(parse_number_text(fields::RCD_TRIP_TIME, "20 mA").is_invalid());
        assert!(parse_number_text(fields::NOMINAL_FREQUENCY, "50 V").is_invalid());
        assert!(parse_number_text(fields::DISTANCE, "20 %").is_invalid());
        assert!(parse_number_text("bemerkung", "16 A").is_invalid());
        assert_eq!(accepted_units(fields::RISO)[0].0, "mω");
        assert!(accepted_units("bemerkung").is_empty());
    }

    #[test]
    fn test_parse_number_text_missing_and_invalid() {
        assert_eq!(parse_number_text(fields::CURRENT, ""), Reading::Missing);
        assert_eq!(parse_number_text(fields::CURRENT, "  -  "), Reading::Missing);
        assert!(parse_number_text(fields::CURRENT, "abc").is_invalid());
        assert!(parse_number_text(fields::CURRENT, "NaN").is_invalid());
        assert!(parse_number_text(fields::CURRENT, "inf").is_invalid());
        assert!(parse_number_text(fields::CURRENT, "12 apples").is_invalid());
    }

    #[test]
    fn test_non_finite_floats_stay_invalid() {
        let circuit = CircuitRecord::new("1")
            .with(fields::CURRENT, f64::NAN)
            .with(fields::RISO, f64::INFINITY)
            .with(fields::DISTANCE, f64::NEG_INFINITY);

        assert_eq!(circuit.get(fields::CURRENT), Some(&json!("NaN")));
        assert!(circuit.reading(fields::CURRENT).is_invalid());
        assert!(circuit.reading(fields::RISO).is_invalid());
        assert!(circuit.reading(fields::DISTANCE).is_invalid());
        assert_eq!(circuit.normalized(fields::CURRENT), Some("!NaN".to_string()));
    }

    #[test]
    fn test_circuit_id_accepts_numbers() {
        let circuit: CircuitRecord =
            serde_json::from_value(json!({ "id": 7, "current": 10 })).unwrap();
        assert_eq!(circuit.id, "7");

        let unnamed: CircuitRecord = serde_json::from_value(json!({ "current": 10 })).unwrap();
        assert_eq!(unnamed.id, "");

        assert!(serde_json::from_value::<CircuitRecord>(json!({ "id": [1] })).is_err());
    }

    #[test]
    fn test_parse_gauge_variants() {
        assert_eq!(parse_gauge(&json!("1.5mm²")), Reading::Value(1.5));
        assert_eq!(parse_gauge(&json!("2,5 mm2")), Reading::Value(2.5));
        assert_eq!(parse_gauge(&json!("NYM-J 3x1,5")), Reading::Value(1.5));
        assert_eq!(parse_gauge(&json!("5×2.5")), Reading::Value(2.5));
        assert_eq!(parse_gauge(&json!(4)), Reading::Value(4.0));
        assert!(parse_gauge(&json!("NYM-Test")).is_invalid());
    }

    #[test]
    fn test_reading_rejects_negative_and_non_scalars() {
        let circuit = CircuitRecord::new("1")
            .with(fields::CURRENT, -3.0)
            .with(fields::DISTANCE, json!([1, 2]))
            .with(fields::RISO, Value::Null);

        assert!(circuit.reading(fields::CURRENT).is_invalid());
        assert!(circuit.reading(fields::DISTANCE).is_invalid());
        assert_eq!(circuit.reading(fields::RISO), Reading::Missing);
        assert_eq!(circuit.reading("unknown"), Reading::Missing);
    }

    #[test]
    fn test_normalized_treats_blank_like_absent() {
        let blank = CircuitRecord::new("a").with(fields::CURRENT, "");
        let absent = CircuitRecord::new("b");
        assert_eq!(blank.normalized(fields::CURRENT), None);
        assert_eq!(absent.normalized(fields::CURRENT), None);

        let text = CircuitRecord::new("c").with(fields::CURRENT, "16 A");
        let number = CircuitRecord::new("d").with(fields::CURRENT, 16);
        assert_eq!(text.normalized(fields::CURRENT), number.normalized(fields::CURRENT));
    }

    #[test]
    fn test_circuit_record_deserializes_flat_fields() {
        let circuit: CircuitRecord = serde_json::from_value(json!({
            "id": "SK-1",
            "current": 16,
            "cableGauge": "2.5mm²",
            "protectionCharacteristic": " b "
        }))
        .unwrap();

        assert_eq!(circuit.id, "SK-1");
        assert_eq!(circuit.number(fields::CURRENT), Some(16.0));
        assert_eq!(circuit.number(fields::CABLE_GAUGE), Some(2.5));
        assert_eq!(circuit.code(fields::PROTECTION_CHARACTERISTIC), Some("B".to_string()));
    }
}
