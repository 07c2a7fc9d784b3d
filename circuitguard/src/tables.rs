//! Static reference tables consulted by the rule catalog.
//!
//! The builtin values follow DIN VDE 0298-4 / IEC 60364-5-52 for PVC-insulated
//! copper cables (reference method B2, three loaded conductors, 30 °C ambient)
//! and the DIN VDE 0100-600 inspection limits. Installations that use a
//! different installation method can supply their own tables as JSON:
//!
//! ```json
//! {
//!   "cables": { "installation_method": "C", "ratings": [{ "gauge_mm2": 1.5, "ampacity_a": 17.5 }] },
//!   "protection": { "standard_ratings": [6, 10, 16], "characteristics": [{ "code": "B", "magnetic_multiple": 5 }] },
//!   "constants": { "voltage_drop_limit_percent": 4.0 }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::CircuitGuardError;

const GAUGE_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CableRating {
    pub gauge_mm2: f64,
    pub ampacity_a: f64,
}

/// Current-carrying capacity per conductor cross-section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CableTable {
    pub installation_method: String,
    pub ratings: Vec<CableRating>,
}

impl CableTable {
    pub fn ampacity(&self, gauge_mm2: f64) -> Option<f64> {
        self.ratings
            .iter()
            .find(|r| (r.gauge_mm2 - gauge_mm2).abs() < GAUGE_EPSILON)
            .map(|r| r.ampacity_a)
    }

    pub fn contains(&self, gauge_mm2: f64) -> bool {
        self.ampacity(gauge_mm2).is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripCharacteristic {
    pub code: String,
    /// Multiple of the rated current at which the magnetic release trips instantly.
    pub magnetic_multiple: f64,
}

/// Standard ratings and trip characteristics of miniature circuit breakers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtectionTable {
    pub standard_ratings: Vec<f64>,
    pub characteristics: Vec<TripCharacteristic>,
}

impl ProtectionTable {
    pub fn is_standard_rating(&self, rating_a: f64) -> bool {
        self.standard_ratings
            .iter()
            .any(|r| (r - rating_a).abs() < GAUGE_EPSILON)
    }

    pub fn magnetic_multiple(&self, code: &str) -> Option<f64> {
        self.characteristics
            .iter()
            .find(|c| c.code.eq_ignore_ascii_case(code))
            .map(|c| c.magnetic_multiple)
    }
}

/// Regulatory limits and physical constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegulatoryConstants {
    pub voltage_drop_limit_percent: f64,
    pub accepted_voltages: Vec<f64>,
    pub accepted_frequencies: Vec<f64>,
    /// Voltage assumed for drop calculations when the circuit has none.
    pub default_voltage: f64,
    /// U0 used for the loop impedance limit.
    pub phase_to_earth_voltage: f64,
    /// κ in m/(Ω·mm²).
    pub conductor_conductivity: f64,
    pub power_factor: f64,
    pub insulation_min_mohm: f64,
    pub insulation_warning_mohm: f64,
    pub default_rcd_residual_current_ma: f64,
    pub leakage_warning_ratio: f64,
    pub leakage_critical_ratio: f64,
    pub rcd_max_trip_time_ms: f64,
    pub default_characteristic: String,
}

impl Default for RegulatoryConstants {
    fn default() -> Self {
        Self {
            voltage_drop_limit_percent: 3.0,
            accepted_voltages: vec![230.0, 400.0],
            accepted_frequencies: vec![50.0, 60.0],
            default_voltage: 230.0,
            phase_to_earth_voltage: 230.0,
            conductor_conductivity: 56.0,
            power_factor: 1.0,
            insulation_min_mohm: 1.0,
            insulation_warning_mohm: 2.0,
            default_rcd_residual_current_ma: 30.0,
            leakage_warning_ratio: 0.3,
            leakage_critical_ratio: 0.5,
            rcd_max_trip_time_ms: 300.0,
            default_characteristic: "B".to_string(),
        }
    }
}

impl RegulatoryConstants {
    pub fn is_accepted_voltage(&self, volts: f64) -> bool {
        self.accepted_voltages
            .iter()
            .any(|v| (v - volts).abs() < GAUGE_EPSILON)
    }

    pub fn is_accepted_frequency(&self, hertz: f64) -> bool {
        self.accepted_frequencies
            .iter()
            .any(|f| (f - hertz).abs() < GAUGE_EPSILON)
    }
}

/// All read-only data the engine consults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceTables {
    pub cables: CableTable,
    pub protection: ProtectionTable,
    #[serde(default)]
    pub constants: RegulatoryConstants,
}

impl Default for ReferenceTables {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ReferenceTables {
    /// Tables compiled into the crate.
    pub fn builtin() -> Self {
        let ratings = [
            (1.5, 15.0),
            (2.5, 20.0),
            (4.0, 27.0),
            (6.0, 34.0),
            (10.0, 46.0),
            (16.0, 62.0),
            (25.0, 80.0),
            (35.0, 99.0),
            (50.0, 118.0),
            (70.0, 149.0),
            (95.0, 179.0),
            (120.0, 206.0),
        ]
        .into_iter()
        .map(|(gauge_mm2, ampacity_a)| CableRating {
            gauge_mm2,
            ampacity_a,
        })
        .collect();

        let characteristics = [("B", 5.0), ("C", 10.0), ("D", 20.0), ("K", 14.0), ("Z", 3.0)]
            .into_iter()
            .map(|(code, magnetic_multiple)| TripCharacteristic {
                code: code.to_string(),
                magnetic_multiple,
            })
            .collect();

        Self {
            cables: CableTable {
                installation_method: "B2".to_string(),
                ratings,
            },
            protection: ProtectionTable {
                standard_ratings: vec![
                    2.0, 4.0, 6.0, 10.0, 13.0, 16.0, 20.0, 25.0, 32.0, 40.0, 50.0, 63.0, 80.0,
                    100.0, 125.0,
                ],
                characteristics,
            },
            constants: RegulatoryConstants::default(),
        }
    }

    /// Parse tables from a JSON string and check them for consistency.
    pub fn from_json_str(json: &str) -> Result<Self, CircuitGuardError> {
        let tables: ReferenceTables = serde_json::from_str(json)?;
        tables.validate()?;
        Ok(tables)
    }

    /// Load tables from a JSON file.
    pub fn load(path: &Path) -> Result<Self, CircuitGuardError> {
        let content = std::fs::read_to_string(path)?;
        let tables: ReferenceTables = serde_json::from_str(&content)?;
        if let Err(e) = tables.validate() {
            tracing::warn!("Rejected reference tables from {:?}: {}", path, e);
            return Err(e);
        }
        tracing::info!(
            "Loaded reference tables from {:?} ({} cable ratings)",
            path,
            tables.cables.ratings.len()
        );
        Ok(tables)
    }

    pub fn validate(&self) -> Result<(), CircuitGuardError> {
        if self.cables.ratings.is_empty() {
            return Err(CircuitGuardError::InvalidTables(
                "cable table has no ratings".to_string(),
            ));
        }
        for rating in &self.cables.ratings {
            if !(rating.gauge_mm2 > 0.0 && rating.ampacity_a > 0.0) {
                return Err(CircuitGuardError::InvalidTables(format!(
                    "cable rating {} mm² / {} A must be positive",
                    rating.gauge_mm2, rating.ampacity_a
                )));
            }
        }
        if let Some(c) = self
            .protection
            .characteristics
            .iter()
            .find(|c| !(c.magnetic_multiple > 0.0))
        {
            return Err(CircuitGuardError::InvalidTables(format!(
                "trip characteristic {} needs a positive magnetic multiple",
                c.code
            )));
        }
        let limits = &self.constants;
        let positive = [
            ("voltage_drop_limit_percent", limits.voltage_drop_limit_percent),
            ("default_voltage", limits.default_voltage),
            ("phase_to_earth_voltage", limits.phase_to_earth_voltage),
            ("conductor_conductivity", limits.conductor_conductivity),
            ("power_factor", limits.power_factor),
            ("insulation_min_mohm", limits.insulation_min_mohm),
            ("default_rcd_residual_current_ma", limits.default_rcd_residual_current_ma),
            ("rcd_max_trip_time_ms", limits.rcd_max_trip_time_ms),
        ];
        if let Some((name, value)) = positive.iter().find(|(_, v)| !(*v > 0.0)) {
            return Err(CircuitGuardError::InvalidTables(format!(
                "{name} must be positive, got {value}"
            )));
        }
        Ok(())
    }
}
