//! Electrotechnical checks per DIN VDE 0100.

use crate::circuit::{fields, CircuitRecord};
use crate::rules::{Category, NonConformity, Rule, Severity};
use crate::tables::ReferenceTables;

/// Rated residual current of the RCD, falling back to the usual 30 mA device.
fn residual_current(circuit: &CircuitRecord, tables: &ReferenceTables) -> f64 {
    circuit
        .number(fields::RCD_RESIDUAL_CURRENT)
        .filter(|v| *v > 0.0)
        .unwrap_or(tables.constants.default_rcd_residual_current_ma)
}

/// Load current must not exceed what the conductor can carry (Ib ≤ Iz).
pub struct CableAmpacityRule;

impl Rule for CableAmpacityRule {
    fn code(&self) -> &'static str {
        "CABLE_AMPACITY"
    }

    fn name(&self) -> &'static str {
        "Cable ampacity"
    }

    fn category(&self) -> Category {
        Category::Cable
    }

    fn description(&self) -> &'static str {
        "Circuit current must stay within the ampacity of the cable cross-section"
    }

    fn fields(&self) -> &'static [&'static str] {
        &[fields::CURRENT, fields::CABLE_GAUGE]
    }

    fn evaluate(&self, circuit: &CircuitRecord, tables: &ReferenceTables) -> Option<NonConformity> {
        let current = circuit.number(fields::CURRENT)?;
        let gauge = circuit.number(fields::CABLE_GAUGE)?;

        let Some(ampacity) = tables.cables.ampacity(gauge) else {
            return Some(
                NonConformity::new(
                    self,
                    Severity::Info,
                    format!(
                        "No ampacity rating for {} mm² (method {}), cable load not verified",
                        gauge, tables.cables.installation_method
                    ),
                )
                .measured(gauge, None, "mm²")
                .affecting(&[fields::CABLE_GAUGE]),
            );
        };

        (current > ampacity).then(|| {
            NonConformity::new(
                self,
                Severity::Critical,
                format!(
                    "Cable undersized: {} A exceeds the {} A ampacity of {} mm²",
                    current, ampacity, gauge
                ),
            )
            .measured(current, Some(ampacity), "A")
            .affecting(&[fields::CABLE_GAUGE, fields::CURRENT])
        })
    }
}

/// Overcurrent device must sit between load and cable rating (Ib ≤ In ≤ Iz).
pub struct ProtectionCoordinationRule;

impl Rule for ProtectionCoordinationRule {
    fn code(&self) -> &'static str {
        "PROTECTION_COORDINATION"
    }

    fn name(&self) -> &'static str {
        "Protection device coordination"
    }

    fn category(&self) -> Category {
        Category::Protection
    }

    fn description(&self) -> &'static str {
        "Breaker rating must protect the cable and carry the load (Ib <= In <= Iz)"
    }

    fn fields(&self) -> &'static [&'static str] {
        &[fields::PROTECTION_CURRENT, fields::CABLE_GAUGE, fields::CURRENT]
    }

    fn evaluate(&self, circuit: &CircuitRecord, tables: &ReferenceTables) -> Option<NonConformity> {
        let rating = circuit.number(fields::PROTECTION_CURRENT)?;

        let ampacity = circuit
            .number(fields::CABLE_GAUGE)
            .and_then(|gauge| tables.cables.ampacity(gauge));
        if let Some(ampacity) = ampacity {
            if rating > ampacity {
                return Some(
                    NonConformity::new(
                        self,
                        Severity::Critical,
                        format!(
                            "Cable not protected: {} A breaker exceeds the {} A cable ampacity",
                            rating, ampacity
                        ),
                    )
                    .measured(rating, Some(ampacity), "A")
                    .affecting(&[fields::PROTECTION_CURRENT, fields::CABLE_GAUGE]),
                );
            }
        }

        if let Some(current) = circuit.number(fields::CURRENT) {
            if current > rating {
                return Some(
                    NonConformity::new(
                        self,
                        Severity::Warning,
                        format!(
                            "Load current {} A exceeds the {} A protection rating",
                            current, rating
                        ),
                    )
                    .measured(current, Some(rating), "A")
                    .affecting(&[fields::PROTECTION_CURRENT, fields::CURRENT]),
                );
            }
        }

        (!tables.protection.is_standard_rating(rating)).then(|| {
            NonConformity::new(
                self,
                Severity::Info,
                format!("{} A is not a standard protection device rating", rating),
            )
            .measured(rating, None, "A")
            .affecting(&[fields::PROTECTION_CURRENT])
        })
    }
}

/// Voltage drop between origin and the end of the run.
pub struct VoltageDropRule;

impl VoltageDropRule {
    /// Drop in percent of nominal voltage, measured if recorded, otherwise
    /// computed from run length, load current and cross-section.
    pub fn drop_percent(circuit: &CircuitRecord, tables: &ReferenceTables) -> Option<f64> {
        if let Some(measured) = circuit.number(fields::VOLTAGE_DROP) {
            return Some(measured);
        }

        let length = circuit.number(fields::DISTANCE)?;
        let current = circuit.number(fields::CURRENT)?;
        let gauge = circuit.number(fields::CABLE_GAUGE).filter(|g| *g > 0.0)?;
        let constants = &tables.constants;
        let voltage = circuit
            .number(fields::NOMINAL_VOLTAGE)
            .filter(|v| *v > 0.0)
            .unwrap_or(constants.default_voltage);

        // Three-phase runs use √3, single-phase runs the out-and-back length.
        let factor = if voltage >= 400.0 { 3f64.sqrt() } else { 2.0 };
        let percent = factor * length * current * constants.power_factor
            / (constants.conductor_conductivity * gauge * voltage)
            * 100.0;
        percent.is_finite().then_some(percent)
    }
}

impl Rule for VoltageDropRule {
    fn code(&self) -> &'static str {
        "VOLTAGE_DROP"
    }

    fn name(&self) -> &'static str {
        "Voltage drop"
    }

    fn category(&self) -> Category {
        Category::VoltageDrop
    }

    fn description(&self) -> &'static str {
        "Voltage drop over the cable run must stay below the configured limit (3 %)"
    }

    fn fields(&self) -> &'static [&'static str] {
        &[
            fields::VOLTAGE_DROP,
            fields::DISTANCE,
            fields::CURRENT,
            fields::CABLE_GAUGE,
            fields::NOMINAL_VOLTAGE,
        ]
    }

    fn evaluate(&self, circuit: &CircuitRecord, tables: &ReferenceTables) -> Option<NonConformity> {
        let percent = Self::drop_percent(circuit, tables)?;
        let limit = tables.constants.voltage_drop_limit_percent;
        if percent <= limit {
            return None;
        }

        let affected: &[&str] = if circuit.number(fields::VOLTAGE_DROP).is_some() {
            &[fields::VOLTAGE_DROP]
        } else {
            &[fields::DISTANCE, fields::CABLE_GAUGE, fields::CURRENT]
        };
        Some(
            NonConformity::new(
                self,
                Severity::Warning,
                format!("Voltage drop {:.2} % exceeds the {} % limit", percent, limit),
            )
            .measured(percent, Some(limit), "%")
            .affecting(affected),
        )
    }
}

/// Insulation resistance, with and without connected loads.
pub struct InsulationResistanceRule;

impl Rule for InsulationResistanceRule {
    fn code(&self) -> &'static str {
        "INSULATION_RESISTANCE"
    }

    fn name(&self) -> &'static str {
        "Insulation resistance"
    }

    fn category(&self) -> Category {
        Category::Insulation
    }

    fn description(&self) -> &'static str {
        "Lowest measured insulation resistance must reach 1 MΩ (warning below 2 MΩ)"
    }

    fn fields(&self) -> &'static [&'static str] {
        &[fields::RISO, fields::RISO_OHNE, fields::RISO_MIT]
    }

    fn evaluate(&self, circuit: &CircuitRecord, tables: &ReferenceTables) -> Option<NonConformity> {
        let (field, lowest) = self
            .fields()
            .iter()
            .filter_map(|f| circuit.number(f).map(|v| (*f, v)))
            .min_by(|a, b| a.1.total_cmp(&b.1))?;

        let constants = &tables.constants;
        let (severity, limit) = if lowest < constants.insulation_min_mohm {
            (Severity::Critical, constants.insulation_min_mohm)
        } else if lowest < constants.insulation_warning_mohm {
            (Severity::Warning, constants.insulation_warning_mohm)
        } else {
            return None;
        };

        Some(
            NonConformity::new(
                self,
                severity,
                format!("Insulation resistance {} MΩ is below {} MΩ", lowest, limit),
            )
            .measured(lowest, Some(limit), "MΩ")
            .affecting(&[field]),
        )
    }
}

/// Standing leakage current compared to the RCD rating.
pub struct DifferentialCurrentRule;

impl Rule for DifferentialCurrentRule {
    fn code(&self) -> &'static str {
        "DIFFERENTIAL_CURRENT"
    }

    fn name(&self) -> &'static str {
        "Differential current"
    }

    fn category(&self) -> Category {
        Category::Rcd
    }

    fn description(&self) -> &'static str {
        "Leakage current must stay below 30 % of the RCD residual current rating"
    }

    fn fields(&self) -> &'static [&'static str] {
        &[fields::DIFFERENZSTROM, fields::RCD_RESIDUAL_CURRENT]
    }

    fn evaluate(&self, circuit: &CircuitRecord, tables: &ReferenceTables) -> Option<NonConformity> {
        let leakage = circuit.number(fields::DIFFERENZSTROM)?;
        let rated = residual_current(circuit, tables);
        let constants = &tables.constants;

        let critical_limit = rated * constants.leakage_critical_ratio;
        let warning_limit = rated * constants.leakage_warning_ratio;
        let (severity, limit) = if leakage >= critical_limit {
            (Severity::Critical, critical_limit)
        } else if leakage > warning_limit {
            (Severity::Warning, warning_limit)
        } else {
            return None;
        };

        let affected: &[&str] = if circuit.number(fields::RCD_RESIDUAL_CURRENT).is_some() {
            &[fields::DIFFERENZSTROM, fields::RCD_RESIDUAL_CURRENT]
        } else {
            &[fields::DIFFERENZSTROM]
        };
        Some(
            NonConformity::new(
                self,
                severity,
                format!(
                    "Leakage current {} mA is too high for a {} mA RCD (limit {} mA)",
                    leakage, rated, limit
                ),
            )
            .measured(leakage, Some(limit), "mA")
            .affecting(affected),
        )
    }
}

/// RCD trip test: trip time and trip current.
pub struct RcdTripRule;

impl Rule for RcdTripRule {
    fn code(&self) -> &'static str {
        "RCD_TRIP"
    }

    fn name(&self) -> &'static str {
        "RCD trip test"
    }

    fn category(&self) -> Category {
        Category::Rcd
    }

    fn description(&self) -> &'static str {
        "RCD must trip within 300 ms and at or below its rated residual current"
    }

    fn fields(&self) -> &'static [&'static str] {
        &[
            fields::RCD_TRIP_TIME,
            fields::RCD_TRIP_CURRENT,
            fields::RCD_RESIDUAL_CURRENT,
        ]
    }

    fn evaluate(&self, circuit: &CircuitRecord, tables: &ReferenceTables) -> Option<NonConformity> {
        let rated = residual_current(circuit, tables);
        let max_time = tables.constants.rcd_max_trip_time_ms;

        let slow = circuit
            .number(fields::RCD_TRIP_TIME)
            .filter(|t| *t > max_time);
        let late = circuit
            .number(fields::RCD_TRIP_CURRENT)
            .filter(|i| *i > rated);

        match (slow, late) {
            (None, None) => None,
            (Some(time), None) => Some(
                NonConformity::new(
                    self,
                    Severity::Critical,
                    format!("RCD trip time {} ms exceeds {} ms", time, max_time),
                )
                .measured(time, Some(max_time), "ms")
                .affecting(&[fields::RCD_TRIP_TIME]),
            ),
            (None, Some(current)) => Some(
                NonConformity::new(
                    self,
                    Severity::Critical,
                    format!("RCD tripped at {} mA, above its {} mA rating", current, rated),
                )
                .measured(current, Some(rated), "mA")
                .affecting(&[fields::RCD_TRIP_CURRENT]),
            ),
            (Some(time), Some(current)) => Some(
                NonConformity::new(
                    self,
                    Severity::Critical,
                    format!(
                        "RCD trip time {} ms exceeds {} ms and trip current {} mA exceeds {} mA",
                        time, max_time, current, rated
                    ),
                )
                .measured(time, Some(max_time), "ms")
                .affecting(&[fields::RCD_TRIP_TIME, fields::RCD_TRIP_CURRENT]),
            ),
        }
    }
}

/// Fault loop impedance must allow instantaneous magnetic tripping.
pub struct LoopImpedanceRule;

impl Rule for LoopImpedanceRule {
    fn code(&self) -> &'static str {
        "LOOP_IMPEDANCE"
    }

    fn name(&self) -> &'static str {
        "Loop impedance"
    }

    fn category(&self) -> Category {
        Category::Protection
    }

    fn description(&self) -> &'static str {
        "Measured Zs must not exceed U0 / Ia for the breaker characteristic"
    }

    fn fields(&self) -> &'static [&'static str] {
        &[
            fields::LOOP_IMPEDANCE,
            fields::PROTECTION_CURRENT,
            fields::PROTECTION_CHARACTERISTIC,
        ]
    }

    fn evaluate(&self, circuit: &CircuitRecord, tables: &ReferenceTables) -> Option<NonConformity> {
        let zs = circuit.number(fields::LOOP_IMPEDANCE)?;
        let rating = circuit
            .number(fields::PROTECTION_CURRENT)
            .filter(|r| *r > 0.0)?;
        let characteristic = circuit
            .code(fields::PROTECTION_CHARACTERISTIC)
            .unwrap_or_else(|| tables.constants.default_characteristic.clone());

        let Some(multiple) = tables.protection.magnetic_multiple(&characteristic) else {
            return Some(
                NonConformity::new(
                    self,
                    Severity::Info,
                    format!(
                        "Unknown trip characteristic '{}', loop impedance not verified",
                        characteristic
                    ),
                )
                .affecting(&[fields::PROTECTION_CHARACTERISTIC]),
            );
        };

        let limit = tables.constants.phase_to_earth_voltage / (multiple * rating);
        (zs > limit).then(|| {
            NonConformity::new(
                self,
                Severity::Critical,
                format!(
                    "Loop impedance {} Ω exceeds {:.2} Ω for {}{}",
                    zs, limit, characteristic, rating
                ),
            )
            .measured(zs, Some(limit), "Ω")
            .affecting(&[fields::LOOP_IMPEDANCE, fields::PROTECTION_CURRENT])
        })
    }
}

/// Recorded nominal voltage and frequency belong to the accepted sets.
pub struct NominalValuesRule;

impl Rule for NominalValuesRule {
    fn code(&self) -> &'static str {
        "NOMINAL_VALUES"
    }

    fn name(&self) -> &'static str {
        "Nominal voltage and frequency"
    }

    fn category(&self) -> Category {
        Category::Supply
    }

    fn description(&self) -> &'static str {
        "Nominal voltage and frequency should be one of the accepted supply values"
    }

    fn fields(&self) -> &'static [&'static str] {
        &[fields::NOMINAL_VOLTAGE, fields::NOMINAL_FREQUENCY]
    }

    fn evaluate(&self, circuit: &CircuitRecord, tables: &ReferenceTables) -> Option<NonConformity> {
        let constants = &tables.constants;
        let voltage = circuit
            .number(fields::NOMINAL_VOLTAGE)
            .filter(|v| !constants.is_accepted_voltage(*v));
        let frequency = circuit
            .number(fields::NOMINAL_FREQUENCY)
            .filter(|f| !constants.is_accepted_frequency(*f));

        let (message, actual, unit, affected): (String, f64, &str, &[&str]) =
            match (voltage, frequency) {
                (None, None) => return None,
                (Some(v), None) => (
                    format!("Nominal voltage {} V is not a standard supply voltage", v),
                    v,
                    "V",
                    &[fields::NOMINAL_VOLTAGE][..],
                ),
                (None, Some(f)) => (
                    format!("Nominal frequency {} Hz is not a standard supply frequency", f),
                    f,
                    "Hz",
                    &[fields::NOMINAL_FREQUENCY][..],
                ),
                (Some(v), Some(f)) => (
                    format!("Nominal voltage {} V and frequency {} Hz are non-standard", v, f),
                    v,
                    "V",
                    &[fields::NOMINAL_VOLTAGE, fields::NOMINAL_FREQUENCY][..],
                ),
            };

        Some(
            NonConformity::new(self, Severity::Info, message)
                .measured(actual, None, unit)
                .affecting(affected),
        )
    }
}

/// Values that are present but cannot be read as a measurement.
pub struct MeasurementFormatRule;

impl Rule for MeasurementFormatRule {
    fn code(&self) -> &'static str {
        "MEASUREMENT_FORMAT"
    }

    fn name(&self) -> &'static str {
        "Measurement format"
    }

    fn category(&self) -> Category {
        Category::Data
    }

    fn description(&self) -> &'static str {
        "Recorded measurements must be finite, non-negative numbers"
    }

    fn fields(&self) -> &'static [&'static str] {
        fields::NUMERIC
    }

    fn evaluate(&self, circuit: &CircuitRecord, _tables: &ReferenceTables) -> Option<NonConformity> {
        let unreadable: Vec<&str> = fields::NUMERIC
            .iter()
            .copied()
            .filter(|f| circuit.reading(f).is_invalid())
            .collect();
        if unreadable.is_empty() {
            return None;
        }

        Some(
            NonConformity::new(
                self,
                Severity::Warning,
                format!("Unreadable measurement values: {}", unreadable.join(", ")),
            )
            .affecting(&unreadable),
        )
    }
}
