//! Sensor range validation
//!
//! Validation is advisory: sensor noise is common on a wrist-worn device, so
//! out-of-range values produce warnings that travel with the decision instead
//! of stopping inference.

use serde::{Deserialize, Serialize};

use crate::types::SensorReading;

/// Plausible heart rate range (bpm)
pub const HR_RANGE: (f64, f64) = (30.0, 220.0);
/// RMSSD above this is flagged as unusually high (ms)
pub const RMSSD_MAX: f64 = 200.0;
/// Plausible breathing range (respirations per minute)
pub const BREATHING_RPM_RANGE: (f64, f64) = (5.0, 60.0);

/// Outcome of validating one or more sensor readings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// True iff no warnings were raised
    pub valid: bool,
    /// Warnings in rule order
    pub warnings: Vec<String>,
}

impl ValidationReport {
    /// Report for a reading that was not checked
    pub fn unchecked() -> Self {
        Self {
            valid: true,
            warnings: Vec::new(),
        }
    }

    fn from_warnings(warnings: Vec<String>) -> Self {
        Self {
            valid: warnings.is_empty(),
            warnings,
        }
    }
}

/// Check the raw scalar fields of a reading
///
/// Every rule is evaluated; a reading can collect several warnings.
pub fn validate_sensor_data(
    hr: f64,
    rmssd: f64,
    breathing_rpm: f64,
    movement: f64,
) -> ValidationReport {
    let mut warnings = Vec::new();

    if hr < HR_RANGE.0 || hr > HR_RANGE.1 {
        warnings.push(format!("Heart rate {hr} BPM is outside normal range (30-220)"));
    }

    if rmssd < 0.0 {
        warnings.push(format!("RMSSD {rmssd} ms cannot be negative"));
    }
    if rmssd > RMSSD_MAX {
        warnings.push(format!("RMSSD {rmssd} ms is unusually high (>200)"));
    }

    if breathing_rpm < BREATHING_RPM_RANGE.0 || breathing_rpm > BREATHING_RPM_RANGE.1 {
        warnings.push(format!("Breathing rate {breathing_rpm} RPM is outside normal range (5-60)"));
    }

    if movement < 0.0 {
        warnings.push(format!("Movement variance {movement} cannot be negative"));
    }

    ValidationReport::from_warnings(warnings)
}

/// Validate a single reading
pub fn validate_reading(reading: &SensorReading) -> ValidationReport {
    validate_sensor_data(
        reading.hr,
        reading.rmssd,
        reading.breathing_rpm,
        reading.movement,
    )
}

/// Validate every step of a buffered window; warnings are prefixed with the step index
pub fn validate_window(readings: &[SensorReading]) -> ValidationReport {
    let warnings = readings
        .iter()
        .enumerate()
        .flat_map(|(i, reading)| {
            validate_reading(reading)
                .warnings
                .into_iter()
                .map(move |w| format!("step {i}: {w}"))
        })
        .collect();

    ValidationReport::from_warnings(warnings)
}
