//! Core types for the Calma stress engine
//!
//! This module defines the data structures that flow through each stage of the
//! decision pipeline: raw sensor readings, feature vectors, windowed sequences,
//! and the final stress decision.

use serde::{Deserialize, Serialize};

use crate::level::StressLevel;
use crate::units::rpm_to_hz;
use crate::validation::ValidationReport;

/// Number of features per time step: `[hr, rmssd, breathing_hz, movement]`
pub const FEATURE_COUNT: usize = 4;

/// One instant of physiological sensor data, as reported by the device
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    /// Heart rate (beats per minute)
    #[serde(alias = "heart_rate")]
    pub hr: f64,
    /// Heart rate variability, RMSSD (ms)
    #[serde(alias = "hrv")]
    pub rmssd: f64,
    /// Breathing rate (respirations per minute)
    #[serde(alias = "breathing_rate")]
    pub breathing_rpm: f64,
    /// Accelerometer variance (unitless)
    #[serde(alias = "motion")]
    pub movement: f64,
}

impl SensorReading {
    pub fn new(hr: f64, rmssd: f64, breathing_rpm: f64, movement: f64) -> Self {
        Self {
            hr,
            rmssd,
            breathing_rpm,
            movement,
        }
    }

    /// Build a reading from one raw `[hr, rmssd, breathing_rpm, movement]` row
    pub(crate) fn from_row(row: [f64; FEATURE_COUNT]) -> Self {
        Self::new(row[0], row[1], row[2], row[3])
    }

    /// Breathing rate converted to Hz
    pub fn breathing_hz(&self) -> f64 {
        rpm_to_hz(self.breathing_rpm)
    }

    /// Convert to the classifier feature order, breathing expressed in Hz
    pub fn to_features(&self) -> FeatureVector {
        FeatureVector([self.hr, self.rmssd, self.breathing_hz(), self.movement])
    }
}

/// Request payload: a single point sample or a window the caller already buffered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StressInput {
    /// Raw `[hr, rmssd, breathing_rpm, movement]` rows, oldest first
    Sequence { sequence: Vec<Vec<f64>> },
    Reading(SensorReading),
}

/// Ordered feature tuple `[hr, rmssd, breathing_hz, movement]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector(pub [f64; FEATURE_COUNT]);

impl FeatureVector {
    pub fn hr(&self) -> f64 {
        self.0[0]
    }

    pub fn rmssd(&self) -> f64 {
        self.0[1]
    }

    pub fn breathing_hz(&self) -> f64 {
        self.0[2]
    }

    pub fn movement(&self) -> f64 {
        self.0[3]
    }

    pub fn as_array(&self) -> &[f64; FEATURE_COUNT] {
        &self.0
    }
}

/// Window of unit-converted but not yet normalized feature vectors
#[derive(Debug, Clone, PartialEq)]
pub struct RawSequence {
    steps: Vec<FeatureVector>,
}

impl RawSequence {
    pub(crate) fn new(steps: Vec<FeatureVector>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[FeatureVector] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Window of normalized feature vectors, ready for the classifier
///
/// Only the [`Normalizer`](crate::normalizer::Normalizer) produces these, so a
/// sequence always carries the scaling the engine was configured with.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSequence {
    steps: Vec<FeatureVector>,
}

impl NormalizedSequence {
    pub(crate) fn new(steps: Vec<FeatureVector>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[FeatureVector] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Echo of the reading the decision was based on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionInputs {
    pub hr: f64,
    pub rmssd: f64,
    /// Breathing rate as supplied by the sensor
    pub breathing_rpm: f64,
    /// Breathing rate as fed to the classifier
    pub breathing_hz: f64,
    pub movement: f64,
    /// Number of time steps the classifier saw
    pub window_len: usize,
}

impl DecisionInputs {
    pub fn from_reading(reading: &SensorReading, window_len: usize) -> Self {
        Self {
            hr: reading.hr,
            rmssd: reading.rmssd,
            breathing_rpm: reading.breathing_rpm,
            breathing_hz: reading.breathing_hz(),
            movement: reading.movement,
            window_len,
        }
    }
}

/// Final stress decision for one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressDecision {
    /// Final stress score (0-100)
    pub stress_percentage: f64,
    /// Ordinal stress level (0-3)
    pub stress_level: StressLevel,
    /// Human-readable level (CALM, MODERATE, HIGH, CRISIS)
    pub level_name: String,
    /// Override rule that fired, or "LSTM" when the classifier was trusted
    pub rule_applied: String,
    /// Raw classifier output as a percentage, kept for auditability
    pub lstm_raw: f64,
    /// The reading the rules were evaluated against
    pub inputs: DecisionInputs,
    /// Advisory sensor range checks
    pub validation: ValidationReport,
}

impl StressDecision {
    /// Whether this decision should raise a user-facing alert
    pub fn requires_alert(&self) -> bool {
        self.stress_level.requires_alert()
    }
}
