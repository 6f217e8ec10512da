//! Decision engine
//!
//! This module provides the public API for the Calma stress engine. It
//! orchestrates one request through the full pipeline:
//!
//! 1. Validate - advisory range checks, warnings only
//! 2. Convert - breathing RPM to Hz
//! 3. BuildSequence - replicate a point sample or accept a buffered window
//! 4. Normalize - training-time scaling
//! 5. Infer - classifier probability
//! 6. ApplyRules - first matching override wins
//! 7. MapLevel - only when no override fired
//!
//! Any failure aborts the request; there is no fallback score.

use std::path::Path;
use std::sync::Arc;

use crate::classifier::{ClassifierAdapter, LstmClassifier, StressClassifier};
use crate::config::EngineConfig;
use crate::encoder::{DecisionEncoder, DecisionReport};
use crate::error::ComputeError;
use crate::normalizer::Normalizer;
use crate::rules::apply_rules;
use crate::sequence::{SequenceBuilder, SequenceStats};
use crate::types::{DecisionInputs, RawSequence, SensorReading, StressDecision, StressInput};
use crate::validation::{validate_reading, validate_window, ValidationReport};

/// Stateless stress decision engine
///
/// Holds only read-only state (configuration, scaling, classifier), so one
/// engine can serve concurrent requests behind an `Arc`.
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    config: EngineConfig,
    normalizer: Normalizer,
    classifier: ClassifierAdapter,
}

impl DecisionEngine {
    /// Create an engine; an invalid config is a startup failure
    pub fn new(
        config: EngineConfig,
        classifier: Arc<dyn StressClassifier>,
    ) -> Result<Self, ComputeError> {
        config.validate()?;
        Ok(Self {
            normalizer: Normalizer::new(config.scaling.clone()),
            classifier: ClassifierAdapter::new(classifier),
            config,
        })
    }

    /// Create an engine with the default configuration
    pub fn with_classifier(classifier: Arc<dyn StressClassifier>) -> Result<Self, ComputeError> {
        Self::new(EngineConfig::default(), classifier)
    }

    /// Load LSTM weights from disk and build an engine around them
    pub fn from_weights_path(
        config: EngineConfig,
        weights: impl AsRef<Path>,
    ) -> Result<Self, ComputeError> {
        let classifier = LstmClassifier::from_path(weights)?;
        Self::new(config, Arc::new(classifier))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Decide on either request shape
    pub fn decide(&self, input: StressInput) -> Result<StressDecision, ComputeError> {
        match input {
            StressInput::Reading(reading) => self.decide_reading(reading),
            StressInput::Sequence { sequence } => self.decide_sequence(&sequence),
        }
    }

    /// Decide on a single point sample, replicated across the configured window
    pub fn decide_reading(&self, reading: SensorReading) -> Result<StressDecision, ComputeError> {
        let validation = self.check(|| validate_reading(&reading));
        let raw = SequenceBuilder::from_reading(reading.to_features(), self.config.seq_len);
        self.run(raw, reading, validation)
    }

    /// Decide on raw `[T, 4]` rows
    pub fn decide_sequence(&self, rows: &[Vec<f64>]) -> Result<StressDecision, ComputeError> {
        let readings = SequenceBuilder::parse_rows(rows)?;
        self.decide_readings(&readings)
    }

    /// Decide on a buffered window of readings
    ///
    /// Override rules and the input echo use the most recent reading.
    pub fn decide_readings(
        &self,
        readings: &[SensorReading],
    ) -> Result<StressDecision, ComputeError> {
        let current = *readings.last().ok_or_else(|| {
            ComputeError::Shape("sequence must contain at least one step".to_string())
        })?;
        let validation = self.check(|| validate_window(readings));
        let raw = SequenceBuilder::from_readings(readings)?;
        self.run(raw, current, validation)
    }

    /// Parse a JSON request and return the decision as JSON
    pub fn decide_json(&self, input_json: &str) -> Result<String, ComputeError> {
        let input: StressInput = serde_json::from_str(input_json)?;
        let decision = self.decide(input)?;
        serde_json::to_string(&decision).map_err(ComputeError::JsonError)
    }

    /// Decide and wrap the result in a report envelope
    ///
    /// Sequence requests also carry summary statistics over the window.
    pub fn decide_report(
        &self,
        input: StressInput,
        encoder: &DecisionEncoder,
    ) -> Result<DecisionReport, ComputeError> {
        match input {
            StressInput::Reading(reading) => {
                let decision = self.decide_reading(reading)?;
                Ok(encoder.encode(decision, None))
            }
            StressInput::Sequence { sequence } => {
                let readings = SequenceBuilder::parse_rows(&sequence)?;
                let decision = self.decide_readings(&readings)?;
                Ok(encoder.encode(decision, SequenceStats::from_readings(&readings)))
            }
        }
    }

    fn check(&self, validate: impl FnOnce() -> ValidationReport) -> ValidationReport {
        if !self.config.validate_inputs {
            return ValidationReport::unchecked();
        }

        let report = validate();
        for warning in &report.warnings {
            log::warn!("sensor validation: {warning}");
        }
        report
    }

    fn run(
        &self,
        raw: RawSequence,
        current: SensorReading,
        validation: ValidationReport,
    ) -> Result<StressDecision, ComputeError> {
        let window_len = raw.len();
        let normalized = self.normalizer.normalize_sequence(&raw);
        let output = self.classifier.infer(&normalized)?;

        let outcome = apply_rules(&current, output.percentage());
        let level = outcome.level();

        log::debug!(
            "{} -> {:.2}% level {} (classifier {:.2}%, window {window_len})",
            outcome.label(),
            outcome.percentage(),
            level.as_u8(),
            output.percentage()
        );

        Ok(StressDecision {
            stress_percentage: outcome.percentage(),
            stress_level: level,
            level_name: level.name().to_string(),
            rule_applied: outcome.label().to_string(),
            lstm_raw: output.percentage(),
            inputs: DecisionInputs::from_reading(&current, window_len),
            validation,
        })
    }
}
