//! Engine configuration
//!
//! The normalization constants and window length are process-wide values tied
//! to one trained classifier artifact. They are loaded once, validated, and
//! never mutated afterwards.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ComputeError;
use crate::types::FEATURE_COUNT;

/// Default number of time steps per classifier window
pub const DEFAULT_SEQ_LEN: usize = 10;

/// Training mean for `[hr, rmssd, breathing_hz, movement]`
pub const PHYS_MEAN: [f64; FEATURE_COUNT] = [153.80, 125.88, 1.87, 0.0006];

/// Training standard deviation for `[hr, rmssd, breathing_hz, movement]`
pub const PHYS_STD: [f64; FEATURE_COUNT] = [13.75, 51.71, 0.08, 0.014];

/// Per-feature scaling constants used at training time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureScaling {
    pub mean: [f64; FEATURE_COUNT],
    pub std: [f64; FEATURE_COUNT],
}

impl Default for FeatureScaling {
    fn default() -> Self {
        Self {
            mean: PHYS_MEAN,
            std: PHYS_STD,
        }
    }
}

impl FeatureScaling {
    pub fn validate(&self) -> Result<(), ComputeError> {
        for (i, (mean, std)) in self.mean.iter().zip(self.std.iter()).enumerate() {
            if !mean.is_finite() {
                return Err(ComputeError::Startup(format!(
                    "scaling mean[{i}] is not finite: {mean}"
                )));
            }
            if !std.is_finite() || *std <= 0.0 {
                return Err(ComputeError::Startup(format!(
                    "scaling std[{i}] must be positive and finite, got {std}"
                )));
            }
        }
        Ok(())
    }
}

fn default_validate_inputs() -> bool {
    true
}

/// Configuration for a [`DecisionEngine`](crate::engine::DecisionEngine)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Window length used when a single reading is expanded into a sequence
    #[serde(default = "default_seq_len")]
    pub seq_len: usize,
    /// Normalization constants matching the deployed classifier
    #[serde(default)]
    pub scaling: FeatureScaling,
    /// Run advisory range checks on every request
    #[serde(default = "default_validate_inputs")]
    pub validate_inputs: bool,
}

fn default_seq_len() -> usize {
    DEFAULT_SEQ_LEN
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seq_len: DEFAULT_SEQ_LEN,
            scaling: FeatureScaling::default(),
            validate_inputs: true,
        }
    }
}

impl EngineConfig {
    /// Create a config with a specific window length and default scaling
    pub fn with_seq_len(seq_len: usize) -> Self {
        Self {
            seq_len,
            ..Self::default()
        }
    }

    /// Parse and validate a config from JSON
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let config: EngineConfig = serde_json::from_str(json)
            .map_err(|e| ComputeError::Startup(format!("invalid engine config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ComputeError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| {
            ComputeError::Startup(format!("cannot read config {}: {e}", path.display()))
        })?;
        let config = Self::from_json(&json)?;
        log::info!(
            "loaded engine config from {} (seq_len={}, validate_inputs={})",
            path.display(),
            config.seq_len,
            config.validate_inputs
        );
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ComputeError> {
        serde_json::to_string_pretty(self).map_err(ComputeError::JsonError)
    }

    pub fn validate(&self) -> Result<(), ComputeError> {
        if self.seq_len == 0 {
            return Err(ComputeError::Startup("seq_len must be at least 1".to_string()));
        }
        self.scaling.validate()
    }
}
