//! Calma - On-device hybrid stress decision engine
//!
//! Calma turns physiological sensor readings (heart rate, HRV, breathing rate,
//! movement) into a stress decision through a deterministic pipeline:
//! validation → unit conversion → sequence building → normalization →
//! sequence classifier → override rules → level mapping.
//!
//! ## Modules
//!
//! - **Engine**: [`DecisionEngine`] orchestrates one request end to end
//! - **Classifier**: the learned model behind the [`StressClassifier`] trait
//! - **Rules**: hand-authored overrides for unambiguous physiological patterns

pub mod classifier;
pub mod config;
pub mod encoder;
pub mod engine;
pub mod error;
pub mod level;
pub mod normalizer;
pub mod rules;
pub mod sequence;
pub mod types;
pub mod units;
pub mod validation;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use classifier::{LstmClassifier, StressClassifier};
pub use config::{EngineConfig, FeatureScaling};
pub use engine::DecisionEngine;
pub use error::{ComputeError, ErrorKind};
pub use level::StressLevel;
pub use rules::{apply_rules, OverrideRule, RuleOutcome};
pub use types::{SensorReading, StressDecision, StressInput};
pub use validation::{validate_sensor_data, ValidationReport};

/// Calma version embedded in all decision reports
pub const CALMA_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for decision reports
pub const PRODUCER_NAME: &str = "calma-stress";
