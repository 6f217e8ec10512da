//! Override rules
//!
//! Hand-authored rules that take precedence over the learned classifier for
//! physiologically unambiguous situations. Rules are checked in a fixed
//! priority order against the raw (unnormalized) reading and the first match
//! wins; later rules are never evaluated.
//!
//! Thresholds are strict comparisons exactly as listed on each rule. Only
//! [`OverrideRule::LightActivity`] blends with the classifier score (it caps
//! it); every other rule replaces it outright.

use serde::{Deserialize, Serialize};

use crate::level::StressLevel;
use crate::types::SensorReading;

/// Label reported when no override fired and the classifier was trusted
pub const TRUSTED_CLASSIFIER_LABEL: &str = "LSTM";

/// Ceiling applied to the classifier score during light activity
pub const LIGHT_ACTIVITY_CAP: f64 = 25.0;

/// A deterministic override for a recognized physiological pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverrideRule {
    /// High movement with high HRV: exercise, not distress
    Sport,
    /// Very high HR, very low HRV, little movement
    Panic,
    /// Elevated HR, low HRV, little movement
    HighStress,
    /// Low HR, high HRV, almost no movement
    Sleep,
    /// Moderate HR with good HRV: talking, walking around
    LightActivity,
}

impl OverrideRule {
    /// Evaluation order; earlier rules shadow later ones
    pub const PRIORITY: [OverrideRule; 5] = [
        OverrideRule::Sport,
        OverrideRule::Panic,
        OverrideRule::HighStress,
        OverrideRule::Sleep,
        OverrideRule::LightActivity,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            OverrideRule::Sport => "SPORT",
            OverrideRule::Panic => "PANIC",
            OverrideRule::HighStress => "HIGH_STRESS",
            OverrideRule::Sleep => "SLEEP",
            OverrideRule::LightActivity => "LIGHT_ACTIVITY",
        }
    }

    /// Whether the rule's predicate holds for a raw reading
    pub fn matches(&self, reading: &SensorReading) -> bool {
        let SensorReading {
            hr,
            rmssd,
            movement,
            ..
        } = *reading;

        match self {
            OverrideRule::Sport => movement > 0.9 && rmssd > 40.0,
            OverrideRule::Panic => hr > 120.0 && rmssd < 8.0 && movement < 0.4,
            OverrideRule::HighStress => hr > 100.0 && rmssd < 20.0 && movement < 0.4,
            OverrideRule::Sleep => hr < 60.0 && rmssd > 70.0 && movement < 0.1,
            OverrideRule::LightActivity => {
                hr > 80.0 && hr < 100.0 && rmssd > 30.0 && movement < 0.4
            }
        }
    }

    /// Final percentage and level once the rule has fired
    pub fn outcome(&self, classifier_pct: f64) -> (f64, StressLevel) {
        match self {
            OverrideRule::Sport => (5.0, StressLevel::Calm),
            OverrideRule::Panic => (95.0, StressLevel::Crisis),
            OverrideRule::HighStress => (75.0, StressLevel::High),
            OverrideRule::Sleep => (2.0, StressLevel::Calm),
            OverrideRule::LightActivity => {
                (classifier_pct.min(LIGHT_ACTIVITY_CAP), StressLevel::Moderate)
            }
        }
    }
}

/// Result of rule evaluation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RuleOutcome {
    /// A rule fired and decided the score and level
    Override {
        rule: OverrideRule,
        percentage: f64,
        level: StressLevel,
    },
    /// No rule fired; defer to the classifier
    Trust { classifier_pct: f64 },
}

impl RuleOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            RuleOutcome::Override { rule, .. } => rule.name(),
            RuleOutcome::Trust { .. } => TRUSTED_CLASSIFIER_LABEL,
        }
    }

    pub fn percentage(&self) -> f64 {
        match self {
            RuleOutcome::Override { percentage, .. } => *percentage,
            RuleOutcome::Trust { classifier_pct } => *classifier_pct,
        }
    }

    /// Level for the outcome; the classifier path goes through the level mapper
    pub fn level(&self) -> StressLevel {
        match self {
            RuleOutcome::Override { level, .. } => *level,
            RuleOutcome::Trust { classifier_pct } => StressLevel::from_percentage(*classifier_pct),
        }
    }

    pub fn is_override(&self) -> bool {
        matches!(self, RuleOutcome::Override { .. })
    }
}

/// Evaluate the override rules in priority order
///
/// `classifier_pct` is the classifier probability scaled to 0-100.
pub fn apply_rules(reading: &SensorReading, classifier_pct: f64) -> RuleOutcome {
    match OverrideRule::PRIORITY.iter().find(|rule| rule.matches(reading)) {
        Some(rule) => {
            let (percentage, level) = rule.outcome(classifier_pct);
            RuleOutcome::Override {
                rule: *rule,
                percentage,
                level,
            }
        }
        None => RuleOutcome::Trust { classifier_pct },
    }
}
