//! Stress level mapping
//!
//! Converts a stress percentage into one of four ordinal levels. Only the
//! classifier-trusted path uses [`StressLevel::from_percentage`]; override rules
//! assign their own level.

use serde::{Deserialize, Serialize};

/// Lower bound (inclusive) of the MODERATE band
pub const MODERATE_THRESHOLD: f64 = 20.0;
/// Lower bound (inclusive) of the HIGH band
pub const HIGH_THRESHOLD: f64 = 40.0;
/// Lower bound (inclusive) of the CRISIS band
pub const CRISIS_THRESHOLD: f64 = 70.0;

/// Ordinal stress level, serialized as its integer value (0-3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum StressLevel {
    Calm = 0,
    Moderate = 1,
    High = 2,
    Crisis = 3,
}

impl StressLevel {
    /// Map a percentage onto a level; each band includes its lower bound
    pub fn from_percentage(pct: f64) -> Self {
        if pct < MODERATE_THRESHOLD {
            StressLevel::Calm
        } else if pct < HIGH_THRESHOLD {
            StressLevel::Moderate
        } else if pct < CRISIS_THRESHOLD {
            StressLevel::High
        } else {
            StressLevel::Crisis
        }
    }

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    pub fn name(&self) -> &'static str {
        match self {
            StressLevel::Calm => "CALM",
            StressLevel::Moderate => "MODERATE",
            StressLevel::High => "HIGH",
            StressLevel::Crisis => "CRISIS",
        }
    }

    /// HIGH and CRISIS raise a user-facing alert on the device
    pub fn requires_alert(&self) -> bool {
        *self >= StressLevel::High
    }
}

impl From<StressLevel> for u8 {
    fn from(level: StressLevel) -> Self {
        level.as_u8()
    }
}

impl TryFrom<u8> for StressLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(StressLevel::Calm),
            1 => Ok(StressLevel::Moderate),
            2 => Ok(StressLevel::High),
            3 => Ok(StressLevel::Crisis),
            other => Err(format!("stress level must be 0-3, got {other}")),
        }
    }
}
