//! Unit conversion
//!
//! Sensors report breathing in respirations per minute while the classifier
//! was trained on breathing frequency in Hz.

/// Convert breathing rate from respirations per minute to Hz
pub fn rpm_to_hz(rpm: f64) -> f64 {
    rpm / 60.0
}

/// Convert breathing rate from Hz to respirations per minute
pub fn hz_to_rpm(hz: f64) -> f64 {
    hz * 60.0
}
