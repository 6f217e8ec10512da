//! Sequence construction
//!
//! The classifier consumes windows of feature vectors. Devices that sample a
//! single point get that reading replicated across the window; callers that
//! already buffer a window hand it over as `[T, 4]` rows.

use serde::{Deserialize, Serialize};

use crate::error::ComputeError;
use crate::types::{FeatureVector, RawSequence, SensorReading, FEATURE_COUNT};

/// Builds raw (unnormalized) windows for the classifier
pub struct SequenceBuilder;

impl SequenceBuilder {
    /// Replicate one feature vector across a window of `seq_len` steps
    pub fn from_reading(features: FeatureVector, seq_len: usize) -> RawSequence {
        RawSequence::new(vec![features; seq_len])
    }

    /// Parse raw `[hr, rmssd, breathing_rpm, movement]` rows
    ///
    /// Rows are passed through unchanged. Fails if there are no rows or any row
    /// does not have exactly four values.
    pub fn parse_rows(rows: &[Vec<f64>]) -> Result<Vec<SensorReading>, ComputeError> {
        if rows.is_empty() {
            return Err(ComputeError::Shape(format!(
                "sequence must have shape [T, {FEATURE_COUNT}] with T > 0, got an empty sequence"
            )));
        }

        rows.iter()
            .enumerate()
            .map(|(i, row)| {
                let step: [f64; FEATURE_COUNT] = row.as_slice().try_into().map_err(|_| {
                    ComputeError::Shape(format!(
                        "sequence must have shape [T, {FEATURE_COUNT}], step {i} has {} features",
                        row.len()
                    ))
                })?;
                Ok(SensorReading::from_row(step))
            })
            .collect()
    }

    /// Convert a buffered window of readings into classifier features
    pub fn from_readings(readings: &[SensorReading]) -> Result<RawSequence, ComputeError> {
        if readings.is_empty() {
            return Err(ComputeError::Shape("sequence must contain at least one step".to_string()));
        }
        Ok(RawSequence::new(readings.iter().map(SensorReading::to_features).collect()))
    }
}

/// Summary statistics over a buffered window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceStats {
    pub steps: usize,
    pub hr_avg: f64,
    pub hr_min: f64,
    pub hr_max: f64,
    pub breathing_rpm_avg: f64,
    pub movement_avg: f64,
    pub movement_max: f64,
}

impl SequenceStats {
    /// Returns `None` for an empty window
    pub fn from_readings(readings: &[SensorReading]) -> Option<Self> {
        let first = readings.first()?;
        let n = readings.len() as f64;

        let mut hr_sum = 0.0;
        let mut breathing_sum = 0.0;
        let mut movement_sum = 0.0;
        let mut hr_min = first.hr;
        let mut hr_max = first.hr;
        let mut movement_max = first.movement;

        for r in readings {
            hr_sum += r.hr;
            breathing_sum += r.breathing_rpm;
            movement_sum += r.movement;
            hr_min = hr_min.min(r.hr);
            hr_max = hr_max.max(r.hr);
            movement_max = movement_max.max(r.movement);
        }

        Some(Self {
            steps: readings.len(),
            hr_avg: hr_sum / n,
            hr_min,
            hr_max,
            breathing_rpm_avg: breathing_sum / n,
            movement_avg: movement_sum / n,
            movement_max,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calm_rows() -> Vec<Vec<f64>> {
        vec![
            vec![65.0, 14.0, 36.5, 10.0],
            vec![63.0, 13.0, 36.6, 12.0],
            vec![67.0, 15.0, 36.5, 8.0],
            vec![66.0, 14.0, 36.6, 15.0],
            vec![64.0, 14.0, 36.5, 10.0],
        ]
    }

    #[test]
    fn test_single_reading_fills_window() {
        let features = SensorReading::new(85.0, 35.0, 18.0, 0.2).to_features();
        let seq = SequenceBuilder::from_reading(features, 10);

        assert_eq!(seq.len(), 10);
        assert!(seq.steps().iter().all(|step| *step == features));
    }

    #[test]
    fn test_rows_pass_through_unchanged() {
        let readings = SequenceBuilder::parse_rows(&calm_rows()).unwrap();
        assert_eq!(readings.len(), 5);
        assert_eq!(readings[0], SensorReading::new(65.0, 14.0, 36.5, 10.0));
        assert_eq!(readings[4], SensorReading::new(64.0, 14.0, 36.5, 10.0));
    }

    #[test]
    fn test_rejects_wrong_width() {
        let narrow = vec![vec![65.0, 14.0, 36.5]];
        let err = SequenceBuilder::parse_rows(&narrow).unwrap_err();
        assert!(matches!(err, ComputeError::Shape(_)));
        assert!(err.to_string().contains("step 0 has 3 features"));

        let mut wide = calm_rows();
        wide[2].push(1.0);
        let err = SequenceBuilder::parse_rows(&wide).unwrap_err();
        assert!(err.to_string().contains("step 2 has 5 features"));
    }

    #[test]
    fn test_rejects_empty_sequence() {
        assert!(matches!(
            SequenceBuilder::parse_rows(&[]),
            Err(ComputeError::Shape(_))
        ));
        assert!(matches!(
            SequenceBuilder::from_readings(&[]),
            Err(ComputeError::Shape(_))
        ));
    }

    #[test]
    fn test_from_readings_converts_breathing_per_step() {
        let readings = [
            SensorReading::new(70.0, 40.0, 12.0, 0.1),
            SensorReading::new(72.0, 38.0, 18.0, 0.1),
        ];
        let seq = SequenceBuilder::from_readings(&readings).unwrap();
        assert!((seq.steps()[0].breathing_hz() - 0.2).abs() < 1e-12);
        assert!((seq.steps()[1].breathing_hz() - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_window_stats() {
        let readings = SequenceBuilder::parse_rows(&calm_rows()).unwrap();
        let stats = SequenceStats::from_readings(&readings).unwrap();

        assert_eq!(stats.steps, 5);
        assert!((stats.hr_avg - 65.0).abs() < 1e-9);
        assert_eq!(stats.hr_min, 63.0);
        assert_eq!(stats.hr_max, 67.0);
        assert!((stats.movement_avg - 11.0).abs() < 1e-9);
        assert_eq!(stats.movement_max, 15.0);
        assert!(SequenceStats::from_readings(&[]).is_none());
    }
}
