//! Feature normalization
//!
//! This module scales raw feature vectors into the representation the
//! classifier was trained on: `(raw - mean) / std`, per feature, using the
//! constants of the deployed artifact.

use crate::config::FeatureScaling;
use crate::types::{FeatureVector, NormalizedSequence, RawSequence, FEATURE_COUNT};

/// Normalizer bound to one set of training statistics
#[derive(Debug, Clone)]
pub struct Normalizer {
    scaling: FeatureScaling,
}

impl Normalizer {
    /// Create a normalizer; `scaling` is expected to be validated already
    pub fn new(scaling: FeatureScaling) -> Self {
        Self { scaling }
    }

    /// Normalize a single time step
    pub fn normalize(&self, raw: &FeatureVector) -> FeatureVector {
        let mut out = [0.0; FEATURE_COUNT];
        for (i, value) in out.iter_mut().enumerate() {
            *value = (raw.0[i] - self.scaling.mean[i]) / self.scaling.std[i];
        }
        FeatureVector(out)
    }

    /// Normalize every step of a window independently
    pub fn normalize_sequence(&self, raw: &RawSequence) -> NormalizedSequence {
        NormalizedSequence::new(raw.steps().iter().map(|s| self.normalize(s)).collect())
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(FeatureScaling::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PHYS_MEAN, PHYS_STD};

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{a} != {b}");
    }

    #[test]
    fn test_training_mean_maps_to_zero() {
        let normalizer = Normalizer::default();
        let normalized = normalizer.normalize(&FeatureVector(PHYS_MEAN));
        for value in normalized.0 {
            assert_close(value, 0.0);
        }
    }

    #[test]
    fn test_one_std_above_mean_maps_to_one() {
        let normalizer = Normalizer::default();
        let mut raw = PHYS_MEAN;
        for i in 0..FEATURE_COUNT {
            raw[i] += PHYS_STD[i];
        }
        for value in normalizer.normalize(&FeatureVector(raw)).0 {
            assert_close(value, 1.0);
        }
    }

    #[test]
    fn test_custom_scaling() {
        let normalizer = Normalizer::new(FeatureScaling {
            mean: [75.0, 18.0, 36.5, 50.0],
            std: [15.0, 5.0, 0.5, 25.0],
        });
        let normalized = normalizer.normalize(&FeatureVector([90.0, 13.0, 36.5, 100.0]));
        assert_eq!(normalized.0, [1.0, -1.0, 0.0, 2.0]);
    }

    #[test]
    fn test_sequence_steps_are_normalized_independently() {
        let normalizer = Normalizer::new(FeatureScaling {
            mean: [0.0; FEATURE_COUNT],
            std: [2.0; FEATURE_COUNT],
        });
        let raw = RawSequence::new(vec![
            FeatureVector([2.0, 4.0, 6.0, 8.0]),
            FeatureVector([-2.0, 0.0, 2.0, 4.0]),
        ]);
        let normalized = normalizer.normalize_sequence(&raw);

        assert_eq!(normalized.len(), 2);
        assert_eq!(normalized.steps()[0].0, [1.0, 2.0, 3.0, 4.0]);
        assert_eq!(normalized.steps()[1].0, [-1.0, 0.0, 1.0, 2.0]);
    }
}
