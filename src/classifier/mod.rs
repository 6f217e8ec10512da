//! Sequence classifier boundary
//!
//! The trained model is an opaque collaborator: it takes a normalized window
//! and returns P(stressed). Everything above this module only sees the
//! [`StressClassifier`] trait, so the rule engine and orchestrator can be
//! exercised with deterministic stand-ins.

mod gate;
mod lstm;

pub use gate::{ExclusiveClassifier, SerializedClassifier};
pub use lstm::LstmClassifier;

#[cfg(test)]
pub(crate) use lstm::test_state_dict_json;

use std::sync::Arc;

use crate::error::ComputeError;
use crate::types::NormalizedSequence;

/// A read-only stress classifier shared across concurrent requests
pub trait StressClassifier: Send + Sync {
    /// Probability in `[0, 1]` that the window represents a stressed state
    fn infer(&self, sequence: &NormalizedSequence) -> Result<f64, ComputeError>;

    /// Short identifier used in logs and diagnostics
    fn name(&self) -> &str {
        "classifier"
    }
}

/// Checked classifier output
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierOutput {
    probability: f64,
}

impl ClassifierOutput {
    pub fn probability(&self) -> f64 {
        self.probability
    }

    /// Probability scaled to 0-100
    pub fn percentage(&self) -> f64 {
        self.probability * 100.0
    }
}

/// Wraps a classifier and enforces its output contract
///
/// Outputs that are non-finite or outside `[0, 1]` are rejected, never clamped.
#[derive(Clone)]
pub struct ClassifierAdapter {
    inner: Arc<dyn StressClassifier>,
}

impl ClassifierAdapter {
    pub fn new(inner: Arc<dyn StressClassifier>) -> Self {
        Self { inner }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub fn infer(&self, sequence: &NormalizedSequence) -> Result<ClassifierOutput, ComputeError> {
        if sequence.is_empty() {
            return Err(ComputeError::Inference("cannot classify an empty sequence".to_string()));
        }

        let probability = self.inner.infer(sequence)?;

        if !probability.is_finite() {
            return Err(ComputeError::Inference(format!(
                "{} returned a non-finite probability: {probability}",
                self.inner.name()
            )));
        }
        if !(0.0..=1.0).contains(&probability) {
            return Err(ComputeError::Inference(format!(
                "{} returned probability {probability} outside [0, 1]",
                self.inner.name()
            )));
        }

        Ok(ClassifierOutput { probability })
    }
}

impl std::fmt::Debug for ClassifierAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierAdapter")
            .field("inner", &self.inner.name())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Deterministic classifiers for tests

    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Always returns the same probability
    pub struct FixedClassifier(pub f64);

    impl StressClassifier for FixedClassifier {
        fn infer(&self, _sequence: &NormalizedSequence) -> Result<f64, ComputeError> {
            Ok(self.0)
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    /// Always fails
    pub struct FailingClassifier;

    impl StressClassifier for FailingClassifier {
        fn infer(&self, _sequence: &NormalizedSequence) -> Result<f64, ComputeError> {
            Err(ComputeError::Inference("backend unavailable".to_string()))
        }
    }

    /// Records the windows it was asked to classify
    pub struct RecordingClassifier {
        pub probability: f64,
        pub calls: AtomicUsize,
        pub last: Mutex<Option<NormalizedSequence>>,
    }

    impl RecordingClassifier {
        pub fn new(probability: f64) -> Self {
            Self {
                probability,
                calls: AtomicUsize::new(0),
                last: Mutex::new(None),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn last_sequence(&self) -> Option<NormalizedSequence> {
            self.last.lock().unwrap().clone()
        }
    }

    impl StressClassifier for RecordingClassifier {
        fn infer(&self, sequence: &NormalizedSequence) -> Result<f64, ComputeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = Some(sequence.clone());
            Ok(self.probability)
        }
    }
}
