//! Serialized access for classifier backends that are not thread-safe
//!
//! Some inference runtimes need `&mut self` per call. Wrapping them in a
//! [`SerializedClassifier`] puts a single gate around inference only; the
//! validator, normalizer and rule engine keep running concurrently.

use std::sync::Mutex;

use super::StressClassifier;
use crate::error::ComputeError;
use crate::types::NormalizedSequence;

/// A classifier backend that needs exclusive access per inference call
pub trait ExclusiveClassifier: Send {
    fn infer_mut(&mut self, sequence: &NormalizedSequence) -> Result<f64, ComputeError>;
}

/// Adapts an [`ExclusiveClassifier`] into a shareable [`StressClassifier`]
pub struct SerializedClassifier<C> {
    inner: Mutex<C>,
}

impl<C: ExclusiveClassifier> SerializedClassifier<C> {
    pub fn new(backend: C) -> Self {
        Self {
            inner: Mutex::new(backend),
        }
    }

    pub fn into_inner(self) -> Result<C, ComputeError> {
        self.inner
            .into_inner()
            .map_err(|_| ComputeError::Inference("classifier gate poisoned".to_string()))
    }
}

impl<C: ExclusiveClassifier> StressClassifier for SerializedClassifier<C> {
    fn infer(&self, sequence: &NormalizedSequence) -> Result<f64, ComputeError> {
        let mut backend = self
            .inner
            .lock()
            .map_err(|_| ComputeError::Inference("classifier gate poisoned".to_string()))?;
        backend.infer_mut(sequence)
    }

    fn name(&self) -> &str {
        "serialized"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FeatureVector;
    use std::sync::Arc;
    use std::thread;

    /// Backend with per-call scratch state, like a runtime session
    struct ScratchBackend {
        calls: usize,
        scratch: Vec<f64>,
    }

    impl ExclusiveClassifier for ScratchBackend {
        fn infer_mut(&mut self, sequence: &NormalizedSequence) -> Result<f64, ComputeError> {
            self.calls += 1;
            self.scratch.clear();
            self.scratch.extend(sequence.steps().iter().map(|s| s.hr()));
            Ok(0.3)
        }
    }

    #[test]
    fn test_concurrent_calls_are_serialized() {
        let classifier = Arc::new(SerializedClassifier::new(ScratchBackend {
            calls: 0,
            scratch: Vec::new(),
        }));
        let seq = NormalizedSequence::new(vec![FeatureVector([0.1, 0.2, 0.3, 0.4]); 10]);

        thread::scope(|scope| {
            for _ in 0..4 {
                let classifier = Arc::clone(&classifier);
                let seq = &seq;
                scope.spawn(move || {
                    for _ in 0..25 {
                        assert_eq!(classifier.infer(seq).unwrap(), 0.3);
                    }
                });
            }
        });

        let backend = Arc::try_unwrap(classifier)
            .ok()
            .expect("all threads joined")
            .into_inner()
            .unwrap();
        assert_eq!(backend.calls, 100);
        assert_eq!(backend.scratch.len(), 10);
    }
}
