//! Error types for the Calma stress engine

use serde::Serialize;
use thiserror::Error;

/// Errors that can occur while producing a stress decision
///
/// Validation warnings are deliberately absent: out-of-range sensor values are
/// reported on the decision itself and never abort the pipeline.
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Invalid sequence shape: {0}")]
    Shape(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Startup failed: {0}")]
    Startup(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Coarse error category exposed to callers that need to branch on failure kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed sequence (request-scoped)
    Shape,
    /// Classifier failure or out-of-range output (request-scoped)
    Inference,
    /// Weights or configuration could not be loaded (process-scoped)
    Startup,
    /// Request payload could not be parsed
    Input,
}

impl ComputeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ComputeError::Shape(_) => ErrorKind::Shape,
            ComputeError::Inference(_) => ErrorKind::Inference,
            ComputeError::Startup(_) => ErrorKind::Startup,
            ComputeError::JsonError(_) => ErrorKind::Input,
        }
    }

    /// Whether the failure is scoped to a single request (the engine stays usable)
    pub fn is_request_scoped(&self) -> bool {
        !matches!(self, ComputeError::Startup(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(ComputeError::Shape("x".into()).kind(), ErrorKind::Shape);
        assert_eq!(
            ComputeError::Inference("x".into()).kind(),
            ErrorKind::Inference
        );
        assert_eq!(ComputeError::Startup("x".into()).kind(), ErrorKind::Startup);

        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert_eq!(ComputeError::from(json_err).kind(), ErrorKind::Input);
    }

    #[test]
    fn test_startup_is_process_scoped() {
        assert!(!ComputeError::Startup("weights".into()).is_request_scoped());
        assert!(ComputeError::Shape("width".into()).is_request_scoped());
    }
}
