//! Decision report encoding
//!
//! Wraps a [`StressDecision`] in an envelope carrying producer metadata and a
//! computation timestamp. The decision itself stays deterministic; anything
//! that varies between runs lives in the envelope.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ComputeError;
use crate::sequence::SequenceStats;
use crate::types::StressDecision;
use crate::{CALMA_VERSION, PRODUCER_NAME};

/// Current report envelope version
pub const REPORT_VERSION: &str = "1.0.0";

/// Identifies the engine build that produced a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// A stress decision plus provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionReport {
    pub report_version: String,
    pub producer: ReportProducer,
    /// RFC 3339 timestamp of when the decision was computed
    pub computed_at_utc: String,
    /// Whether the decision crosses the alert threshold
    pub alert: bool,
    /// Summary of the buffered window, for sequence requests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_stats: Option<SequenceStats>,
    pub decision: StressDecision,
}

/// Encoder for decision reports
pub struct DecisionEncoder {
    instance_id: String,
}

impl Default for DecisionEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn encode(
        &self,
        decision: StressDecision,
        window_stats: Option<SequenceStats>,
    ) -> DecisionReport {
        DecisionReport {
            report_version: REPORT_VERSION.to_string(),
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: CALMA_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            computed_at_utc: Utc::now().to_rfc3339(),
            alert: decision.requires_alert(),
            window_stats,
            decision,
        }
    }

    /// Encode to a pretty-printed JSON string
    pub fn encode_to_json(
        &self,
        decision: StressDecision,
        window_stats: Option<SequenceStats>,
    ) -> Result<String, ComputeError> {
        let report = self.encode(decision, window_stats);
        serde_json::to_string_pretty(&report).map_err(ComputeError::JsonError)
    }
}
