//! Error types for vsr-enrich
//!
//! Per-item failures (`EnrichError`) are recorded and never abort a report.
//! Missing lookup coverage and empty field results are not errors at all;
//! they surface as `None`. `DeliveryError` covers losing the whole output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Per-item enrichment or classification error
#[derive(Debug, Error)]
pub enum EnrichError {
    /// Lookup service unreachable or returned a non-success status
    #[error("Transport error: {0}")]
    Transport(String),

    /// Numeric field (SR pair, TMB, MSI score) failed to parse
    #[error("Parse error: {0}")]
    Parse(String),

    /// Split-read counts sum to zero
    #[error("Split-read counts sum to zero: {0}")]
    DivisionByZero(String),

    /// Cancelled before or during the lookup
    #[error("Cancelled")]
    Cancelled,

    /// Report deadline elapsed before or during the lookup
    #[error("Deadline exceeded")]
    DeadlineExceeded,
}

impl EnrichError {
    pub fn kind(&self) -> FailureKind {
        match self {
            EnrichError::Transport(_) => FailureKind::TransportError,
            EnrichError::Parse(_) => FailureKind::ParseError,
            EnrichError::DivisionByZero(_) => FailureKind::DivisionByZero,
            EnrichError::Cancelled => FailureKind::Cancelled,
            EnrichError::DeadlineExceeded => FailureKind::DeadlineExceeded,
        }
    }
}

impl From<reqwest::Error> for EnrichError {
    fn from(e: reqwest::Error) -> Self {
        EnrichError::Transport(e.to_string())
    }
}

pub type EnrichResult<T> = Result<T, EnrichError>;

/// Serializable failure category for observability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureKind {
    TransportError,
    ParseError,
    DivisionByZero,
    Cancelled,
    DeadlineExceeded,
}

/// One per-item failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureRecord {
    /// Variant location (`biomarkers[0]`) or signature name (`TMB`)
    pub item_id: String,
    pub kind: FailureKind,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

impl FailureRecord {
    pub fn new(item_id: impl Into<String>, error: &EnrichError) -> Self {
        Self {
            item_id: item_id.into(),
            kind: error.kind(),
            message: error.to_string(),
            occurred_at: Utc::now(),
        }
    }
}

/// Failure to hand the report to a downstream collaborator
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Gateway could not be reached
    #[error("Gateway unreachable: {0}")]
    Unreachable(String),

    /// Gateway answered with a non-success status
    #[error("Gateway rejected payload (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    /// External message generator failed
    #[error("Message generator failed: {0}")]
    Generator(String),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
