//! Signature classifier
//!
//! Maps sample-level scores to clinical categories using fixed thresholds:
//! - **TMB** (mut/Mb): `High` at or above 20.0, otherwise `Low`
//! - **MSI** (sites): `Stable` at or below 6.5, `High` at or above 8.5,
//!   `Indeterminate` strictly between
//!
//! Pure functions; no I/O.

use crate::error::{EnrichError, EnrichResult, FailureRecord};
use serde::{Deserialize, Serialize};
use std::fmt;
use vsr_common::SampleState;

pub const TMB_HIGH_THRESHOLD: f64 = 20.0;
pub const MSI_STABLE_MAX: f64 = 6.5;
pub const MSI_HIGH_MIN: f64 = 8.5;

/// Recognized sample-level signatures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureKind {
    #[serde(rename = "TMB")]
    Tmb,
    #[serde(rename = "MSI")]
    Msi,
}

impl SignatureKind {
    pub const ALL: [SignatureKind; 2] = [SignatureKind::Tmb, SignatureKind::Msi];

    /// Extensible-field name and downstream signature name
    pub fn name(self) -> &'static str {
        match self {
            SignatureKind::Tmb => "TMB",
            SignatureKind::Msi => "MSI",
        }
    }

    pub fn units(self) -> &'static str {
        match self {
            SignatureKind::Tmb => "mut/Mb",
            SignatureKind::Msi => "sites",
        }
    }

    pub fn status_for(self, value: f64) -> SignatureStatus {
        match self {
            SignatureKind::Tmb => classify_tmb(value),
            SignatureKind::Msi => classify_msi(value),
        }
    }

    /// Reported quantitative value; MSI carries a `%` suffix
    fn quantitative_value(self, raw: &str) -> String {
        match self {
            SignatureKind::Tmb => raw.to_string(),
            SignatureKind::Msi => format!("{}%", raw),
        }
    }
}

impl fmt::Display for SignatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Categorical clinical status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureStatus {
    High,
    Low,
    Stable,
    Indeterminate,
}

pub fn classify_tmb(value: f64) -> SignatureStatus {
    if value >= TMB_HIGH_THRESHOLD {
        SignatureStatus::High
    } else {
        SignatureStatus::Low
    }
}

pub fn classify_msi(value: f64) -> SignatureStatus {
    if value <= MSI_STABLE_MAX {
        SignatureStatus::Stable
    } else if value >= MSI_HIGH_MIN {
        SignatureStatus::High
    } else {
        SignatureStatus::Indeterminate
    }
}

/// Classification record handed to the signature registrar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureClassification {
    pub signature: SignatureKind,
    pub status: SignatureStatus,
    pub quantitative_value: String,
    pub units: String,
    pub evaluation_id: i64,
}

/// Classify one raw score
pub fn classify(
    kind: SignatureKind,
    raw: &str,
    evaluation_id: i64,
) -> EnrichResult<SignatureClassification> {
    let raw = raw.trim();
    let value = raw
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| EnrichError::Parse(format!("{} value {:?} is not numeric", kind, raw)))?;

    Ok(SignatureClassification {
        signature: kind,
        status: kind.status_for(value),
        quantitative_value: kind.quantitative_value(raw),
        units: kind.units().to_string(),
        evaluation_id,
    })
}

/// Classify every recognized signature present on the sample
///
/// Absent signatures are skipped; unparseable ones become failure records.
pub fn classify_sample(
    sample: &SampleState,
    evaluation_id: i64,
) -> (Vec<SignatureClassification>, Vec<FailureRecord>) {
    let mut classifications = Vec::new();
    let mut failures = Vec::new();

    for kind in SignatureKind::ALL {
        let Some(raw) = sample.field_value(kind.name()) else {
            tracing::info!(signature = %kind, "Signature not present on sample; skipping");
            continue;
        };

        match classify(kind, &raw, evaluation_id) {
            Ok(classification) => {
                tracing::info!(
                    signature = %kind,
                    status = ?classification.status,
                    value = %raw,
                    "Classified signature"
                );
                classifications.push(classification);
            }
            Err(e) => {
                tracing::warn!(signature = %kind, error = %e, "Failed to classify signature");
                failures.push(FailureRecord::new(kind.name(), &e));
            }
        }
    }

    (classifications, failures)
}
