//! Annotation enricher
//!
//! Derives per-variant annotations from the lookup service:
//! - **NAF**: per-allele list field; the first allele's first value is used
//! - **NDP**: scalar field; the row's first element is used
//! - **SR**: `"wt,sv"` split-read pair, giving `svReads` and `svVaf`
//!
//! The enricher never mutates its input. It returns the annotations for the
//! caller to merge back, so variants can be enriched concurrently.

use crate::error::{EnrichError, EnrichResult};
use crate::lookup::{LookupService, VARIANTS_ALGORITHM_KEY};
use crate::resolver::FieldResolver;
use serde_json::Value;
use std::sync::Arc;
use vsr_common::config::EnrichmentProfile;
use vsr_common::{Annotations, Variant};

pub const NAF_FIELD: &str = "NAF";
pub const NDP_FIELD: &str = "NDP";
pub const SR_FIELD: &str = "SR";

/// NAF rows hold a per-allele list: `row[0][0]`
pub const NAF_NESTING_DEPTH: usize = 2;
/// NDP rows hold the value directly: `row[0]`
pub const NDP_NESTING_DEPTH: usize = 1;
/// SR rows hold the `"wt,sv"` string directly: `row[0]`
pub const SR_NESTING_DEPTH: usize = 1;

/// Result of enriching one variant
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EnrichmentOutcome {
    /// Lookup performed; fields not found remain `None`
    Annotated(Annotations),
    /// Variant has no table reference; no lookup attempted
    NotEligible,
    /// Table reference resolved to no sources
    NoSource,
}

impl EnrichmentOutcome {
    pub fn annotations(&self) -> Annotations {
        match self {
            EnrichmentOutcome::Annotated(a) => *a,
            EnrichmentOutcome::NotEligible | EnrichmentOutcome::NoSource => Annotations::default(),
        }
    }
}

/// Split-read support counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitReads {
    pub wt_reads: u64,
    pub sv_reads: u64,
}

impl SplitReads {
    /// Parse a `"wt,sv"` pair of non-negative integers
    pub fn parse(raw: &str) -> EnrichResult<Self> {
        let mut parts = raw.split(',');
        let (Some(wt), Some(sv), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(EnrichError::Parse(format!(
                "SR value {:?} is not a \"wt,sv\" pair",
                raw
            )));
        };

        let parse_count = |s: &str| {
            s.trim()
                .parse::<u64>()
                .map_err(|e| EnrichError::Parse(format!("SR value {:?}: {}", raw, e)))
        };

        Ok(Self {
            wt_reads: parse_count(wt)?,
            sv_reads: parse_count(sv)?,
        })
    }

    /// `sv / (wt + sv)`; a zero total is an error, never 0 or NaN
    pub fn allele_fraction(&self) -> EnrichResult<f64> {
        let total = self.wt_reads.checked_add(self.sv_reads).ok_or_else(|| {
            EnrichError::Parse(format!(
                "SR read total overflows: wt={} sv={}",
                self.wt_reads, self.sv_reads
            ))
        })?;
        if total == 0 {
            return Err(EnrichError::DivisionByZero(format!(
                "wt={} sv={}",
                self.wt_reads, self.sv_reads
            )));
        }
        Ok(self.sv_reads as f64 / total as f64)
    }
}

/// Numeric lookup value; numeric strings are accepted
fn numeric_value(field: &str, value: &Value) -> EnrichResult<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|v| v.is_finite())
        .ok_or_else(|| EnrichError::Parse(format!("{} value {} is not numeric", field, value)))
}

fn extract_numeric(field: &str, value: Option<Value>) -> EnrichResult<Option<f64>> {
    value.map(|v| numeric_value(field, &v)).transpose()
}

/// Per-variant enrichment against a lookup service
pub struct AnnotationEnricher {
    service: Arc<dyn LookupService>,
    profile: EnrichmentProfile,
}

impl AnnotationEnricher {
    pub fn new(service: Arc<dyn LookupService>, profile: EnrichmentProfile) -> Self {
        Self { service, profile }
    }

    pub fn profile(&self) -> EnrichmentProfile {
        self.profile
    }

    /// Compute annotations for one variant of the report for `sample_id`
    pub async fn enrich(&self, variant: &Variant, sample_id: &str) -> EnrichResult<EnrichmentOutcome> {
        let Some((table_id, record_id)) = variant.lookup_reference() else {
            return Ok(EnrichmentOutcome::NotEligible);
        };

        let sources = self.service.sources(table_id, VARIANTS_ALGORITHM_KEY).await?;
        // Fixed precedence: only the first source is consulted
        let Some(source) = sources.first() else {
            tracing::debug!(table_id = %table_id, "No lookup source for table");
            return Ok(EnrichmentOutcome::NoSource);
        };

        let resolver = FieldResolver::new(self.service.as_ref(), source, record_id, sample_id);
        let mut annotations = Annotations::default();

        if self.profile.includes_allele_fraction() {
            let (naf, ndp) = tokio::try_join!(
                resolver.resolve(NAF_FIELD, NAF_NESTING_DEPTH),
                resolver.resolve(NDP_FIELD, NDP_NESTING_DEPTH)
            )?;
            annotations.naf = extract_numeric(NAF_FIELD, naf)?;
            annotations.ndp = extract_numeric(NDP_FIELD, ndp)?;
        }

        if self.profile.includes_split_read() {
            if let Some(value) = resolver.resolve(SR_FIELD, SR_NESTING_DEPTH).await? {
                let raw = value.as_str().ok_or_else(|| {
                    EnrichError::Parse(format!("SR value {} is not a string", value))
                })?;
                let reads = SplitReads::parse(raw)?;
                annotations.sv_vaf = Some(reads.allele_fraction()?);
                annotations.sv_reads = Some(reads.sv_reads);
            }
        }

        tracing::debug!(
            table_id = %table_id,
            record_id = %record_id,
            naf = ?annotations.naf,
            ndp = ?annotations.ndp,
            sv_vaf = ?annotations.sv_vaf,
            "Variant enriched"
        );

        Ok(EnrichmentOutcome::Annotated(annotations))
    }
}
