//! Report pipeline
//!
//! Orchestrates one report:
//! 1. Enrich every variant in `biomarkers ++ germlineVariants ++ uncertainVariants`
//!    order using a bounded worker pool
//! 2. Merge annotations back by original index
//! 3. Classify recognized sample signatures
//!
//! # Error Handling
//! - Per-variant error isolation: a failed lookup or parse nulls out only that
//!   variant's derived fields and adds a failure record
//! - Cancellation or deadline: in-flight lookups are abandoned and variants not
//!   yet started are skipped; both are reported as failures, never a hang

use crate::enricher::{AnnotationEnricher, EnrichmentOutcome};
use crate::error::{EnrichError, EnrichResult, FailureRecord};
use crate::signature::{classify_sample, SignatureClassification};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vsr_common::{Report, SampleState};

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Concurrent per-variant enrichments
    pub workers: usize,
    /// Whole-report deadline
    pub deadline: Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            deadline: None,
        }
    }
}

/// Sample signature inputs for one run
#[derive(Debug, Clone, Copy)]
pub struct SignatureContext<'a> {
    pub sample: &'a SampleState,
    pub evaluation_id: i64,
}

/// Per-run counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub total: usize,
    pub enriched: usize,
    pub not_eligible: usize,
    pub no_source: usize,
    pub failed: usize,
    pub cancelled: usize,
}

/// Enriched report plus everything observed while producing it
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub report: Report,
    pub classifications: Vec<SignatureClassification>,
    pub failures: Vec<FailureRecord>,
    pub stats: RunStats,
}

impl PipelineOutput {
    /// True when cancellation or the deadline cut the run short
    pub fn interrupted(&self) -> bool {
        self.stats.cancelled > 0
    }
}

/// Report pipeline orchestrator
pub struct ReportPipeline {
    enricher: Arc<AnnotationEnricher>,
    config: PipelineConfig,
}

impl ReportPipeline {
    pub fn new(enricher: Arc<AnnotationEnricher>, config: PipelineConfig) -> Self {
        Self { enricher, config }
    }

    /// Run the pipeline over one report
    ///
    /// Never fails as a whole; per-item problems are in `failures`.
    pub async fn run(
        &self,
        mut report: Report,
        signatures: Option<SignatureContext<'_>>,
        cancel: &CancellationToken,
    ) -> PipelineOutput {
        let token = cancel.child_token();
        let deadline_at = self.config.deadline.map(|d| Instant::now() + d);
        let total = report.variant_count();
        let labels = report.variant_labels();

        info!(
            sample_id = %report.sample_id,
            variants = total,
            workers = self.config.workers,
            profile = %self.enricher.profile(),
            "Enriching report"
        );

        let sample_id = report.sample_id.as_str();
        let mut outcomes: Vec<(usize, EnrichResult<EnrichmentOutcome>)> =
            stream::iter(report.variants().enumerate())
                .map(|(index, variant)| {
                    let token = token.clone();
                    let enricher = self.enricher.clone();
                    async move {
                        // Not started before cancellation: skip without a lookup
                        if token.is_cancelled() {
                            return (index, Err(stop_reason(deadline_at)));
                        }

                        let expired = async {
                            match deadline_at {
                                Some(at) => tokio::time::sleep_until(at).await,
                                None => std::future::pending::<()>().await,
                            }
                        };

                        let result = tokio::select! {
                            biased;
                            _ = token.cancelled() => Err(stop_reason(deadline_at)),
                            _ = expired => {
                                token.cancel();
                                Err(EnrichError::DeadlineExceeded)
                            }
                            result = enricher.enrich(variant, sample_id) => result,
                        };
                        (index, result)
                    }
                })
                .buffer_unordered(self.config.workers.max(1))
                .collect()
                .await;

        // Deterministic merge in original order
        outcomes.sort_by_key(|(index, _)| *index);

        let mut stats = RunStats {
            total,
            ..Default::default()
        };
        let mut failures = Vec::new();

        for ((index, result), variant) in outcomes.into_iter().zip(report.variants_mut()) {
            variant.clear_annotations();
            let label = &labels[index];
            match result {
                Ok(outcome) => {
                    match outcome {
                        EnrichmentOutcome::Annotated(_) => stats.enriched += 1,
                        EnrichmentOutcome::NotEligible => stats.not_eligible += 1,
                        EnrichmentOutcome::NoSource => stats.no_source += 1,
                    }
                    variant.set_annotations(outcome.annotations());
                    debug!(item = %label, outcome = ?outcome, "Variant merged");
                }
                Err(e @ (EnrichError::Cancelled | EnrichError::DeadlineExceeded)) => {
                    stats.cancelled += 1;
                    failures.push(FailureRecord::new(label.as_str(), &e));
                }
                Err(e) => {
                    warn!(item = %label, error = %e, "Variant enrichment failed");
                    stats.failed += 1;
                    failures.push(FailureRecord::new(label.as_str(), &e));
                }
            }
        }

        if stats.cancelled > 0 {
            warn!(
                sample_id = %report.sample_id,
                cancelled = stats.cancelled,
                "Enrichment interrupted; remaining variants left unannotated"
            );
        }

        let classifications = match signatures {
            Some(ctx) => {
                let (classifications, signature_failures) =
                    classify_sample(ctx.sample, ctx.evaluation_id);
                failures.extend(signature_failures);
                classifications
            }
            None => Vec::new(),
        };

        info!(
            sample_id = %report.sample_id,
            enriched = stats.enriched,
            not_eligible = stats.not_eligible,
            no_source = stats.no_source,
            failed = stats.failed,
            cancelled = stats.cancelled,
            signatures = classifications.len(),
            "Report enrichment complete"
        );

        PipelineOutput {
            report,
            classifications,
            failures,
            stats,
        }
    }
}

/// Why a variant was stopped: deadline if it has passed, otherwise cancellation
fn stop_reason(deadline_at: Option<Instant>) -> EnrichError {
    match deadline_at {
        Some(at) if Instant::now() >= at => EnrichError::DeadlineExceeded,
        _ => EnrichError::Cancelled,
    }
}
