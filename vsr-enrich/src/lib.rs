//! vsr-enrich library interface
//!
//! Enriches clinical variant reports with lookup-table annotations,
//! classifies sample-level signatures and hands the results downstream.

pub mod delivery;
pub mod enricher;
pub mod error;
pub mod lookup;
pub mod output;
pub mod pipeline;
pub mod resolver;
pub mod signature;

pub use crate::enricher::{AnnotationEnricher, EnrichmentOutcome};
pub use crate::error::{DeliveryError, EnrichError, EnrichResult, FailureKind, FailureRecord};
pub use crate::lookup::{HttpLookupClient, LookupService, LookupSource};
pub use crate::pipeline::{PipelineConfig, PipelineOutput, ReportPipeline, RunStats, SignatureContext};
pub use crate::signature::{SignatureClassification, SignatureKind, SignatureStatus};
