//! # VSR Common Library
//!
//! Shared code for the variant report enrichment tools:
//! - Report data model (reports, variants, sample extensible fields)
//! - Configuration loading and precedence resolution
//! - Common error type

pub mod config;
pub mod error;
pub mod model;

pub use error::{Error, Result};
pub use model::{Annotations, ExtraField, RecordId, Report, SampleState, Variant};
