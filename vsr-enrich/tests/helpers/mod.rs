//! Test Helper Utilities
//!
//! In-memory lookup service and report builders shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use vsr_common::Report;
use vsr_enrich::resolver::{FieldQuery, FieldQueryResult};
use vsr_enrich::{EnrichError, EnrichResult, LookupService, LookupSource};

/// Lookup service backed by maps
///
/// - `tables`: table id → sources
/// - `records`: (record id, field) → raw rows
#[derive(Default)]
pub struct FakeLookup {
    tables: HashMap<String, Vec<LookupSource>>,
    records: HashMap<(String, String), Value>,
    failing_records: Vec<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    queried_records: Mutex<Vec<String>>,
}

impl FakeLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(mut self, table_id: &str, source_urls: &[&str]) -> Self {
        self.tables.insert(
            table_id.to_string(),
            source_urls.iter().map(|u| LookupSource::new(*u)).collect(),
        );
        self
    }

    pub fn field(mut self, record_id: &str, field: &str, rows: Value) -> Self {
        self.records
            .insert((record_id.to_string(), field.to_string()), rows);
        self
    }

    /// Record queries for this id fail with a transport error
    pub fn failing(mut self, record_id: &str) -> Self {
        self.failing_records.push(record_id.to_string());
        self
    }

    /// Every call sleeps first
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn queried_records(&self) -> Vec<String> {
        self.queried_records.lock().unwrap().clone()
    }
}

#[async_trait]
impl LookupService for FakeLookup {
    async fn sources(&self, table_id: &str, _algorithm_key: &str) -> EnrichResult<Vec<LookupSource>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.tables.get(table_id).cloned().unwrap_or_default())
    }

    async fn records(&self, query: &FieldQuery) -> EnrichResult<FieldQueryResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let record_id = query.record_id.to_string();
        self.queried_records.lock().unwrap().push(record_id.clone());

        if self.failing_records.contains(&record_id) {
            return Err(EnrichError::Transport("connection reset".to_string()));
        }

        let rows = self
            .records
            .get(&(record_id, query.field_symbols[0].clone()))
            .cloned()
            .unwrap_or_else(|| json!([]));
        Ok(serde_json::from_value(rows).expect("fake rows must be valid"))
    }
}

/// Variant JSON with a table reference
pub fn linked_variant(gene: &str, table_id: &str, record_id: &str) -> Value {
    json!({
        "geneName": gene,
        "projectTableUuid": table_id,
        "projectTableRecordId": record_id,
    })
}

/// Variant JSON without a table reference
pub fn unlinked_variant(gene: &str) -> Value {
    json!({ "geneName": gene })
}

pub fn report(biomarkers: Vec<Value>, germline: Vec<Value>, uncertain: Vec<Value>) -> Report {
    serde_json::from_value(json!({
        "sampleId": "S-100",
        "tumorType": "Colorectal Adenocarcinoma",
        "biomarkers": biomarkers,
        "germlineVariants": germline,
        "uncertainVariants": uncertain,
    }))
    .expect("test report must be valid")
}
