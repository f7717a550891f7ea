//! Field resolver
//!
//! A field query can match several physical records for one logical record
//! (e.g. one per variant caller). The resolver applies a fixed precedence:
//! the first row holding a non-null value at the field's nesting depth wins;
//! every other row is discarded, never merged. At depth 1 this is the first
//! row that is present, non-empty and has a non-null first element.

use crate::error::EnrichResult;
use crate::lookup::{LookupService, LookupSource};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use vsr_common::RecordId;

/// One raw row returned for a field query; values may themselves be lists
pub type FieldRow = Vec<Value>;

/// Request for named fields of one record, scoped to one sample
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldQuery {
    pub source_url: String,
    pub record_id: RecordId,
    pub sample_id: String,
    pub field_symbols: Vec<String>,
}

/// Rows returned by the lookup service, in service order
///
/// A `None` row is a JSON `null` entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldQueryResult {
    pub rows: Vec<Option<FieldRow>>,
}

impl FieldQueryResult {
    pub fn new(rows: Vec<Option<FieldRow>>) -> Self {
        Self { rows }
    }

    /// First row that is non-null, non-empty and whose first element is non-null
    pub fn first_non_empty(&self) -> Option<&FieldRow> {
        self.rows
            .iter()
            .flatten()
            .find(|row| nested_value(row, 1).is_some())
    }

    /// Value `depth` levels into the first row that has one there
    pub fn first_value(&self, depth: usize) -> Option<&Value> {
        self.rows
            .iter()
            .flatten()
            .find_map(|row| nested_value(row, depth))
    }
}

/// Follow first elements `depth` levels into a row
///
/// `None` when the shape is shallower than expected or the value is null.
pub fn nested_value(row: &[Value], depth: usize) -> Option<&Value> {
    let mut current = row.first()?;
    for _ in 1..depth {
        current = current.as_array()?.first()?;
    }
    (!current.is_null()).then_some(current)
}

/// Field queries for one variant within one lookup source
pub struct FieldResolver<'a> {
    service: &'a dyn LookupService,
    source: &'a LookupSource,
    record_id: &'a RecordId,
    sample_id: &'a str,
}

impl<'a> FieldResolver<'a> {
    pub fn new(
        service: &'a dyn LookupService,
        source: &'a LookupSource,
        record_id: &'a RecordId,
        sample_id: &'a str,
    ) -> Self {
        Self {
            service,
            source,
            record_id,
            sample_id,
        }
    }

    /// Raw rows for the given field names
    pub async fn query_fields(&self, field_names: &[&str]) -> EnrichResult<FieldQueryResult> {
        let query = FieldQuery {
            source_url: self.source.url.clone(),
            record_id: self.record_id.clone(),
            sample_id: self.sample_id.to_string(),
            field_symbols: field_names.iter().map(|s| s.to_string()).collect(),
        };
        self.service.records(&query).await
    }

    /// Query a single field and select its value at `depth`
    pub async fn resolve(&self, field_name: &str, depth: usize) -> EnrichResult<Option<Value>> {
        let result = self.query_fields(&[field_name]).await?;
        let selected = result.first_value(depth).cloned();

        tracing::debug!(
            field = field_name,
            record_id = %self.record_id,
            found = selected.is_some(),
            "Resolved lookup field"
        );

        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result_from(value: Value) -> FieldQueryResult {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_first_non_empty_skips_null_empty_and_null_first() {
        let result = result_from(json!([null, [], [null], [[7.2, 0.1]]]));
        assert_eq!(result.first_non_empty(), Some(&vec![json!([7.2, 0.1])]));
    }

    #[test]
    fn test_first_non_empty_takes_first_of_several_candidates() {
        let result = result_from(json!([[3], [99]]));
        assert_eq!(result.first_non_empty(), Some(&vec![json!(3)]));
    }

    #[test]
    fn test_first_element_only_needs_to_be_non_null() {
        // Later elements may be null; nested contents are not inspected
        let result = result_from(json!([[[null], 5], [[1.0]]]));
        assert_eq!(result.first_non_empty(), Some(&vec![json!([null]), json!(5)]));
    }

    #[test]
    fn test_all_empty_rows_yield_none() {
        assert!(result_from(json!([null, [], [null, 1]])).first_non_empty().is_none());
        assert!(FieldQueryResult::default().first_non_empty().is_none());
    }

    #[test]
    fn test_first_value_skips_rows_null_at_depth() {
        let result = result_from(json!([null, [], [[null]], [[7.2, 0.1]]]));
        assert_eq!(result.first_value(2), Some(&json!(7.2)));
        // At depth 1 the `[[null]]` row already qualifies
        assert_eq!(result.first_value(1), Some(&json!([null])));
        assert_eq!(result.first_non_empty(), Some(&vec![json!([null])]));
    }

    #[test]
    fn test_first_value_depth_one_matches_first_non_empty() {
        let result = result_from(json!([[], ["120,8"], ["3,1"]]));
        assert_eq!(result.first_value(1), Some(&json!("120,8")));
        assert_eq!(result.first_non_empty(), Some(&vec![json!("120,8")]));
    }

    #[test]
    fn test_nested_value_shapes() {
        assert_eq!(nested_value(&[json!([7.2, 0.1])], 2), Some(&json!(7.2)));
        assert_eq!(nested_value(&[json!(3)], 2), None);
        assert_eq!(nested_value(&[json!([null])], 2), None);
        assert_eq!(nested_value(&[json!([])], 2), None);
        assert_eq!(nested_value(&[], 1), None);
    }

    #[test]
    fn test_field_query_wire_format() {
        let query = FieldQuery {
            source_url: "https://lookup/src/1".to_string(),
            record_id: RecordId::Int(42),
            sample_id: "S-001".to_string(),
            field_symbols: vec!["NAF".to_string()],
        };
        let value = serde_json::to_value(&query).unwrap();
        assert_eq!(
            value,
            json!({
                "sourceUrl": "https://lookup/src/1",
                "recordId": 42,
                "sampleId": "S-001",
                "fieldSymbols": ["NAF"]
            })
        );
    }
}
