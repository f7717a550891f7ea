//! Report data model
//!
//! A report is one sample's output: three ordered variant sequences plus
//! whatever other fields the upstream report generator emitted. Fields this
//! crate does not interpret are carried through verbatim in `extra` so that
//! an enriched report serializes as the input plus the derived annotations.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Wire names of the three variant sequences, in concatenation order
pub const VARIANT_SECTIONS: [&str; 3] = ["biomarkers", "germlineVariants", "uncertainVariants"];

/// One sample's clinical variant report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Sample identifier used to scope lookup queries
    pub sample_id: String,
    pub biomarkers: Vec<Variant>,
    pub germline_variants: Vec<Variant>,
    pub uncertain_variants: Vec<Variant>,
    /// Fields not interpreted by the enrichment core
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Report {
    /// Parse a report from its JSON encoding
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// All variants in `biomarkers ++ germlineVariants ++ uncertainVariants` order
    pub fn variants(&self) -> impl Iterator<Item = &Variant> {
        self.biomarkers
            .iter()
            .chain(self.germline_variants.iter())
            .chain(self.uncertain_variants.iter())
    }

    /// Mutable view over all variants, same order as [`Report::variants`]
    pub fn variants_mut(&mut self) -> impl Iterator<Item = &mut Variant> {
        self.biomarkers
            .iter_mut()
            .chain(self.germline_variants.iter_mut())
            .chain(self.uncertain_variants.iter_mut())
    }

    pub fn variant_count(&self) -> usize {
        self.biomarkers.len() + self.germline_variants.len() + self.uncertain_variants.len()
    }

    /// Human-readable location of each variant, e.g. `germlineVariants[2]`
    ///
    /// Indexed the same way as [`Report::variants`].
    pub fn variant_labels(&self) -> Vec<String> {
        let sections = [
            self.biomarkers.len(),
            self.germline_variants.len(),
            self.uncertain_variants.len(),
        ];
        VARIANT_SECTIONS
            .iter()
            .zip(sections)
            .flat_map(|(name, len)| (0..len).map(move |i| format!("{}[{}]", name, i)))
            .collect()
    }
}

/// External record identifier; the lookup service issues both forms
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Text(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(id) => write!(f, "{}", id),
            RecordId::Text(id) => f.write_str(id),
        }
    }
}

/// One called genomic alteration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    /// Lookup table reference; absent or empty means not lookup-eligible
    #[serde(
        rename = "projectTableUuid",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub table_id: Option<String>,

    /// Record within the lookup table
    #[serde(
        rename = "projectTableRecordId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub record_id: Option<RecordId>,

    /// Normalized allele fraction
    #[serde(default)]
    pub naf: Option<f64>,

    /// Normalized depth
    #[serde(default)]
    pub ndp: Option<f64>,

    /// Structural-variant allele fraction from split reads
    #[serde(rename = "svVaf", default)]
    pub sv_vaf: Option<f64>,

    /// Split reads supporting the structural variant
    #[serde(rename = "svReads", default)]
    pub sv_reads: Option<u64>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Variant {
    /// Table/record pair when the variant can be looked up
    pub fn lookup_reference(&self) -> Option<(&str, &RecordId)> {
        let table_id = self.table_id.as_deref().filter(|id| !id.trim().is_empty())?;
        let record_id = self.record_id.as_ref()?;
        Some((table_id, record_id))
    }

    /// Current derived fields
    pub fn annotations(&self) -> Annotations {
        Annotations {
            naf: self.naf,
            ndp: self.ndp,
            sv_vaf: self.sv_vaf,
            sv_reads: self.sv_reads,
        }
    }

    /// Replace all derived fields at once
    pub fn set_annotations(&mut self, annotations: Annotations) {
        self.naf = annotations.naf;
        self.ndp = annotations.ndp;
        self.sv_vaf = annotations.sv_vaf;
        self.sv_reads = annotations.sv_reads;
    }

    pub fn clear_annotations(&mut self) {
        self.set_annotations(Annotations::default());
    }
}

/// Derived per-variant values set by enrichment
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Annotations {
    pub naf: Option<f64>,
    pub ndp: Option<f64>,
    pub sv_vaf: Option<f64>,
    pub sv_reads: Option<u64>,
}

impl Annotations {
    pub fn is_empty(&self) -> bool {
        *self == Annotations::default()
    }
}

/// Sample state holding the extensible field list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleState {
    #[serde(default)]
    pub extra_field: Vec<ExtraField>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One `{fieldName, fieldValue}` entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtraField {
    pub field_name: String,
    #[serde(default)]
    pub field_value: Option<Value>,
}

impl SampleState {
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Value of the first field named `name`, rendered as a string
    ///
    /// Later duplicates are ignored even when the first match has no value.
    pub fn field_value(&self, name: &str) -> Option<String> {
        let field = self.extra_field.iter().find(|f| f.field_name == name)?;
        match field.field_value.as_ref()? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_report() -> Report {
        serde_json::from_value(json!({
            "sampleId": "S-001",
            "tumorType": "Lung Adenocarcinoma",
            "biomarkers": [
                {"geneName": "EGFR", "projectTableUuid": "tbl-1", "projectTableRecordId": 17},
                {"geneName": "KRAS"}
            ],
            "germlineVariants": [
                {"geneName": "BRCA2", "projectTableUuid": "tbl-1", "projectTableRecordId": "r-9"}
            ],
            "uncertainVariants": []
        }))
        .unwrap()
    }

    #[test]
    fn test_variants_concatenation_order() {
        let report = sample_report();
        let genes: Vec<_> = report
            .variants()
            .map(|v| v.extra["geneName"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(genes, vec!["EGFR", "KRAS", "BRCA2"]);
        assert_eq!(report.variant_count(), 3);
    }

    #[test]
    fn test_variant_labels_follow_sections() {
        let report = sample_report();
        assert_eq!(
            report.variant_labels(),
            vec!["biomarkers[0]", "biomarkers[1]", "germlineVariants[0]"]
        );
    }

    #[test]
    fn test_unknown_fields_round_trip() {
        let report = sample_report();
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["tumorType"], "Lung Adenocarcinoma");
        assert_eq!(value["biomarkers"][0]["geneName"], "EGFR");
        assert_eq!(value["biomarkers"][0]["projectTableRecordId"], 17);
        // Derived fields are always present, null before enrichment
        assert!(value["biomarkers"][1]["naf"].is_null());
        assert!(value["biomarkers"][1].get("svReads").is_some());
    }

    #[test]
    fn test_lookup_reference_requires_non_empty_table() {
        let mut variant = Variant {
            table_id: Some("".to_string()),
            record_id: Some(RecordId::Int(3)),
            ..Default::default()
        };
        assert!(variant.lookup_reference().is_none());

        variant.table_id = Some("tbl".to_string());
        let (table, record) = variant.lookup_reference().unwrap();
        assert_eq!(table, "tbl");
        assert_eq!(record.to_string(), "3");

        variant.record_id = None;
        assert!(variant.lookup_reference().is_none());
    }

    #[test]
    fn test_clear_annotations() {
        let mut variant = Variant {
            naf: Some(0.2),
            ndp: Some(10.0),
            sv_vaf: Some(0.5),
            sv_reads: Some(4),
            ..Default::default()
        };
        variant.clear_annotations();
        assert!(variant.annotations().is_empty());
    }

    #[test]
    fn test_field_value_first_match_wins() {
        let sample: SampleState = serde_json::from_value(json!({
            "extraField": [
                {"fieldName": "TMB", "fieldValue": "12.5"},
                {"fieldName": "TMB", "fieldValue": "40"},
                {"fieldName": "MSI", "fieldValue": 7.1},
                {"fieldName": "N_SID", "fieldValue": null}
            ]
        }))
        .unwrap();
        assert_eq!(sample.field_value("TMB").as_deref(), Some("12.5"));
        assert_eq!(sample.field_value("MSI").as_deref(), Some("7.1"));
        assert_eq!(sample.field_value("N_SID"), None);
        assert_eq!(sample.field_value("missing"), None);
    }

    #[test]
    fn test_report_missing_sample_id_is_error() {
        let result = Report::from_json(r#"{"biomarkers": [], "germlineVariants": [], "uncertainVariants": []}"#);
        assert!(matches!(result, Err(crate::Error::Json(_))));
    }
}
