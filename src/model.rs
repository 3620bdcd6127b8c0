use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub document_id: String,
    pub fields: BTreeMap<String, String>,
}

/// A document list whose ids are known to be unique.
///
/// Only the schema validator and the payload codec construct one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Dataset {
    documents: Vec<Document>,
}

impl Dataset {
    pub(crate) fn from_unique(documents: Vec<Document>) -> Self {
        Self { documents }
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn iter(&self) -> impl Iterator<Item = &Document> {
        self.documents.iter()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Documents ordered by `document_id`; the form that is hashed and embedded.
    pub fn canonicalize(&self) -> Dataset {
        let mut documents = self.documents.clone();
        documents.sort_by(|left, right| left.document_id.cmp(&right.document_id));
        Dataset { documents }
    }
}

/// Metadata stored next to the sealed payload inside a baked evaluator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInfo {
    pub schema_version: String,
    pub build_timestamp: String,
    pub builder_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rustc_version: Option<String>,
    pub content_hash: String,
    pub document_count: usize,
    pub payload_format: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_commit: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub output_path: String,
    pub artifact_bytes: usize,
    pub payload_bytes: usize,
    pub canonical_bytes: usize,
    pub document_count: usize,
    pub build_info: BuildInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub schema_version: String,
    pub document_count_ground_truth: usize,
    pub document_count_predictions: usize,
    pub matched_document_count: usize,
    pub missing_document_count: usize,
    pub document_coverage: f64,
    pub per_field_accuracy: BTreeMap<String, f64>,
    pub exact_match_rate: f64,
    /// Ground-truth field names the matching prediction also declares, over
    /// all ground-truth field names.
    pub structural_completeness: f64,
    pub missing_field_count: usize,
    pub extra_field_count: usize,
    pub extra_documents: Vec<String>,
    pub unrecognized_fields: Vec<String>,
    /// Prediction document id to field names its ground truth does not declare.
    pub extra_fields: BTreeMap<String, Vec<String>>,
}
