//! Scoring of a predictions dataset against ground truth.
//!
//! Pure function of its inputs. Every denominator counts ground-truth
//! documents, so a missing prediction is a miss and never shrinks the base.
//! Values are compared as exact strings; no case, whitespace or numeric
//! normalisation happens here. Field presence diagnostics count names only.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::model::{Dataset, Document, MetricsReport};
use crate::schema::Schema;


#[derive(Debug, Default, Clone, Copy)]
struct FieldTally {
    expected: usize,
    matched: usize,
}

/// Field-name presence, independent of values.
#[derive(Debug, Default)]
struct FieldPresence {
    expected: usize,
    present: usize,
    missing: usize,
    extra: usize,
    extra_fields: BTreeMap<String, Vec<String>>,
}

impl FieldPresence {
    fn record(&mut self, expected: &Document, prediction: Option<&Document>) {
        self.expected += expected.fields.len();
        let Some(prediction) = prediction else {
            self.missing += expected.fields.len();
            return;
        };

        let present = expected
            .fields
            .keys()
            .filter(|field| prediction.fields.contains_key(*field))
            .count();
        self.present += present;
        self.missing += expected.fields.len() - present;

        let extra = prediction
            .fields
            .keys()
            .filter(|field| !expected.fields.contains_key(*field))
            .cloned()
            .collect::<Vec<String>>();
        self.push_extra(prediction, extra);
    }

    fn record_unmatched(&mut self, prediction: &Document) {
        self.push_extra(prediction, prediction.fields.keys().cloned().collect());
    }

    // Keyed by prediction ids only; ground-truth-only ids never land here.
    fn push_extra(&mut self, prediction: &Document, extra: Vec<String>) {
        if extra.is_empty() {
            return;
        }
        self.extra += extra.len();
        self.extra_fields.insert(prediction.document_id.clone(), extra);
    }
}

pub fn score(schema: &Schema, ground_truth: &Dataset, predictions: &Dataset) -> MetricsReport {
    let predicted = predictions
        .iter()
        .map(|document| (document.document_id.as_str(), document))
        .collect::<HashMap<&str, &Document>>();

    let mut matched_documents = 0usize;
    let mut exact_matches = 0usize;
    let mut presence = FieldPresence::default();
    let mut tallies = schema
        .field_names()
        .map(|field| (field, FieldTally::default()))
        .collect::<BTreeMap<&str, FieldTally>>();

    for expected in ground_truth.iter() {
        let prediction = predicted.get(expected.document_id.as_str()).copied();
        if prediction.is_some() {
            matched_documents += 1;
        }
        presence.record(expected, prediction);

        for (field, expected_value) in &expected.fields {
            let Some(tally) = tallies.get_mut(field.as_str()) else {
                continue;
            };
            tally.expected += 1;
            if prediction.and_then(|document| document.fields.get(field)) == Some(expected_value) {
                tally.matched += 1;
            }
        }

        if let Some(prediction) = prediction {
            if is_exact_match(schema, expected, prediction) {
                exact_matches += 1;
            }
        }
    }

    let ground_truth_ids = ground_truth
        .iter()
        .map(|document| document.document_id.as_str())
        .collect::<BTreeSet<&str>>();
    for document in predictions.iter() {
        if !ground_truth_ids.contains(document.document_id.as_str()) {
            presence.record_unmatched(document);
        }
    }
    let extra_documents = predictions
        .iter()
        .map(|document| document.document_id.as_str())
        .filter(|document_id| !ground_truth_ids.contains(document_id))
        .collect::<BTreeSet<&str>>()
        .into_iter()
        .map(str::to_string)
        .collect();
    let unrecognized_fields = predictions
        .iter()
        .flat_map(|document| document.fields.keys())
        .filter(|field| !schema.contains(field))
        .map(String::as_str)
        .collect::<BTreeSet<&str>>()
        .into_iter()
        .map(str::to_string)
        .collect();

    let per_field_accuracy = tallies
        .into_iter()
        .map(|(field, tally)| (field.to_string(), ratio(tally.matched, tally.expected)))
        .collect();

    MetricsReport {
        schema_version: schema.version().to_string(),
        document_count_ground_truth: ground_truth.len(),
        document_count_predictions: predictions.len(),
        matched_document_count: matched_documents,
        missing_document_count: ground_truth.len() - matched_documents,
        document_coverage: ratio(matched_documents, ground_truth.len()),
        per_field_accuracy,
        exact_match_rate: ratio(exact_matches, ground_truth.len()),
        structural_completeness: ratio(presence.present, presence.expected),
        missing_field_count: presence.missing,
        extra_field_count: presence.extra,
        extra_documents,
        unrecognized_fields,
        extra_fields: presence.extra_fields,
    }
}

/// Every schema field agrees; a field absent on both sides agrees.
fn is_exact_match(schema: &Schema, expected: &Document, predicted: &Document) -> bool {
    schema
        .field_names()
        .all(|field| expected.fields.get(field) == predicted.fields.get(field))
}

/// Fraction rounded to four decimals; an empty denominator scores zero.
pub fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    round_metric(numerator as f64 / denominator as f64)
}

fn round_metric(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
