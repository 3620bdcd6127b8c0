//! Baking pipeline: ground truth in, self-contained evaluator out.

use std::fs;
use std::io;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::artifact::{self, EmbeddedPayload};
use crate::codec::{self, PAYLOAD_FORMAT};
use crate::error::{BakeError, InputError};
use crate::model::{BuildInfo, BuildReport, Dataset};
use crate::schema::{Schema, ValidationPolicy};
use crate::util::{self, read_json_file};

pub const BUILDER_VERSION: &str = concat!("pdf-eval-bake ", env!("CARGO_PKG_VERSION"));

/// Values shorter than this are too likely to occur by chance in sealed bytes.
const MIN_LEAK_NEEDLE_LEN: usize = 6;

#[derive(Debug, Clone)]
pub enum GroundTruthSource {
    Path(PathBuf),
    Inline(String),
}

#[derive(Debug, Clone)]
pub struct BakeRequest {
    pub source: GroundTruthSource,
    pub output: PathBuf,
    pub evaluator: PathBuf,
    pub build_time: DateTime<Utc>,
    pub source_commit: Option<String>,
}

pub fn bake(schema: &Schema, request: &BakeRequest) -> Result<BuildReport, BakeError> {
    let raw = load_source(&request.source)?;
    let dataset = schema.validate(&raw, ValidationPolicy::ground_truth())?;
    info!(documents = dataset.len(), "ground truth validated");

    let encoded = codec::encode(&dataset)?;
    debug!(
        canonical_bytes = encoded.canonical_len,
        sealed_bytes = encoded.bytes.len(),
        "payload sealed"
    );

    if let Some(index) = find_plaintext(&encoded.bytes, &dataset) {
        return Err(BakeError::PlaintextLeak { index });
    }

    let build_info = BuildInfo {
        schema_version: schema.version().to_string(),
        build_timestamp: util::utc_string(request.build_time),
        builder_version: BUILDER_VERSION.to_string(),
        rustc_version: option_env!("PDF_EVAL_RUSTC_VERSION").map(str::to_string),
        content_hash: encoded.content_hash.clone(),
        document_count: dataset.len(),
        payload_format: PAYLOAD_FORMAT,
        source_commit: request.source_commit.clone(),
    };

    let template = fs::read(&request.evaluator).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            BakeError::EvaluatorNotFound {
                path: request.evaluator.clone(),
            }
        } else {
            BakeError::EvaluatorUnreadable {
                path: request.evaluator.clone(),
                source,
            }
        }
    })?;
    let permissions = fs::metadata(&request.evaluator)
        .map(|metadata| metadata.permissions())
        .map_err(|source| BakeError::EvaluatorUnreadable {
            path: request.evaluator.clone(),
            source,
        })?;

    let section = artifact::encode_section(&EmbeddedPayload {
        metadata: build_info.clone(),
        sealed: encoded.bytes,
    })?;
    let artifact = artifact::assemble(&template, &section);

    util::write_atomic(&request.output, &artifact, Some(permissions)).map_err(|source| {
        BakeError::Packaging {
            path: request.output.clone(),
            source,
        }
    })?;

    info!(
        path = %request.output.display(),
        artifact_bytes = artifact.len(),
        content_hash = %build_info.content_hash,
        "evaluator baked"
    );

    Ok(BuildReport {
        output_path: request.output.display().to_string(),
        artifact_bytes: artifact.len(),
        payload_bytes: section.len(),
        canonical_bytes: encoded.canonical_len,
        document_count: dataset.len(),
        build_info,
    })
}

fn load_source(source: &GroundTruthSource) -> Result<serde_json::Value, BakeError> {
    match source {
        GroundTruthSource::Path(path) => {
            info!(path = %path.display(), "loading ground truth");
            Ok(read_json_file(path)?)
        }
        GroundTruthSource::Inline(raw) => serde_json::from_str(raw).map_err(|source| {
            InputError::MalformedJson {
                origin: "inline JSON".to_string(),
                source,
            }
            .into()
        }),
    }
}

/// Index of the first document whose id or a field value appears verbatim.
fn find_plaintext(haystack: &[u8], dataset: &Dataset) -> Option<usize> {
    dataset.iter().position(|document| {
        std::iter::once(&document.document_id)
            .chain(document.fields.values())
            .map(String::as_bytes)
            .filter(|needle| needle.len() >= MIN_LEAK_NEEDLE_LEN)
            .any(|needle| haystack.windows(needle.len()).any(|window| window == needle))
    })
}
