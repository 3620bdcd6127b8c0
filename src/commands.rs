pub mod bake;
pub mod info;
pub mod score;
pub mod template;

use std::fs;

use anyhow::{Result, anyhow};
use tracing::debug;

use crate::artifact::{self, EmbeddedPayload};
use crate::codec::{self, PAYLOAD_FORMAT};
use crate::error::{CodecError, EvalError};
use crate::model::Dataset;
use crate::schema::Schema;

/// The compiled-in template. A failure here is a build defect, not bad input.
pub fn load_schema() -> Result<Schema> {
    Schema::canonical().map_err(|err| anyhow!("compiled-in extraction template is unusable: {err}"))
}

/// Payload section appended to the running executable.
pub(crate) fn embedded_payload() -> Result<EmbeddedPayload, EvalError> {
    let exe = std::env::current_exe().map_err(EvalError::SelfUnreadable)?;
    let bytes = fs::read(&exe).map_err(EvalError::SelfUnreadable)?;
    debug!(path = %exe.display(), bytes = bytes.len(), "scanning evaluator for payload section");

    artifact::read_section(&bytes)?.ok_or(EvalError::MissingGroundTruth)
}

pub(crate) fn embedded_ground_truth(schema: &Schema) -> Result<Dataset, EvalError> {
    let payload = embedded_payload()?;
    open_payload(schema, &payload)
}

/// Checks metadata compatibility before the sealed blob is touched.
pub(crate) fn open_payload(
    schema: &Schema,
    payload: &EmbeddedPayload,
) -> Result<Dataset, EvalError> {
    let metadata = &payload.metadata;
    if metadata.schema_version != schema.version() {
        return Err(CodecError::SchemaMismatch {
            embedded: metadata.schema_version.clone(),
            expected: schema.version().to_string(),
        }
        .into());
    }
    if metadata.payload_format != PAYLOAD_FORMAT {
        return Err(CodecError::corrupt(format!(
            "unsupported payload format {}",
            metadata.payload_format
        ))
        .into());
    }

    let dataset = codec::decode_verified(&payload.sealed, &metadata.content_hash)?;
    if dataset.len() != metadata.document_count {
        return Err(CodecError::corrupt("document count does not match build metadata").into());
    }
    debug!(documents = dataset.len(), "embedded ground truth opened");
    Ok(dataset)
}
