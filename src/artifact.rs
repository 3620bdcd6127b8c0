//! Payload section appended to an evaluator executable.
//!
//! ```text
//! [executable][u32 LE metadata len][metadata JSON][sealed blob][u64 LE section len][PDFEVAL1]
//! ```
//!
//! The operating system loader ignores trailing bytes, so the baked file runs
//! exactly like the template it was made from.

use crate::error::CodecError;
use crate::model::BuildInfo;

const TRAILER_MAGIC: &[u8; 8] = b"PDFEVAL1";
const FOOTER_LEN: usize = 16;
const METADATA_LEN_BYTES: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedPayload {
    pub metadata: BuildInfo,
    pub sealed: Vec<u8>,
}

pub fn encode_section(payload: &EmbeddedPayload) -> Result<Vec<u8>, CodecError> {
    let metadata = serde_json::to_vec(&payload.metadata).map_err(CodecError::Serialize)?;
    let metadata_len = u32::try_from(metadata.len())
        .map_err(|_| CodecError::corrupt("build metadata exceeds section limits"))?;

    let mut section =
        Vec::with_capacity(METADATA_LEN_BYTES + metadata.len() + payload.sealed.len() + FOOTER_LEN);
    section.extend_from_slice(&metadata_len.to_le_bytes());
    section.extend_from_slice(&metadata);
    section.extend_from_slice(&payload.sealed);

    let body_len = section.len() as u64;
    section.extend_from_slice(&body_len.to_le_bytes());
    section.extend_from_slice(TRAILER_MAGIC);
    Ok(section)
}

/// The executable bytes without any previously appended section.
pub fn strip_section(bytes: &[u8]) -> &[u8] {
    match locate_section(bytes) {
        Ok(Some((start, _))) => &bytes[..start],
        _ => bytes,
    }
}

pub fn assemble(executable: &[u8], section: &[u8]) -> Vec<u8> {
    let base = strip_section(executable);
    let mut artifact = Vec::with_capacity(base.len() + section.len());
    artifact.extend_from_slice(base);
    artifact.extend_from_slice(section);
    artifact
}

/// `Ok(None)` when no section is present; an inconsistent section is corrupt.
pub fn read_section(bytes: &[u8]) -> Result<Option<EmbeddedPayload>, CodecError> {
    let Some((start, end)) = locate_section(bytes)? else {
        return Ok(None);
    };
    let body = &bytes[start..end];

    if body.len() < METADATA_LEN_BYTES {
        return Err(CodecError::corrupt("payload section is truncated"));
    }
    let (len_bytes, rest) = body.split_at(METADATA_LEN_BYTES);
    let mut metadata_len = [0_u8; METADATA_LEN_BYTES];
    metadata_len.copy_from_slice(len_bytes);
    let metadata_len = u32::from_le_bytes(metadata_len) as usize;
    if metadata_len > rest.len() {
        return Err(CodecError::corrupt("build metadata overruns payload section"));
    }

    let (metadata, sealed) = rest.split_at(metadata_len);
    let metadata: BuildInfo = serde_json::from_slice(metadata)
        .map_err(|_| CodecError::corrupt("build metadata is unreadable"))?;

    Ok(Some(EmbeddedPayload {
        metadata,
        sealed: sealed.to_vec(),
    }))
}

fn locate_section(bytes: &[u8]) -> Result<Option<(usize, usize)>, CodecError> {
    if bytes.len() < FOOTER_LEN || !bytes.ends_with(TRAILER_MAGIC) {
        return Ok(None);
    }

    let footer_start = bytes.len() - FOOTER_LEN;
    let mut len_bytes = [0_u8; 8];
    len_bytes.copy_from_slice(&bytes[footer_start..footer_start + 8]);
    let body_len = usize::try_from(u64::from_le_bytes(len_bytes))
        .map_err(|_| CodecError::corrupt("payload section length is out of range"))?;

    if body_len > footer_start {
        return Err(CodecError::corrupt("payload section length exceeds file size"));
    }
    Ok(Some((footer_start - body_len, footer_start)))
}
