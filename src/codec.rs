//! Canonical serialisation, hashing and sealing of a ground-truth dataset.
//!
//! Blob layout: `nonce (16) || zlib stream XOR keystream || tag (16)`. The
//! keystream is SHA-256 in counter mode over the nonce, so byte scans of the
//! blob never find plaintext even when deflate falls back to stored blocks.
//! The tag is a SHA-256 prefix over nonce and masked bytes; any truncation or
//! bit flip fails it before inflation is attempted.

use std::collections::HashSet;
use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use sha2::{Digest, Sha256};

use crate::error::CodecError;
use crate::model::{Dataset, Document};

pub const PAYLOAD_FORMAT: u32 = 1;

const SEAL_DOMAIN: &[u8] = b"pdf-eval/payload-seal/v1";
const NONCE_LEN: usize = 16;
const TAG_LEN: usize = 16;
const KEYSTREAM_BLOCK_LEN: usize = 32;

#[derive(Debug, Clone)]
pub struct EncodedPayload {
    pub bytes: Vec<u8>,
    pub content_hash: String,
    pub canonical_len: usize,
}

/// Compact JSON of the dataset ordered by `document_id`, fields by name.
pub fn canonical_json(dataset: &Dataset) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(&dataset.canonicalize()).map_err(CodecError::Serialize)
}

pub fn content_hash(canonical: &[u8]) -> String {
    format!("{:x}", Sha256::digest(canonical))
}

pub fn encode(dataset: &Dataset) -> Result<EncodedPayload, CodecError> {
    let canonical = canonical_json(dataset)?;
    let content_hash = content_hash(&canonical);

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(&canonical).map_err(CodecError::Compress)?;
    let compressed = encoder.finish().map_err(CodecError::Compress)?;

    let nonce = derive_nonce(&canonical);
    let mut bytes = Vec::with_capacity(NONCE_LEN + compressed.len() + TAG_LEN);
    bytes.extend_from_slice(&nonce);
    bytes.extend_from_slice(&compressed);
    apply_keystream(&nonce, &mut bytes[NONCE_LEN..]);
    let tag = seal_tag(&bytes);
    bytes.extend_from_slice(&tag);

    Ok(EncodedPayload {
        bytes,
        content_hash,
        canonical_len: canonical.len(),
    })
}

/// Inverse of [`encode`]. Any failure means the artifact must be rebaked.
pub fn decode(bytes: &[u8]) -> Result<Dataset, CodecError> {
    if bytes.len() <= NONCE_LEN + TAG_LEN {
        return Err(CodecError::corrupt("sealed blob is truncated"));
    }

    let (sealed, tag) = bytes.split_at(bytes.len() - TAG_LEN);
    if seal_tag(sealed).as_slice() != tag {
        return Err(CodecError::corrupt("integrity tag mismatch"));
    }

    let (nonce, masked) = sealed.split_at(NONCE_LEN);
    let mut compressed = masked.to_vec();
    apply_keystream(nonce, &mut compressed);

    let mut canonical = Vec::new();
    ZlibDecoder::new(compressed.as_slice())
        .read_to_end(&mut canonical)
        .map_err(|_| CodecError::corrupt("compressed stream failed to inflate"))?;

    // Parse errors can quote content, so only the fact of failure is kept.
    let documents: Vec<Document> = serde_json::from_slice(&canonical)
        .map_err(|_| CodecError::corrupt("inflated bytes are not a document list"))?;

    let mut seen = HashSet::with_capacity(documents.len());
    if !documents
        .iter()
        .all(|document| seen.insert(document.document_id.as_str()))
    {
        return Err(CodecError::corrupt("document ids are not unique"));
    }

    Ok(Dataset::from_unique(documents))
}

/// Decodes and checks the result against the hash recorded at bake time.
pub fn decode_verified(bytes: &[u8], expected_hash: &str) -> Result<Dataset, CodecError> {
    let dataset = decode(bytes)?;
    let actual = content_hash(&canonical_json(&dataset)?);
    if actual != expected_hash {
        return Err(CodecError::corrupt("content hash does not match build metadata"));
    }
    Ok(dataset)
}

fn derive_nonce(canonical: &[u8]) -> [u8; NONCE_LEN] {
    let digest = Sha256::new()
        .chain_update(SEAL_DOMAIN)
        .chain_update(canonical)
        .finalize();
    let mut nonce = [0_u8; NONCE_LEN];
    nonce.copy_from_slice(&digest[..NONCE_LEN]);
    nonce
}

fn seal_tag(sealed: &[u8]) -> [u8; TAG_LEN] {
    let digest = Sha256::new()
        .chain_update(SEAL_DOMAIN)
        .chain_update(b"tag")
        .chain_update(sealed)
        .finalize();
    let mut tag = [0_u8; TAG_LEN];
    tag.copy_from_slice(&digest[..TAG_LEN]);
    tag
}

fn apply_keystream(nonce: &[u8], data: &mut [u8]) {
    for (counter, chunk) in data.chunks_mut(KEYSTREAM_BLOCK_LEN).enumerate() {
        let block = Sha256::new()
            .chain_update(SEAL_DOMAIN)
            .chain_update(nonce)
            .chain_update((counter as u64).to_le_bytes())
            .finalize();
        for (byte, key) in chunk.iter_mut().zip(block.iter()) {
            *byte ^= key;
        }
    }
}
