//! Binary framing for stored artifacts.
//!
//! Every artifact file starts with a 4-byte little-endian header length,
//! followed by a bincode-encoded [`ArtifactHeader`], followed by the raw
//! payload. The header carries magic bytes, a format version, and a payload
//! checksum so that decoding validates integrity before anything downstream
//! touches the bytes.

use kiln_common::ContentHash;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Magic bytes identifying a kiln store artifact.
const ARTIFACT_MAGIC: [u8; 4] = *b"KILN";

/// Current artifact framing version. Increment on breaking changes to the
/// header or payload layout.
const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Header prepended to every stored artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactHeader {
    /// Magic bytes: must be `b"KILN"`.
    pub magic: [u8; 4],

    /// Artifact framing version.
    pub format_version: u32,

    /// Version string of the compiler toolchain that produced the payload.
    /// Informational; incompatible toolchains are kept apart by the store's
    /// directory namespacing, not by this field.
    pub tool_version: String,

    /// Content hash of the payload (for integrity checks).
    pub checksum: ContentHash,
}

/// Frames `payload` with a validated header.
pub fn encode_artifact(payload: &[u8], tool_version: &str) -> Result<Vec<u8>, StoreError> {
    let header = ArtifactHeader {
        magic: ARTIFACT_MAGIC,
        format_version: ARTIFACT_FORMAT_VERSION,
        tool_version: tool_version.to_string(),
        checksum: ContentHash::from_bytes(payload),
    };
    let header_bytes = bincode::serde::encode_to_vec(&header, bincode::config::standard())
        .map_err(|e| StoreError::Serialization {
            reason: e.to_string(),
        })?;

    let header_len = header_bytes.len() as u32;
    let mut output = Vec::with_capacity(4 + header_bytes.len() + payload.len());
    output.extend_from_slice(&header_len.to_le_bytes());
    output.extend_from_slice(&header_bytes);
    output.extend_from_slice(payload);
    Ok(output)
}

/// Unframes an artifact, validating magic, format version, and checksum.
///
/// Returns `None` on any defect; corruption is a cache miss.
pub fn decode_artifact(raw: &[u8]) -> Option<Vec<u8>> {
    if raw.len() < 4 {
        return None;
    }
    let header_len = u32::from_le_bytes(raw[..4].try_into().ok()?) as usize;
    if raw.len() < 4 + header_len {
        return None;
    }

    let header: ArtifactHeader =
        bincode::serde::decode_from_slice(&raw[4..4 + header_len], bincode::config::standard())
            .ok()?
            .0;

    if header.magic != ARTIFACT_MAGIC {
        return None;
    }
    if header.format_version != ARTIFACT_FORMAT_VERSION {
        return None;
    }

    let payload = &raw[4 + header_len..];
    if ContentHash::from_bytes(payload) != header.checksum {
        return None;
    }

    Some(payload.to_vec())
}
