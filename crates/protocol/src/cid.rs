//! Content identifiers.
//!
//! CIDs here are always version 1 with a sha2-256 multihash, rendered with
//! the base64url multibase (`u` prefix). Raw payloads use the `raw` codec and
//! JSON structures (descriptors, signature payloads) use `dag-json` over their
//! JCS canonical form.

use ::cid::multibase::Base;
use ::cid::{Cid, Version};
use multihash_codetable::{Code, MultihashDigest};
use serde::Serialize;

use crate::error::{ProtocolError, Result};

/// Multicodec for raw bytes.
pub const RAW_CODEC: u64 = 0x55;

/// Multicodec for dag-json.
pub const DAG_JSON_CODEC: u64 = 0x0129;

/// Multihash code for sha2-256.
pub const SHA2_256: u64 = 0x12;

/// Computes the CID of a raw data payload.
pub fn compute_cid(data: &[u8]) -> String {
    render(RAW_CODEC, data)
}

/// Computes the CID of a value's JCS (RFC 8785) encoding.
pub fn cid_of_json<T: Serialize>(value: &T) -> Result<String> {
    let bytes = serde_jcs::to_vec(value)?;
    Ok(render(DAG_JSON_CODEC, &bytes))
}

/// Parsed components of a CID string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CidParts {
    /// Multicodec of the addressed content.
    pub codec: u64,
    /// The sha2-256 digest.
    pub digest: [u8; 32],
}

/// Parses a CIDv1 string and checks that it carries a sha2-256 digest.
pub fn parse_cid(cid: &str) -> Result<CidParts> {
    if !cid.starts_with(Base::Base64Url.code()) {
        return Err(ProtocolError::InvalidCid(format!(
            "expected base64url multibase, got '{}'",
            cid.chars().next().unwrap_or(' ')
        )));
    }

    let parsed = Cid::try_from(cid).map_err(|e| ProtocolError::InvalidCid(e.to_string()))?;
    if parsed.version() != Version::V1 {
        return Err(ProtocolError::InvalidCid("expected a version 1 CID".to_string()));
    }

    let hash = parsed.hash();
    let digest: [u8; 32] = hash
        .digest()
        .try_into()
        .ok()
        .filter(|_| hash.code() == SHA2_256)
        .ok_or_else(|| ProtocolError::InvalidCid("expected a sha2-256 multihash".to_string()))?;

    Ok(CidParts {
        codec: parsed.codec(),
        digest,
    })
}

fn render(codec: u64, data: &[u8]) -> String {
    let cid = Cid::new_v1(codec, Code::Sha2_256.digest(data));
    // only CIDv0 is restricted to base58btc
    cid.to_string_of_base(Base::Base64Url)
        .unwrap_or_else(|_| cid.to_string())
}
