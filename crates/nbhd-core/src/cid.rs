//! # Content Identifiers
//!
//! CIDs are immutable content hashes identifying record values.
//!
//! ```text
//! cid = "bafy" + lowercase(base32(sha256(dag_cbor(value)))) without padding
//! ```
//!
//! The same logical value always produces the same CID; changing any field
//! changes it. Map key order never matters (see [`crate::formats::dag_cbor`]).

use crate::formats::dag_cbor;
use crate::primitives::{CID_PREFIX, MAX_CID_LENGTH, MIN_CID_LENGTH};
use crate::{Cid, NbhdError, StructuredData};
use data_encoding::BASE32_NOPAD;
use sha2::{Digest, Sha256};

/// Generate the CID of a record value.
///
/// Pure and deterministic.
///
/// # Errors
///
/// Returns `NbhdError::Encoding` if the value cannot be canonically encoded.
pub fn generate_cid(value: &StructuredData) -> Result<Cid, NbhdError> {
    let bytes = dag_cbor::encode(value)?;
    let digest = Sha256::digest(&bytes);

    let mut cid = String::with_capacity(MIN_CID_LENGTH);
    cid.push_str(CID_PREFIX);
    cid.push_str(&BASE32_NOPAD.encode(&digest).to_ascii_lowercase());

    Ok(Cid::from_validated(cid))
}

/// Structural check of a CID string. Does not re-derive anything.
///
/// True iff the string starts with `bafy`, continues with lowercase base-32
/// characters only, and is between 56 and 200 characters long.
#[must_use]
pub fn validate_cid(cid: &str) -> bool {
    if cid.len() < MIN_CID_LENGTH || cid.len() > MAX_CID_LENGTH {
        return false;
    }

    match cid.strip_prefix(CID_PREFIX) {
        Some(rest) => rest.bytes().all(is_base32_lower),
        None => false,
    }
}

/// The base-32 digest portion of a CID (everything after `bafy`).
pub fn extract_cid_hash(cid: &str) -> Result<&str, NbhdError> {
    if !validate_cid(cid) {
        return Err(NbhdError::MalformedIdentifier(format!(
            "invalid CID format: {cid}"
        )));
    }
    Ok(&cid[CID_PREFIX.len()..])
}

/// Decode the SHA-256 digest carried by a CID.
pub fn cid_digest(cid: &str) -> Result<[u8; 32], NbhdError> {
    let hash = extract_cid_hash(cid)?;
    let bytes = BASE32_NOPAD
        .decode(hash.to_ascii_uppercase().as_bytes())
        .map_err(|e| NbhdError::MalformedIdentifier(format!("undecodable CID digest: {e}")))?;

    bytes.try_into().map_err(|b: Vec<u8>| {
        NbhdError::MalformedIdentifier(format!(
            "CID digest is {} bytes, expected 32",
            b.len()
        ))
    })
}

pub(crate) fn is_base32_lower(b: u8) -> bool {
    b.is_ascii_lowercase() || (b'2'..=b'7').contains(&b)
}

// =============================================================================
// TESTS
// =============================================================================
