//! # Core Type Definitions
//!
//! This module contains the shared types of the nbhd core:
//! - Content identifiers (`Cid`)
//! - Record addressing (`RecordUri`)
//! - Persisted records (`Record`)
//! - Error types (`NbhdError`)
//!
//! Record values and frontmatter samples are plain `serde_json` values; the
//! core never interprets them beyond what CID generation and schema
//! inference need.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// An arbitrary structured record value.
pub type StructuredData = serde_json::Value;

/// One document's frontmatter: field name to raw value.
pub type FrontmatterSample = serde_json::Map<String, serde_json::Value>;

// =============================================================================
// CONTENT IDENTIFIER
// =============================================================================

/// A content identifier: `"bafy"` + lowercase base-32 SHA-256 digest.
///
/// Only constructed by [`crate::cid::generate_cid`] or by parsing a string
/// that passes [`crate::cid::validate_cid`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cid(String);

impl Cid {
    pub(crate) fn from_validated(s: String) -> Self {
        Self(s)
    }

    /// Get the CID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Cid {
    type Err = NbhdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if crate::cid::validate_cid(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(NbhdError::MalformedIdentifier(format!("invalid CID: {s}")))
        }
    }
}

impl TryFrom<String> for Cid {
    type Error = NbhdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        if crate::cid::validate_cid(&s) {
            Ok(Self(s))
        } else {
            Err(NbhdError::MalformedIdentifier(format!("invalid CID: {s}")))
        }
    }
}

impl From<Cid> for String {
    fn from(cid: Cid) -> Self {
        cid.0
    }
}

// =============================================================================
// RECORD URI
// =============================================================================

/// Address of a record: `at://{owner}/{collection}/{rkey}`.
///
/// Doubles as the key of the record store. Ordering is by owner, then
/// collection, then rkey, so one owner's collection is a contiguous range.
/// Within it rkeys compare as strings, which is not always TID order (see
/// [`crate::tid`]).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecordUri {
    /// Owner identifier (a DID).
    pub owner: String,
    /// Collection NSID, e.g. `app.nbhd.blog.post`.
    pub collection: String,
    /// Record key (a TID).
    pub rkey: String,
}

impl RecordUri {
    const SCHEME: &'static str = "at://";

    /// Compose a URI from its parts.
    #[must_use]
    pub fn new(
        owner: impl Into<String>,
        collection: impl Into<String>,
        rkey: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            collection: collection.into(),
            rkey: rkey.into(),
        }
    }
}

impl fmt::Display for RecordUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}/{}/{}",
            Self::SCHEME,
            self.owner,
            self.collection,
            self.rkey
        )
    }
}

impl FromStr for RecordUri {
    type Err = NbhdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || NbhdError::MalformedIdentifier(format!("invalid record URI: {s}"));

        let rest = s.strip_prefix(Self::SCHEME).ok_or_else(malformed)?;
        let mut parts = rest.splitn(3, '/');
        let owner = parts.next().filter(|p| !p.is_empty()).ok_or_else(malformed)?;
        let collection = parts.next().filter(|p| !p.is_empty()).ok_or_else(malformed)?;
        let rkey = parts.next().ok_or_else(malformed)?;

        if !crate::tid::validate_rkey(rkey) {
            return Err(malformed());
        }

        Ok(Self::new(owner, collection, rkey))
    }
}

impl TryFrom<String> for RecordUri {
    type Error = NbhdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<RecordUri> for String {
    fn from(uri: RecordUri) -> Self {
        uri.to_string()
    }
}

// =============================================================================
// RECORD
// =============================================================================

/// A persisted record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Where the record lives.
    pub uri: RecordUri,
    /// CID of `value` at the time it was written.
    pub cid: Cid,
    /// The record body.
    pub value: StructuredData,
    /// RFC 3339 UTC timestamp of creation.
    pub created_at: String,
    /// Record this one is cross-linked with (blog post <-> feed post).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_record: Option<RecordUri>,
}

impl Record {
    /// The record key.
    #[must_use]
    pub fn rkey(&self) -> &str {
        &self.uri.rkey
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the nbhd core.
///
/// - No silent failures
/// - Use `Result<T, NbhdError>` for fallible operations
/// - The core never panics; all errors are recoverable
#[derive(Debug, Error)]
pub enum NbhdError {
    /// A value could not be canonically encoded.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// A CID, TID, or record URI is malformed.
    #[error("Malformed identifier: {0}")]
    MalformedIdentifier(String),

    /// No record exists under the given URI.
    #[error("Record not found: {0}")]
    RecordNotFound(String),

    /// A record already exists under the given URI.
    #[error("Record conflict: {0}")]
    RecordConflict(String),

    /// A record value or its addressing was rejected.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// A template project failed validation.
    #[error("Invalid template: {0}")]
    InvalidTemplate(String),

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A deserialization error occurred.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

// =============================================================================
// TESTS
// =============================================================================
