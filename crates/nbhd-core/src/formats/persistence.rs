//! # Persistence Format
//!
//! Binary serialization of record collections for the file backend.
//!
//! Format: Header (5 bytes) + postcard-serialized snapshot.
//! - 4 bytes: Magic ("NBHD")
//! - 1 byte: Version
//!
//! Record values are `serde_json::Value`, which postcard cannot decode on
//! its own (it is not self-describing), so each value is carried as its JSON
//! text inside a [`StoredRecord`]. The same row type is used by the redb
//! backend.
//!
//! File I/O lives in the app layer; everything here is a pure transformation.

use crate::{primitives, NbhdError, Record};
use serde::{Deserialize, Serialize};

/// Maximum allowed payload size for the snapshot format.
///
/// Checked before any decoding so a corrupted length cannot trigger a
/// huge allocation.
pub const MAX_PERSISTENCE_PAYLOAD_SIZE: usize = 500 * 1024 * 1024; // 500 MB

/// Minimum valid file size (header only).
const MIN_FILE_SIZE: usize = 5;

// =============================================================================
// FILE HEADER
// =============================================================================

/// The persistence header precedes all record data.
#[derive(Debug, Clone, Copy)]
pub struct PersistenceHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl PersistenceHeader {
    /// Create a new header with current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    /// Validate the header.
    pub fn validate(&self) -> Result<(), NbhdError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(NbhdError::DeserializationError(
                "Invalid magic bytes".to_string(),
            ));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(NbhdError::DeserializationError(format!(
                "Unsupported version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    /// Write header to bytes.
    pub fn to_bytes(&self) -> [u8; 5] {
        let mut bytes = [0u8; 5];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    /// Read header from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, NbhdError> {
        if bytes.len() < MIN_FILE_SIZE {
            return Err(NbhdError::DeserializationError(
                "Header too short".to_string(),
            ));
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        Ok(Self {
            magic,
            version: bytes[4],
        })
    }
}

impl Default for PersistenceHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// STORED RECORD
// =============================================================================

/// On-disk row for one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub uri: String,
    pub cid: String,
    /// The record value as JSON text.
    pub value_json: String,
    pub created_at: String,
    pub linked_record: Option<String>,
}

impl StoredRecord {
    /// Flatten a record into its on-disk form.
    pub fn from_record(record: &Record) -> Result<Self, NbhdError> {
        let value_json = serde_json::to_string(&record.value)
            .map_err(|e| NbhdError::SerializationError(e.to_string()))?;
        Ok(Self {
            uri: record.uri.to_string(),
            cid: record.cid.to_string(),
            value_json,
            created_at: record.created_at.clone(),
            linked_record: record.linked_record.as_ref().map(ToString::to_string),
        })
    }

    /// Rebuild the record, re-validating its identifiers.
    pub fn into_record(self) -> Result<Record, NbhdError> {
        let value = serde_json::from_str(&self.value_json)
            .map_err(|e| NbhdError::DeserializationError(format!("Record value: {}", e)))?;
        let linked_record = self
            .linked_record
            .map(|uri| uri.parse())
            .transpose()?;

        Ok(Record {
            uri: self.uri.parse()?,
            cid: self.cid.parse()?,
            value,
            created_at: self.created_at,
            linked_record,
        })
    }

    /// postcard bytes of this row.
    pub fn to_bytes(&self) -> Result<Vec<u8>, NbhdError> {
        postcard::to_allocvec(self).map_err(|e| NbhdError::SerializationError(e.to_string()))
    }

    /// Decode a row from postcard bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, NbhdError> {
        postcard::from_bytes(bytes).map_err(|e| NbhdError::DeserializationError(e.to_string()))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    records: Vec<StoredRecord>,
}

// =============================================================================
// SERIALIZATION FUNCTIONS
// =============================================================================

/// Serialize records to bytes (header + payload).
///
/// Rows are sorted by URI first, so the output does not depend on the order
/// of `records`.
pub fn records_to_bytes<'a, I>(records: I) -> Result<Vec<u8>, NbhdError>
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut rows = records
        .into_iter()
        .map(|r| Ok((r.uri.clone(), StoredRecord::from_record(r)?)))
        .collect::<Result<Vec<_>, NbhdError>>()?;
    rows.sort_by(|(a, _), (b, _)| a.cmp(b));

    let snapshot = Snapshot {
        records: rows.into_iter().map(|(_, row)| row).collect(),
    };

    let payload = postcard::to_stdvec(&snapshot)
        .map_err(|e| NbhdError::SerializationError(e.to_string()))?;

    let header = PersistenceHeader::new();
    let mut result = Vec::with_capacity(MIN_FILE_SIZE + payload.len());
    result.extend_from_slice(&header.to_bytes());
    result.extend_from_slice(&payload);

    Ok(result)
}

/// Deserialize records from bytes.
///
/// Size and header are validated before the payload is touched.
pub fn records_from_bytes(bytes: &[u8]) -> Result<Vec<Record>, NbhdError> {
    if bytes.len() < MIN_FILE_SIZE {
        return Err(NbhdError::DeserializationError(
            "Data too short: minimum 5 bytes required".to_string(),
        ));
    }

    if bytes.len() > MAX_PERSISTENCE_PAYLOAD_SIZE {
        return Err(NbhdError::DeserializationError(format!(
            "Data size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_PERSISTENCE_PAYLOAD_SIZE
        )));
    }

    let header = PersistenceHeader::from_bytes(bytes)?;
    header.validate()?;

    let snapshot: Snapshot = postcard::from_bytes(&bytes[MIN_FILE_SIZE..]).map_err(|e| {
        NbhdError::DeserializationError(format!("Failed to deserialize records: {}", e))
    })?;

    snapshot
        .records
        .into_iter()
        .map(StoredRecord::into_record)
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================
