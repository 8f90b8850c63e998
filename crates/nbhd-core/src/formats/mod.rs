//! # Formats
//!
//! Byte-level encodings owned by the core:
//! - `dag_cbor`: canonical encoding hashed into CIDs
//! - `persistence`: snapshot files and stored-record rows

pub mod dag_cbor;
pub mod persistence;

pub use persistence::{
    PersistenceHeader, StoredRecord, records_from_bytes, records_to_bytes,
};
