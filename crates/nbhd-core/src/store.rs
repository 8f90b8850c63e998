//! # Record Store
//!
//! The key-value seam between the repository and its storage.
//!
//! This module defines the `RecordStore` trait and the in-memory
//! `MemoryStore`. All data structures use `BTreeMap`, so listings come out
//! in key order without an explicit sort.

use crate::{NbhdError, Record, RecordUri};
use std::collections::BTreeMap;

// =============================================================================
// RECORDSTORE TRAIT
// =============================================================================

/// The RecordStore trait defines the storage operations for records.
///
/// All fallible operations return `Result<T, NbhdError>` to support both
/// in-memory and persistent storage backends uniformly.
pub trait RecordStore {
    /// Conditional write: fails with `RecordConflict` if the key exists.
    fn insert_new(&mut self, record: &Record) -> Result<(), NbhdError>;

    /// Insert or overwrite.
    fn put(&mut self, record: &Record) -> Result<(), NbhdError>;

    /// Lookup a record by its URI.
    fn get(&self, uri: &RecordUri) -> Result<Option<Record>, NbhdError>;

    /// All records of one owner's collection, in rkey order.
    fn list(&self, owner: &str, collection: &str) -> Result<Vec<Record>, NbhdError>;

    /// Remove a record. Returns whether it existed.
    fn delete(&mut self, uri: &RecordUri) -> Result<bool, NbhdError>;

    /// Number of stored records.
    fn len(&self) -> Result<usize, NbhdError>;

    /// Whether the store holds no records.
    fn is_empty(&self) -> Result<bool, NbhdError> {
        Ok(self.len()? == 0)
    }
}

// =============================================================================
// MEMORY STORE
// =============================================================================

/// In-memory record store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: BTreeMap<RecordUri, Record>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from previously saved records.
    ///
    /// Later duplicates of the same URI overwrite earlier ones.
    #[must_use]
    pub fn from_records(records: impl IntoIterator<Item = Record>) -> Self {
        Self {
            records: records.into_iter().map(|r| (r.uri.clone(), r)).collect(),
        }
    }

    /// Iterate over every record in key order.
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }
}

impl RecordStore for MemoryStore {
    fn insert_new(&mut self, record: &Record) -> Result<(), NbhdError> {
        if self.records.contains_key(&record.uri) {
            return Err(NbhdError::RecordConflict(record.uri.to_string()));
        }
        self.records.insert(record.uri.clone(), record.clone());
        Ok(())
    }

    fn put(&mut self, record: &Record) -> Result<(), NbhdError> {
        self.records.insert(record.uri.clone(), record.clone());
        Ok(())
    }

    fn get(&self, uri: &RecordUri) -> Result<Option<Record>, NbhdError> {
        Ok(self.records.get(uri).cloned())
    }

    fn list(&self, owner: &str, collection: &str) -> Result<Vec<Record>, NbhdError> {
        Ok(self
            .records
            .values()
            .filter(|r| r.uri.owner == owner && r.uri.collection == collection)
            .cloned()
            .collect())
    }

    fn delete(&mut self, uri: &RecordUri) -> Result<bool, NbhdError> {
        Ok(self.records.remove(uri).is_some())
    }

    fn len(&self) -> Result<usize, NbhdError> {
        Ok(self.records.len())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cid::generate_cid;
    use serde_json::json;

    fn record(owner: &str, collection: &str, rkey: &str) -> Record {
        let value = json!({"$type": collection, "rkey": rkey});
        Record {
            uri: RecordUri::new(owner, collection, rkey),
            cid: generate_cid(&value).expect("cid"),
            value,
            created_at: "2026-01-01T00:00:00Z".to_string(),
            linked_record: None,
        }
    }

    #[test]
    fn insert_new_rejects_existing_key() {
        let mut store = MemoryStore::new();
        let r = record("did:a", "app.x", "3kbcdefghij2a");

        store.insert_new(&r).expect("first insert");
        let err = store.insert_new(&r);
        assert!(matches!(err, Err(NbhdError::RecordConflict(_))));
        assert_eq!(store.len().expect("len"), 1);
    }

    #[test]
    fn put_overwrites() {
        let mut store = MemoryStore::new();
        let mut r = record("did:a", "app.x", "3kbcdefghij2a");
        store.put(&r).expect("put");

        r.created_at = "2027-01-01T00:00:00Z".to_string();
        store.put(&r).expect("put again");

        let got = store.get(&r.uri).expect("get").expect("present");
        assert_eq!(got.created_at, "2027-01-01T00:00:00Z");
        assert_eq!(store.len().expect("len"), 1);
    }

    #[test]
    fn list_filters_by_owner_and_collection() {
        let mut store = MemoryStore::new();
        store.put(&record("did:a", "app.x", "3kbcdefghij3a")).expect("put");
        store.put(&record("did:a", "app.x", "3kbcdefghij2a")).expect("put");
        store.put(&record("did:a", "app.y", "3kbcdefghij2a")).expect("put");
        store.put(&record("did:b", "app.x", "3kbcdefghij2a")).expect("put");

        let listed = store.list("did:a", "app.x").expect("list");
        let rkeys: Vec<&str> = listed.iter().map(Record::rkey).collect();
        assert_eq!(rkeys, vec!["3kbcdefghij2a", "3kbcdefghij3a"]);
    }

    #[test]
    fn delete_reports_presence() {
        let mut store = MemoryStore::new();
        let r = record("did:a", "app.x", "3kbcdefghij2a");
        store.put(&r).expect("put");

        assert!(store.delete(&r.uri).expect("delete"));
        assert!(!store.delete(&r.uri).expect("delete again"));
        assert!(store.is_empty().expect("empty"));
    }
}
