//! # redb-backed Record Storage
//!
//! A disk-backed record store using the redb embedded database:
//! - ACID transactions
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//!
//! Records live in one table keyed by `(owner, collection, rkey)`, so a
//! collection listing is a single range scan. Values are postcard-encoded
//! [`StoredRecord`] rows.

use crate::formats::StoredRecord;
use crate::store::RecordStore;
use crate::{NbhdError, Record, RecordUri};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::path::Path;

/// Table for records: (owner, collection, rkey) -> serialized StoredRecord bytes
const RECORDS: TableDefinition<(&str, &str, &str), &[u8]> = TableDefinition::new("records");

fn io_err(e: impl std::fmt::Display) -> NbhdError {
    NbhdError::IoError(e.to_string())
}

/// A disk-backed record store using redb.
pub struct RedbStore {
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a record database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, NbhdError> {
        let db = Database::create(path.as_ref()).map_err(io_err)?;

        // Initialize the table if it doesn't exist
        {
            let write_txn = db.begin_write().map_err(io_err)?;
            let _ = write_txn.open_table(RECORDS).map_err(io_err)?;
            write_txn.commit().map_err(io_err)?;
        }

        Ok(Self { db })
    }

    /// Compact the database (optional optimization).
    pub fn compact(&mut self) -> Result<(), NbhdError> {
        self.db.compact().map_err(io_err)?;
        Ok(())
    }

    fn write(&mut self, record: &Record, must_be_new: bool) -> Result<(), NbhdError> {
        let bytes = StoredRecord::from_record(record)?.to_bytes()?;
        let key = (
            record.uri.owner.as_str(),
            record.uri.collection.as_str(),
            record.uri.rkey.as_str(),
        );

        let write_txn = self.db.begin_write().map_err(io_err)?;
        {
            let mut table = write_txn.open_table(RECORDS).map_err(io_err)?;
            // Check and insert share one write transaction, so the
            // condition cannot race another writer.
            if must_be_new && table.get(key).map_err(io_err)?.is_some() {
                return Err(NbhdError::RecordConflict(record.uri.to_string()));
            }
            table.insert(key, bytes.as_slice()).map_err(io_err)?;
        }
        write_txn.commit().map_err(io_err)?;
        Ok(())
    }
}

impl RecordStore for RedbStore {
    fn insert_new(&mut self, record: &Record) -> Result<(), NbhdError> {
        self.write(record, true)
    }

    fn put(&mut self, record: &Record) -> Result<(), NbhdError> {
        self.write(record, false)
    }

    fn get(&self, uri: &RecordUri) -> Result<Option<Record>, NbhdError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(RECORDS).map_err(io_err)?;

        let key = (uri.owner.as_str(), uri.collection.as_str(), uri.rkey.as_str());
        match table.get(key).map_err(io_err)? {
            Some(data) => {
                let row = StoredRecord::from_bytes(data.value())?;
                Ok(Some(row.into_record()?))
            }
            None => Ok(None),
        }
    }

    fn list(&self, owner: &str, collection: &str) -> Result<Vec<Record>, NbhdError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(RECORDS).map_err(io_err)?;

        let mut records = Vec::new();
        for entry in table.range((owner, collection, "")..).map_err(io_err)? {
            let (key, value) = entry.map_err(io_err)?;
            let (o, c, _) = key.value();
            if o != owner || c != collection {
                break;
            }
            records.push(StoredRecord::from_bytes(value.value())?.into_record()?);
        }
        Ok(records)
    }

    fn delete(&mut self, uri: &RecordUri) -> Result<bool, NbhdError> {
        let write_txn = self.db.begin_write().map_err(io_err)?;
        let existed = {
            let mut table = write_txn.open_table(RECORDS).map_err(io_err)?;
            let key = (uri.owner.as_str(), uri.collection.as_str(), uri.rkey.as_str());
            table.remove(key).map_err(io_err)?.is_some()
        };
        write_txn.commit().map_err(io_err)?;
        Ok(existed)
    }

    fn len(&self) -> Result<usize, NbhdError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(RECORDS).map_err(io_err)?;
        let count = table.len().map_err(io_err)?;
        Ok(count as usize)
    }
}

// =============================================================================
// TESTS
// =============================================================================
