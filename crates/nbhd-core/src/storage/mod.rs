//! # Storage Backends
//!
//! Persistent implementations of [`crate::store::RecordStore`].

mod redb_store;

pub use redb_store::RedbStore;
