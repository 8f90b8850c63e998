//! # Repository
//!
//! Record CRUD on top of a [`RecordStore`]: identifiers are assigned here
//! (TID for the key, CID for the content), values are checked against their
//! collection, and blog posts can be published together with a linked feed
//! post.
//!
//! ## Storage Backends
//!
//! `Repository` is generic over the store. [`StorageBackend`] picks one at
//! runtime:
//! - `InMemory`: a `MemoryStore` (fast, volatile unless explicitly saved)
//! - `Persistent`: a `RedbStore` for disk-backed ACID storage

use crate::cid::generate_cid;
use crate::crosspost::{BlogPost, generate_feed_summary};
use crate::primitives::{
    BLOG_POST_COLLECTION, FEED_POST_COLLECTION, MAX_COLLECTION_LENGTH, MAX_OWNER_LENGTH,
    MAX_RKEY_ATTEMPTS,
};
use crate::storage::RedbStore;
use crate::store::{MemoryStore, RecordStore};
use crate::tid::{Tid, generate_rkey};
use crate::{NbhdError, Record, RecordUri, StructuredData};
use chrono::{SecondsFormat, Utc};
use serde_json::{Value, json};
use std::path::Path;

/// Key of the record-type discriminator inside a record value.
pub const TYPE_FIELD: &str = "$type";

/// Current UTC time as RFC 3339 with a `Z` suffix.
#[must_use]
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

// =============================================================================
// STORAGE BACKEND
// =============================================================================

/// Storage backend chosen at runtime.
#[derive(Debug)]
pub enum StorageBackend {
    /// In-memory store (fast, volatile).
    InMemory(MemoryStore),
    /// Disk-backed store using redb (ACID, persistent).
    Persistent(RedbStore),
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::InMemory(MemoryStore::new())
    }
}

impl StorageBackend {
    /// Open a redb-backed store.
    pub fn redb(path: impl AsRef<Path>) -> Result<Self, NbhdError> {
        Ok(Self::Persistent(RedbStore::open(path)?))
    }

    /// Check if using persistent storage.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self, Self::Persistent(_))
    }

    /// The in-memory store, if that is the backend.
    #[must_use]
    pub fn memory(&self) -> Option<&MemoryStore> {
        match self {
            Self::InMemory(m) => Some(m),
            Self::Persistent(_) => None,
        }
    }
}

impl RecordStore for StorageBackend {
    fn insert_new(&mut self, record: &Record) -> Result<(), NbhdError> {
        match self {
            Self::InMemory(s) => s.insert_new(record),
            Self::Persistent(s) => s.insert_new(record),
        }
    }

    fn put(&mut self, record: &Record) -> Result<(), NbhdError> {
        match self {
            Self::InMemory(s) => s.put(record),
            Self::Persistent(s) => s.put(record),
        }
    }

    fn get(&self, uri: &RecordUri) -> Result<Option<Record>, NbhdError> {
        match self {
            Self::InMemory(s) => s.get(uri),
            Self::Persistent(s) => s.get(uri),
        }
    }

    fn list(&self, owner: &str, collection: &str) -> Result<Vec<Record>, NbhdError> {
        match self {
            Self::InMemory(s) => s.list(owner, collection),
            Self::Persistent(s) => s.list(owner, collection),
        }
    }

    fn delete(&mut self, uri: &RecordUri) -> Result<bool, NbhdError> {
        match self {
            Self::InMemory(s) => s.delete(uri),
            Self::Persistent(s) => s.delete(uri),
        }
    }

    fn len(&self) -> Result<usize, NbhdError> {
        match self {
            Self::InMemory(s) => s.len(),
            Self::Persistent(s) => s.len(),
        }
    }
}

// =============================================================================
// REPOSITORY
// =============================================================================

/// Result of publishing a blog post.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedPost {
    /// The `app.nbhd.blog.post` record.
    pub blog: Record,
    /// The linked `app.bsky.feed.post` record, if cross-posted.
    pub feed: Option<Record>,
}

/// Record operations over a store.
#[derive(Debug)]
pub struct Repository<S: RecordStore = StorageBackend> {
    store: S,
    rkey_source: fn() -> String,
}

impl Default for Repository<StorageBackend> {
    fn default() -> Self {
        Self::new(StorageBackend::default())
    }
}

impl<S: RecordStore> Repository<S> {
    /// Wrap a store.
    #[must_use]
    pub fn new(store: S) -> Self {
        Self {
            store,
            rkey_source: generate_rkey,
        }
    }

    /// Replace the rkey generator (deterministic keys in tests and imports).
    #[must_use]
    pub fn with_rkey_source(mut self, source: fn() -> String) -> Self {
        self.rkey_source = source;
        self
    }

    /// Get a reference to the store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Consume the repository, returning its store.
    #[must_use]
    pub fn into_store(self) -> S {
        self.store
    }

    /// Create a record with a fresh rkey.
    ///
    /// `$type` is filled with the collection when absent.
    ///
    /// # Errors
    ///
    /// - `InvalidRecord` for a bad owner, collection, non-object value, or a
    ///   `$type` naming another collection
    /// - `RecordConflict` if no free rkey was found in `MAX_RKEY_ATTEMPTS`
    pub fn create_record(
        &mut self,
        owner: &str,
        collection: &str,
        value: StructuredData,
    ) -> Result<Record, NbhdError> {
        self.insert_fresh(owner, collection, value, None)
    }

    /// Fetch a record.
    pub fn get_record(&self, uri: &RecordUri) -> Result<Record, NbhdError> {
        self.store
            .get(uri)?
            .ok_or_else(|| NbhdError::RecordNotFound(uri.to_string()))
    }

    /// All records of a collection, oldest first.
    ///
    /// Sorted by decoded TID, not by rkey string.
    pub fn list_records(&self, owner: &str, collection: &str) -> Result<Vec<Record>, NbhdError> {
        let mut records = self.store.list(owner, collection)?;
        records.sort_by_cached_key(|r| r.rkey().parse::<Tid>().ok());
        Ok(records)
    }

    /// Replace a record's value, keeping its rkey, creation time, and link.
    pub fn update_record(
        &mut self,
        uri: &RecordUri,
        value: StructuredData,
    ) -> Result<Record, NbhdError> {
        let existing = self.get_record(uri)?;
        let value = typed_value(&uri.collection, value)?;

        let record = Record {
            uri: existing.uri,
            cid: generate_cid(&value)?,
            value,
            created_at: existing.created_at,
            linked_record: existing.linked_record,
        };
        self.store.put(&record)?;
        Ok(record)
    }

    /// Delete a record. Returns whether it existed.
    pub fn delete_record(&mut self, uri: &RecordUri) -> Result<bool, NbhdError> {
        self.store.delete(uri)
    }

    /// Publish a blog post, optionally cross-posting a feed summary.
    ///
    /// When cross-posting, each record's `linked_record` points at the other.
    /// If the feed post cannot be written or linked, the records written so
    /// far are deleted again and the first error is returned.
    pub fn publish_blog_post(
        &mut self,
        owner: &str,
        post: &BlogPost,
        static_url: &str,
        cross_post: bool,
    ) -> Result<PublishedPost, NbhdError> {
        let created_at = timestamp_now();

        let mut blog_value = json!({
            TYPE_FIELD: BLOG_POST_COLLECTION,
            "title": post.title,
            "content": post.content,
            "frontmatter": post.frontmatter,
            "status": "published",
            "createdAt": created_at,
        });
        if let (Some(site_id), Some(map)) = (&post.site_id, blog_value.as_object_mut()) {
            map.insert("site_id".to_string(), Value::String(site_id.clone()));
        }

        let mut blog = self.insert_fresh(owner, BLOG_POST_COLLECTION, blog_value, None)?;
        if !cross_post {
            return Ok(PublishedPost { blog, feed: None });
        }

        match self.cross_post(owner, post, static_url, &created_at, &mut blog) {
            Ok(feed) => Ok(PublishedPost {
                blog,
                feed: Some(feed),
            }),
            Err(e) => {
                // Rollback is best effort.
                self.store.delete(&blog.uri).ok();
                Err(e)
            }
        }
    }

    /// Write the feed post for `blog` and link the two.
    fn cross_post(
        &mut self,
        owner: &str,
        post: &BlogPost,
        static_url: &str,
        created_at: &str,
        blog: &mut Record,
    ) -> Result<Record, NbhdError> {
        let summary = generate_feed_summary(post, static_url, created_at)?;
        let summary = serde_json::to_value(&summary)
            .map_err(|e| NbhdError::SerializationError(e.to_string()))?;
        let feed = self.insert_fresh(
            owner,
            FEED_POST_COLLECTION,
            summary,
            Some(blog.uri.clone()),
        )?;

        blog.linked_record = Some(feed.uri.clone());
        if let Err(e) = self.store.put(blog) {
            blog.linked_record = None;
            self.store.delete(&feed.uri).ok();
            return Err(e);
        }
        Ok(feed)
    }

    fn insert_fresh(
        &mut self,
        owner: &str,
        collection: &str,
        value: StructuredData,
        linked_record: Option<RecordUri>,
    ) -> Result<Record, NbhdError> {
        validate_owner(owner)?;
        validate_collection(collection)?;
        let value = typed_value(collection, value)?;
        let cid = generate_cid(&value)?;
        let created_at = timestamp_now();

        for _ in 0..MAX_RKEY_ATTEMPTS {
            let record = Record {
                uri: RecordUri::new(owner, collection, (self.rkey_source)()),
                cid: cid.clone(),
                value: value.clone(),
                created_at: created_at.clone(),
                linked_record: linked_record.clone(),
            };
            match self.store.insert_new(&record) {
                Ok(()) => return Ok(record),
                Err(NbhdError::RecordConflict(_)) => continue,
                Err(e) => return Err(e),
            }
        }

        Err(NbhdError::RecordConflict(format!(
            "no free rkey in {owner}/{collection} after {MAX_RKEY_ATTEMPTS} attempts"
        )))
    }
}

// =============================================================================
// VALIDATION
// =============================================================================

/// Owner identifiers are DIDs: non-empty, no `/`, no whitespace.
pub fn validate_owner(owner: &str) -> Result<(), NbhdError> {
    if owner.is_empty() || owner.len() > MAX_OWNER_LENGTH {
        return Err(NbhdError::InvalidRecord(format!(
            "owner must be 1..={MAX_OWNER_LENGTH} bytes"
        )));
    }
    if owner.contains('/') || owner.chars().any(char::is_whitespace) {
        return Err(NbhdError::InvalidRecord(format!("invalid owner: {owner}")));
    }
    Ok(())
}

/// Collections are NSID-like: two or more dot-separated segments of
/// `[A-Za-z0-9-]`.
pub fn validate_collection(collection: &str) -> Result<(), NbhdError> {
    let invalid = || NbhdError::InvalidRecord(format!("invalid collection: {collection}"));

    if collection.is_empty() || collection.len() > MAX_COLLECTION_LENGTH {
        return Err(invalid());
    }
    let segments: Vec<&str> = collection.split('.').collect();
    if segments.len() < 2 {
        return Err(invalid());
    }
    let segment_ok = |s: &&str| {
        !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
    };
    if !segments.iter().all(segment_ok) {
        return Err(invalid());
    }
    Ok(())
}

/// Check the value is an object and its `$type` matches the collection,
/// filling it in when absent.
fn typed_value(collection: &str, mut value: StructuredData) -> Result<StructuredData, NbhdError> {
    let map = value.as_object_mut().ok_or_else(|| {
        NbhdError::InvalidRecord("record value must be a JSON object".to_string())
    })?;

    match map.get(TYPE_FIELD) {
        None => {
            map.insert(
                TYPE_FIELD.to_string(),
                Value::String(collection.to_string()),
            );
        }
        Some(Value::String(t)) if t == collection => {}
        Some(other) => {
            return Err(NbhdError::InvalidRecord(format!(
                "$type {other} does not match collection {collection}"
            )));
        }
    }
    Ok(value)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cid::validate_cid;
    use crate::tid::validate_rkey;

    const OWNER: &str = "did:plc:alice";

    fn repo() -> Repository<MemoryStore> {
        Repository::new(MemoryStore::new())
    }

    /// Memory store whose overwrites fail, or whose inserts into one
    /// collection fail.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        fail_put: bool,
        fail_insert_into: Option<&'static str>,
    }

    impl RecordStore for FlakyStore {
        fn insert_new(&mut self, record: &Record) -> Result<(), NbhdError> {
            if self.fail_insert_into == Some(record.uri.collection.as_str()) {
                return Err(NbhdError::IoError("disk full".to_string()));
            }
            self.inner.insert_new(record)
        }

        fn put(&mut self, record: &Record) -> Result<(), NbhdError> {
            if self.fail_put {
                return Err(NbhdError::IoError("disk full".to_string()));
            }
            self.inner.put(record)
        }

        fn get(&self, uri: &RecordUri) -> Result<Option<Record>, NbhdError> {
            self.inner.get(uri)
        }

        fn list(&self, owner: &str, collection: &str) -> Result<Vec<Record>, NbhdError> {
            self.inner.list(owner, collection)
        }

        fn delete(&mut self, uri: &RecordUri) -> Result<bool, NbhdError> {
            self.inner.delete(uri)
        }

        fn len(&self) -> Result<usize, NbhdError> {
            self.inner.len()
        }
    }

    #[test]
    fn create_assigns_identifiers() {
        let mut repo = repo();
        let record = repo
            .create_record(OWNER, BLOG_POST_COLLECTION, json!({"title": "Hello"}))
            .expect("create");

        assert!(validate_rkey(record.rkey()));
        assert!(validate_cid(record.cid.as_str()));
        assert_eq!(record.value[TYPE_FIELD], BLOG_POST_COLLECTION);
        assert!(record.created_at.ends_with('Z'));
        assert_eq!(repo.get_record(&record.uri).expect("get"), record);
    }

    #[test]
    fn create_rejects_mismatched_type() {
        let mut repo = repo();
        let err = repo.create_record(
            OWNER,
            BLOG_POST_COLLECTION,
            json!({"$type": "app.bsky.feed.post"}),
        );
        assert!(matches!(err, Err(NbhdError::InvalidRecord(_))));
    }

    #[test]
    fn create_rejects_non_object_and_bad_addressing() {
        let mut repo = repo();
        assert!(repo.create_record(OWNER, "app.x", json!([1, 2])).is_err());
        assert!(repo.create_record("", "app.x", json!({})).is_err());
        assert!(repo.create_record("did:a/b", "app.x", json!({})).is_err());
        assert!(repo.create_record(OWNER, "nodots", json!({})).is_err());
        assert!(repo.create_record(OWNER, "app..x", json!({})).is_err());
        assert!(repo.create_record(OWNER, "app.x_y", json!({})).is_err());
        assert_eq!(repo.store().len().expect("len"), 0);
    }

    #[test]
    fn conflicting_rkeys_are_retried_then_reported() {
        fn fixed() -> String {
            "3kbcdefghij2a".to_string()
        }
        let mut repo = repo().with_rkey_source(fixed);

        repo.create_record(OWNER, "app.x", json!({"n": 1}))
            .expect("first create");
        let err = repo.create_record(OWNER, "app.x", json!({"n": 2}));
        assert!(matches!(err, Err(NbhdError::RecordConflict(_))));
        assert_eq!(repo.store().len().expect("len"), 1);
    }

    #[test]
    fn update_keeps_rkey_and_created_at() {
        let mut repo = repo();
        let original = repo
            .create_record(OWNER, "app.x", json!({"title": "v1"}))
            .expect("create");

        let updated = repo
            .update_record(&original.uri, json!({"title": "v2"}))
            .expect("update");

        assert_eq!(updated.uri, original.uri);
        assert_eq!(updated.created_at, original.created_at);
        assert_ne!(updated.cid, original.cid);
        assert_eq!(
            repo.get_record(&original.uri).expect("get").value["title"],
            "v2"
        );
    }

    #[test]
    fn update_missing_record_fails() {
        let mut repo = repo();
        let uri = RecordUri::new(OWNER, "app.x", "3kbcdefghij2a");
        assert!(matches!(
            repo.update_record(&uri, json!({})),
            Err(NbhdError::RecordNotFound(_))
        ));
    }

    #[test]
    fn list_is_chronological() {
        let mut repo = repo();
        let created: Vec<Record> = (0..20)
            .map(|i| {
                repo.create_record(OWNER, "app.x", json!({"i": i}))
                    .expect("create")
            })
            .collect();

        let listed = repo.list_records(OWNER, "app.x").expect("list");
        assert_eq!(listed, created);
    }

    #[test]
    fn delete_then_get_is_not_found() {
        let mut repo = repo();
        let record = repo
            .create_record(OWNER, "app.x", json!({}))
            .expect("create");

        assert!(repo.delete_record(&record.uri).expect("delete"));
        assert!(matches!(
            repo.get_record(&record.uri),
            Err(NbhdError::RecordNotFound(_))
        ));
    }

    #[test]
    fn publish_links_both_records() {
        let mut repo = repo();
        let post = BlogPost {
            title: "Hello".to_string(),
            content: "# Hello\n\nFirst paragraph.".to_string(),
            frontmatter: Default::default(),
            site_id: Some("site-1".to_string()),
        };

        let published = repo
            .publish_blog_post(OWNER, &post, "https://example.com/hello/", true)
            .expect("publish");
        let feed = published.feed.expect("feed post");

        assert_eq!(published.blog.linked_record.as_ref(), Some(&feed.uri));
        assert_eq!(feed.linked_record.as_ref(), Some(&published.blog.uri));
        assert_eq!(published.blog.value["site_id"], "site-1");
        assert_eq!(feed.value[TYPE_FIELD], FEED_POST_COLLECTION);

        // the stored blog record carries the link too
        let stored = repo.get_record(&published.blog.uri).expect("get");
        assert_eq!(stored.linked_record, Some(feed.uri));
    }

    #[test]
    fn publish_without_cross_post() {
        let mut repo = repo();
        let post = BlogPost {
            title: "Quiet".to_string(),
            content: String::new(),
            frontmatter: Default::default(),
            site_id: None,
        };

        let published = repo
            .publish_blog_post(OWNER, &post, "https://example.com/q/", false)
            .expect("publish");
        assert!(published.feed.is_none());
        assert!(published.blog.linked_record.is_none());
        assert!(published.blog.value.get("site_id").is_none());
        assert_eq!(repo.store().len().expect("len"), 1);
    }

    #[test]
    fn failed_cross_post_leaves_no_records() {
        let post = BlogPost {
            title: "Doomed".to_string(),
            content: "Body text.".to_string(),
            frontmatter: Default::default(),
            site_id: None,
        };

        let mut feed_fails = Repository::new(FlakyStore {
            fail_insert_into: Some(FEED_POST_COLLECTION),
            ..FlakyStore::default()
        });
        let err = feed_fails.publish_blog_post(OWNER, &post, "https://example.com/d/", true);
        assert!(matches!(err, Err(NbhdError::IoError(_))));
        assert_eq!(feed_fails.store().len().expect("len"), 0);

        let mut link_fails = Repository::new(FlakyStore {
            fail_put: true,
            ..FlakyStore::default()
        });
        let err = link_fails.publish_blog_post(OWNER, &post, "https://example.com/d/", true);
        assert!(matches!(err, Err(NbhdError::IoError(_))));
        assert_eq!(link_fails.store().len().expect("len"), 0);
    }

    #[test]
    fn storage_backend_dispatches() {
        let mut repo = Repository::default();
        assert!(!repo.store().is_persistent());
        repo.create_record(OWNER, "app.x", json!({}))
            .expect("create");
        assert_eq!(
            repo.store().memory().map(|m| m.records().count()),
            Some(1)
        );
    }
}
