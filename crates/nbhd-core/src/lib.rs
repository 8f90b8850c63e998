//! # nbhd-core
//!
//! Record identity and template schema engine for nbhd - THE LOGIC.
//!
//! This crate implements the pieces of an AT-Protocol personal data
//! repository that must be bit-exact and dependency-light:
//! - CID generation over canonical DAG-CBOR (`cid`, `formats::dag_cbor`)
//! - TID record keys (`tid`)
//! - Frontmatter schema inference (`schema`, `template`)
//! - Record storage behind the `RecordStore` trait (`store`, `storage`,
//!   `repository`)
//!
//! ## Architectural Constraints
//!
//! - NO async, NO network dependencies (pure Rust)
//! - CIDs and inferred schemas are pure functions of their input
//! - Stores are injected, never global; the only process-wide state is the
//!   TID clock that keeps generated keys strictly increasing

// =============================================================================
// MODULES
// =============================================================================

pub mod cid;
pub mod crosspost;
pub mod formats;
pub mod primitives;
pub mod repository;
pub mod schema;
pub mod storage;
pub mod store;
pub mod template;
pub mod tid;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{Cid, FrontmatterSample, NbhdError, Record, RecordUri, StructuredData};

// =============================================================================
// RE-EXPORTS: Identity
// =============================================================================

pub use cid::{cid_digest, extract_cid_hash, generate_cid, validate_cid};
pub use tid::{Tid, extract_tid_components, extract_tid_timestamp, generate_rkey, validate_rkey};

// =============================================================================
// RE-EXPORTS: Schema & Templates
// =============================================================================

pub use schema::{
    FieldSchema, InferredSchema, ItemSchema, JsonType, Properties, field_title, infer_field_type,
    infer_schema, is_iso_date,
};
pub use template::{
    ContentTypeAnalysis, ScanResult, SkippedFile, TemplateAnalysis, analyze_template,
    find_content_directory, parse_frontmatter, scan_frontmatter, validate_eleventy_project,
};

// =============================================================================
// RE-EXPORTS: Records
// =============================================================================

pub use crosspost::{BlogPost, FeedPost, generate_feed_summary};
pub use repository::{PublishedPost, Repository, StorageBackend};
pub use storage::RedbStore;
pub use store::{MemoryStore, RecordStore};

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{PersistenceHeader, StoredRecord, records_from_bytes, records_to_bytes};
