//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.
//!
//! Each `cmd_*` function prints its result (text or JSON per `--json-mode`)
//! and also returns it, so commands can be driven from tests.

use crate::config::{Backend, Settings};
use nbhd_core::{
    BlogPost, Cid, FrontmatterSample, InferredSchema, MemoryStore, NbhdError, PublishedPost,
    Record, RecordStore, RecordUri, Repository, StorageBackend, TemplateAnalysis, Tid,
    analyze_template, generate_cid, infer_schema, records_from_bytes, records_to_bytes,
    validate_cid,
};
use serde::Serialize;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum size for JSON input files (100 MB).
///
/// This prevents memory exhaustion from malicious or accidental large files.
const MAX_INPUT_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Maximum size for a snapshot database file (500 MB).
const MAX_SNAPSHOT_FILE_SIZE: u64 = 500 * 1024 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), NbhdError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| NbhdError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(NbhdError::IoError(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Canonicalize an input path and make sure it is a regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, NbhdError> {
    let canonical = path.canonicalize().map_err(|e| {
        NbhdError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(NbhdError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Read and parse a bounded JSON input file.
fn read_json_file(path: &Path) -> Result<Value, NbhdError> {
    let path = validate_file_path(path)?;
    validate_file_size(&path, MAX_INPUT_FILE_SIZE)?;

    let text = std::fs::read_to_string(&path)
        .map_err(|e| NbhdError::IoError(format!("Read '{}': {}", path.display(), e)))?;
    serde_json::from_str(&text).map_err(|e| {
        NbhdError::DeserializationError(format!("Invalid JSON in '{}': {}", path.display(), e))
    })
}

fn print_json(value: &impl Serialize) -> Result<(), NbhdError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| NbhdError::SerializationError(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show database status. Returns the record count.
pub fn cmd_status(settings: &Settings) -> Result<usize, NbhdError> {
    let repo = open_existing_repository(settings)?;
    let count = repo.store().len()?;

    if settings.json_mode {
        print_json(&json!({
            "database": settings.database.to_string_lossy(),
            "backend": settings.backend.to_string(),
            "record_count": count,
        }))?;
        return Ok(count);
    }

    println!("nbhd Database Status");
    println!("====================");
    println!("Database: {:?}", settings.database);
    println!("Backend:  {}", settings.backend);
    println!();
    println!("Records:  {}", count);

    Ok(count)
}

// =============================================================================
// IDENTITY COMMANDS
// =============================================================================

/// Compute the CID of a JSON record value.
pub fn cmd_cid(settings: &Settings, file: &Path) -> Result<Cid, NbhdError> {
    let value = read_json_file(file)?;
    let cid = generate_cid(&value)?;

    if settings.json_mode {
        print_json(&json!({ "cid": cid }))?;
    } else {
        println!("{}", cid);
    }
    Ok(cid)
}

/// Structural CID check. An invalid CID is reported, not an error.
pub fn cmd_verify_cid(settings: &Settings, cid: &str) -> Result<bool, NbhdError> {
    let valid = validate_cid(cid);

    if settings.json_mode {
        print_json(&json!({ "cid": cid, "valid": valid }))?;
    } else if valid {
        println!("valid");
    } else {
        println!("invalid");
    }
    Ok(valid)
}

/// Generate `count` record keys.
pub fn cmd_rkey(settings: &Settings, count: usize) -> Result<Vec<String>, NbhdError> {
    let rkeys: Vec<String> = (0..count).map(|_| Tid::now().to_string()).collect();

    if settings.json_mode {
        print_json(&json!({ "rkeys": rkeys }))?;
    } else {
        for rkey in &rkeys {
            println!("{}", rkey);
        }
    }
    Ok(rkeys)
}

/// Decoded record key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedRkey {
    pub rkey: String,
    pub timestamp_us: u64,
    pub random_bits: u16,
    /// RFC 3339 rendering of the timestamp, when representable.
    pub time: Option<String>,
}

/// Decode a record key.
pub fn cmd_decode_rkey(settings: &Settings, rkey: &str) -> Result<DecodedRkey, NbhdError> {
    let tid: Tid = rkey.parse()?;
    let time = i64::try_from(tid.timestamp_us())
        .ok()
        .and_then(chrono::DateTime::from_timestamp_micros)
        .map(|t| t.to_rfc3339_opts(chrono::SecondsFormat::Micros, true));

    let decoded = DecodedRkey {
        rkey: rkey.to_string(),
        timestamp_us: tid.timestamp_us(),
        random_bits: tid.random_bits(),
        time,
    };

    if settings.json_mode {
        print_json(&decoded)?;
    } else {
        println!("Timestamp:   {} us", decoded.timestamp_us);
        println!("Random bits: {}", decoded.random_bits);
        if let Some(time) = &decoded.time {
            println!("Time:        {}", time);
        }
    }
    Ok(decoded)
}

// =============================================================================
// SCHEMA COMMANDS
// =============================================================================

/// Infer a schema from a JSON array of frontmatter objects.
pub fn cmd_infer(settings: &Settings, file: &Path) -> Result<InferredSchema, NbhdError> {
    let value = read_json_file(file)?;
    let samples: Vec<FrontmatterSample> = serde_json::from_value(value).map_err(|e| {
        NbhdError::DeserializationError(format!("Expected an array of objects: {}", e))
    })?;

    let schema = infer_schema(&samples);
    tracing::debug!(samples = samples.len(), fields = schema.properties.len(), "inferred schema");

    if settings.json_mode {
        print_json(&schema)?;
    } else {
        print_schema(&schema);
    }
    Ok(schema)
}

/// Analyze an 11ty template project.
pub fn cmd_analyze(settings: &Settings, path: &Path) -> Result<TemplateAnalysis, NbhdError> {
    let analysis = analyze_template(path)?;

    for skipped in &analysis.skipped {
        tracing::warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped file");
    }

    if settings.json_mode {
        print_json(&analysis)?;
        return Ok(analysis);
    }

    println!("Template Analysis");
    println!("=================");
    for (name, content_type) in &analysis.content_types {
        println!();
        println!("{} ({} files)", name, content_type.count);
        print_schema(&content_type.schema);
    }
    if !analysis.skipped.is_empty() {
        println!();
        println!("Skipped {} file(s)", analysis.skipped.len());
    }

    Ok(analysis)
}

/// One line per field; `*` marks required fields.
fn print_schema(schema: &InferredSchema) {
    for (field, field_schema) in schema.properties.iter() {
        let marker = if schema.is_required(field) { "*" } else { " " };
        match &field_schema.format {
            Some(format) => println!(
                "  {} {:<24} {} ({})",
                marker, field, field_schema.kind, format
            ),
            None => println!("  {} {:<24} {}", marker, field, field_schema.kind),
        }
    }
}

// =============================================================================
// RECORD COMMANDS
// =============================================================================

fn print_record(settings: &Settings, record: &Record) -> Result<(), NbhdError> {
    if settings.json_mode {
        return print_json(record);
    }
    println!("URI:     {}", record.uri);
    println!("CID:     {}", record.cid);
    println!("Created: {}", record.created_at);
    if let Some(linked) = &record.linked_record {
        println!("Linked:  {}", linked);
    }
    Ok(())
}

/// Create a record from a JSON file.
pub fn cmd_create(
    settings: &Settings,
    owner: &str,
    collection: &str,
    file: &Path,
) -> Result<Record, NbhdError> {
    let value = read_json_file(file)?;

    let mut repo = open_repository(settings)?;
    let record = repo.create_record(owner, collection, value)?;
    save_repository(&repo, &settings.database)?;

    tracing::info!(uri = %record.uri, cid = %record.cid, "record created");
    print_record(settings, &record)?;
    Ok(record)
}

/// Fetch a record.
pub fn cmd_get(settings: &Settings, uri: &str) -> Result<Record, NbhdError> {
    let uri: RecordUri = uri.parse()?;
    let repo = open_existing_repository(settings)?;
    let record = repo.get_record(&uri)?;

    if settings.json_mode {
        print_json(&record)?;
    } else {
        print_record(settings, &record)?;
        print_json(&record.value)?;
    }
    Ok(record)
}

/// List a collection.
pub fn cmd_list(
    settings: &Settings,
    owner: &str,
    collection: &str,
) -> Result<Vec<Record>, NbhdError> {
    let repo = open_existing_repository(settings)?;
    let records = repo.list_records(owner, collection)?;

    if settings.json_mode {
        print_json(&records)?;
    } else {
        for record in &records {
            println!("{}  {}", record.uri, record.cid);
        }
        println!("{} record(s)", records.len());
    }
    Ok(records)
}

/// Delete a record.
pub fn cmd_delete(settings: &Settings, uri: &str) -> Result<bool, NbhdError> {
    let uri: RecordUri = uri.parse()?;
    let mut repo = open_existing_repository(settings)?;
    let existed = repo.delete_record(&uri)?;
    save_repository(&repo, &settings.database)?;

    if existed {
        tracing::info!(uri = %uri, "record deleted");
    }
    if settings.json_mode {
        print_json(&json!({ "uri": uri, "deleted": existed }))?;
    } else if existed {
        println!("Deleted {}", uri);
    } else {
        println!("No record at {}", uri);
    }
    Ok(existed)
}

/// Publish a blog post, optionally with a linked feed post.
pub fn cmd_publish(
    settings: &Settings,
    owner: &str,
    file: &Path,
    url: Option<&str>,
    cross_post: bool,
) -> Result<PublishedPost, NbhdError> {
    let post: BlogPost = serde_json::from_value(read_json_file(file)?)
        .map_err(|e| NbhdError::DeserializationError(format!("Invalid blog post: {}", e)))?;

    let url = match url {
        Some(url) => url.to_string(),
        None => default_post_url(settings, &post)?,
    };

    let mut repo = open_repository(settings)?;
    let published = repo.publish_blog_post(owner, &post, &url, cross_post)?;
    save_repository(&repo, &settings.database)?;

    tracing::info!(
        blog = %published.blog.uri,
        feed = ?published.feed.as_ref().map(|r| r.uri.to_string()),
        "blog post published"
    );

    if settings.json_mode {
        print_json(&json!({
            "blog_post": published.blog,
            "feed_post": published.feed,
        }))?;
    } else {
        print_record(settings, &published.blog)?;
        if let Some(feed) = &published.feed {
            println!();
            print_record(settings, feed)?;
        }
    }
    Ok(published)
}

/// `{site_base_url}/posts/{slug}/`, slug from frontmatter or title.
fn default_post_url(settings: &Settings, post: &BlogPost) -> Result<String, NbhdError> {
    let base = settings.site_base_url.as_deref().ok_or_else(|| {
        NbhdError::InvalidRecord(
            "No post URL: pass --url or set site_base_url in the config".to_string(),
        )
    })?;

    let slug = post
        .frontmatter
        .get("slug")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| slugify(&post.title));

    Ok(format!("{}/posts/{}/", base.trim_end_matches('/'), slug))
}

/// Lowercase ASCII alphanumerics, everything else collapsed to single `-`.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize a new database.
pub fn cmd_init(settings: &Settings, force: bool) -> Result<(), NbhdError> {
    let db_path = &settings.database;
    if db_path.exists() && !force {
        return Err(NbhdError::IoError(
            "Database already exists. Use --force to overwrite.".to_string(),
        ));
    }

    match settings.backend {
        Backend::Redb => {
            if db_path.exists() {
                std::fs::remove_file(db_path)
                    .map_err(|e| NbhdError::IoError(format!("Remove db: {}", e)))?;
            }
            let _store = StorageBackend::redb(db_path)?;
            println!("Initialized new redb database at {:?}", db_path);
        }
        Backend::File => {
            let repo = Repository::new(StorageBackend::InMemory(MemoryStore::new()));
            save_repository(&repo, db_path)?;
            println!("Initialized new file database at {:?}", db_path);
        }
    }

    Ok(())
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Open the repository for the configured backend.
///
/// The file backend starts empty when the snapshot does not exist yet.
pub fn open_repository(settings: &Settings) -> Result<Repository, NbhdError> {
    let db_path = &settings.database;
    let backend = match settings.backend {
        Backend::Redb => StorageBackend::redb(db_path)?,
        Backend::File => {
            if db_path.exists() {
                validate_file_size(db_path, MAX_SNAPSHOT_FILE_SIZE)?;
                let data = std::fs::read(db_path)
                    .map_err(|e| NbhdError::IoError(format!("Read db: {}", e)))?;
                let records = records_from_bytes(&data)?;
                tracing::debug!(records = records.len(), "loaded snapshot");
                StorageBackend::InMemory(MemoryStore::from_records(records))
            } else {
                StorageBackend::default()
            }
        }
    };
    Ok(Repository::new(backend))
}

/// Open the repository for a command that must not create one.
fn open_existing_repository(settings: &Settings) -> Result<Repository, NbhdError> {
    if !settings.database.exists() {
        return Err(NbhdError::IoError(format!(
            "No database at {:?}. Run `nbhd init` first.",
            settings.database
        )));
    }
    open_repository(settings)
}

/// Persist an in-memory repository to its snapshot file.
///
/// redb writes in place, so there is nothing to do for that backend.
pub fn save_repository(repo: &Repository, db_path: &Path) -> Result<(), NbhdError> {
    let Some(memory) = repo.store().memory() else {
        return Ok(());
    };

    let data = records_to_bytes(memory.records())?;
    std::fs::write(db_path, &data).map_err(|e| NbhdError::IoError(format!("Write db: {}", e)))?;
    Ok(())
}
