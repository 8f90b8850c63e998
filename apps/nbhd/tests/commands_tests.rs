//! Tests for the CLI command functions against both storage backends.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use nbhd::cli::{
    cmd_analyze, cmd_cid, cmd_create, cmd_decode_rkey, cmd_delete, cmd_get, cmd_infer, cmd_init,
    cmd_list, cmd_publish, cmd_rkey, cmd_status, cmd_verify_cid, open_repository, slugify,
};
use nbhd::config::{Backend, NbhdConfig, Settings};
use nbhd_core::{NbhdError, generate_cid, validate_rkey};
use serde_json::json;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const OWNER: &str = "did:plc:abc123";
const COLLECTION: &str = "app.nbhd.note";

fn settings(dir: &TempDir, backend: Backend) -> Settings {
    let config = NbhdConfig {
        site_base_url: Some("https://alice.nbhd.example/".to_string()),
        ..NbhdConfig::default()
    };
    Settings::resolve(
        config,
        Some(dir.path().join("nbhd.db")),
        Some(backend),
        true,
    )
}

fn write_json(dir: &Path, name: &str, value: &serde_json::Value) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, serde_json::to_string(value).unwrap()).unwrap();
    path
}

// =============================================================================
// IDENTITY COMMAND TESTS
// =============================================================================

#[test]
fn test_cid_matches_library() {
    let dir = tempfile::tempdir().unwrap();
    let value = json!({"text": "hello", "tags": ["a", "b"]});
    let file = write_json(dir.path(), "record.json", &value);

    let cid = cmd_cid(&settings(&dir, Backend::File), &file).unwrap();
    assert_eq!(cid, generate_cid(&value).unwrap());
    assert!(cmd_verify_cid(&settings(&dir, Backend::File), cid.as_str()).unwrap());
}

#[test]
fn test_cid_rejects_missing_and_invalid_files() {
    let dir = tempfile::tempdir().unwrap();
    let s = settings(&dir, Backend::File);

    assert!(cmd_cid(&s, &dir.path().join("absent.json")).is_err());

    let bad = dir.path().join("bad.json");
    std::fs::write(&bad, "{not json").unwrap();
    assert!(matches!(
        cmd_cid(&s, &bad),
        Err(NbhdError::DeserializationError(_))
    ));

    // A directory is not a regular file
    assert!(cmd_cid(&s, dir.path()).is_err());
}

#[test]
fn test_verify_cid_reports_invalid() {
    let dir = tempfile::tempdir().unwrap();
    assert!(!cmd_verify_cid(&settings(&dir, Backend::File), "Qm-not-a-cid").unwrap());
}

#[test]
fn test_rkey_generates_increasing_keys() {
    let dir = tempfile::tempdir().unwrap();
    let s = settings(&dir, Backend::File);

    let rkeys = cmd_rkey(&s, 5).unwrap();
    assert_eq!(rkeys.len(), 5);
    assert!(rkeys.iter().all(|k| validate_rkey(k)));

    let decoded: Vec<u64> = rkeys
        .iter()
        .map(|k| cmd_decode_rkey(&s, k).unwrap().timestamp_us)
        .collect();
    assert!(decoded.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_decode_rkey() {
    let dir = tempfile::tempdir().unwrap();
    let s = settings(&dir, Backend::File);

    let decoded = cmd_decode_rkey(&s, "aaaaaaaaaaaaa").unwrap();
    assert_eq!(decoded.timestamp_us, 0);
    assert_eq!(decoded.random_bits, 0);
    assert_eq!(decoded.time.as_deref(), Some("1970-01-01T00:00:00.000000Z"));

    assert!(cmd_decode_rkey(&s, "not-a-tid").is_err());
}

// =============================================================================
// SCHEMA COMMAND TESTS
// =============================================================================

#[test]
fn test_infer_from_samples_file() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_json(
        dir.path(),
        "samples.json",
        &json!([
            {"title": "A", "date": "2024-01-15", "tags": ["x"]},
            {"title": "B", "date": "2024-02-01"},
        ]),
    );

    let schema = cmd_infer(&settings(&dir, Backend::File), &file).unwrap();
    assert!(schema.is_required("title"));
    assert!(!schema.is_required("tags"));
    assert_eq!(
        schema.properties.get("date").unwrap().format.as_deref(),
        Some("date-time")
    );
}

#[test]
fn test_infer_rejects_non_array() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_json(dir.path(), "samples.json", &json!({"title": "A"}));
    assert!(cmd_infer(&settings(&dir, Backend::File), &file).is_err());
}

#[test]
fn test_analyze_project() {
    let dir = tempfile::tempdir().unwrap();
    let project = dir.path().join("site");
    std::fs::create_dir_all(project.join("content/blog")).unwrap();
    std::fs::write(project.join("eleventy.config.js"), "export default {};\n").unwrap();
    std::fs::write(
        project.join("package.json"),
        r#"{"devDependencies": {"@11ty/eleventy": "^3.0.0"}}"#,
    )
    .unwrap();
    std::fs::write(
        project.join("content/blog/first.md"),
        "---\ntitle: First\ndate: 2024-01-15\n---\nBody\n",
    )
    .unwrap();
    std::fs::write(
        project.join("content/blog/second.md"),
        "---\ntitle: Second\n---\nMore\n",
    )
    .unwrap();

    let analysis = cmd_analyze(&settings(&dir, Backend::File), &project).unwrap();
    let blog = analysis.content_types.get("blog").unwrap();
    assert_eq!(blog.count, 2);
    assert!(blog.schema.is_required("title"));
    assert!(!blog.schema.is_required("date"));
}

#[test]
fn test_analyze_rejects_non_eleventy_dir() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        cmd_analyze(&settings(&dir, Backend::File), dir.path()),
        Err(NbhdError::InvalidTemplate(_))
    ));
}

// =============================================================================
// RECORD COMMAND TESTS
// =============================================================================

fn crud_roundtrip(backend: Backend) {
    let dir = tempfile::tempdir().unwrap();
    let s = settings(&dir, backend);
    let file = write_json(dir.path(), "note.json", &json!({"text": "first"}));

    let created = cmd_create(&s, OWNER, COLLECTION, &file).unwrap();
    assert_eq!(created.uri.owner, OWNER);
    assert_eq!(created.value["$type"], COLLECTION);

    // Reopens the database from disk each time
    let fetched = cmd_get(&s, &created.uri.to_string()).unwrap();
    assert_eq!(fetched, created);

    let second = cmd_create(&s, OWNER, COLLECTION, &file).unwrap();
    let listed = cmd_list(&s, OWNER, COLLECTION).unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].uri, created.uri);
    assert_eq!(listed[1].uri, second.uri);
    assert_eq!(cmd_status(&s).unwrap(), 2);

    assert!(cmd_delete(&s, &created.uri.to_string()).unwrap());
    assert!(!cmd_delete(&s, &created.uri.to_string()).unwrap());
    assert!(matches!(
        cmd_get(&s, &created.uri.to_string()),
        Err(NbhdError::RecordNotFound(_))
    ));
    assert_eq!(cmd_list(&s, OWNER, COLLECTION).unwrap().len(), 1);
}

#[test]
fn test_crud_file_backend() {
    crud_roundtrip(Backend::File);
}

#[test]
fn test_crud_redb_backend() {
    crud_roundtrip(Backend::Redb);
}

#[test]
fn test_create_rejects_bad_addressing() {
    let dir = tempfile::tempdir().unwrap();
    let s = settings(&dir, Backend::File);
    let file = write_json(dir.path(), "note.json", &json!({"text": "x"}));

    assert!(cmd_create(&s, "did:plc:a/b", COLLECTION, &file).is_err());
    assert!(cmd_create(&s, OWNER, "notes", &file).is_err());
    assert!(!s.database.exists());
}

#[test]
fn test_read_commands_do_not_create_database() {
    for backend in [Backend::File, Backend::Redb] {
        let dir = tempfile::tempdir().unwrap();
        let s = settings(&dir, backend);
        let uri = format!("at://{}/{}/3kbcdefghij2a", OWNER, COLLECTION);

        assert!(matches!(cmd_status(&s), Err(NbhdError::IoError(_))));
        assert!(matches!(cmd_list(&s, OWNER, COLLECTION), Err(NbhdError::IoError(_))));
        assert!(matches!(cmd_get(&s, &uri), Err(NbhdError::IoError(_))));
        assert!(matches!(cmd_delete(&s, &uri), Err(NbhdError::IoError(_))));
        assert!(!s.database.exists());

        cmd_init(&s, false).unwrap();
        assert_eq!(cmd_status(&s).unwrap(), 0);
        assert!(cmd_list(&s, OWNER, COLLECTION).unwrap().is_empty());
    }
}

#[test]
fn test_get_rejects_malformed_uri() {
    let dir = tempfile::tempdir().unwrap();
    assert!(cmd_get(&settings(&dir, Backend::File), "https://example.com").is_err());
}

// =============================================================================
// PUBLISH TESTS
// =============================================================================

#[test]
fn test_publish_with_cross_post() {
    let dir = tempfile::tempdir().unwrap();
    let s = settings(&dir, Backend::Redb);
    let file = write_json(
        dir.path(),
        "post.json",
        &json!({
            "title": "Hello World",
            "content": "# Hello\n\nFirst paragraph of the post.\n\nSecond.",
            "frontmatter": {"tags": ["intro"]},
        }),
    );

    let published =
        cmd_publish(&s, OWNER, &file, Some("https://example.com/hello/"), true).unwrap();
    let feed = published.feed.unwrap();

    assert_eq!(published.blog.linked_record.as_ref(), Some(&feed.uri));
    assert_eq!(feed.linked_record.as_ref(), Some(&published.blog.uri));
    let text = feed.value["text"].as_str().unwrap();
    assert!(text.starts_with("New blog post: Hello World"));
    assert!(text.ends_with("https://example.com/hello/"));

    // The stored blog post carries the link too
    let stored = cmd_get(&s, &published.blog.uri.to_string()).unwrap();
    assert_eq!(stored.linked_record, Some(feed.uri));
}

#[test]
fn test_publish_without_cross_post_derives_url() {
    let dir = tempfile::tempdir().unwrap();
    let s = settings(&dir, Backend::File);
    let file = write_json(dir.path(), "post.json", &json!({"title": "Quiet Post"}));

    let published = cmd_publish(&s, OWNER, &file, None, false).unwrap();
    assert!(published.feed.is_none());
    assert_eq!(cmd_status(&s).unwrap(), 1);
}

#[test]
fn test_publish_without_url_or_base_fails() {
    let dir = tempfile::tempdir().unwrap();
    let s = Settings::resolve(
        NbhdConfig::default(),
        Some(dir.path().join("nbhd.db")),
        Some(Backend::File),
        true,
    );
    let file = write_json(dir.path(), "post.json", &json!({"title": "No Home"}));

    assert!(cmd_publish(&s, OWNER, &file, None, true).is_err());
}

#[test]
fn test_slugify() {
    assert_eq!(slugify("Hello World"), "hello-world");
    assert_eq!(slugify("  Rust & AT Proto!  "), "rust-at-proto");
    assert_eq!(slugify("---"), "");
}

// =============================================================================
// INIT TESTS
// =============================================================================

#[test]
fn test_init_refuses_existing_without_force() {
    for backend in [Backend::File, Backend::Redb] {
        let dir = tempfile::tempdir().unwrap();
        let s = settings(&dir, backend);

        cmd_init(&s, false).unwrap();
        assert!(s.database.exists());
        assert!(cmd_init(&s, false).is_err());
        cmd_init(&s, true).unwrap();

        let repo = open_repository(&s).unwrap();
        assert_eq!(repo.store().is_persistent(), backend == Backend::Redb);
    }
}

#[test]
fn test_init_force_clears_records() {
    let dir = tempfile::tempdir().unwrap();
    let s = settings(&dir, Backend::File);
    let file = write_json(dir.path(), "note.json", &json!({"text": "x"}));

    cmd_create(&s, OWNER, COLLECTION, &file).unwrap();
    assert_eq!(cmd_status(&s).unwrap(), 1);

    cmd_init(&s, true).unwrap();
    assert_eq!(cmd_status(&s).unwrap(), 0);
}
