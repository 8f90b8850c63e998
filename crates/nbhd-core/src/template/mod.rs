//! # Template Analysis
//!
//! Inspects an 11ty project and infers one frontmatter schema per content
//! type.
//!
//! Pipeline: validate project -> locate content directory -> scan `.md`
//! files -> group by first directory below the content root -> infer.
//! Files directly in the content root are grouped as `pages`.

mod frontmatter;

pub use frontmatter::parse_frontmatter;

use crate::primitives::MAX_TEMPLATE_FILES;
use crate::schema::{InferredSchema, infer_schema};
use crate::{FrontmatterSample, NbhdError};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Config files that mark an 11ty project.
pub const ELEVENTY_CONFIG_FILES: [&str; 2] = ["eleventy.config.js", ".eleventy.js"];

/// Package that must appear in `package.json`.
pub const ELEVENTY_PACKAGE: &str = "@11ty/eleventy";

/// Content directories, probed in order.
pub const CONTENT_DIR_CANDIDATES: [&str; 4] = ["content", "posts", "src", "src/posts"];

/// Group name for files directly in the content root.
pub const ROOT_CONTENT_TYPE: &str = "pages";

// =============================================================================
// TYPES
// =============================================================================

/// A markdown file that could not be read or parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Frontmatter samples grouped by content type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanResult {
    pub content_types: BTreeMap<String, Vec<FrontmatterSample>>,
    pub skipped: Vec<SkippedFile>,
}

impl ScanResult {
    /// Total number of parsed files.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.content_types.values().map(Vec::len).sum()
    }
}

/// Schema of one content type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentTypeAnalysis {
    pub directory: PathBuf,
    pub schema: InferredSchema,
    pub count: usize,
}

/// Full analysis of a template project.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateAnalysis {
    pub content_types: BTreeMap<String, ContentTypeAnalysis>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedFile>,
    pub analyzed_at: String,
}

// =============================================================================
// OPERATIONS
// =============================================================================

/// Check that `path` is an 11ty project.
///
/// # Errors
///
/// `InvalidTemplate` naming the first missing piece.
pub fn validate_eleventy_project(path: &Path) -> Result<(), NbhdError> {
    if !path.exists() {
        return Err(NbhdError::InvalidTemplate(format!(
            "Path does not exist: {}",
            path.display()
        )));
    }
    if !path.is_dir() {
        return Err(NbhdError::InvalidTemplate(format!(
            "Path is not a directory: {}",
            path.display()
        )));
    }

    if !ELEVENTY_CONFIG_FILES.iter().any(|f| path.join(f).exists()) {
        return Err(NbhdError::InvalidTemplate(
            "Missing eleventy.config.js or .eleventy.js".to_string(),
        ));
    }

    let package_path = path.join("package.json");
    if !package_path.exists() {
        return Err(NbhdError::InvalidTemplate("Missing package.json".to_string()));
    }

    let text = fs::read_to_string(&package_path)
        .map_err(|e| NbhdError::IoError(format!("Error reading package.json: {e}")))?;
    let package: Value = serde_json::from_str(&text)
        .map_err(|e| NbhdError::InvalidTemplate(format!("Invalid package.json: {e}")))?;

    let declared = ["dependencies", "devDependencies"].iter().any(|section| {
        package
            .get(section)
            .and_then(Value::as_object)
            .is_some_and(|deps| deps.contains_key(ELEVENTY_PACKAGE))
    });
    if !declared {
        return Err(NbhdError::InvalidTemplate(format!(
            "{ELEVENTY_PACKAGE} not found in dependencies"
        )));
    }

    Ok(())
}

/// First existing candidate content directory, even if empty.
#[must_use]
pub fn find_content_directory(path: &Path) -> Option<PathBuf> {
    CONTENT_DIR_CANDIDATES
        .iter()
        .map(|c| path.join(c))
        .find(|p| p.is_dir())
}

/// Read the frontmatter of every `.md` file under `content_dir`.
///
/// Each sample gets `_filepath` and `_content_length` (body length in
/// characters) added; schema inference ignores them. Files that fail to
/// read or parse are listed in `skipped` rather than aborting the scan.
///
/// # Errors
///
/// `IoError` if the directory cannot be walked, `InvalidTemplate` if it
/// holds more than `MAX_TEMPLATE_FILES` markdown files.
pub fn scan_frontmatter(content_dir: &Path) -> Result<ScanResult, NbhdError> {
    let mut result = ScanResult::default();
    let mut seen = 0usize;

    for entry in WalkDir::new(content_dir).sort_by_file_name() {
        let entry = entry.map_err(|e| NbhdError::IoError(e.to_string()))?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().is_none_or(|ext| ext != "md") {
            continue;
        }

        seen += 1;
        if seen > MAX_TEMPLATE_FILES {
            return Err(NbhdError::InvalidTemplate(format!(
                "more than {MAX_TEMPLATE_FILES} markdown files under {}",
                content_dir.display()
            )));
        }

        let sample = match read_sample(path) {
            Ok(sample) => sample,
            Err(e) => {
                result.skipped.push(SkippedFile {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        result
            .content_types
            .entry(content_type_of(content_dir, path))
            .or_default()
            .push(sample);
    }

    Ok(result)
}

/// Validate, scan, and infer a schema per content type.
pub fn analyze_template(path: &Path) -> Result<TemplateAnalysis, NbhdError> {
    validate_eleventy_project(path)?;

    let content_dir = find_content_directory(path)
        .ok_or_else(|| NbhdError::InvalidTemplate("No content directory found".to_string()))?;

    let scan = scan_frontmatter(&content_dir)?;
    if scan.content_types.is_empty() {
        return Err(NbhdError::InvalidTemplate(
            "No markdown files found".to_string(),
        ));
    }

    let content_types = scan
        .content_types
        .into_iter()
        .map(|(name, samples)| {
            let analysis = ContentTypeAnalysis {
                directory: content_dir.clone(),
                schema: infer_schema(&samples),
                count: samples.len(),
            };
            (name, analysis)
        })
        .collect();

    Ok(TemplateAnalysis {
        content_types,
        skipped: scan.skipped,
        analyzed_at: crate::repository::timestamp_now(),
    })
}

fn read_sample(path: &Path) -> Result<FrontmatterSample, NbhdError> {
    let text = fs::read_to_string(path).map_err(|e| NbhdError::IoError(e.to_string()))?;
    let (mut sample, body) = parse_frontmatter(&text)?;

    sample.insert(
        "_filepath".to_string(),
        Value::String(path.display().to_string()),
    );
    sample.insert(
        "_content_length".to_string(),
        Value::from(body.chars().count()),
    );
    Ok(sample)
}

fn content_type_of(content_dir: &Path, file: &Path) -> String {
    file.parent()
        .and_then(|dir| dir.strip_prefix(content_dir).ok())
        .and_then(|rel| rel.components().next())
        .map_or_else(
            || ROOT_CONTENT_TYPE.to_string(),
            |first| first.as_os_str().to_string_lossy().into_owned(),
        )
}

// =============================================================================
// TESTS
// =============================================================================
