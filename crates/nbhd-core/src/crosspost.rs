//! # Cross-posting
//!
//! Turns a blog post into an `app.bsky.feed.post` summary:
//!
//! ```text
//! New blog post: {title}
//!
//! {excerpt}
//!
//! 🔗 {url}
//! ```
//!
//! The whole text is capped at 300 characters (Unicode scalar values). The
//! URL is marked with a link facet whose offsets are UTF-8 byte positions,
//! as the feed-post lexicon requires.
//!
//! Excerpt priority: frontmatter `excerpt`, then the first paragraph of the
//! markdown body, then the first 150 characters of the stripped body.

use crate::primitives::{
    FALLBACK_EXCERPT_CHARS, FEED_POST_COLLECTION, LINK_FACET_TYPE, MAX_FEED_POST_CHARS,
};
use crate::{FrontmatterSample, NbhdError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

const ELLIPSIS: &str = "...";

// =============================================================================
// TYPES
// =============================================================================

/// A blog post as submitted for publishing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlogPost {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub frontmatter: FrontmatterSample,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_id: Option<String>,
}

fn default_title() -> String {
    "Untitled".to_string()
}

/// Byte range of a facet within the post text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ByteSlice {
    pub byte_start: usize,
    pub byte_end: usize,
}

/// A rich-text feature attached to a facet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetFeature {
    #[serde(rename = "$type")]
    pub kind: String,
    pub uri: String,
}

/// Rich-text annotation over a byte range of the text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facet {
    pub index: ByteSlice,
    pub features: Vec<FacetFeature>,
}

/// An `app.bsky.feed.post` record value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPost {
    #[serde(rename = "$type")]
    pub kind: String,
    pub text: String,
    pub facets: Vec<Facet>,
    pub created_at: String,
}

// =============================================================================
// SUMMARY
// =============================================================================

/// Build the feed-post summary for a blog post.
///
/// `created_at` is stamped verbatim so the result stays a pure function of
/// its inputs.
pub fn generate_feed_summary(
    post: &BlogPost,
    static_url: &str,
    created_at: &str,
) -> Result<FeedPost, NbhdError> {
    let excerpt = pick_excerpt(post)?;
    let text = fit_text(&post.title, &excerpt, static_url);
    let facets = create_link_facets(&text, static_url);

    Ok(FeedPost {
        kind: FEED_POST_COLLECTION.to_string(),
        text,
        facets,
        created_at: created_at.to_string(),
    })
}

fn pick_excerpt(post: &BlogPost) -> Result<String, NbhdError> {
    if let Some(excerpt) = post
        .frontmatter
        .get("excerpt")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
    {
        return Ok(excerpt.to_string());
    }

    let paragraph = extract_first_paragraph(&post.content)?;
    if !paragraph.is_empty() {
        return Ok(paragraph);
    }

    let stripped = strip_markdown(&post.content)?;
    Ok(stripped.chars().take(FALLBACK_EXCERPT_CHARS).collect())
}

fn compose(title: &str, excerpt: &str, url: &str) -> String {
    format!("New blog post: {title}\n\n{excerpt}\n\n🔗 {url}")
}

fn fit_text(title: &str, excerpt: &str, url: &str) -> String {
    let text = compose(title, excerpt, url);
    if text.chars().count() <= MAX_FEED_POST_CHARS {
        return text;
    }

    let overhead = compose(title, ELLIPSIS, url).chars().count();
    let excerpt = match MAX_FEED_POST_CHARS.checked_sub(overhead) {
        Some(room) if room > 0 => {
            let cut: String = excerpt.chars().take(room).collect();
            // back off to the last word boundary
            let cut = cut.rsplit_once(' ').map_or(cut.as_str(), |(head, _)| head);
            format!("{cut}{ELLIPSIS}")
        }
        _ => String::new(),
    };

    let text = compose(title, &excerpt, url);
    if text.chars().count() <= MAX_FEED_POST_CHARS {
        return text;
    }

    let mut hard: String = text
        .chars()
        .take(MAX_FEED_POST_CHARS - ELLIPSIS.len())
        .collect();
    hard.push_str(ELLIPSIS);
    hard
}

/// Link facets for the first occurrence of `url` in `text`.
///
/// Empty when the URL does not appear (e.g. it was cut by truncation).
#[must_use]
pub fn create_link_facets(text: &str, url: &str) -> Vec<Facet> {
    if url.is_empty() {
        return Vec::new();
    }
    match text.find(url) {
        Some(start) => vec![Facet {
            index: ByteSlice {
                byte_start: start,
                byte_end: start + url.len(),
            },
            features: vec![FacetFeature {
                kind: LINK_FACET_TYPE.to_string(),
                uri: url.to_string(),
            }],
        }],
        None => Vec::new(),
    }
}

// =============================================================================
// MARKDOWN
// =============================================================================

struct MarkdownPatterns {
    link: Regex,
    emphasis: Regex,
    code: Regex,
    html: Regex,
}

static PATTERNS: LazyLock<Result<MarkdownPatterns, regex::Error>> = LazyLock::new(|| {
    Ok(MarkdownPatterns {
        link: Regex::new(r"\[([^\]]+)\]\([^)]+\)")?,
        emphasis: Regex::new(r"\*+([^*]+)\*+")?,
        code: Regex::new(r"`([^`]+)`")?,
        html: Regex::new(r"<[^>]+>")?,
    })
});

fn patterns() -> Result<&'static MarkdownPatterns, NbhdError> {
    PATTERNS
        .as_ref()
        .map_err(|e| NbhdError::Encoding(format!("markdown pattern: {e}")))
}

/// Remove inline markdown: links keep their text, emphasis and code lose
/// their markers, HTML tags are dropped.
pub fn strip_markdown(text: &str) -> Result<String, NbhdError> {
    let p = patterns()?;
    let text = p.link.replace_all(text, "$1");
    let text = p.emphasis.replace_all(&text, "$1");
    let text = p.code.replace_all(&text, "$1");
    let text = p.html.replace_all(&text, "");
    Ok(text.trim().to_string())
}

/// The first body paragraph of a markdown document, stripped of markup.
///
/// Frontmatter and headings are skipped. A line directly under a heading
/// (no blank line between) is treated as a subtitle and skipped too.
pub fn extract_first_paragraph(markdown: &str) -> Result<String, NbhdError> {
    let mut in_frontmatter = false;
    let mut under_heading = false;
    let mut lines: Vec<&str> = Vec::new();

    for line in markdown.lines() {
        let line = line.trim();

        if line == "---" {
            in_frontmatter = !in_frontmatter;
            continue;
        }
        if in_frontmatter {
            continue;
        }

        if line.starts_with('#') {
            if !lines.is_empty() {
                break;
            }
            under_heading = true;
            continue;
        }

        if line.is_empty() {
            if !lines.is_empty() {
                break;
            }
            under_heading = false;
            continue;
        }

        if under_heading && lines.is_empty() {
            under_heading = false;
            continue;
        }
        lines.push(line);
    }

    strip_markdown(&lines.join(" "))
}

// =============================================================================
// TESTS
// =============================================================================
