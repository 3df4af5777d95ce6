//! Mirrored file tree: front-matter Markdown files kept 1:1 with store rows.
//!
//! Every post owns at most one file under the content root, named
//! `{YYYY-MM-DD}-{slug}.md` inside a subdirectory chosen by kind
//! (`posts/` or `presentations/`). Updates rewrite the recorded path in
//! place rather than minting a new date-stamped name, so the mirror tracks
//! the row instead of accumulating copies.
//!
//! # Front matter
//!
//! ```text
//! ---
//! title: Hello World
//! slug: hello-world
//! date: 2025-02-23T09:30:00+00:00
//! description: greeting
//! category: general
//! tags: [intro, test]
//! type: post
//! ---
//!
//! # Hi
//! ```
//!
//! Parsing is the exact inverse of rendering: the block between the `---`
//! delimiters is read line by line as `key: value` (splitting on the FIRST
//! colon, so RFC 3339 dates survive), bracketed values become lists, and
//! everything after the closing delimiter is the body, verbatim.

use crate::store::{Post, PostKind};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

/// Subdirectories created under the content root.
const LAYOUT_DIRS: &[&str] = &["posts", "presentations", "images"];

// ============================================================================
// Front Matter
// ============================================================================

/// Metadata parsed from (or rendered into) a file's front-matter block.
///
/// Serializes with the wire names the editor expects (`type`,
/// `featuredImage`).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FrontMatter {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    pub description: String,
    pub category: String,
    pub tags: Vec<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<PostKind>,
    #[serde(rename = "featuredImage", skip_serializing_if = "Option::is_none")]
    pub featured_image: Option<String>,
    /// Keys the schema doesn't model, preserved as-is.
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

/// Render a post as a front-matter document.
pub fn render_document(post: &Post) -> String {
    let mut out = String::with_capacity(post.content.len() + 256);
    out.push_str("---\n");
    push_field(&mut out, "title", &post.title);
    push_field(&mut out, "slug", &post.slug);
    push_field(&mut out, "date", &post.published_at.to_rfc3339());
    push_field(&mut out, "description", &post.description);
    push_field(&mut out, "category", &post.category);
    push_field(&mut out, "tags", &format!("[{}]", post.tags.join(", ")));
    push_field(&mut out, "type", post.kind.as_str());
    if let Some(image) = &post.featured_image {
        push_field(&mut out, "featuredImage", image);
    }
    for (key, value) in &post.extra {
        push_field(&mut out, key, value);
    }
    out.push_str("---\n\n");
    out.push_str(&post.content);
    out
}

fn push_field(out: &mut String, key: &str, value: &str) {
    out.push_str(key);
    out.push_str(": ");
    out.push_str(value);
    out.push('\n');
}

/// Split a document into front matter and body.
///
/// Returns `None` when the text does not open with a front-matter block.
/// The body is the text after the closing delimiter, verbatim except for
/// the single blank separator line the renderer emits.
pub fn parse_document(text: &str) -> Option<(FrontMatter, &str)> {
    let rest = text.strip_prefix("---\n")?;
    let end = rest.find("\n---")?;

    let block = &rest[..end];
    let mut body = &rest[end + 4..];
    // Line terminator of the closing delimiter, then the blank separator
    body = body.strip_prefix('\n').unwrap_or(body);
    body = body.strip_prefix('\n').unwrap_or(body);

    let mut meta = FrontMatter::default();
    for line in block.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();

        match key {
            "title" => meta.title = value.to_string(),
            "slug" => meta.slug = non_empty(value),
            "date" => meta.date = parse_date(value),
            "description" => meta.description = value.to_string(),
            "category" => meta.category = value.to_string(),
            "tags" => meta.tags = parse_list(value),
            "type" => meta.kind = PostKind::parse(value),
            "featuredImage" => meta.featured_image = non_empty(value),
            _ if !key.is_empty() => {
                meta.extra.insert(key.to_string(), value.to_string());
            }
            _ => {}
        }
    }

    Some((meta, body))
}

/// Parse a bracketed, comma-separated value into a list.
///
/// Unbracketed values fall back to a plain comma split, matching files
/// written by hand.
fn parse_list(value: &str) -> Vec<String> {
    let inner = value
        .strip_prefix('[')
        .and_then(|v| v.strip_suffix(']'))
        .unwrap_or(value);

    inner
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Accept RFC 3339 or bare `YYYY-MM-DD` dates.
fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

// ============================================================================
// File Mirror
// ============================================================================

/// Writes, rewrites and removes the mirrored files under the content root.
#[derive(Debug, Clone)]
pub struct FileMirror {
    root: PathBuf,
}

impl FileMirror {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding uploaded image assets.
    pub fn images_dir(&self) -> PathBuf {
        self.root.join("images")
    }

    /// Create the posts/presentations/images layout under the content root.
    pub fn ensure_layout(&self) -> Result<()> {
        for dir in LAYOUT_DIRS {
            let path = self.root.join(dir);
            std::fs::create_dir_all(&path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
        }
        Ok(())
    }

    /// Path a fresh mirror file gets, relative to the content root:
    /// `{posts|presentations}/{YYYY-MM-DD}-{slug}.md`.
    pub fn mirror_path(kind: PostKind, published_at: DateTime<Utc>, slug: &str) -> String {
        format!(
            "{}/{}-{}.md",
            kind.subdir(),
            published_at.format("%Y-%m-%d"),
            slug
        )
    }

    /// Resolve a recorded `file_path` against the content root.
    ///
    /// Absolute paths (watcher-synced entries) pass through untouched.
    pub fn resolve(&self, file_path: &str) -> PathBuf {
        self.root.join(file_path)
    }

    /// Write a post's mirror file.
    ///
    /// Rewrites the recorded `file_path` in place when the post has one;
    /// otherwise derives a fresh date-stamped path. Returns the path that
    /// should be recorded on the row.
    pub async fn write_post(&self, post: &Post) -> Result<String> {
        let file_path = match &post.file_path {
            Some(path) => path.clone(),
            None => Self::mirror_path(post.kind, post.published_at, &post.slug),
        };

        let absolute = self.resolve(&file_path);
        if let Some(parent) = absolute.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        tokio::fs::write(&absolute, render_document(post))
            .await
            .with_context(|| format!("Failed to write {}", absolute.display()))?;

        Ok(file_path)
    }

    /// Remove a mirrored file. A file that is already gone is consistent,
    /// not an error.
    pub async fn remove(&self, file_path: &str) -> Result<()> {
        let absolute = self.resolve(file_path);
        match tokio::fs::remove_file(&absolute).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => {
                Err(err).with_context(|| format!("Failed to remove {}", absolute.display()))
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
