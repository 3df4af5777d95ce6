//! Data types for stored content.
//!
//! These are the rows the editor API serializes back to the browser, so the
//! serde names follow the original wire format (camelCase where it matters).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Kinds
// ============================================================================

/// What a post renders as: a regular Markdown article or a Marp slide deck.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostKind {
    Post,
    Marp,
}

impl PostKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Marp => "marp",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "post" => Some(Self::Post),
            "marp" | "presentation" => Some(Self::Marp),
            _ => None,
        }
    }

    /// Subdirectory of the content root holding this kind's mirror files.
    pub const fn subdir(self) -> &'static str {
        match self {
            Self::Post => "posts",
            Self::Marp => "presentations",
        }
    }
}

/// Role of an uploaded image within its post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    Featured,
    Content,
    Marp,
}

impl ImageKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Featured => "featured",
            Self::Content => "content",
            Self::Marp => "marp",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "featured" => Some(Self::Featured),
            "content" => Some(Self::Content),
            "marp" => Some(Self::Marp),
            _ => None,
        }
    }
}

// ============================================================================
// Posts
// ============================================================================

/// A stored post with its resolved tag names.
#[derive(Debug, Clone, Serialize)]
pub struct Post {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: PostKind,
    #[serde(rename = "featuredImage", skip_serializing_if = "Option::is_none")]
    pub featured_image: Option<String>,
    pub description: String,
    pub category: String,
    #[serde(rename = "deployHook", skip_serializing_if = "Option::is_none")]
    pub deploy_hook: Option<String>,
    /// Open extension map for front-matter fields the schema doesn't model.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
    /// Mirrored file this row owns, when one exists. Relative paths resolve
    /// against the content root; watcher-synced rows keep absolute paths.
    #[serde(rename = "filePath", skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(rename = "publishedAt")]
    pub published_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
    pub tags: Vec<String>,
}

/// Fields for inserting a post.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub slug: String,
    pub title: String,
    pub content: String,
    pub kind: PostKind,
    pub featured_image: Option<String>,
    pub description: String,
    pub category: String,
    pub deploy_hook: Option<String>,
    pub extra: BTreeMap<String, String>,
    pub file_path: Option<String>,
    pub published_at: DateTime<Utc>,
    pub tags: Vec<String>,
}

/// Full-replacement update for an existing post.
///
/// The tag set replaces the old one wholesale; `updated_at` is refreshed by
/// the store.
#[derive(Debug, Clone)]
pub struct PostUpdate {
    pub title: String,
    pub content: String,
    pub featured_image: Option<String>,
    pub description: String,
    pub category: String,
    pub deploy_hook: Option<String>,
    pub extra: BTreeMap<String, String>,
    pub tags: Vec<String>,
}

/// Filters for listing posts. `None` fields are unconstrained.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub kind: Option<PostKind>,
    /// Only posts carrying this tag.
    pub tag: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

// ============================================================================
// Images
// ============================================================================

/// An uploaded image owned by a post.
#[derive(Debug, Clone, Serialize)]
pub struct Image {
    pub id: i64,
    #[serde(rename = "postId")]
    pub post_id: i64,
    pub filename: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: ImageKind,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// Fields for inserting an image row.
#[derive(Debug, Clone)]
pub struct NewImage {
    pub post_id: i64,
    pub filename: String,
    pub path: String,
    pub kind: ImageKind,
}
