//! Publish façade: the request-facing orchestrator.
//!
//! Composes the content store, the file mirror and the optional deploy
//! hook for the operations the editor invokes over HTTP. The sequencing is
//! fixed: store transaction first, mirror write second, hook call last.
//!
//! The two writes are not atomic. A crash between them leaves a row whose
//! `file_path` has no file (or a stale file); `mdpress repair` closes that
//! window after the fact. A hook that answers non-2xx fails the publish
//! *response* but never rolls back the committed row and file - the error
//! names the saved slug so the client knows the content landed.

use crate::{
    log,
    mirror::{FileMirror, FrontMatter, parse_document},
    store::{
        ContentStore, Image, ImageKind, NewImage, NewPost, PostKind, PostUpdate, StoreError,
    },
    utils::slug::slugify,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::Path};
use thiserror::Error;

// ============================================================================
// Request / Response Types
// ============================================================================

/// Body of a create request: `{type, content, metadata}`.
#[derive(Debug, Clone, Deserialize)]
pub struct PublishRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
    #[serde(default)]
    pub metadata: RequestMetadata,
}

/// Body of an update request: `{content, metadata}`. The kind is fixed at
/// create time.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateRequest {
    pub content: String,
    #[serde(default)]
    pub metadata: RequestMetadata,
}

/// Metadata block sent by the editor. Unknown keys collect into `extra`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestMetadata {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    /// Comma-separated tag names, as the editor's tags field submits them.
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(rename = "featuredImage", default)]
    pub featured_image: Option<String>,
    #[serde(rename = "deployHook", default)]
    pub deploy_hook: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

/// Successful create/update response.
#[derive(Debug, Serialize)]
pub struct PublishReceipt {
    pub success: bool,
    pub slug: String,
    pub id: i64,
    #[serde(rename = "filePath")]
    pub file_path: String,
}

/// Result of splitting an uploaded file: `{content, metadata}`.
#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub content: String,
    pub metadata: FrontMatter,
}

// ============================================================================
// Errors
// ============================================================================

/// Failures of the publish operations, separated so the HTTP boundary can
/// answer with the right class.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("missing required field `{0}`")]
    Validation(&'static str),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The hook answered non-2xx after the row and file were committed.
    #[error("deploy hook returned {status} for `{slug}` (content was saved)")]
    HookFailed { slug: String, status: u16 },

    /// The hook was unreachable after the row and file were committed.
    #[error("deploy hook request failed for `{slug}` (content was saved): {source}")]
    HookUnreachable {
        slug: String,
        #[source]
        source: reqwest::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ============================================================================
// Publisher
// ============================================================================

/// Orchestrates store + mirror + deploy hook for the network boundary.
#[derive(Clone)]
pub struct Publisher {
    store: ContentStore,
    mirror: FileMirror,
    http: reqwest::Client,
    default_hook: Option<String>,
}

impl Publisher {
    pub fn new(store: ContentStore, mirror: FileMirror, default_hook: Option<String>) -> Self {
        Self {
            store,
            mirror,
            http: reqwest::Client::new(),
            default_hook,
        }
    }

    /// Create a post: store transaction, mirror write, optional hook.
    pub async fn publish(&self, request: &PublishRequest) -> Result<PublishReceipt, PublishError> {
        let kind = PostKind::parse(&request.kind).ok_or(PublishError::Validation("type"))?;
        let meta = &request.metadata;
        if meta.title.trim().is_empty() {
            return Err(PublishError::Validation("title"));
        }
        if request.content.trim().is_empty() {
            return Err(PublishError::Validation("content"));
        }

        let slug = meta
            .slug
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| slugify(&meta.title));
        let published_at = Utc::now();
        let file_path = FileMirror::mirror_path(kind, published_at, &slug);

        let new = NewPost {
            slug: slug.clone(),
            title: meta.title.clone(),
            content: request.content.clone(),
            kind,
            featured_image: meta.featured_image.clone(),
            description: meta.description.clone(),
            category: meta.category.clone(),
            deploy_hook: meta.deploy_hook.clone(),
            extra: meta.extra.clone(),
            file_path: Some(file_path.clone()),
            published_at,
            tags: parse_tags(&meta.tags),
        };
        let id = self.store.create_post(&new).await?;

        let post = self.store.get_post(&slug).await?;
        self.mirror.write_post(&post).await?;
        log!("serve"; "published `{slug}` -> {file_path}");

        self.trigger_hook(meta.deploy_hook.as_deref(), kind, &file_path, &slug)
            .await?;

        Ok(PublishReceipt {
            success: true,
            slug,
            id,
            file_path,
        })
    }

    /// Update a post in place: fields and tags replaced, mirror rewritten
    /// at its recorded path, optional hook.
    pub async fn update(
        &self,
        slug: &str,
        request: &UpdateRequest,
    ) -> Result<PublishReceipt, PublishError> {
        let meta = &request.metadata;
        if meta.title.trim().is_empty() {
            return Err(PublishError::Validation("title"));
        }
        if request.content.trim().is_empty() {
            return Err(PublishError::Validation("content"));
        }

        let update = PostUpdate {
            title: meta.title.clone(),
            content: request.content.clone(),
            featured_image: meta.featured_image.clone(),
            description: meta.description.clone(),
            category: meta.category.clone(),
            deploy_hook: meta.deploy_hook.clone(),
            extra: meta.extra.clone(),
            tags: parse_tags(&meta.tags),
        };
        let id = self.store.update_post(slug, &update).await?;

        let post = self.store.get_post(slug).await?;
        let file_path = self.mirror.write_post(&post).await?;
        if post.file_path.is_none() {
            // Row predates the mirror; claim the freshly written file
            self.store.set_file_path(id, &file_path).await?;
        }
        log!("serve"; "updated `{slug}` -> {file_path}");

        self.trigger_hook(meta.deploy_hook.as_deref(), post.kind, &file_path, slug)
            .await?;

        Ok(PublishReceipt {
            success: true,
            slug: slug.to_string(),
            id,
            file_path,
        })
    }

    /// Delete a post, its mirror file and its images' backing files.
    pub async fn delete(&self, slug: &str) -> Result<(), PublishError> {
        let post = self.store.get_post(slug).await?;
        let images = self.store.post_images(post.id).await?;

        let file_path = self.store.delete_post(slug).await?;

        // Rows are gone (images cascaded); now the files
        if let Some(recorded) = file_path {
            self.mirror.remove(&recorded).await?;
        }
        for image in images {
            self.mirror.remove(&image.path).await?;
        }
        log!("serve"; "deleted `{slug}`");
        Ok(())
    }

    /// Split an uploaded Markdown file into `{metadata, content}` without
    /// persisting anything.
    pub fn import(text: &str) -> ImportResponse {
        match parse_document(text) {
            Some((metadata, body)) => ImportResponse {
                content: body.to_string(),
                metadata,
            },
            None => ImportResponse {
                content: text.to_string(),
                metadata: FrontMatter::default(),
            },
        }
    }

    // ------------------------------------------------------------------------
    // Images
    // ------------------------------------------------------------------------

    /// Store uploaded image bytes under the images directory and record the
    /// row. The stored name is prefixed with the post id to keep uploads
    /// from different posts apart.
    pub async fn add_image(
        &self,
        slug: &str,
        filename: &str,
        kind: ImageKind,
        bytes: &[u8],
    ) -> Result<Image, PublishError> {
        let post = self.store.get_post(slug).await?;

        let safe_name = Path::new(filename)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .filter(|n| !n.is_empty())
            .ok_or(PublishError::Validation("filename"))?;
        let rel_path = format!("images/{}-{}", post.id, safe_name);

        let absolute = self.mirror.resolve(&rel_path);
        if let Some(parent) = absolute.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(anyhow::Error::from)?;
        }
        tokio::fs::write(&absolute, bytes)
            .await
            .map_err(anyhow::Error::from)?;

        let id = self
            .store
            .add_image(&NewImage {
                post_id: post.id,
                filename: safe_name,
                path: rel_path,
                kind,
            })
            .await?;
        Ok(self.store.get_image(id).await?)
    }

    /// All images of a post, by slug.
    pub async fn post_images(&self, slug: &str) -> Result<Vec<Image>, PublishError> {
        let post = self.store.get_post(slug).await?;
        Ok(self.store.post_images(post.id).await?)
    }

    /// Delete an image row, then its backing file.
    pub async fn delete_image(&self, id: i64) -> Result<(), PublishError> {
        let image = self.store.get_image(id).await?;
        self.store.delete_image(id).await?;
        self.mirror.remove(&image.path).await?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Deploy Hook
    // ------------------------------------------------------------------------

    /// POST `{type, filename}` to the request's hook, falling back to the
    /// configured default. No hook configured means nothing to trigger.
    async fn trigger_hook(
        &self,
        request_hook: Option<&str>,
        kind: PostKind,
        file_path: &str,
        slug: &str,
    ) -> Result<(), PublishError> {
        let Some(url) = request_hook.or(self.default_hook.as_deref()) else {
            return Ok(());
        };

        let filename = Path::new(file_path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_path.to_string());
        let body = serde_json::json!({ "type": kind.as_str(), "filename": filename });

        log!("deploy"; "triggering hook for `{slug}`");
        let response = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|source| PublishError::HookUnreachable {
                slug: slug.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(PublishError::HookFailed {
                slug: slug.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }
}

/// Split the editor's comma-separated tags field into clean names.
fn parse_tags(tags: &str) -> Vec<String> {
    tags.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
