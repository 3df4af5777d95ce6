//! Reconciles watcher events into the content store.
//!
//! Files dropped into a watched directory become posts; edits become
//! updates; removals become deletions. Metadata comes from front matter
//! when the file carries it, otherwise it is synthesized from filename
//! conventions (`my-first-post.md` becomes title "My First Post", a
//! filename containing "marp" becomes a slide deck).
//!
//! Re-sync is idempotent: a watcher restart replays `add` for every file
//! already in the directory, so an `add` whose slug exists falls back to
//! an update, and a `change` for an unknown slug falls back to a create.
//! Each file is handled independently - one failure is logged and affects
//! neither the rest of the scan nor future scans.

use crate::{
    log,
    mirror::{FileMirror, FrontMatter, parse_document},
    store::{ContentStore, NewPost, PostKind, PostUpdate, StoreError},
    utils::slug::{slug_from_filename, slugify, title_from_filename},
    watch::WatchEvent,
};
use anyhow::{Context, Result};
use chrono::Utc;
use std::path::Path;
use tokio::sync::mpsc;

/// Consumes watcher events and applies them to the store and mirror.
#[derive(Clone)]
pub struct SyncDispatcher {
    store: ContentStore,
    mirror: FileMirror,
}

impl SyncDispatcher {
    pub fn new(store: ContentStore, mirror: FileMirror) -> Self {
        Self { store, mirror }
    }

    /// Drain the event channel until every sender is gone.
    ///
    /// Each event is handled on its own task, so a slow or failing file
    /// never blocks the channel or the watcher's next scan.
    pub async fn run(self, mut events: mpsc::Receiver<WatchEvent>) {
        while let Some(event) = events.recv().await {
            let dispatcher = self.clone();
            tokio::spawn(async move {
                if let Err(err) = dispatcher.handle(&event).await {
                    log!("sync"; "{}: {err:#}", describe(&event));
                }
            });
        }
    }

    /// Apply one watcher event.
    pub async fn handle(&self, event: &WatchEvent) -> Result<()> {
        match event {
            WatchEvent::Added(path) => self.upsert(path, true).await,
            WatchEvent::Changed(path) => self.upsert(path, false).await,
            WatchEvent::Removed(path) => self.remove(path).await,
            WatchEvent::ScanFailed { dir, error } => {
                log!("watch"; "scan of {} failed: {error}", dir.display());
                Ok(())
            }
        }
    }

    /// Sync an added or changed file into the store.
    ///
    /// `fresh` picks the first attempt (create for `add`, update for
    /// `change`); the opposite operation is the fallback that keeps
    /// re-sync idempotent.
    async fn upsert(&self, path: &Path, fresh: bool) -> Result<()> {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let (meta, body) = extract_metadata(&text, path);
        let slug = meta
            .slug
            .clone()
            .unwrap_or_else(|| slugify(&meta.title));

        let verb = if fresh {
            match self.create(path, &slug, &meta, &body).await {
                Err(StoreError::Conflict(_)) => {
                    self.update(path, &slug, &meta, &body).await?;
                    "re-synced"
                }
                result => {
                    result?;
                    "added"
                }
            }
        } else {
            match self.update(path, &slug, &meta, &body).await {
                Err(StoreError::NotFound(_)) => {
                    self.create(path, &slug, &meta, &body).await?;
                    "added"
                }
                result => {
                    result?;
                    "updated"
                }
            }
        };

        log!("sync"; "{verb} `{slug}` from {}", path.display());
        Ok(())
    }

    async fn create(
        &self,
        path: &Path,
        slug: &str,
        meta: &FrontMatter,
        body: &str,
    ) -> Result<(), StoreError> {
        let new = NewPost {
            slug: slug.to_string(),
            title: meta.title.clone(),
            content: body.to_string(),
            kind: meta.kind.unwrap_or(PostKind::Post),
            featured_image: meta.featured_image.clone(),
            description: meta.description.clone(),
            category: meta.category.clone(),
            deploy_hook: None,
            extra: meta.extra.clone(),
            file_path: Some(path.to_string_lossy().into_owned()),
            published_at: meta.date.unwrap_or_else(Utc::now),
            tags: meta.tags.clone(),
        };
        self.store.create_post(&new).await.map(|_| ())
    }

    async fn update(
        &self,
        path: &Path,
        slug: &str,
        meta: &FrontMatter,
        body: &str,
    ) -> Result<(), StoreError> {
        let update = PostUpdate {
            title: meta.title.clone(),
            content: body.to_string(),
            featured_image: meta.featured_image.clone(),
            description: meta.description.clone(),
            category: meta.category.clone(),
            deploy_hook: None,
            extra: meta.extra.clone(),
            tags: meta.tags.clone(),
        };
        let post_id = self.store.update_post(slug, &update).await?;

        // Claim the file for rows that predate this mirror (façade-created
        // posts start with their own file_path; leave those alone)
        let post = self.store.get_post(slug).await?;
        if post.file_path.is_none() {
            self.store
                .set_file_path(post_id, &path.to_string_lossy())
                .await?;
        }
        Ok(())
    }

    /// Sync an externally removed file: delete the owning row and, when the
    /// row recorded a mirror elsewhere, that file too.
    async fn remove(&self, path: &Path) -> Result<()> {
        let observed = path.to_string_lossy();

        // The row that owns this exact file wins; the filename stem is the
        // fallback for files the store never linked
        let slug = match self.store.find_by_file_path(&observed).await? {
            Some(post) => post.slug,
            None => slug_from_filename(path),
        };

        match self.store.delete_post(&slug).await {
            Ok(file_path) => {
                if let Some(recorded) = file_path
                    && recorded != observed
                {
                    self.mirror.remove(&recorded).await?;
                }
                log!("sync"; "deleted `{slug}` after {} was removed", path.display());
                Ok(())
            }
            Err(StoreError::NotFound(_)) => {
                log!("sync"; "no post for removed file {}", path.display());
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// Parse front matter, or synthesize defaults from filename conventions.
fn extract_metadata(text: &str, path: &Path) -> (FrontMatter, String) {
    match parse_document(text) {
        Some((mut meta, body)) => {
            if meta.title.is_empty() {
                meta.title = title_from_filename(path);
            }
            if meta.kind.is_none() {
                meta.kind = Some(kind_from_filename(path));
            }
            (meta, body.to_string())
        }
        None => {
            let meta = FrontMatter {
                title: title_from_filename(path),
                kind: Some(kind_from_filename(path)),
                date: Some(Utc::now()),
                ..FrontMatter::default()
            };
            (meta, text.to_string())
        }
    }
}

/// Filename convention: anything mentioning "marp" is a slide deck.
fn kind_from_filename(path: &Path) -> PostKind {
    if path.to_string_lossy().to_lowercase().contains("marp") {
        PostKind::Marp
    } else {
        PostKind::Post
    }
}

fn describe(event: &WatchEvent) -> String {
    match event {
        WatchEvent::Added(path) => format!("add {}", path.display()),
        WatchEvent::Changed(path) => format!("change {}", path.display()),
        WatchEvent::Removed(path) => format!("unlink {}", path.display()),
        WatchEvent::ScanFailed { dir, .. } => format!("scan {}", dir.display()),
    }
}

// ============================================================================
// Tests
// ============================================================================
