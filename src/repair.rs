//! Reconciliation between store rows and the mirrored file tree.
//!
//! The publish path commits the database row and then writes the mirror
//! file as two separate steps, so a crash in between can leave a row whose
//! `file_path` points at nothing, or a file no row claims. This scan closes
//! the window after the fact: missing mirrors are rewritten from their
//! rows, orphan files are reported but never deleted.

use crate::{
    log,
    mirror::FileMirror,
    store::{ContentStore, ListFilter},
};
use anyhow::Result;
use rustc_hash::FxHashSet;
use std::path::PathBuf;
use walkdir::WalkDir;

/// Mirror subdirectories scanned for orphan files.
const MIRROR_DIRS: &[&str] = &["posts", "presentations"];

/// Outcome of a repair scan.
#[derive(Debug, Default)]
pub struct RepairReport {
    /// Slugs whose missing mirror file was rewritten from the row.
    pub rewritten: Vec<String>,
    /// Markdown files in the mirror tree that no row claims.
    pub orphans: Vec<PathBuf>,
}

/// Compare every row's `file_path` against the mirror tree and rewrite
/// what is missing.
pub async fn repair(store: &ContentStore, mirror: &FileMirror) -> Result<RepairReport> {
    let posts = store.list_posts(&ListFilter::default()).await?;

    let mut report = RepairReport::default();
    let mut claimed: FxHashSet<PathBuf> = FxHashSet::default();

    for post in &posts {
        let Some(file_path) = &post.file_path else {
            continue;
        };
        let absolute = mirror.resolve(file_path);
        claimed.insert(absolute.clone());

        if !absolute.exists() {
            mirror.write_post(post).await?;
            log!("repair"; "rewrote missing mirror {}", absolute.display());
            report.rewritten.push(post.slug.clone());
        }
    }

    for subdir in MIRROR_DIRS {
        let dir = mirror.root().join(subdir);
        if !dir.exists() {
            continue;
        }
        for entry in WalkDir::new(&dir).into_iter().filter_map(Result::ok) {
            let path = entry.path();
            if entry.file_type().is_file()
                && path.extension().and_then(|e| e.to_str()) == Some("md")
                && !claimed.contains(path)
            {
                log!("repair"; "orphan file {}", path.display());
                report.orphans.push(path.to_path_buf());
            }
        }
    }

    report.rewritten.sort();
    report.orphans.sort();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{NewPost, PostKind};
    use chrono::Utc;
    use std::{collections::BTreeMap, fs};
    use tempfile::TempDir;

    async fn fixture() -> (TempDir, ContentStore, FileMirror) {
        let dir = TempDir::new().unwrap();
        let store = ContentStore::connect(&dir.path().join("test.sqlite3"))
            .await
            .unwrap();
        let mirror = FileMirror::new(dir.path().join("content"));
        mirror.ensure_layout().unwrap();
        (dir, store, mirror)
    }

    fn post_with_mirror(slug: &str) -> NewPost {
        NewPost {
            slug: slug.to_string(),
            title: "T".to_string(),
            content: "body".to_string(),
            kind: PostKind::Post,
            featured_image: None,
            description: String::new(),
            category: String::new(),
            deploy_hook: None,
            extra: BTreeMap::new(),
            file_path: Some(format!("posts/2025-01-01-{slug}.md")),
            published_at: Utc::now(),
            tags: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_repair_rewrites_missing_mirror() {
        let (_dir, store, mirror) = fixture().await;

        // Row committed, file write never happened
        store.create_post(&post_with_mirror("lost")).await.unwrap();

        let report = repair(&store, &mirror).await.unwrap();
        assert_eq!(report.rewritten, vec!["lost"]);
        assert!(mirror.resolve("posts/2025-01-01-lost.md").exists());

        // Second run finds nothing to do
        let report = repair(&store, &mirror).await.unwrap();
        assert!(report.rewritten.is_empty());
        assert!(report.orphans.is_empty());
    }

    #[tokio::test]
    async fn test_repair_reports_orphans_without_deleting() {
        let (_dir, store, mirror) = fixture().await;

        let stray = mirror.root().join("posts/stray.md");
        fs::write(&stray, "---\ntitle: Stray\n---\n").unwrap();

        let report = repair(&store, &mirror).await.unwrap();
        assert_eq!(report.orphans, vec![stray.clone()]);
        assert!(stray.exists());
    }

    #[tokio::test]
    async fn test_repair_leaves_consistent_posts_alone() {
        let (_dir, store, mirror) = fixture().await;

        store.create_post(&post_with_mirror("fine")).await.unwrap();
        let post = store.get_post("fine").await.unwrap();
        mirror.write_post(&post).await.unwrap();

        let report = repair(&store, &mirror).await.unwrap();
        assert!(report.rewritten.is_empty());
        assert!(report.orphans.is_empty());
    }
}
