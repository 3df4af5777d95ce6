//! Relational content store for posts, tags and images.
//!
//! Backed by a single SQLite file. Every multi-statement mutation runs in a
//! transaction so a failed statement rolls the whole operation back, and
//! post deletion cascades through tag associations and images at the
//! referential-integrity level rather than in application loops.
//!
//! # Tag resolution
//!
//! Create and update share one tag-linking pass: find which requested names
//! already exist, insert only the missing ones, then resolve the full id set
//! and write the join rows. Two requests racing to introduce the same new
//! tag name resolve through `ON CONFLICT(name) DO NOTHING` - the loser
//! treats the existing row as its own insert.

mod error;
mod types;

pub use error::{StoreError, StoreResult};
pub use types::{Image, ImageKind, ListFilter, NewImage, NewPost, Post, PostKind, PostUpdate};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    Row, Sqlite, Transaction,
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow},
};
use std::{collections::BTreeMap, path::Path};

/// Schema applied idempotently on connect.
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS posts (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    slug           TEXT NOT NULL UNIQUE,
    title          TEXT NOT NULL,
    content        TEXT NOT NULL,
    kind           TEXT NOT NULL DEFAULT 'post',
    featured_image TEXT,
    description    TEXT NOT NULL DEFAULT '',
    category       TEXT NOT NULL DEFAULT '',
    deploy_hook    TEXT,
    extra          TEXT NOT NULL DEFAULT '{}',
    file_path      TEXT UNIQUE,
    published_at   TEXT NOT NULL,
    updated_at     TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS tags (
    id   INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);
CREATE TABLE IF NOT EXISTS post_tags (
    post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
    tag_id  INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
    PRIMARY KEY (post_id, tag_id)
);
CREATE TABLE IF NOT EXISTS images (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    post_id    INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
    filename   TEXT NOT NULL,
    path       TEXT NOT NULL,
    kind       TEXT NOT NULL,
    created_at TEXT NOT NULL
);
";

const POST_COLUMNS: &str = "id, slug, title, content, kind, featured_image, description, \
                            category, deploy_hook, extra, file_path, published_at, updated_at";

/// Handle to the content database. Cheap to clone; all clones share one pool.
#[derive(Debug, Clone)]
pub struct ContentStore {
    pool: SqlitePool,
}

impl ContentStore {
    /// Open (creating if missing) the database at `path` and apply the schema.
    ///
    /// Foreign keys are enabled per connection so post deletion cascades.
    pub async fn connect(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database {}", path.display()))?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        for statement in SCHEMA.split(';').filter(|s| !s.trim().is_empty()) {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("Failed to apply database schema")?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Posts
    // ------------------------------------------------------------------------

    /// Insert a post and its tag associations in one transaction.
    ///
    /// Returns the new post id. A slug collision rolls everything back and
    /// surfaces as [`StoreError::Conflict`].
    pub async fn create_post(&self, new: &NewPost) -> StoreResult<i64> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "INSERT INTO posts (slug, title, content, kind, featured_image, description, \
             category, deploy_hook, extra, file_path, published_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&new.slug)
        .bind(&new.title)
        .bind(&new.content)
        .bind(new.kind.as_str())
        .bind(&new.featured_image)
        .bind(&new.description)
        .bind(&new.category)
        .bind(&new.deploy_hook)
        .bind(encode_extra(&new.extra))
        .bind(&new.file_path)
        .bind(new.published_at)
        .bind(new.published_at)
        .execute(&mut *tx)
        .await
        .map_err(|err| map_slug_conflict(err, &new.slug))?;

        let post_id = result.last_insert_rowid();
        link_tags(&mut tx, post_id, &new.tags).await?;

        tx.commit().await?;
        Ok(post_id)
    }

    /// Fetch a post and its resolved tag names.
    pub async fn get_post(&self, slug: &str) -> StoreResult<Post> {
        let row = sqlx::query(&format!("SELECT {POST_COLUMNS} FROM posts WHERE slug = ?"))
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(slug.to_string()))?;

        let mut post = read_post(&row)?;
        post.tags = self.tags_of(post.id).await?;
        Ok(post)
    }

    /// Look up the post owning a mirrored file, if any row claims it.
    pub async fn find_by_file_path(&self, file_path: &str) -> StoreResult<Option<Post>> {
        let row = sqlx::query(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE file_path = ?"
        ))
        .bind(file_path)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let mut post = read_post(&row)?;
                post.tags = self.tags_of(post.id).await?;
                Ok(Some(post))
            }
            None => Ok(None),
        }
    }

    /// Update post fields and replace its tag set in one transaction.
    ///
    /// Tag update is a wholesale replace, not a diff: all existing
    /// associations are dropped and the new set is linked through the same
    /// resolution pass as create. `updated_at` is refreshed.
    pub async fn update_post(&self, slug: &str, update: &PostUpdate) -> StoreResult<i64> {
        let mut tx = self.pool.begin().await?;

        let post_id: Option<i64> = sqlx::query_scalar(
            "UPDATE posts SET title = ?, content = ?, featured_image = ?, description = ?, \
             category = ?, deploy_hook = ?, extra = ?, updated_at = ? \
             WHERE slug = ? RETURNING id",
        )
        .bind(&update.title)
        .bind(&update.content)
        .bind(&update.featured_image)
        .bind(&update.description)
        .bind(&update.category)
        .bind(&update.deploy_hook)
        .bind(encode_extra(&update.extra))
        .bind(Utc::now())
        .bind(slug)
        .fetch_optional(&mut *tx)
        .await?;

        let post_id = post_id.ok_or_else(|| StoreError::NotFound(slug.to_string()))?;

        sqlx::query("DELETE FROM post_tags WHERE post_id = ?")
            .bind(post_id)
            .execute(&mut *tx)
            .await?;
        link_tags(&mut tx, post_id, &update.tags).await?;

        tx.commit().await?;
        Ok(post_id)
    }

    /// Delete a post. Tag associations and image rows cascade.
    ///
    /// Returns the recorded `file_path` so the caller can remove the mirror.
    pub async fn delete_post(&self, slug: &str) -> StoreResult<Option<String>> {
        let row = sqlx::query("DELETE FROM posts WHERE slug = ? RETURNING file_path")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(slug.to_string()))?;

        Ok(row.try_get("file_path")?)
    }

    /// Record the mirrored file a post owns.
    pub async fn set_file_path(&self, post_id: i64, file_path: &str) -> StoreResult<()> {
        sqlx::query("UPDATE posts SET file_path = ? WHERE id = ?")
            .bind(file_path)
            .bind(post_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// List posts newest-first with optional kind/tag filters and pagination.
    ///
    /// Tags are aggregated into one list per post.
    pub async fn list_posts(&self, filter: &ListFilter) -> StoreResult<Vec<Post>> {
        let mut sql = format!(
            "SELECT p.id, p.slug, p.title, p.content, p.kind, p.featured_image, \
             p.description, p.category, p.deploy_hook, p.extra, p.file_path, \
             p.published_at, p.updated_at, GROUP_CONCAT(t.name) AS tag_names \
             FROM posts p \
             LEFT JOIN post_tags pt ON p.id = pt.post_id \
             LEFT JOIN tags t ON pt.tag_id = t.id"
        );

        let mut conditions: Vec<&str> = Vec::new();
        if filter.kind.is_some() {
            conditions.push("p.kind = ?");
        }
        if filter.tag.is_some() {
            conditions.push(
                "EXISTS (SELECT 1 FROM post_tags pt2 JOIN tags t2 ON pt2.tag_id = t2.id \
                 WHERE pt2.post_id = p.id AND t2.name = ?)",
            );
        }
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        // LIMIT -1 is SQLite for "no limit"
        sql.push_str(" GROUP BY p.id ORDER BY p.published_at DESC LIMIT ? OFFSET ?");

        let mut query = sqlx::query(&sql);
        if let Some(kind) = filter.kind {
            query = query.bind(kind.as_str());
        }
        if let Some(tag) = &filter.tag {
            query = query.bind(tag);
        }
        query = query
            .bind(filter.limit.unwrap_or(-1))
            .bind(filter.offset.unwrap_or(0));

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| {
                let mut post = read_post(row)?;
                let names: Option<String> = row.try_get("tag_names")?;
                post.tags = names
                    .map(|joined| {
                        let mut tags: Vec<String> =
                            joined.split(',').map(str::to_string).collect();
                        tags.sort();
                        tags
                    })
                    .unwrap_or_default();
                Ok(post)
            })
            .collect()
    }

    async fn tags_of(&self, post_id: i64) -> StoreResult<Vec<String>> {
        Ok(sqlx::query_scalar(
            "SELECT t.name FROM tags t JOIN post_tags pt ON t.id = pt.tag_id \
             WHERE pt.post_id = ? ORDER BY t.name",
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?)
    }

    // ------------------------------------------------------------------------
    // Images
    // ------------------------------------------------------------------------

    /// Insert an image row. The backing file is the caller's business.
    pub async fn add_image(&self, new: &NewImage) -> StoreResult<i64> {
        let result = sqlx::query(
            "INSERT INTO images (post_id, filename, path, kind, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(new.post_id)
        .bind(&new.filename)
        .bind(&new.path)
        .bind(new.kind.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// All images owned by a post.
    pub async fn post_images(&self, post_id: i64) -> StoreResult<Vec<Image>> {
        let rows = sqlx::query(
            "SELECT id, post_id, filename, path, kind, created_at \
             FROM images WHERE post_id = ? ORDER BY id",
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(read_image).collect()
    }

    /// Fetch one image row by id.
    pub async fn get_image(&self, id: i64) -> StoreResult<Image> {
        let row = sqlx::query(
            "SELECT id, post_id, filename, path, kind, created_at FROM images WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::ImageNotFound(id))?;

        read_image(&row)
    }

    /// Delete an image row. Removing the backing file is NOT automatic -
    /// the caller deletes it using the path from [`Self::get_image`].
    pub async fn delete_image(&self, id: i64) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM images WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::ImageNotFound(id));
        }
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Link `tags` to a post inside an open transaction.
///
/// Statement order is the contract: probe existing names, insert the missing
/// ones, then resolve all ids and write join rows.
async fn link_tags(
    tx: &mut Transaction<'_, Sqlite>,
    post_id: i64,
    tags: &[String],
) -> StoreResult<()> {
    let requested = dedup(tags);
    if requested.is_empty() {
        return Ok(());
    }

    let placeholders = vec!["?"; requested.len()].join(", ");
    let select_names = format!("SELECT name FROM tags WHERE name IN ({placeholders})");
    let select_ids = format!("SELECT id FROM tags WHERE name IN ({placeholders})");

    let mut existing_query = sqlx::query_scalar::<_, String>(&select_names);
    for name in &requested {
        existing_query = existing_query.bind(name);
    }
    let existing = existing_query.fetch_all(&mut **tx).await?;

    for name in requested.iter().filter(|name| !existing.contains(name)) {
        // A concurrent insert of the same name is "already exists"
        sqlx::query("INSERT INTO tags (name) VALUES (?) ON CONFLICT(name) DO NOTHING")
            .bind(name)
            .execute(&mut **tx)
            .await?;
    }

    let mut ids_query = sqlx::query_scalar::<_, i64>(&select_ids);
    for name in &requested {
        ids_query = ids_query.bind(name);
    }
    let tag_ids = ids_query.fetch_all(&mut **tx).await?;

    for tag_id in tag_ids {
        sqlx::query("INSERT INTO post_tags (post_id, tag_id) VALUES (?, ?)")
            .bind(post_id)
            .bind(tag_id)
            .execute(&mut **tx)
            .await?;
    }

    Ok(())
}

/// Order-preserving dedup of requested tag names.
fn dedup(tags: &[String]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        if !seen.contains(tag) {
            seen.push(tag.clone());
        }
    }
    seen
}

/// Map a unique violation on `posts.slug` to [`StoreError::Conflict`].
fn map_slug_conflict(err: sqlx::Error, slug: &str) -> StoreError {
    match &err {
        sqlx::Error::Database(db)
            if db.is_unique_violation() && db.message().contains("posts.slug") =>
        {
            StoreError::Conflict(slug.to_string())
        }
        _ => StoreError::Database(err),
    }
}

fn encode_extra(extra: &BTreeMap<String, String>) -> String {
    serde_json::to_string(extra).unwrap_or_else(|_| "{}".to_string())
}

fn read_post(row: &SqliteRow) -> StoreResult<Post> {
    let kind_str: String = row.try_get("kind")?;
    let kind = PostKind::parse(&kind_str).ok_or_else(|| {
        StoreError::Database(sqlx::Error::Decode(
            format!("unknown post kind `{kind_str}`").into(),
        ))
    })?;

    let extra_json: String = row.try_get("extra")?;
    let extra: BTreeMap<String, String> = serde_json::from_str(&extra_json).unwrap_or_default();

    Ok(Post {
        id: row.try_get("id")?,
        slug: row.try_get("slug")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        kind,
        featured_image: row.try_get("featured_image")?,
        description: row.try_get("description")?,
        category: row.try_get("category")?,
        deploy_hook: row.try_get("deploy_hook")?,
        extra,
        file_path: row.try_get("file_path")?,
        published_at: row.try_get::<DateTime<Utc>, _>("published_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
        tags: Vec::new(),
    })
}

fn read_image(row: &SqliteRow) -> StoreResult<Image> {
    let kind_str: String = row.try_get("kind")?;
    let kind = ImageKind::parse(&kind_str).ok_or_else(|| {
        StoreError::Database(sqlx::Error::Decode(
            format!("unknown image kind `{kind_str}`").into(),
        ))
    })?;

    Ok(Image {
        id: row.try_get("id")?,
        post_id: row.try_get("post_id")?,
        filename: row.try_get("filename")?,
        path: row.try_get("path")?,
        kind,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    async fn open_store() -> (TempDir, ContentStore) {
        let dir = TempDir::new().unwrap();
        let store = ContentStore::connect(&dir.path().join("test.sqlite3"))
            .await
            .unwrap();
        (dir, store)
    }

    fn sample_post(slug: &str, tags: &[&str]) -> NewPost {
        NewPost {
            slug: slug.to_string(),
            title: "Hello World".to_string(),
            content: "# Hi".to_string(),
            kind: PostKind::Post,
            featured_image: None,
            description: "greeting".to_string(),
            category: "general".to_string(),
            deploy_hook: None,
            extra: BTreeMap::new(),
            file_path: None,
            published_at: Utc::now(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_create_and_get_round_trip() {
        let (_dir, store) = open_store().await;

        let id = store
            .create_post(&sample_post("hello-world", &["intro", "test"]))
            .await
            .unwrap();
        assert!(id > 0);

        let post = store.get_post("hello-world").await.unwrap();
        assert_eq!(post.id, id);
        assert_eq!(post.title, "Hello World");
        assert_eq!(post.content, "# Hi");
        assert_eq!(post.kind, PostKind::Post);
        assert_eq!(post.tags, vec!["intro", "test"]);
    }

    #[tokio::test]
    async fn test_create_dedups_requested_tags() {
        let (_dir, store) = open_store().await;

        store
            .create_post(&sample_post("dup-tags", &["intro", "intro", "test"]))
            .await
            .unwrap();

        let post = store.get_post("dup-tags").await.unwrap();
        assert_eq!(post.tags, vec!["intro", "test"]);
    }

    #[tokio::test]
    async fn test_tags_shared_between_posts() {
        let (_dir, store) = open_store().await;

        store.create_post(&sample_post("first", &["rust"])).await.unwrap();
        store.create_post(&sample_post("second", &["rust"])).await.unwrap();

        let tagged = store
            .list_posts(&ListFilter {
                tag: Some("rust".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(tagged.len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_slug_is_conflict() {
        let (_dir, store) = open_store().await;

        store.create_post(&sample_post("foo", &["a"])).await.unwrap();
        let err = store
            .create_post(&sample_post("foo", &["b"]))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(slug) if slug == "foo"));

        // The original row is unchanged and no duplicate exists
        let post = store.get_post("foo").await.unwrap();
        assert_eq!(post.tags, vec!["a"]);
        let all = store.list_posts(&ListFilter::default()).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let (_dir, store) = open_store().await;
        let err = store.get_post("nope").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(slug) if slug == "nope"));
    }

    #[tokio::test]
    async fn test_update_replaces_tag_set() {
        let (_dir, store) = open_store().await;

        store
            .create_post(&sample_post("hello", &["old", "shared"]))
            .await
            .unwrap();

        let update = PostUpdate {
            title: "Hello Again".to_string(),
            content: "# Hi again".to_string(),
            featured_image: None,
            description: String::new(),
            category: String::new(),
            deploy_hook: None,
            extra: BTreeMap::new(),
            tags: vec!["shared".to_string(), "new".to_string()],
        };
        store.update_post("hello", &update).await.unwrap();

        let post = store.get_post("hello").await.unwrap();
        assert_eq!(post.title, "Hello Again");
        // Exactly the new set - replace, not merge
        assert_eq!(post.tags, vec!["new", "shared"]);
        assert!(post.updated_at >= post.published_at);
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let (_dir, store) = open_store().await;

        let update = PostUpdate {
            title: "X".to_string(),
            content: "Y".to_string(),
            featured_image: None,
            description: String::new(),
            category: String::new(),
            deploy_hook: None,
            extra: BTreeMap::new(),
            tags: Vec::new(),
        };
        let err = store.update_post("ghost", &update).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_cascades_tags_and_images() {
        let (_dir, store) = open_store().await;

        let mut new = sample_post("doomed", &["tagged"]);
        new.file_path = Some("posts/2025-01-01-doomed.md".to_string());
        let post_id = store.create_post(&new).await.unwrap();

        store
            .add_image(&NewImage {
                post_id,
                filename: "cover.png".to_string(),
                path: "images/cover.png".to_string(),
                kind: ImageKind::Featured,
            })
            .await
            .unwrap();

        let file_path = store.delete_post("doomed").await.unwrap();
        assert_eq!(file_path.as_deref(), Some("posts/2025-01-01-doomed.md"));

        let err = store.get_post("doomed").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert!(store.post_images(post_id).await.unwrap().is_empty());

        // The tag itself may persist with zero associations
        store.create_post(&sample_post("revived", &["tagged"])).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let (_dir, store) = open_store().await;
        let err = store.delete_post("ghost").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_orders_newest_first() {
        let (_dir, store) = open_store().await;

        let mut older = sample_post("older", &[]);
        older.published_at = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let mut newer = sample_post("newer", &[]);
        newer.published_at = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();

        store.create_post(&older).await.unwrap();
        store.create_post(&newer).await.unwrap();

        let posts = store.list_posts(&ListFilter::default()).await.unwrap();
        let slugs: Vec<_> = posts.iter().map(|p| p.slug.as_str()).collect();
        assert_eq!(slugs, vec!["newer", "older"]);
    }

    #[tokio::test]
    async fn test_list_filters_by_tag() {
        let (_dir, store) = open_store().await;

        store
            .create_post(&sample_post("hello-world", &["intro", "test"]))
            .await
            .unwrap();
        store.create_post(&sample_post("other", &["misc"])).await.unwrap();

        let intro = store
            .list_posts(&ListFilter {
                tag: Some("intro".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(intro.len(), 1);
        assert_eq!(intro[0].slug, "hello-world");
        // Aggregated tags include all of the post's tags, not just the filter
        assert_eq!(intro[0].tags, vec!["intro", "test"]);

        let none = store
            .list_posts(&ListFilter {
                tag: Some("nomatch".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_list_filters_by_kind() {
        let (_dir, store) = open_store().await;

        store.create_post(&sample_post("an-article", &[])).await.unwrap();
        let mut deck = sample_post("a-deck", &[]);
        deck.kind = PostKind::Marp;
        store.create_post(&deck).await.unwrap();

        let decks = store
            .list_posts(&ListFilter {
                kind: Some(PostKind::Marp),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(decks.len(), 1);
        assert_eq!(decks[0].slug, "a-deck");
    }

    #[tokio::test]
    async fn test_list_pagination() {
        let (_dir, store) = open_store().await;

        for i in 0..5 {
            let mut post = sample_post(&format!("post-{i}"), &[]);
            post.published_at = Utc.with_ymd_and_hms(2025, 1, 1 + i, 0, 0, 0).unwrap();
            store.create_post(&post).await.unwrap();
        }

        let page = store
            .list_posts(&ListFilter {
                limit: Some(2),
                offset: Some(1),
                ..Default::default()
            })
            .await
            .unwrap();
        let slugs: Vec<_> = page.iter().map(|p| p.slug.as_str()).collect();
        assert_eq!(slugs, vec!["post-3", "post-2"]);
    }

    #[tokio::test]
    async fn test_find_by_file_path() {
        let (_dir, store) = open_store().await;

        let mut new = sample_post("mirrored", &["x"]);
        new.file_path = Some("/watched/mirrored.md".to_string());
        store.create_post(&new).await.unwrap();

        let found = store
            .find_by_file_path("/watched/mirrored.md")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.slug, "mirrored");
        assert_eq!(found.tags, vec!["x"]);

        assert!(store.find_by_file_path("/nowhere.md").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_file_path() {
        let (_dir, store) = open_store().await;

        let id = store.create_post(&sample_post("late-mirror", &[])).await.unwrap();
        store
            .set_file_path(id, "posts/2025-02-23-late-mirror.md")
            .await
            .unwrap();

        let post = store.get_post("late-mirror").await.unwrap();
        assert_eq!(
            post.file_path.as_deref(),
            Some("posts/2025-02-23-late-mirror.md")
        );
    }

    #[tokio::test]
    async fn test_image_crud() {
        let (_dir, store) = open_store().await;

        let post_id = store.create_post(&sample_post("pics", &[])).await.unwrap();
        let image_id = store
            .add_image(&NewImage {
                post_id,
                filename: "diagram.png".to_string(),
                path: "images/diagram.png".to_string(),
                kind: ImageKind::Content,
            })
            .await
            .unwrap();

        let image = store.get_image(image_id).await.unwrap();
        assert_eq!(image.filename, "diagram.png");
        assert_eq!(image.kind, ImageKind::Content);

        let listed = store.post_images(post_id).await.unwrap();
        assert_eq!(listed.len(), 1);

        store.delete_image(image_id).await.unwrap();
        let err = store.get_image(image_id).await.unwrap_err();
        assert!(matches!(err, StoreError::ImageNotFound(_)));

        let err = store.delete_image(image_id).await.unwrap_err();
        assert!(matches!(err, StoreError::ImageNotFound(_)));
    }

    #[tokio::test]
    async fn test_extra_metadata_round_trip() {
        let (_dir, store) = open_store().await;

        let mut new = sample_post("extras", &[]);
        new.extra.insert("series".to_string(), "rust-basics".to_string());
        store.create_post(&new).await.unwrap();

        let post = store.get_post("extras").await.unwrap();
        assert_eq!(post.extra.get("series").map(String::as_str), Some("rust-basics"));
    }
}
