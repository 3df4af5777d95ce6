//! Service configuration management for `mdpress.toml`.
//!
//! # Sections
//!
//! | Section      | Purpose                                        |
//! |--------------|------------------------------------------------|
//! | `[content]`  | Content root holding the mirrored file tree    |
//! | `[database]` | SQLite database file location                  |
//! | `[serve]`    | HTTP server (interface, port)                  |
//! | `[watch]`    | Poll interval, directories watched at startup  |
//! | `[deploy]`   | Default deploy-hook URL                        |
//!
//! # Example
//!
//! ```toml
//! [content]
//! root = "content"
//!
//! [database]
//! path = "db/mdpress.sqlite3"
//!
//! [serve]
//! port = 3001
//!
//! [watch]
//! interval_secs = 5
//! dirs = ["~/notes/inbox"]
//!
//! [deploy]
//! hook_url = "https://api.vercel.com/v1/integrations/deploy/..."
//! ```

mod defaults;
mod error;

pub use error::ConfigError;

use educe::Educe;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Result, bail};

// ============================================================================
// Sections
// ============================================================================

/// `[content]` section - where the mirrored Markdown tree lives.
///
/// Posts are written under `root/posts/`, slide decks under
/// `root/presentations/`, uploaded images under `root/images/`.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct ContentConfig {
    /// Content root directory (default: `content`)
    #[serde(default = "defaults::content::root")]
    #[educe(Default = defaults::content::root())]
    pub root: PathBuf,
}

/// `[database]` section - SQLite file location.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Database file path (default: `db/mdpress.sqlite3`)
    #[serde(default = "defaults::database::path")]
    #[educe(Default = defaults::database::path())]
    pub path: PathBuf,
}

/// `[serve]` section - HTTP server settings.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct ServeConfig {
    /// Network interface to bind.
    /// - `127.0.0.1` (default): localhost only
    /// - `0.0.0.0`: all interfaces (LAN accessible)
    #[serde(default = "defaults::serve::interface")]
    #[educe(Default = defaults::serve::interface())]
    pub interface: String,

    /// HTTP port number (default: 3001).
    #[serde(default = "defaults::serve::port")]
    #[educe(Default = defaults::serve::port())]
    pub port: u16,
}

/// `[watch]` section - polling watcher settings.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct WatchConfig {
    /// Seconds between directory scans (default: 5).
    #[serde(default = "defaults::watch::interval_secs")]
    #[educe(Default = defaults::watch::interval_secs())]
    pub interval_secs: u64,

    /// Directories to start watching when the server starts.
    #[serde(default = "defaults::watch::dirs")]
    #[educe(Default = defaults::watch::dirs())]
    pub dirs: Vec<PathBuf>,
}

/// `[deploy]` section - outbound redeploy trigger.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct DeployConfig {
    /// Webhook POSTed after each successful publish. A per-request
    /// `deployHook` in the publish metadata overrides this.
    #[serde(default = "defaults::deploy::hook_url")]
    #[educe(Default = defaults::deploy::hook_url())]
    pub hook_url: Option<String>,
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure representing mdpress.toml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Absolute path to the config file (set after loading)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Project root directory (set from the CLI after loading)
    #[serde(skip)]
    root: Option<PathBuf>,

    /// Content tree settings
    #[serde(default)]
    pub content: ContentConfig,

    /// Database settings
    #[serde(default)]
    pub database: DatabaseConfig,

    /// HTTP server settings
    #[serde(default)]
    pub serve: ServeConfig,

    /// Directory watcher settings
    #[serde(default)]
    pub watch: WatchConfig,

    /// Deployment settings
    #[serde(default)]
    pub deploy: DeployConfig,
}

impl AppConfig {
    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Load configuration from file path
    pub fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        Self::from_str(&content)
    }

    /// Get the root directory path
    pub fn get_root(&self) -> &Path {
        self.root.as_deref().unwrap_or(Path::new("./"))
    }

    /// Anchor all relative paths at `root` and normalize them to absolute.
    ///
    /// Watch directories additionally get `~` expanded, since they usually
    /// point outside the project tree.
    pub fn anchor_at(&mut self, root: &Path, config_file: &Path) {
        let root = Self::normalize_path(root);

        self.config_path = Self::normalize_path(&root.join(config_file));
        self.content.root = Self::normalize_path(&root.join(&self.content.root));
        self.database.path = Self::normalize_path(&root.join(&self.database.path));

        self.watch.dirs = self
            .watch
            .dirs
            .iter()
            .map(|dir| {
                let expanded = shellexpand::tilde(&dir.to_string_lossy()).into_owned();
                Self::normalize_path(&root.join(expanded))
            })
            .collect();

        self.root = Some(root);
    }

    /// Normalize a path to absolute, using canonicalize if the path exists
    fn normalize_path(path: &Path) -> PathBuf {
        path.canonicalize().unwrap_or_else(|_| {
            // For non-existent paths, manually make them absolute
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                std::env::current_dir()
                    .map(|cwd| cwd.join(path))
                    .unwrap_or_else(|_| path.to_path_buf())
            }
        })
    }

    /// Validate configuration before running a command
    pub fn validate(&self) -> Result<()> {
        if self.watch.interval_secs == 0 {
            bail!(ConfigError::Validation(
                "[watch.interval_secs] must be at least 1".into()
            ));
        }

        if let Some(url) = &self.deploy.hook_url
            && !url.starts_with("http")
        {
            bail!(ConfigError::Validation(
                "[deploy.hook_url] must start with http:// or https://".into()
            ));
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str_defaults() {
        let config = AppConfig::from_str("").unwrap();

        assert_eq!(config.content.root, PathBuf::from("content"));
        assert_eq!(config.database.path, PathBuf::from("db/mdpress.sqlite3"));
        assert_eq!(config.serve.interface, "127.0.0.1");
        assert_eq!(config.serve.port, 3001);
        assert_eq!(config.watch.interval_secs, 5);
        assert!(config.watch.dirs.is_empty());
        assert!(config.deploy.hook_url.is_none());
    }

    #[test]
    fn test_from_str_all_sections() {
        let config = AppConfig::from_str(
            r#"
            [content]
            root = "posts-tree"

            [database]
            path = "state/blog.sqlite3"

            [serve]
            interface = "0.0.0.0"
            port = 8080

            [watch]
            interval_secs = 30
            dirs = ["inbox", "/abs/notes"]

            [deploy]
            hook_url = "https://example.com/hook"
        "#,
        )
        .unwrap();

        assert_eq!(config.content.root, PathBuf::from("posts-tree"));
        assert_eq!(config.database.path, PathBuf::from("state/blog.sqlite3"));
        assert_eq!(config.serve.interface, "0.0.0.0");
        assert_eq!(config.serve.port, 8080);
        assert_eq!(config.watch.interval_secs, 30);
        assert_eq!(config.watch.dirs.len(), 2);
        assert_eq!(config.deploy.hook_url.as_deref(), Some("https://example.com/hook"));
    }

    #[test]
    fn test_unknown_field_rejection() {
        let result = AppConfig::from_str(
            r#"
            [serve]
            unknown_field = "should_fail"
        "#,
        );
        assert!(result.is_err());

        let result = AppConfig::from_str(
            r#"
            [unknown_section]
            field = "value"
        "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let config = AppConfig::from_str(
            r#"
            [watch]
            interval_secs = 0
        "#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_non_http_hook() {
        let config = AppConfig::from_str(
            r#"
            [deploy]
            hook_url = "ftp://example.com/hook"
        "#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_defaults() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_anchor_at_makes_paths_absolute() {
        let mut config = AppConfig::from_str("").unwrap();
        config.anchor_at(Path::new("/srv/blog"), Path::new("mdpress.toml"));

        assert_eq!(config.get_root(), Path::new("/srv/blog"));
        assert_eq!(config.config_path, PathBuf::from("/srv/blog/mdpress.toml"));
        assert_eq!(config.content.root, PathBuf::from("/srv/blog/content"));
        assert_eq!(
            config.database.path,
            PathBuf::from("/srv/blog/db/mdpress.sqlite3")
        );
    }

    #[test]
    fn test_anchor_at_keeps_absolute_watch_dirs() {
        let mut config = AppConfig::from_str(
            r#"
            [watch]
            dirs = ["/abs/notes"]
        "#,
        )
        .unwrap();
        config.anchor_at(Path::new("/srv/blog"), Path::new("mdpress.toml"));

        assert_eq!(config.watch.dirs, vec![PathBuf::from("/abs/notes")]);
    }

    #[test]
    fn test_default_serializes() {
        // `init` writes the default config with toml::to_string_pretty;
        // the skipped fields must not break serialization
        let rendered = toml::to_string_pretty(&AppConfig::default()).unwrap();
        assert!(rendered.contains("[content]"));
        assert!(rendered.contains("[serve]"));
    }
}
