//! Workspace initialization.
//!
//! Creates the content tree, the database directory and a default config.

use crate::{config::AppConfig, log};
use anyhow::{Context, Result, bail};
use std::{fs, path::Path};

/// Default config filename
const CONFIG_FILE: &str = "mdpress.toml";

/// Default workspace directory structure
const WORKSPACE_DIRS: &[&str] = &[
    "content/posts",
    "content/presentations",
    "content/images",
    "db",
];

/// Create a new publishing workspace with default structure
pub fn new_workspace(root: &Path, has_name: bool) -> Result<()> {
    // Safety check: if no name was provided (init in current dir),
    // the directory must be completely empty
    if !has_name && !is_dir_empty(root)? {
        bail!(
            "Current directory is not empty. Use `mdpress init <NAME>` to create in a subdirectory."
        );
    }

    init_structure(root)?;
    init_default_config(root)?;
    log!("init"; "workspace ready at {}", root.display());

    Ok(())
}

/// Check if a directory is completely empty
fn is_dir_empty(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(true);
    }
    Ok(fs::read_dir(path)?.next().is_none())
}

/// Create workspace directory structure
fn init_structure(root: &Path) -> Result<()> {
    for dir in WORKSPACE_DIRS {
        let path = root.join(dir);
        if path.exists() {
            bail!(
                "Path `{}` already exists. Try `mdpress init <NAME>` instead.",
                path.display()
            );
        }
        fs::create_dir_all(&path).with_context(|| format!("Failed to create {}", path.display()))?;
    }
    Ok(())
}

/// Write default configuration file
fn init_default_config(root: &Path) -> Result<()> {
    let content = toml::to_string_pretty(&AppConfig::default())?;
    fs::write(root.join(CONFIG_FILE), content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_new_workspace_scaffolds_layout() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("blog");

        new_workspace(&root, true).unwrap();

        assert!(root.join("content/posts").is_dir());
        assert!(root.join("content/presentations").is_dir());
        assert!(root.join("content/images").is_dir());
        assert!(root.join("db").is_dir());

        let config = AppConfig::from_path(&root.join(CONFIG_FILE)).unwrap();
        assert_eq!(config.serve.port, 3001);
    }

    #[test]
    fn test_new_workspace_refuses_non_empty_dir() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("stray.txt"), "x").unwrap();

        assert!(new_workspace(dir.path(), false).is_err());
    }

    #[test]
    fn test_new_workspace_refuses_existing_structure() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("blog");
        new_workspace(&root, true).unwrap();

        assert!(new_workspace(&root, true).is_err());
    }
}
