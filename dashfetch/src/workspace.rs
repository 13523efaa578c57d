//! Per-job scratch directories.
//!
//! Each job gets a fresh directory named `temp_<asset>_<random>` under a
//! staging root. The random suffix comes from `tempfile`, which creates the
//! directory exclusively, so two jobs for the same asset never share a path.
//!
//! A [`Workspace`] is released exactly once: explicitly through
//! [`Workspace::release`], or on drop if the owner unwinds early.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, warn};

use crate::naming::sanitize_filename;

/// Longest asset-derived fragment kept in a workspace name.
const MAX_KEY_LEN: usize = 48;

/// Errors that can occur allocating or releasing a workspace.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// The staging root could not be created.
    #[error("failed to create staging directory {}: {source}", path.display())]
    CreateRoot { path: PathBuf, source: io::Error },

    /// The scratch directory could not be created.
    #[error("failed to allocate workspace in {}: {source}", root.display())]
    Allocate { root: PathBuf, source: io::Error },

    /// The scratch directory could not be removed.
    #[error("failed to remove workspace {}: {source}", path.display())]
    Release { path: PathBuf, source: io::Error },
}

/// Allocates per-job scratch directories under a staging root.
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
}

impl WorkspaceManager {
    /// Create a manager that allocates under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The staging root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Allocate a fresh workspace for `asset_key`.
    ///
    /// The key only makes the directory recognizable; uniqueness comes from
    /// the random suffix.
    pub fn acquire(&self, asset_key: &str) -> Result<Workspace, WorkspaceError> {
        fs::create_dir_all(&self.root).map_err(|e| WorkspaceError::CreateRoot {
            path: self.root.clone(),
            source: e,
        })?;

        let prefix = format!("temp_{}_", workspace_key(asset_key));
        let dir = tempfile::Builder::new()
            .prefix(&prefix)
            .tempdir_in(&self.root)
            .map_err(|e| WorkspaceError::Allocate {
                root: self.root.clone(),
                source: e,
            })?;

        debug!(path = %dir.path().display(), "Acquired workspace");
        Ok(Workspace { dir: Some(dir) })
    }
}

/// A scratch directory owned by one job.
#[derive(Debug)]
pub struct Workspace {
    dir: Option<TempDir>,
}

impl Workspace {
    /// Path of the scratch directory.
    pub fn path(&self) -> &Path {
        self.dir
            .as_ref()
            .map(TempDir::path)
            .unwrap_or_else(|| Path::new(""))
    }

    /// Location of the initialization block.
    pub fn init_path(&self, extension: &str) -> PathBuf {
        self.path().join(format!("init.{}", extension))
    }

    /// Location of a numbered segment.
    pub fn segment_path(&self, index: u32, extension: &str) -> PathBuf {
        self.path().join(format!("segment_{:03}.{}", index, extension))
    }

    /// Remove the scratch directory and everything in it.
    pub fn release(mut self) -> Result<(), WorkspaceError> {
        match self.dir.take() {
            Some(dir) => close(dir),
            None => Ok(()),
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            if let Err(e) = close(dir) {
                warn!(error = %e, "Workspace cleanup failed");
            }
        }
    }
}

fn close(dir: TempDir) -> Result<(), WorkspaceError> {
    let path = dir.path().to_path_buf();
    dir.close()
        .map_err(|e| WorkspaceError::Release {
            path: path.clone(),
            source: e,
        })
        .map(|_| debug!(path = %path.display(), "Released workspace"))
}

/// Reduce an asset key to a short, filesystem-safe fragment.
fn workspace_key(asset_key: &str) -> String {
    let cleaned: String = sanitize_filename(asset_key)
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .take(MAX_KEY_LEN)
        .collect();
    if cleaned.is_empty() {
        "asset".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_acquire_creates_directory_under_root() {
        let temp = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(temp.path().join("staging"));

        let workspace = manager.acquire("12345").unwrap();

        assert!(workspace.path().is_dir());
        assert!(workspace.path().starts_with(manager.root()));
        let name = workspace.path().file_name().unwrap().to_string_lossy();
        assert!(name.starts_with("temp_12345_"));
    }

    #[test]
    fn test_same_key_never_collides() {
        let temp = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(temp.path());

        let a = manager.acquire("Same Song").unwrap();
        let b = manager.acquire("Same Song").unwrap();

        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn test_release_removes_directory() {
        let temp = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(temp.path());

        let workspace = manager.acquire("track").unwrap();
        let path = workspace.path().to_path_buf();
        fs::write(workspace.segment_path(1, "mp4"), b"data").unwrap();

        workspace.release().unwrap();

        assert!(!path.exists());
    }

    #[test]
    fn test_drop_removes_directory() {
        let temp = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(temp.path());

        let path = {
            let workspace = manager.acquire("track").unwrap();
            fs::write(workspace.init_path("mp4"), b"init").unwrap();
            workspace.path().to_path_buf()
        };

        assert!(!path.exists());
    }

    #[test]
    fn test_unit_paths() {
        let temp = TempDir::new().unwrap();
        let workspace = WorkspaceManager::new(temp.path()).acquire("x").unwrap();

        assert_eq!(workspace.init_path("mp4"), workspace.path().join("init.mp4"));
        assert_eq!(
            workspace.segment_path(7, "mp4"),
            workspace.path().join("segment_007.mp4")
        );
        assert_eq!(
            workspace.segment_path(1234, "m4s"),
            workspace.path().join("segment_1234.m4s")
        );
    }

    #[test]
    fn test_workspace_key_is_filesystem_safe() {
        assert_eq!(workspace_key("a/b:c"), "a_b_c");
        assert_eq!(workspace_key("two words"), "two_words");
        assert_eq!(workspace_key(""), "asset");
        assert_eq!(workspace_key(&"x".repeat(100)).len(), MAX_KEY_LEN);
    }

    #[test]
    fn test_acquire_fails_when_root_is_a_file() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("not-a-dir");
        fs::write(&file, b"").unwrap();

        let err = WorkspaceManager::new(&file).acquire("x").unwrap_err();
        assert!(matches!(
            err,
            WorkspaceError::CreateRoot { .. } | WorkspaceError::Allocate { .. }
        ));
    }
}
