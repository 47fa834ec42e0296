//! Branch snapshots: a branch's file tree plus its git identity.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Serializable identity of a branch under evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BranchInfo {
    /// Display name (e.g. "main", "feature/routing").
    pub name: String,

    /// Absolute path of the branch checkout.
    pub path: PathBuf,

    /// Git HEAD hash, or "unknown" when git metadata was unavailable.
    pub commit_hash: String,

    /// First line of the HEAD commit message (may be empty).
    pub commit_message: String,

    /// When the snapshot was taken.
    pub timestamp: DateTime<Utc>,
}

/// Read-only view of one branch's file tree.
///
/// File contents are read on first access and cached, including misses, so
/// every evaluator sees the same bytes for the lifetime of the snapshot.
#[derive(Debug)]
pub struct BranchSnapshot {
    info: BranchInfo,
    cache: Mutex<HashMap<PathBuf, Option<Arc<str>>>>,
}

impl BranchSnapshot {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        commit_hash: impl Into<String>,
        commit_message: impl Into<String>,
    ) -> Self {
        Self {
            info: BranchInfo {
                name: name.into(),
                path: path.into(),
                commit_hash: commit_hash.into(),
                commit_message: commit_message.into(),
                timestamp: Utc::now(),
            },
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn info(&self) -> &BranchInfo {
        &self.info
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn path(&self) -> &Path {
        &self.info.path
    }

    /// Read a file relative to the branch root.
    ///
    /// Returns `None` for missing or non-UTF-8 files; the miss is cached too.
    pub fn read_file(&self, rel: impl AsRef<Path>) -> Option<Arc<str>> {
        let rel = rel.as_ref();
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(hit) = cache.get(rel) {
            return hit.clone();
        }

        let content = if rel.is_absolute() {
            None
        } else {
            std::fs::read_to_string(self.info.path.join(rel))
                .ok()
                .map(Arc::from)
        };
        debug!(branch = %self.info.name, file = %rel.display(), found = content.is_some(), "read file");
        cache.insert(rel.to_path_buf(), content.clone());
        content
    }

    /// List files under `rel_dir` (recursively), relative to the branch root,
    /// sorted. When `extension` is set only matching files are returned.
    pub fn list_files(&self, rel_dir: impl AsRef<Path>, extension: Option<&str>) -> Vec<PathBuf> {
        let root = self.info.path.join(rel_dir.as_ref());
        let mut files: Vec<PathBuf> = walk_files(&root)
            .into_iter()
            .filter(|p| match extension {
                Some(ext) => p.extension().is_some_and(|e| e == ext),
                None => true,
            })
            .filter_map(|p| p.strip_prefix(&self.info.path).ok().map(Path::to_path_buf))
            .collect();
        files.sort();
        files
    }
}

/// Recursive directory walk. Unreadable directories and symlinks are
/// skipped so the walk stays inside the branch and terminates.
fn walk_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let Ok(entries) = std::fs::read_dir(dir) else {
        return files;
    };
    for entry in entries.flatten() {
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            files.extend(walk_files(&entry.path()));
        } else if file_type.is_file() {
            files.push(entry.path());
        }
    }
    files
}
