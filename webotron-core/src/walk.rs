use globset::GlobSet;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Result, SyncError};
use crate::path_safety::path_to_key;

/// A regular file found under the sync root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalFile {
    pub path: PathBuf,
    /// Path relative to the root, `/`-separated.
    pub key: String,
    pub size: u64,
}

pub type FileIter<'a> = Box<dyn Iterator<Item = Result<LocalFile>> + 'a>;

/// Source of the local file list. A fresh walk is issued for every run.
pub trait Walker: Send + Sync {
    fn walk<'a>(&'a self, root: &'a Path) -> Result<FileIter<'a>>;
}

/// Depth-first walk over the local filesystem.
///
/// Only regular files are yielded. Symlinks are neither followed nor
/// yielded, and devices, fifos and sockets are skipped.
#[derive(Clone, Debug)]
pub struct DirWalker {
    exclude: GlobSet,
}

impl Default for DirWalker {
    fn default() -> Self {
        Self { exclude: GlobSet::empty() }
    }
}

impl DirWalker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_exclude(exclude: GlobSet) -> Self {
        Self { exclude }
    }
}

fn walk_error(root: &Path, reason: impl ToString) -> SyncError {
    SyncError::Walk { root: root.to_path_buf(), reason: reason.to_string() }
}

impl Walker for DirWalker {
    fn walk<'a>(&'a self, root: &'a Path) -> Result<FileIter<'a>> {
        let md = std::fs::metadata(root).map_err(|e| walk_error(root, e))?;
        if !md.is_dir() {
            return Err(walk_error(root, "not a directory"));
        }
        let it = walkdir::WalkDir::new(root)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(move |ent| {
                let ent = match ent {
                    Ok(e) => e,
                    Err(e) => return Some(Err(walk_error(root, e))),
                };
                if !ent.file_type().is_file() {
                    if ent.file_type().is_symlink() {
                        debug!(path = %ent.path().display(), "skipping symlink");
                    }
                    return None;
                }
                // Non-UTF-8 names have no faithful key; fail the walk.
                let key = match path_to_key(root, ent.path()) {
                    Ok(k) => k,
                    Err(e) => return Some(Err(walk_error(root, format!("{e:#}")))),
                };
                if self.exclude.is_match(&key) {
                    debug!(%key, "excluded");
                    return None;
                }
                let size = match ent.metadata() {
                    Ok(m) => m.len(),
                    Err(e) => return Some(Err(walk_error(root, e))),
                };
                Some(Ok(LocalFile { path: ent.into_path(), key, size }))
            });
        Ok(Box::new(it))
    }
}
