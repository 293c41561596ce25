use anyhow::{bail, Context, Result};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{describe_keys, RemoteManifest, RemoteStore};
use crate::error::TransferError;
use crate::fingerprint::{fingerprint_file, Fingerprint, DEFAULT_CHUNK_SIZE};
use crate::path_safety::key_to_path;
use crate::walk::{DirWalker, Walker};

/// A directory acting as a set of buckets: each target is a subdirectory of
/// `base` and each object a file under it.
///
/// Checksums are recomputed from file contents on every listing using
/// `part_size` chunks.
pub struct DirStore {
    base: PathBuf,
    part_size: usize,
}

impl DirStore {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into(), part_size: DEFAULT_CHUNK_SIZE }
    }

    pub fn with_part_size(mut self, part_size: usize) -> Self {
        self.part_size = part_size.max(1);
        self
    }

    pub fn target_dir(&self, target: &str) -> Result<PathBuf> {
        if target.is_empty() || target.contains(['/', '\\']) || target == "." || target == ".." {
            bail!("invalid target name: {:?}", target);
        }
        Ok(self.base.join(target))
    }

    fn list(&self, target: &str) -> Result<RemoteManifest> {
        let dir = self.target_dir(target)?;
        let mut manifest = RemoteManifest::new();
        if !dir.exists() {
            return Ok(manifest);
        }
        let walker = DirWalker::new();
        for f in walker.walk(&dir).with_context(|| format!("walk {:?}", dir))? {
            let f = f.with_context(|| format!("walk {:?}", dir))?;
            let fp = fingerprint_file(&f.path, self.part_size)
                .with_context(|| format!("checksum {:?}", f.path))?
                .unwrap_or_else(Fingerprint::empty);
            manifest.insert(f.key, fp.into_string());
        }
        Ok(manifest)
    }

    fn put(&self, target: &str, key: &str, content: &[u8]) -> Result<()> {
        let dir = self.target_dir(target)?;
        let path = key_to_path(&dir, key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create dir {:?}", parent))?;
        }
        fs::write(&path, content).with_context(|| format!("write {:?}", path))?;
        Ok(())
    }

    fn remove(&self, target: &str, key: &str) -> Result<()> {
        let dir = self.target_dir(target)?;
        let path = key_to_path(&dir, key)?;
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e).with_context(|| format!("remove {:?}", path)),
        }
        prune_empty_parents(&dir, &path);
        Ok(())
    }
}

/// Drop directories left empty by a delete, stopping at `root`.
fn prune_empty_parents(root: &Path, path: &Path) {
    let mut cur = path.parent();
    while let Some(p) = cur {
        if p == root || !p.starts_with(root) {
            break;
        }
        if fs::remove_dir(p).is_err() {
            break;
        }
        cur = p.parent();
    }
}

impl RemoteStore for DirStore {
    fn list_all(&self, target: &str) -> Result<RemoteManifest, TransferError> {
        self.list(target).map_err(|e| TransferError::from_anyhow("list", target, "*", e))
    }

    fn upload(
        &self,
        target: &str,
        key: &str,
        content: &[u8],
        content_type: &str,
    ) -> Result<(), TransferError> {
        debug!(bucket = target, key, content_type, bytes = content.len(), "dir store put");
        self.put(target, key, content)
            .map_err(|e| TransferError::from_anyhow("upload", target, key, e))
    }

    fn delete_many(&self, target: &str, keys: &BTreeSet<String>) -> Result<(), TransferError> {
        let mut failed = Vec::new();
        for key in keys {
            if let Err(e) = self.remove(target, key) {
                failed.push(format!("{key}: {e:#}"));
            }
        }
        if failed.is_empty() {
            Ok(())
        } else {
            Err(TransferError::new("delete", target, describe_keys(keys), failed.join("; ")))
        }
    }
}
