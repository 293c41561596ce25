use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, SyncError};
use crate::fingerprint::DEFAULT_CHUNK_SIZE;

/// What to do when an upload or delete call fails.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Record the failed key and keep going.
    #[default]
    Continue,
    /// Stop starting new uploads, skip deletion, return `SyncError::Aborted`.
    Abort,
}

/// How zero-length files are compared against the manifest.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EmptyFilePolicy {
    /// Empty files have no fingerprint and are uploaded on every run.
    #[default]
    AlwaysUpload,
    /// Empty files compare as the MD5 of empty input.
    HashEmpty,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct SyncConfig {
    /// Multipart part size the remote used when computing its checksums.
    pub chunk_size: usize,
    /// 1 = sequential, 0 = rayon default, n = pool of n threads.
    pub jobs: usize,
    /// Globs matched against relative keys; matches are neither uploaded nor deleted.
    pub exclude: Vec<String>,
    pub error_policy: ErrorPolicy,
    pub empty_files: EmptyFilePolicy,
    pub progress: bool,
    /// Lower the delete batch size below the store's maximum.
    pub delete_batch_size: Option<usize>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            jobs: 1,
            exclude: Vec::new(),
            error_policy: ErrorPolicy::Continue,
            empty_files: EmptyFilePolicy::AlwaysUpload,
            progress: false,
            delete_batch_size: None,
        }
    }
}

impl SyncConfig {
    pub fn from_json_str(s: &str) -> Result<Self> {
        let cfg: SyncConfig =
            serde_json::from_str(s).map_err(|e| SyncError::Config(format!("parse: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path)
            .map_err(|e| SyncError::Config(format!("read {}: {e}", path.display())))?;
        Self::from_json_str(&s)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(SyncError::Config("chunk_size must be positive".into()));
        }
        if self.delete_batch_size == Some(0) {
            return Err(SyncError::Config("delete_batch_size must be positive".into()));
        }
        self.exclude_set()?;
        Ok(())
    }

    pub fn exclude_set(&self) -> Result<GlobSet> {
        let mut b = GlobSetBuilder::new();
        for g in &self.exclude {
            let glob =
                Glob::new(g).map_err(|e| SyncError::Config(format!("exclude {g:?}: {e}")))?;
            b.add(glob);
        }
        b.build().map_err(|e| SyncError::Config(format!("exclude set: {e}")))
    }

    /// Effective delete batch size given the store's hard limit.
    pub fn delete_batch(&self, store_max: usize) -> usize {
        let store_max = store_max.max(1);
        self.delete_batch_size.map_or(store_max, |n| n.clamp(1, store_max))
    }
}
