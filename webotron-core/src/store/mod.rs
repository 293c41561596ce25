use std::collections::{BTreeMap, BTreeSet};

use crate::error::TransferError;

pub mod dir;
pub mod memory;

pub use dir::DirStore;
pub use memory::MemoryStore;

/// Largest batch most object stores accept in one delete request.
pub const DEFAULT_MAX_DELETE_BATCH: usize = 1000;

/// Key -> remote fingerprint snapshot of a target.
pub type RemoteManifest = BTreeMap<String, String>;

/// The object-store operations the sync engine needs.
///
/// Implementations own pagination, sessions and retries.
pub trait RemoteStore: Send + Sync {
    /// Every object currently in `target` with its checksum as the store reports it.
    fn list_all(&self, target: &str) -> Result<RemoteManifest, TransferError>;

    fn upload(
        &self,
        target: &str,
        key: &str,
        content: &[u8],
        content_type: &str,
    ) -> Result<(), TransferError>;

    /// Remove `keys` from `target`. An empty set is a no-op.
    fn delete_many(&self, target: &str, keys: &BTreeSet<String>) -> Result<(), TransferError>;

    fn max_delete_batch(&self) -> usize {
        DEFAULT_MAX_DELETE_BATCH
    }
}

impl<S: RemoteStore + ?Sized> RemoteStore for &S {
    fn list_all(&self, target: &str) -> Result<RemoteManifest, TransferError> {
        (**self).list_all(target)
    }

    fn upload(
        &self,
        target: &str,
        key: &str,
        content: &[u8],
        content_type: &str,
    ) -> Result<(), TransferError> {
        (**self).upload(target, key, content, content_type)
    }

    fn delete_many(&self, target: &str, keys: &BTreeSet<String>) -> Result<(), TransferError> {
        (**self).delete_many(target, keys)
    }

    fn max_delete_batch(&self) -> usize {
        (**self).max_delete_batch()
    }
}

/// Short label for a key set in error messages.
pub(crate) fn describe_keys(keys: &BTreeSet<String>) -> String {
    match keys.len() {
        0 => "<none>".to_string(),
        1 => keys.iter().next().cloned().unwrap_or_default(),
        n => format!("<{n} keys>"),
    }
}
