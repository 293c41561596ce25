use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{describe_keys, RemoteManifest, RemoteStore, DEFAULT_MAX_DELETE_BATCH};
use crate::error::TransferError;
use crate::fingerprint::{fingerprint_bytes, Fingerprint, DEFAULT_CHUNK_SIZE};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    pub content: Vec<u8>,
    pub content_type: String,
    pub fingerprint: String,
}

/// One call made against the store, in call order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreCall {
    List { target: String },
    Upload { target: String, key: String },
    DeleteMany { target: String, keys: BTreeSet<String> },
}

#[derive(Default)]
struct State {
    targets: BTreeMap<String, BTreeMap<String, StoredObject>>,
    calls: Vec<StoreCall>,
    fail_uploads: HashSet<String>,
    fail_deletes: bool,
    fail_list: bool,
}

/// In-process object store.
///
/// Uploads are checksummed the way a multipart uploader with `part_size`
/// parts would be, so listings look like a real bucket's.
pub struct MemoryStore {
    part_size: usize,
    max_batch: usize,
    state: Mutex<State>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_part_size(DEFAULT_CHUNK_SIZE)
    }

    pub fn with_part_size(part_size: usize) -> Self {
        Self {
            part_size: part_size.max(1),
            max_batch: DEFAULT_MAX_DELETE_BATCH,
            state: Mutex::new(State::default()),
        }
    }

    pub fn with_max_delete_batch(mut self, n: usize) -> Self {
        self.max_batch = n.max(1);
        self
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed an object with an arbitrary fingerprint, bypassing checksumming.
    pub fn insert_raw(&self, target: &str, key: &str, fingerprint: &str) {
        let obj = StoredObject {
            content: Vec::new(),
            content_type: "application/octet-stream".into(),
            fingerprint: fingerprint.into(),
        };
        self.lock().targets.entry(target.into()).or_default().insert(key.into(), obj);
    }

    pub fn get(&self, target: &str, key: &str) -> Option<StoredObject> {
        self.lock().targets.get(target).and_then(|t| t.get(key)).cloned()
    }

    pub fn keys(&self, target: &str) -> BTreeSet<String> {
        self.lock().targets.get(target).map(|t| t.keys().cloned().collect()).unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn uploaded_keys(&self) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                StoreCall::Upload { key, .. } => Some(key.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn delete_batches(&self) -> Vec<BTreeSet<String>> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                StoreCall::DeleteMany { keys, .. } => Some(keys.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn fail_upload_of(&self, key: &str) {
        self.lock().fail_uploads.insert(key.into());
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.lock().fail_deletes = fail;
    }

    pub fn fail_list(&self, fail: bool) {
        self.lock().fail_list = fail;
    }
}

impl RemoteStore for MemoryStore {
    fn list_all(&self, target: &str) -> Result<RemoteManifest, TransferError> {
        let mut st = self.lock();
        st.calls.push(StoreCall::List { target: target.into() });
        if st.fail_list {
            return Err(TransferError::new("list", target, "*", "injected list failure"));
        }
        Ok(st
            .targets
            .get(target)
            .map(|t| t.iter().map(|(k, o)| (k.clone(), o.fingerprint.clone())).collect())
            .unwrap_or_default())
    }

    fn upload(
        &self,
        target: &str,
        key: &str,
        content: &[u8],
        content_type: &str,
    ) -> Result<(), TransferError> {
        let mut st = self.lock();
        st.calls.push(StoreCall::Upload { target: target.into(), key: key.into() });
        if st.fail_uploads.contains(key) {
            return Err(TransferError::new("upload", target, key, "injected upload failure"));
        }
        let fingerprint = fingerprint_bytes(content, self.part_size)
            .unwrap_or_else(Fingerprint::empty)
            .into_string();
        let obj = StoredObject {
            content: content.to_vec(),
            content_type: content_type.into(),
            fingerprint,
        };
        st.targets.entry(target.into()).or_default().insert(key.into(), obj);
        Ok(())
    }

    fn delete_many(&self, target: &str, keys: &BTreeSet<String>) -> Result<(), TransferError> {
        if keys.is_empty() {
            return Ok(());
        }
        if keys.len() > self.max_batch {
            return Err(TransferError::new(
                "delete",
                target,
                describe_keys(keys),
                format!("batch of {} exceeds limit {}", keys.len(), self.max_batch),
            ));
        }
        let mut st = self.lock();
        st.calls.push(StoreCall::DeleteMany { target: target.into(), keys: keys.clone() });
        if st.fail_deletes {
            return Err(TransferError::new(
                "delete",
                target,
                describe_keys(keys),
                "injected delete failure",
            ));
        }
        if let Some(objects) = st.targets.get_mut(target) {
            for k in keys {
                objects.remove(k);
            }
        }
        Ok(())
    }

    fn max_delete_batch(&self) -> usize {
        self.max_batch
    }
}
