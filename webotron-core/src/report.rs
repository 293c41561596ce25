use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum FailedOp {
    Fingerprint,
    Upload,
    Delete,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct FailedKey {
    pub key: String,
    pub op: FailedOp,
    pub error: String,
}

/// Per-key outcome of one sync run. Key lists are sorted.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub target: String,
    pub local_root: String,
    pub started_utc: String,
    pub finished_utc: String,
    pub scanned: u64,
    pub bytes_uploaded: u64,
    pub uploaded: Vec<String>,
    pub skipped: Vec<String>,
    pub deleted: Vec<String>,
    pub failed: Vec<FailedKey>,
    /// Keys never processed because the run was cancelled or aborted.
    pub not_attempted: Vec<String>,
    /// Remote keys that would have been deleted but were left alone.
    pub delete_skipped: Vec<String>,
    pub cancelled: bool,
    pub aborted: bool,
}

impl SyncReport {
    /// True when remote now mirrors local exactly.
    pub fn is_complete(&self) -> bool {
        !self.cancelled
            && !self.aborted
            && self.failed.is_empty()
            && self.not_attempted.is_empty()
            && self.delete_skipped.is_empty()
    }

    /// Keys a follow-up run has to touch again.
    pub fn retry_keys(&self) -> BTreeSet<String> {
        self.failed
            .iter()
            .map(|f| f.key.clone())
            .chain(self.not_attempted.iter().cloned())
            .chain(self.delete_skipped.iter().cloned())
            .collect()
    }

    pub fn failed_for(&self, op: FailedOp) -> Vec<&str> {
        self.failed.iter().filter(|f| f.op == op).map(|f| f.key.as_str()).collect()
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub(crate) fn finish(&mut self) {
        self.uploaded.sort();
        self.skipped.sort();
        self.deleted.sort();
        self.not_attempted.sort();
        self.delete_skipped.sort();
        self.failed.sort_by(|a, b| a.key.cmp(&b.key).then(a.op.cmp(&b.op)));
        self.finished_utc = chrono::Utc::now().to_rfc3339();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_only_without_failures_or_leftovers() {
        let mut r = SyncReport::default();
        assert!(r.is_complete());
        r.failed.push(FailedKey { key: "a".into(), op: FailedOp::Upload, error: "x".into() });
        assert!(!r.is_complete());
        r.failed.clear();
        r.cancelled = true;
        assert!(!r.is_complete());
    }

    #[test]
    fn retry_keys_cover_failed_and_unprocessed() {
        let r = SyncReport {
            failed: vec![FailedKey { key: "b".into(), op: FailedOp::Delete, error: "x".into() }],
            not_attempted: vec!["c".into()],
            delete_skipped: vec!["d".into()],
            uploaded: vec!["a".into()],
            ..Default::default()
        };
        let keys: Vec<_> = r.retry_keys().into_iter().collect();
        assert_eq!(keys, ["b", "c", "d"]);
    }

    #[test]
    fn json_uses_snake_case_ops() {
        let r = SyncReport {
            failed: vec![FailedKey {
                key: "a".into(),
                op: FailedOp::Fingerprint,
                error: "denied".into(),
            }],
            ..Default::default()
        };
        let s = r.to_json_pretty().unwrap();
        assert!(s.contains("\"fingerprint\""));
    }
}
