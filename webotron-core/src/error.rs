use std::path::PathBuf;
use thiserror::Error;

use crate::report::SyncReport;

/// Failure reported by a [`RemoteStore`](crate::store::RemoteStore) call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{op} {target}/{key}: {reason}")]
pub struct TransferError {
    pub op: &'static str,
    pub target: String,
    /// Object key, or a short description of the key set for batch calls.
    pub key: String,
    pub reason: String,
}

impl TransferError {
    pub fn new(
        op: &'static str,
        target: impl Into<String>,
        key: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self { op, target: target.into(), key: key.into(), reason: reason.into() }
    }

    /// Wrap an `anyhow` chain, keeping every context layer in the reason.
    pub fn from_anyhow(
        op: &'static str,
        target: impl Into<String>,
        key: impl Into<String>,
        err: anyhow::Error,
    ) -> Self {
        Self::new(op, target, key, format!("{:#}", err))
    }
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("walk {}: {reason}", .root.display())]
    Walk { root: PathBuf, reason: String },

    #[error("fingerprint {}: {source}", .path.display())]
    Fingerprint {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error("sync aborted after transfer failure: {source}")]
    Aborted {
        #[source]
        source: TransferError,
        report: Box<SyncReport>,
    },

    #[error("config: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;
