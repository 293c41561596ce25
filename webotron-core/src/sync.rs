use globset::GlobSet;
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::config::{EmptyFilePolicy, ErrorPolicy, SyncConfig};
use crate::content_type;
use crate::error::{Result, SyncError, TransferError};
use crate::fingerprint::{fingerprint_bytes, Fingerprint};
use crate::progress::Progress;
use crate::report::{FailedKey, FailedOp, SyncReport};
use crate::store::{RemoteManifest, RemoteStore};
use crate::walk::{DirWalker, LocalFile, Walker};

enum Outcome {
    Uploaded(u64),
    Skipped,
    Failed(FailedOp, String),
    NotAttempted,
}

/// State shared by every file of one run.
struct Run<'a> {
    target: &'a str,
    manifest: &'a RemoteManifest,
    cancel: &'a CancelToken,
    /// Set when the abort policy trips; stops new uploads.
    halt: CancelToken,
    first_error: Mutex<Option<TransferError>>,
    progress: Progress,
}

impl Run<'_> {
    fn stopped(&self) -> bool {
        self.cancel.is_cancelled() || self.halt.is_cancelled()
    }

    fn trip(&self, err: &TransferError) {
        let mut slot = self.first_error.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(err.clone());
        }
        self.halt.cancel();
    }

    fn take_error(&self) -> Option<TransferError> {
        self.first_error.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

/// Mirrors a local tree into a remote target.
pub struct SyncEngine<S, W = DirWalker> {
    store: S,
    walker: W,
    config: SyncConfig,
    exclude: GlobSet,
    pool: Option<rayon::ThreadPool>,
}

impl<S: RemoteStore> SyncEngine<S, DirWalker> {
    pub fn new(store: S, config: SyncConfig) -> Result<Self> {
        let walker = DirWalker::with_exclude(config.exclude_set()?);
        Self::with_walker(store, walker, config)
    }
}

impl<S: RemoteStore, W: Walker> SyncEngine<S, W> {
    pub fn with_walker(store: S, walker: W, config: SyncConfig) -> Result<Self> {
        config.validate()?;
        let exclude = config.exclude_set()?;
        let pool = match config.jobs {
            0 | 1 => None,
            n => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .thread_name(|i| format!("webotron-sync-{i}"))
                    .build()
                    .map_err(|e| SyncError::Config(format!("worker pool: {e}")))?,
            ),
        };
        Ok(Self { store, walker, config, exclude, pool })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn sync(&self, local_root: &Path, target: &str) -> Result<SyncReport> {
        self.sync_with_cancel(local_root, target, &CancelToken::new())
    }

    /// Run one sync. Listing and walk failures are fatal; per-file failures
    /// land in the report. Deletion runs only after every file is accounted
    /// for, and is skipped entirely when `cancel` fires or the abort policy trips.
    pub fn sync_with_cancel(
        &self,
        local_root: &Path,
        target: &str,
        cancel: &CancelToken,
    ) -> Result<SyncReport> {
        let mut report = SyncReport {
            target: target.to_string(),
            local_root: local_root.to_string_lossy().into_owned(),
            started_utc: chrono::Utc::now().to_rfc3339(),
            ..Default::default()
        };
        let progress = Progress::new(self.config.progress);
        progress.set_stage("Listing");
        progress.start();
        let res = self.run(local_root, target, cancel, &progress, &mut report);
        progress.stop();
        let abort = res?;

        report.finish();
        info!(
            bucket = target,
            scanned = report.scanned,
            uploaded = report.uploaded.len(),
            skipped = report.skipped.len(),
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            complete = report.is_complete(),
            "sync finished"
        );
        match abort {
            Some(source) => Err(SyncError::Aborted { source, report: Box::new(report) }),
            None => Ok(report),
        }
    }

    fn run(
        &self,
        local_root: &Path,
        target: &str,
        cancel: &CancelToken,
        progress: &Progress,
        report: &mut SyncReport,
    ) -> Result<Option<TransferError>> {
        // 1) Remote snapshot
        let manifest = self.store.list_all(target)?;
        info!(bucket = target, objects = manifest.len(), "listed remote");
        let mut pending: BTreeSet<String> =
            manifest.keys().filter(|k| !self.exclude.is_match(k.as_str())).cloned().collect();

        // 2) Local files; the walk finishes before any transfer starts
        progress.set_stage("Scanning");
        let mut files: Vec<LocalFile> = Vec::new();
        for f in self.walker.walk(local_root)? {
            let f = f?;
            if self.exclude.is_match(&f.key) {
                continue;
            }
            pending.remove(&f.key);
            files.push(f);
        }
        report.scanned = files.len() as u64;
        progress.set_totals(files.len() as u64, files.iter().map(|f| f.size).sum());

        // 3) Fingerprint and upload
        progress.set_stage("Uploading");
        let run = Run {
            target,
            manifest: &manifest,
            cancel,
            halt: CancelToken::new(),
            first_error: Mutex::new(None),
            progress: progress.clone(),
        };
        let outcomes = self.process_all(&files, &run);
        for (file, outcome) in files.into_iter().zip(outcomes) {
            match outcome {
                Outcome::Uploaded(n) => {
                    report.bytes_uploaded += n;
                    report.uploaded.push(file.key);
                }
                Outcome::Skipped => report.skipped.push(file.key),
                Outcome::Failed(op, error) => {
                    report.failed.push(FailedKey { key: file.key, op, error })
                }
                Outcome::NotAttempted => report.not_attempted.push(file.key),
            }
        }

        // 4) Orphans, strictly after the join above
        let mut abort = run.take_error();
        if cancel.is_cancelled() || abort.is_some() {
            report.cancelled = cancel.is_cancelled();
            report.aborted = abort.is_some();
            if !pending.is_empty() {
                warn!(bucket = target, keys = pending.len(), "skipping delete batch");
            }
            report.delete_skipped = pending.into_iter().collect();
            return Ok(abort);
        }
        progress.set_stage("Deleting");
        let batch = self.config.delete_batch(self.store.max_delete_batch());
        let pending: Vec<String> = pending.into_iter().collect();
        for chunk in pending.chunks(batch) {
            if abort.is_some() {
                report.delete_skipped.extend(chunk.iter().cloned());
                continue;
            }
            let keys: BTreeSet<String> = chunk.iter().cloned().collect();
            match self.store.delete_many(target, &keys) {
                Ok(()) => {
                    debug!(bucket = target, keys = keys.len(), "deleted batch");
                    report.deleted.extend(keys);
                }
                Err(e) => {
                    warn!(bucket = target, error = %e, "delete batch failed");
                    let error = e.to_string();
                    report.failed.extend(keys.into_iter().map(|key| FailedKey {
                        key,
                        op: FailedOp::Delete,
                        error: error.clone(),
                    }));
                    if self.config.error_policy == ErrorPolicy::Abort {
                        report.aborted = true;
                        abort = Some(e);
                    }
                }
            }
        }
        Ok(abort)
    }

    fn process_all(&self, files: &[LocalFile], run: &Run<'_>) -> Vec<Outcome> {
        match (self.config.jobs, &self.pool) {
            (1, _) => files.iter().map(|f| self.process(f, run)).collect(),
            (_, Some(pool)) => {
                pool.install(|| files.par_iter().map(|f| self.process(f, run)).collect())
            }
            (_, None) => files.par_iter().map(|f| self.process(f, run)).collect(),
        }
    }

    fn process(&self, file: &LocalFile, run: &Run<'_>) -> Outcome {
        if run.stopped() {
            return Outcome::NotAttempted;
        }
        let outcome = self.transfer(file, run);
        run.progress.file_done(file.size);
        outcome
    }

    fn transfer(&self, file: &LocalFile, run: &Run<'_>) -> Outcome {
        // One read feeds both the checksum and the upload body.
        let content = match std::fs::read(&file.path) {
            Ok(c) => c,
            Err(source) => {
                let err = SyncError::Fingerprint { path: file.path.clone(), source };
                warn!(key = %file.key, error = %err, "cannot fingerprint");
                return Outcome::Failed(FailedOp::Fingerprint, err.to_string());
            }
        };
        let fp = match fingerprint_bytes(&content, self.config.chunk_size) {
            Some(fp) => Some(fp),
            None => match self.config.empty_files {
                EmptyFilePolicy::AlwaysUpload => None,
                EmptyFilePolicy::HashEmpty => Some(Fingerprint::empty()),
            },
        };
        if let (Some(fp), Some(remote)) = (&fp, run.manifest.get(&file.key)) {
            if fp == remote {
                debug!(key = %file.key, "unchanged");
                return Outcome::Skipped;
            }
        }
        if run.stopped() {
            return Outcome::NotAttempted;
        }
        let ctype = content_type::guess(&file.key);
        match self.store.upload(run.target, &file.key, &content, ctype) {
            Ok(()) => {
                debug!(key = %file.key, content_type = ctype, bytes = content.len(), "uploaded");
                Outcome::Uploaded(content.len() as u64)
            }
            Err(e) => {
                warn!(key = %file.key, error = %e, "upload failed");
                if self.config.error_policy == ErrorPolicy::Abort {
                    run.trip(&e);
                }
                Outcome::Failed(FailedOp::Upload, e.to_string())
            }
        }
    }
}
