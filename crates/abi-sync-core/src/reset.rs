//! Output directory preparation.
//!
//! The output directory is a derived cache owned by this tool. Both
//! strategies are destructive: files placed there by anything else are
//! removed.

use std::collections::HashSet;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Result, SyncError};

/// How the output directory is brought in line with the current input set.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResetStrategy {
    /// Delete the directory tree and create it again, empty.
    #[default]
    Recreate,
    /// Keep the directory and delete only entries that will not be
    /// republished. Never leaves the directory empty mid-run.
    Reconcile,
}

/// What a reset did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResetOutcome {
    /// Entries removed by a reconcile. Always 0 for a recreate, which drops
    /// the whole tree without counting.
    pub removed: usize,
}

/// Prepares the output directory before any bundle is written.
#[derive(Debug, Clone)]
pub struct OutputResetter {
    dir: PathBuf,
}

impl OutputResetter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn reset_error(&self, source: std::io::Error) -> SyncError {
        SyncError::Reset {
            path: self.dir.clone(),
            source,
        }
    }

    fn not_a_directory(&self) -> SyncError {
        self.reset_error(std::io::Error::new(
            ErrorKind::AlreadyExists,
            "output path exists and is not a directory",
        ))
    }

    /// Apply `strategy`. `keep` lists the file names this run will publish
    /// and is only consulted by [`ResetStrategy::Reconcile`].
    pub async fn reset(
        &self,
        strategy: ResetStrategy,
        keep: &HashSet<OsString>,
    ) -> Result<ResetOutcome> {
        match strategy {
            ResetStrategy::Recreate => self.recreate().await,
            ResetStrategy::Reconcile => self.reconcile(keep).await,
        }
    }

    /// Remove the directory (if any) and create it empty, parents included.
    pub async fn recreate(&self) -> Result<ResetOutcome> {
        if let Ok(meta) = tokio::fs::symlink_metadata(&self.dir).await {
            if meta.is_file() {
                return Err(self.not_a_directory());
            }
        }
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => debug!(dir = %self.dir.display(), "Removed previous output"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(self.reset_error(e)),
        }
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| self.reset_error(e))?;

        info!(dir = %self.dir.display(), "Output directory recreated");
        Ok(ResetOutcome::default())
    }

    /// Ensure the directory exists and delete every entry whose name is not
    /// in `keep`.
    pub async fn reconcile(&self, keep: &HashSet<OsString>) -> Result<ResetOutcome> {
        self.ensure_dir().await?;

        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| self.reset_error(e))?;

        let mut removed = 0usize;
        while let Some(entry) = entries.next_entry().await.map_err(|e| self.reset_error(e))? {
            if keep.contains(&entry.file_name()) {
                continue;
            }
            let path = entry.path();
            let file_type = entry.file_type().await.map_err(|e| self.reset_error(e))?;
            let outcome = if file_type.is_dir() {
                tokio::fs::remove_dir_all(&path).await
            } else {
                tokio::fs::remove_file(&path).await
            };
            match outcome {
                Ok(()) => {
                    debug!(path = %path.display(), "Removed stale output");
                    removed += 1;
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(self.reset_error(e)),
            }
        }

        info!(dir = %self.dir.display(), removed, "Output directory reconciled");
        Ok(ResetOutcome { removed })
    }

    /// Remove previously published files for bundles that failed this run.
    ///
    /// Only needed after a reconcile, which keeps old outputs for every
    /// name it expected to republish. Returns how many files were removed;
    /// failures are logged and skipped.
    pub async fn prune(&self, names: &[OsString]) -> usize {
        let mut removed = 0usize;
        for name in names {
            let path = self.dir.join(name);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    debug!(path = %path.display(), "Removed output of failed bundle");
                    removed += 1;
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to remove stale output");
                }
            }
        }
        removed
    }

    async fn ensure_dir(&self) -> Result<()> {
        match tokio::fs::metadata(&self.dir).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(self.not_a_directory()),
            Err(e) if e.kind() == ErrorKind::NotFound => tokio::fs::create_dir_all(&self.dir)
                .await
                .map_err(|e| self.reset_error(e)),
            Err(e) => Err(self.reset_error(e)),
        }
    }
}
