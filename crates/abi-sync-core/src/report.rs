//! Run outcomes and the summary report.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::BundleError;

/// Terminal state of one discovered bundle.
#[derive(Debug)]
pub enum BundleOutcome {
    /// Matched the exclusion predicate; never read.
    Skipped { file_name: String },
    /// Descriptor written to the output directory.
    Published {
        file_name: String,
        output_path: PathBuf,
        bytes: usize,
        /// SHA-256 hex of the written descriptor.
        digest: String,
    },
    /// Read, parse, serialize or write failed; nothing was published.
    Failed { error: BundleError },
}

impl BundleOutcome {
    pub fn file_name(&self) -> &str {
        match self {
            BundleOutcome::Skipped { file_name } | BundleOutcome::Published { file_name, .. } => {
                file_name
            }
            BundleOutcome::Failed { error } => error.file(),
        }
    }

    pub fn is_published(&self) -> bool {
        matches!(self, BundleOutcome::Published { .. })
    }

    /// Short state label used in logs and the JSON summary.
    pub fn status(&self) -> BundleStatus {
        match self {
            BundleOutcome::Skipped { .. } => BundleStatus::Skipped,
            BundleOutcome::Published { .. } => BundleStatus::Published,
            BundleOutcome::Failed { error } => match error {
                BundleError::Read { .. } => BundleStatus::ReadFailed,
                BundleError::Parse { .. } => BundleStatus::ParseFailed,
                BundleError::Serialize { .. } | BundleError::Panicked { .. } => {
                    BundleStatus::Failed
                }
                BundleError::Write { .. } => BundleStatus::WriteFailed,
            },
        }
    }
}

/// Serializable bundle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BundleStatus {
    Skipped,
    Published,
    ReadFailed,
    ParseFailed,
    WriteFailed,
    Failed,
}

/// One row of the JSON summary.
#[derive(Debug, Clone, Serialize)]
pub struct BundleSummary {
    pub file_name: String,
    pub status: BundleStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&BundleOutcome> for BundleSummary {
    fn from(outcome: &BundleOutcome) -> Self {
        let (digest, error) = match outcome {
            BundleOutcome::Published { digest, .. } => (Some(digest.clone()), None),
            BundleOutcome::Failed { error } => (None, Some(error.to_string())),
            BundleOutcome::Skipped { .. } => (None, None),
        };
        Self {
            file_name: outcome.file_name().to_string(),
            status: outcome.status(),
            digest,
            error,
        }
    }
}

/// Summary of a completed run.
///
/// A run with failed bundles is still a successful run: the output directory
/// holds whatever parsed and wrote correctly.
#[derive(Debug)]
pub struct SyncReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub build_root: PathBuf,
    pub output_dir: PathBuf,
    pub outcomes: Vec<BundleOutcome>,
    /// Stale entries removed from the output directory (reconcile only).
    pub removed_stale: usize,
    pub duration_ms: u64,
}

impl SyncReport {
    pub fn discovered_count(&self) -> usize {
        self.outcomes.len()
    }

    pub fn published_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_published()).count()
    }

    pub fn skipped_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, BundleOutcome::Skipped { .. }))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.failures().count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &BundleError> {
        self.outcomes.iter().filter_map(|o| match o {
            BundleOutcome::Failed { error } => Some(error),
            _ => None,
        })
    }

    /// `true` when every non-excluded bundle was published.
    pub fn is_complete(&self) -> bool {
        self.failed_count() == 0
    }

    /// Outcome for a bundle file name, if it was discovered.
    pub fn outcome(&self, file_name: &str) -> Option<&BundleOutcome> {
        self.outcomes.iter().find(|o| o.file_name() == file_name)
    }

    /// JSON-friendly view for `--summary` output.
    pub fn to_json(&self) -> serde_json::Value {
        let mut bundles: Vec<BundleSummary> = self.outcomes.iter().map(Into::into).collect();
        bundles.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        serde_json::json!({
            "run_id": self.run_id,
            "started_at": self.started_at,
            "build_root": self.build_root.display().to_string(),
            "output_dir": self.output_dir.display().to_string(),
            "discovered": self.discovered_count(),
            "published": self.published_count(),
            "skipped": self.skipped_count(),
            "failed": self.failed_count(),
            "removed_stale": self.removed_stale,
            "duration_ms": self.duration_ms,
            "bundles": bundles,
        })
    }
}
