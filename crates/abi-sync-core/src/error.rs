//! Error taxonomy for ABI synchronization.
//!
//! [`SyncError`] aborts a run. [`BundleError`] is scoped to a single bundle:
//! it is logged and recorded in the report, and never escalates.

use std::path::PathBuf;

/// Fatal errors that stop the whole run.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("cannot scan build root {path}: {source}")]
    Scan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot reset output directory {path}: {source}")]
    Reset {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("cannot read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("scan task failed: {0}")]
    TaskJoin(String),
}

/// Per-bundle errors. The bundle is left unpublished and the run continues.
#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    #[error("cannot read {file}: {source}")]
    Read {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {file} as JSON: {source}")]
    Parse {
        file: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot serialize descriptor of {file}: {source}")]
    Serialize {
        file: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot write {file}: {source}")]
    Write {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("publish task for {file} panicked: {detail}")]
    Panicked { file: String, detail: String },
}

impl BundleError {
    /// Name of the bundle file this error belongs to.
    pub fn file(&self) -> &str {
        match self {
            BundleError::Read { file, .. }
            | BundleError::Parse { file, .. }
            | BundleError::Serialize { file, .. }
            | BundleError::Write { file, .. }
            | BundleError::Panicked { file, .. } => file,
        }
    }
}

/// Result type for fatal-path operations.
pub type Result<T> = std::result::Result<T, SyncError>;
