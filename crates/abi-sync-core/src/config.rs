//! Run configuration.
//!
//! Defaults follow the Hardhat layout: artifacts under
//! `artifacts/contracts`, published ABIs under `src/abis`. A TOML file may
//! override any subset of keys.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};
use crate::filter::{SubstringMatch, HARDHAT_DEBUG_MARKER};
use crate::publisher::DEFAULT_DESCRIPTOR_FIELD;
use crate::reset::ResetStrategy;

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "abi-sync.toml";

/// Settings for one synchronization run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// Compiler output root; each child directory is one source file.
    pub build_root: PathBuf,

    /// Destination for published descriptors. Owned by the tool.
    pub output_dir: PathBuf,

    /// Field extracted from every bundle.
    pub descriptor_field: String,

    /// File-name substrings marking debug metadata.
    pub exclude: Vec<String>,

    /// How stale output is cleared.
    pub reset: ResetStrategy,

    /// Upper bound on concurrently running publish tasks.
    pub max_concurrent: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            build_root: PathBuf::from("artifacts/contracts"),
            output_dir: PathBuf::from("src/abis"),
            descriptor_field: DEFAULT_DESCRIPTOR_FIELD.to_string(),
            exclude: vec![HARDHAT_DEBUG_MARKER.to_string()],
            reset: ResetStrategy::default(),
            max_concurrent: 16,
        }
    }
}

impl SyncConfig {
    /// Parse a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(source: &str, origin: &Path) -> Result<Self> {
        toml::from_str(source).map_err(|source| SyncError::ConfigParse {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Load a TOML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| SyncError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text, path)
    }

    /// Load `path` if given, else `abi-sync.toml` in `cwd` if present, else
    /// defaults.
    pub fn discover(path: Option<&Path>, cwd: &Path) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => {
                let candidate = cwd.join(DEFAULT_CONFIG_FILE);
                if candidate.is_file() {
                    Self::load(&candidate)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Reject settings that cannot produce a sound run.
    pub fn validate(&self) -> Result<()> {
        if self.descriptor_field.trim().is_empty() {
            return Err(SyncError::Config(
                "descriptor_field must not be empty".to_string(),
            ));
        }
        if self.max_concurrent == 0 {
            return Err(SyncError::Config(
                "max_concurrent must be at least 1".to_string(),
            ));
        }
        let root = comparable_path(&self.build_root);
        let out = comparable_path(&self.output_dir);
        if root == out {
            return Err(SyncError::Config(format!(
                "output_dir must differ from build_root ({})",
                self.build_root.display()
            )));
        }
        if out.starts_with(&root) {
            return Err(SyncError::Config(format!(
                "output_dir {} lies inside build_root {}",
                self.output_dir.display(),
                self.build_root.display()
            )));
        }
        // Recreating the output would delete the build root with it.
        if root.starts_with(&out) {
            return Err(SyncError::Config(format!(
                "output_dir {} contains build_root {}",
                self.output_dir.display(),
                self.build_root.display()
            )));
        }
        Ok(())
    }

    /// Exclusion predicate built from `exclude`.
    pub fn exclusion(&self) -> SubstringMatch {
        SubstringMatch::new(self.exclude.iter().cloned())
    }
}

/// Absolute, lexically normalized form of `path` for overlap checks.
///
/// `.` is dropped and `..` pops a component. The deepest existing ancestor
/// is canonicalized so symlinked spellings of one directory compare equal.
fn comparable_path(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());

    let mut lexical = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                lexical.pop();
            }
            other => lexical.push(other),
        }
    }

    let mut existing = lexical.as_path();
    let mut missing = Vec::new();
    while !existing.exists() {
        match (existing.file_name(), existing.parent()) {
            (Some(name), Some(parent)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => break,
        }
    }
    let mut resolved = std::fs::canonicalize(existing).unwrap_or_else(|_| existing.to_path_buf());
    resolved.extend(missing.iter().rev());
    resolved
}
