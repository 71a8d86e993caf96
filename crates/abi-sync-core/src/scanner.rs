//! Artifact discovery.
//!
//! The compiler writes one directory per source file under the build root
//! (`artifacts/contracts/Token.sol/`), holding one JSON bundle per contract
//! plus debug siblings. [`ArtifactScanner`] walks exactly two levels: group
//! directories, then the regular files inside them.

use std::ffi::OsString;
use std::fs::ReadDir;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Result, SyncError};

/// A bundle file found under the build root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredBundle {
    /// Name of the group directory (the compiled source file).
    pub group: String,
    /// Full path of the bundle file.
    pub path: PathBuf,
    /// File name, reused verbatim for the published output.
    pub file_name: OsString,
}

impl DiscoveredBundle {
    /// Lossy UTF-8 rendering of the file name for logs and matching.
    pub fn display_name(&self) -> String {
        self.file_name.to_string_lossy().into_owned()
    }
}

/// Scans a build root for artifact bundles.
#[derive(Debug, Clone)]
pub struct ArtifactScanner {
    root: PathBuf,
}

impl ArtifactScanner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Open the build root and return a lazy iterator over its bundles.
    ///
    /// Fails immediately if the root is missing or not a directory.
    pub fn scan(&self) -> Result<ArtifactScan> {
        let groups = std::fs::read_dir(&self.root).map_err(|source| SyncError::Scan {
            path: self.root.clone(),
            source,
        })?;
        debug!(root = %self.root.display(), "Scanning build root");
        Ok(ArtifactScan {
            root: self.root.clone(),
            groups,
            current: None,
        })
    }
}

/// Lazy sequence of bundles, produced group by group.
///
/// Yields `Err` once for an unreadable group or entry; callers treat that as
/// fatal for the run.
pub struct ArtifactScan {
    root: PathBuf,
    groups: ReadDir,
    current: Option<(String, PathBuf, ReadDir)>,
}

impl ArtifactScan {
    fn scan_error(path: PathBuf, source: std::io::Error) -> SyncError {
        SyncError::Scan { path, source }
    }

    /// Advance to the next group directory. `Ok(false)` when exhausted.
    fn next_group(&mut self) -> Result<bool> {
        for entry in self.groups.by_ref() {
            let entry = entry.map_err(|e| Self::scan_error(self.root.clone(), e))?;
            let path = entry.path();
            let file_type = entry
                .file_type()
                .map_err(|e| Self::scan_error(path.clone(), e))?;

            if !file_type.is_dir() {
                debug!(path = %path.display(), "Ignoring non-directory entry in build root");
                continue;
            }

            let files = std::fs::read_dir(&path).map_err(|e| Self::scan_error(path.clone(), e))?;
            let group = entry.file_name().to_string_lossy().into_owned();
            self.current = Some((group, path, files));
            return Ok(true);
        }
        Ok(false)
    }
}

impl Iterator for ArtifactScan {
    type Item = Result<DiscoveredBundle>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((group, group_path, files)) = self.current.as_mut() {
                match files.next() {
                    Some(Ok(entry)) => {
                        let path = entry.path();
                        match entry.file_type() {
                            Ok(ft) if ft.is_file() => {
                                return Some(Ok(DiscoveredBundle {
                                    group: group.clone(),
                                    file_name: entry.file_name(),
                                    path,
                                }));
                            }
                            Ok(_) => {
                                debug!(path = %path.display(), "Ignoring non-file entry in group");
                                continue;
                            }
                            Err(e) => {
                                self.current = None;
                                return Some(Err(Self::scan_error(path, e)));
                            }
                        }
                    }
                    Some(Err(e)) => {
                        let path = group_path.clone();
                        self.current = None;
                        return Some(Err(Self::scan_error(path, e)));
                    }
                    None => self.current = None,
                }
            }

            match self.next_group() {
                Ok(true) => continue,
                Ok(false) => return None,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
