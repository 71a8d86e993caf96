//! Debug-metadata exclusion.
//!
//! Hardhat writes a `<Contract>.dbg.json` sibling next to every artifact.
//! Other toolchains name their debug files differently, so the check is an
//! injectable [`ExclusionPredicate`] rather than a fixed string.

/// Default marker for Hardhat debug-metadata files.
pub const HARDHAT_DEBUG_MARKER: &str = ".dbg.json";

/// Decides whether a bundle file name is excluded from publication.
///
/// Implemented for any `Fn(&str) -> bool`, so tests and embedders can pass
/// a closure.
pub trait ExclusionPredicate: Send + Sync {
    /// Returns `true` when `file_name` must not be published.
    fn is_excluded(&self, file_name: &str) -> bool;
}

impl<F> ExclusionPredicate for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_excluded(&self, file_name: &str) -> bool {
        self(file_name)
    }
}

/// Excludes any file whose name contains one of the configured markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstringMatch {
    markers: Vec<String>,
}

impl SubstringMatch {
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            markers: markers
                .into_iter()
                .map(Into::into)
                .filter(|m: &String| !m.is_empty())
                .collect(),
        }
    }

    /// Matches Hardhat's `.dbg.json` convention.
    pub fn hardhat() -> Self {
        Self::new([HARDHAT_DEBUG_MARKER])
    }

    pub fn markers(&self) -> &[String] {
        &self.markers
    }
}

impl Default for SubstringMatch {
    fn default() -> Self {
        Self::hardhat()
    }
}

impl ExclusionPredicate for SubstringMatch {
    fn is_excluded(&self, file_name: &str) -> bool {
        self.markers.iter().any(|m| file_name.contains(m.as_str()))
    }
}
