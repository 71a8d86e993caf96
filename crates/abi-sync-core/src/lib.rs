//! abi-sync core
//!
//! Publishes contract interface descriptors (ABIs) out of compiler build
//! artifacts:
//! - Scans `<build_root>/<Source>.sol/<Contract>.json` bundles
//! - Skips debug-metadata siblings (`*.dbg.json` by default)
//! - Resets the output directory so it mirrors the current build
//! - Writes each bundle's `abi` field, pretty-printed, under the same name

pub mod config;
pub mod error;
pub mod filter;
pub mod pipeline;
pub mod publisher;
pub mod report;
pub mod reset;
pub mod scanner;

// Re-export key types
pub use config::{SyncConfig, DEFAULT_CONFIG_FILE};
pub use error::{BundleError, Result, SyncError};
pub use filter::{ExclusionPredicate, SubstringMatch, HARDHAT_DEBUG_MARKER};
pub use pipeline::SyncPipeline;
pub use publisher::{
    descriptor_digest, extract_descriptor, render_descriptor, Publisher, DEFAULT_DESCRIPTOR_FIELD,
};
pub use report::{BundleOutcome, BundleStatus, BundleSummary, SyncReport};
pub use reset::{OutputResetter, ResetOutcome, ResetStrategy};
pub use scanner::{ArtifactScan, ArtifactScanner, DiscoveredBundle};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
