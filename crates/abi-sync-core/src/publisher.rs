//! Descriptor extraction and publication.
//!
//! Each bundle is handled independently: read, parse, pull out the
//! descriptor field, pretty-print it and write it under the bundle's own
//! file name. Failures stay with the bundle.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::BundleError;
use crate::filter::ExclusionPredicate;
use crate::report::BundleOutcome;
use crate::scanner::DiscoveredBundle;

/// Field holding the ABI in Hardhat and Foundry artifacts.
pub const DEFAULT_DESCRIPTOR_FIELD: &str = "abi";

/// Pull `field` out of a parsed bundle.
///
/// A missing field, or a bundle whose root is not an object, yields
/// `Value::Null`. The descriptor's own shape is not checked.
pub fn extract_descriptor(bundle: &Value, field: &str) -> Value {
    bundle.get(field).cloned().unwrap_or(Value::Null)
}

/// Render a descriptor with 2-space indentation and source key order.
///
/// No trailing newline, so output matches `JSON.stringify(v, null, 2)`.
/// Numbers are re-emitted exactly as written in the bundle (`1.0` stays
/// `1.0`, integers wider than 64 bits keep every digit), where a JavaScript
/// round trip would print `1` or lose precision.
pub fn render_descriptor(descriptor: &Value) -> serde_json::Result<String> {
    serde_json::to_string_pretty(descriptor)
}

/// SHA-256 hex of rendered descriptor text.
pub fn descriptor_digest(rendered: &str) -> String {
    hex::encode(Sha256::digest(rendered.as_bytes()))
}

/// Publishes bundles into one output directory.
#[derive(Clone)]
pub struct Publisher {
    output_dir: PathBuf,
    field: String,
    filter: Arc<dyn ExclusionPredicate>,
}

impl Publisher {
    pub fn new(
        output_dir: impl Into<PathBuf>,
        field: impl Into<String>,
        filter: Arc<dyn ExclusionPredicate>,
    ) -> Self {
        Self {
            output_dir: output_dir.into(),
            field: field.into(),
            filter,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Whether this bundle is excluded from publication.
    pub fn is_excluded(&self, bundle: &DiscoveredBundle) -> bool {
        self.filter.is_excluded(&bundle.display_name())
    }

    /// Drive one bundle to its terminal state.
    ///
    /// The output directory must already have been reset.
    pub async fn publish(&self, bundle: &DiscoveredBundle) -> BundleOutcome {
        let file_name = bundle.display_name();

        if self.is_excluded(bundle) {
            debug!(file = %file_name, "Skipping debug metadata");
            return BundleOutcome::Skipped { file_name };
        }

        match self.publish_inner(bundle, &file_name).await {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(file = %file_name, group = %bundle.group, error = %error, "Bundle not published");
                BundleOutcome::Failed { error }
            }
        }
    }

    async fn publish_inner(
        &self,
        bundle: &DiscoveredBundle,
        file_name: &str,
    ) -> Result<BundleOutcome, BundleError> {
        let text = tokio::fs::read_to_string(&bundle.path)
            .await
            .map_err(|source| BundleError::Read {
                file: file_name.to_string(),
                source,
            })?;

        let parsed: Value = serde_json::from_str(&text).map_err(|source| BundleError::Parse {
            file: file_name.to_string(),
            source,
        })?;

        let descriptor = extract_descriptor(&parsed, &self.field);
        if descriptor.is_null() {
            debug!(file = %file_name, field = %self.field, "Descriptor field missing, publishing null");
        }

        let rendered = render_descriptor(&descriptor).map_err(|source| BundleError::Serialize {
            file: file_name.to_string(),
            source,
        })?;

        let output_path = self.output_dir.join(&bundle.file_name);
        tokio::fs::write(&output_path, rendered.as_bytes())
            .await
            .map_err(|source| BundleError::Write {
                file: file_name.to_string(),
                source,
            })?;

        info!(file = %file_name, "ABI file created");
        Ok(BundleOutcome::Published {
            file_name: file_name.to_string(),
            output_path,
            bytes: rendered.len(),
            digest: descriptor_digest(&rendered),
        })
    }
}
