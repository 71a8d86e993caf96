//! Scan, reset and publish as one run.

use std::collections::HashSet;
use std::ffi::OsString;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::SyncConfig;
use crate::error::{BundleError, Result, SyncError};
use crate::filter::ExclusionPredicate;
use crate::publisher::Publisher;
use crate::report::{BundleOutcome, SyncReport};
use crate::reset::{OutputResetter, ResetStrategy};
use crate::scanner::{ArtifactScanner, DiscoveredBundle};

/// ABI synchronization pipeline.
///
/// Order of a run:
/// 1. Scan the build root to completion. A scan error aborts before the
///    output directory is touched.
/// 2. Reset the output directory and await it.
/// 3. Publish every bundle concurrently, then join all tasks.
pub struct SyncPipeline {
    config: SyncConfig,
    filter: Arc<dyn ExclusionPredicate>,
}

impl SyncPipeline {
    /// Pipeline using the config's substring exclusion list.
    pub fn new(config: SyncConfig) -> Self {
        let filter = Arc::new(config.exclusion());
        Self { config, filter }
    }

    /// Replace the exclusion predicate.
    pub fn with_filter(mut self, filter: Arc<dyn ExclusionPredicate>) -> Self {
        self.filter = filter;
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Execute one run.
    ///
    /// Returns `Err` only for fatal scan, reset or config errors. Per-bundle
    /// failures are recorded in the report.
    pub async fn run(&self) -> Result<SyncReport> {
        self.config.validate()?;

        let start = Instant::now();
        let started_at = Utc::now();
        let run_id = Uuid::new_v4().to_string();

        info!(
            run_id = %run_id,
            build_root = %self.config.build_root.display(),
            output_dir = %self.config.output_dir.display(),
            "Starting ABI files update"
        );

        let bundles = self.scan().await?;
        info!(run_id = %run_id, discovered = bundles.len(), "Scan complete");

        let publisher = Publisher::new(
            &self.config.output_dir,
            &self.config.descriptor_field,
            Arc::clone(&self.filter),
        );

        let mut keep: HashSet<OsString> = HashSet::with_capacity(bundles.len());
        for bundle in bundles.iter().filter(|b| !publisher.is_excluded(b)) {
            if !keep.insert(bundle.file_name.clone()) {
                warn!(
                    file = %bundle.display_name(),
                    group = %bundle.group,
                    "Bundle name already seen in another group; which copy lands is not deterministic"
                );
            }
        }

        let resetter = OutputResetter::new(&self.config.output_dir);
        let reset = resetter.reset(self.config.reset, &keep).await?;

        let mut outcomes = self.publish_all(&publisher, bundles).await;

        let mut removed_stale = reset.removed;
        if self.config.reset == ResetStrategy::Reconcile {
            // A failed bundle may share its name with one published from
            // another group; that file is current and must stay.
            let published: HashSet<&str> = outcomes
                .iter()
                .filter(|o| o.is_published())
                .map(|o| o.file_name())
                .collect();
            let failed: Vec<OsString> = outcomes
                .iter()
                .filter_map(|o| match o {
                    BundleOutcome::Failed { error } => Some(error.file()),
                    _ => None,
                })
                .filter(|name| !published.contains(name))
                .map(OsString::from)
                .collect();
            removed_stale += resetter.prune(&failed).await;
        }

        outcomes.sort_by(|a, b| a.file_name().cmp(b.file_name()));

        let report = SyncReport {
            run_id,
            started_at,
            build_root: self.config.build_root.clone(),
            output_dir: self.config.output_dir.clone(),
            outcomes,
            removed_stale,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        if report.is_complete() {
            info!(
                run_id = %report.run_id,
                published = report.published_count(),
                skipped = report.skipped_count(),
                "ABI files update complete"
            );
        } else {
            warn!(
                run_id = %report.run_id,
                published = report.published_count(),
                failed = report.failed_count(),
                "ABI files update finished with failures"
            );
        }

        Ok(report)
    }

    /// Collect the whole scan on a blocking thread.
    async fn scan(&self) -> Result<Vec<DiscoveredBundle>> {
        let scanner = ArtifactScanner::new(&self.config.build_root);
        tokio::task::spawn_blocking(move || scanner.scan()?.collect::<Result<Vec<_>>>())
            .await
            .map_err(|e| SyncError::TaskJoin(e.to_string()))?
    }

    /// Publish bundles concurrently, bounded by `max_concurrent`, and wait
    /// for every task.
    async fn publish_all(
        &self,
        publisher: &Publisher,
        bundles: Vec<DiscoveredBundle>,
    ) -> Vec<BundleOutcome> {
        let sem = Arc::new(Semaphore::new(self.config.max_concurrent));
        let mut join_set = JoinSet::new();
        let mut names = Vec::with_capacity(bundles.len());

        for (idx, bundle) in bundles.into_iter().enumerate() {
            names.push(bundle.display_name());
            let publisher = publisher.clone();
            let sem = Arc::clone(&sem);
            join_set.spawn(async move {
                let _permit = sem.acquire_owned().await.ok();
                (idx, publisher.publish(&bundle).await)
            });
        }

        let mut slots: Vec<Option<BundleOutcome>> = names.iter().map(|_| None).collect();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((idx, outcome)) => slots[idx] = Some(outcome),
                Err(e) => warn!(error = %e, "Publish task did not complete"),
            }
        }

        slots
            .into_iter()
            .zip(names)
            .map(|(slot, file)| {
                slot.unwrap_or_else(|| BundleOutcome::Failed {
                    error: BundleError::Panicked {
                        file,
                        detail: "task aborted before reporting".to_string(),
                    },
                })
            })
            .collect()
    }
}
