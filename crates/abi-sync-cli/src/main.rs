//! abi-sync - publish contract ABIs from compiler artifacts
//!
//! Run after `npx hardhat compile`. Reads every bundle under the build root
//! and writes its `abi` field to the output directory, one file per
//! contract, named like the source artifact.
//!
//! The output directory is a derived cache: files placed there by hand are
//! deleted on every run.

use std::path::{Path, PathBuf};

use abi_sync_core::{ResetStrategy, SyncConfig, SyncPipeline, SyncReport};
use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "abi-sync")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Publish contract ABIs from compiler build artifacts", long_about = None)]
struct Cli {
    /// Config file (default: abi-sync.toml in the current directory, if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Compiler output root containing one directory per source file
    #[arg(long, env = "ABI_SYNC_BUILD_ROOT")]
    build_root: Option<PathBuf>,

    /// Directory receiving the published ABIs (recreated on every run)
    #[arg(short, long, env = "ABI_SYNC_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Bundle field holding the interface descriptor
    #[arg(long, env = "ABI_SYNC_FIELD")]
    field: Option<String>,

    /// File-name substring marking debug metadata (repeatable; replaces the configured list)
    #[arg(long = "exclude", value_name = "PATTERN")]
    exclude: Vec<String>,

    /// Delete only stale outputs instead of recreating the directory
    #[arg(long)]
    reconcile: bool,

    /// Maximum number of bundles processed concurrently
    #[arg(long)]
    max_concurrent: Option<usize>,

    /// Write a JSON run summary to this path
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Exit with an error if any bundle failed to publish
    #[arg(long)]
    strict: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_logging(cli.json, level);

    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    let config = resolve_config(&cli, &cwd)?;

    cmd_sync(config, cli.summary.as_deref(), cli.strict).await
}

/// Log filter used when `RUST_LOG` is unset: `level` for this tool's own
/// crates, warnings only from dependencies.
fn default_log_filter(level: Level) -> String {
    let level = level.as_str().to_ascii_lowercase();
    format!("warn,abi_sync={level},abi_sync_core={level}")
}

/// Install the global subscriber. `--json` switches to one JSON object per
/// line for CI log collectors. A second call is a no-op.
fn init_logging(json: bool, level: Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_log_filter(level)));
    let subscriber = tracing_subscriber::registry().with(filter);
    let installed = if json {
        subscriber
            .with(fmt::layer().with_target(false).json())
            .try_init()
    } else {
        subscriber.with(fmt::layer().with_target(false)).try_init()
    };
    if installed.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

/// Layer flags (and their env vars) over the config file over defaults.
fn resolve_config(cli: &Cli, cwd: &Path) -> Result<SyncConfig> {
    let mut config = SyncConfig::discover(cli.config.as_deref(), cwd)
        .context("Failed to load configuration")?;

    if let Some(root) = &cli.build_root {
        config.build_root = root.clone();
    }
    if let Some(out) = &cli.output_dir {
        config.output_dir = out.clone();
    }
    if let Some(field) = &cli.field {
        config.descriptor_field = field.clone();
    }
    if !cli.exclude.is_empty() {
        config.exclude = cli.exclude.clone();
    }
    if cli.reconcile {
        config.reset = ResetStrategy::Reconcile;
    }
    if let Some(n) = cli.max_concurrent {
        config.max_concurrent = n;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Run one synchronization and report the result.
async fn cmd_sync(config: SyncConfig, summary: Option<&Path>, strict: bool) -> Result<()> {
    info!(
        build_root = %config.build_root.display(),
        output_dir = %config.output_dir.display(),
        reset = ?config.reset,
        "Synchronizing ABIs"
    );

    let report = SyncPipeline::new(config)
        .run()
        .await
        .context("ABI sync failed")?;

    if let Some(path) = summary {
        write_summary(&report, path)?;
    }

    println!("{}", render_report_text(&report));

    if strict && !report.is_complete() {
        bail!(
            "{} bundle(s) failed to publish (--strict)",
            report.failed_count()
        );
    }

    Ok(())
}

fn write_summary(report: &SyncReport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create summary directory {:?}", parent))?;
    }
    let json = serde_json::to_vec_pretty(&report.to_json())?;
    std::fs::write(path, json).with_context(|| format!("Failed to write summary {:?}", path))?;
    info!(path = %path.display(), "Run summary written");
    Ok(())
}

fn render_report_text(report: &SyncReport) -> String {
    let mut out = format!(
        "ABI sync {} -> {}: {} published, {} skipped, {} failed ({} ms)",
        report.build_root.display(),
        report.output_dir.display(),
        report.published_count(),
        report.skipped_count(),
        report.failed_count(),
        report.duration_ms,
    );
    for error in report.failures() {
        out.push_str(&format!("\n  ✗ {}", error));
    }
    out
}
