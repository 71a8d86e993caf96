//! Integration tests for the ABI sync pipeline over real directories.

use abi_sync_core::{BundleStatus, ResetStrategy, SyncConfig, SyncError, SyncPipeline};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

struct Workspace {
    _dir: TempDir,
    root: PathBuf,
    out: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join("artifacts").join("contracts");
        let out = dir.path().join("src").join("abis");
        fs::create_dir_all(&root).expect("create build root");
        Self {
            _dir: dir,
            root,
            out,
        }
    }

    fn bundle(&self, group: &str, name: &str, contents: &str) {
        let dir = self.root.join(group);
        fs::create_dir_all(&dir).expect("create group");
        fs::write(dir.join(name), contents).expect("write bundle");
    }

    fn config(&self, reset: ResetStrategy) -> SyncConfig {
        SyncConfig {
            build_root: self.root.clone(),
            output_dir: self.out.clone(),
            reset,
            ..SyncConfig::default()
        }
    }

    fn output(&self) -> BTreeMap<String, Vec<u8>> {
        read_dir_contents(&self.out)
    }
}

fn read_dir_contents(dir: &Path) -> BTreeMap<String, Vec<u8>> {
    fs::read_dir(dir)
        .expect("read output dir")
        .map(|e| {
            let e = e.expect("entry");
            (
                e.file_name().to_string_lossy().into_owned(),
                fs::read(e.path()).expect("read output file"),
            )
        })
        .collect()
}

fn artifact(abi: Value) -> String {
    json!({
        "_format": "hh-sol-artifact-1",
        "contractName": "X",
        "abi": abi,
        "bytecode": "0x6080",
        "deployedBytecode": "0x6080",
    })
    .to_string()
}

/// Test: the Token example publishes the ABI and drops the debug file
#[tokio::test]
async fn test_token_example() {
    let ws = Workspace::new();
    ws.bundle(
        "Token.sol",
        "Token.json",
        r#"{"abi":[{"type":"function","name":"transfer"}], "bytecode":"0x..."}"#,
    );
    ws.bundle(
        "Token.sol",
        "Token.dbg.json",
        r#"{"_format":"hh-sol-dbg-1","buildInfo":"../../build-info/abc.json"}"#,
    );

    let report = SyncPipeline::new(ws.config(ResetStrategy::Recreate))
        .run()
        .await
        .expect("run failed");

    assert_eq!(report.published_count(), 1);
    assert_eq!(report.skipped_count(), 1);
    assert!(report.is_complete());

    let written = fs::read_to_string(ws.out.join("Token.json")).expect("Token.json missing");
    assert_eq!(
        written,
        "[\n  {\n    \"type\": \"function\",\n    \"name\": \"transfer\"\n  }\n]"
    );
    assert!(
        !ws.out.join("Token.dbg.json").exists(),
        "debug metadata must never be published"
    );
}

/// Test: every valid bundle across groups is published under its own name
#[tokio::test]
async fn test_all_groups_published() {
    let ws = Workspace::new();
    ws.bundle(
        "Lottery.sol",
        "Lottery.json",
        &artifact(json!([{"type": "function", "name": "enter"}])),
    );
    ws.bundle("Lottery.sol", "Lottery.dbg.json", "{}");
    ws.bundle(
        "interfaces/IERC20.sol",
        "IERC20.json",
        &artifact(json!([{"type": "event", "name": "Transfer"}])),
    );
    ws.bundle("Token.sol", "Token.json", &artifact(json!([])));
    ws.bundle("Token.sol", "IToken.json", &artifact(json!([{"type": "error", "name": "E"}])));

    let report = SyncPipeline::new(ws.config(ResetStrategy::Recreate))
        .run()
        .await
        .expect("run failed");

    let output = ws.output();
    let names: Vec<&str> = output.keys().map(String::as_str).collect();
    // "interfaces/IERC20.sol" is a nested group directory, not an immediate child
    assert_eq!(names, vec!["IToken.json", "Lottery.json", "Token.json"]);
    assert_eq!(report.published_count(), 3);

    let lottery: Value = serde_json::from_slice(&output["Lottery.json"]).unwrap();
    assert_eq!(lottery, json!([{"type": "function", "name": "enter"}]));
    assert_eq!(output["Token.json"], b"[]".to_vec());
}

/// Test: two runs over unchanged input produce byte-identical output
#[tokio::test]
async fn test_idempotent_runs() {
    let ws = Workspace::new();
    ws.bundle(
        "Token.sol",
        "Token.json",
        &artifact(json!([{"inputs": [{"name": "to", "type": "address"}], "name": "transfer", "outputs": [], "stateMutability": "nonpayable", "type": "function"}])),
    );
    ws.bundle("Vault.sol", "Vault.json", &artifact(json!([{"type": "receive"}])));

    for strategy in [ResetStrategy::Recreate, ResetStrategy::Reconcile] {
        let pipeline = SyncPipeline::new(ws.config(strategy));
        let first_report = pipeline.run().await.expect("first run");
        let first = ws.output();
        let second_report = pipeline.run().await.expect("second run");
        let second = ws.output();

        assert_eq!(first, second, "outputs differ between runs ({strategy:?})");
        for name in ["Token.json", "Vault.json"] {
            assert_eq!(
                first_report.outcome(name).map(|o| o.status()),
                Some(BundleStatus::Published)
            );
            assert_eq!(
                second_report.to_json()["bundles"]
                    .as_array()
                    .unwrap()
                    .iter()
                    .find(|b| b["file_name"] == name)
                    .map(|b| b["digest"].clone()),
                first_report.to_json()["bundles"]
                    .as_array()
                    .unwrap()
                    .iter()
                    .find(|b| b["file_name"] == name)
                    .map(|b| b["digest"].clone()),
            );
        }
    }
}

/// Test: a stale output file is removed by either reset strategy
#[tokio::test]
async fn test_stale_output_removed() {
    for strategy in [ResetStrategy::Recreate, ResetStrategy::Reconcile] {
        let ws = Workspace::new();
        ws.bundle("Token.sol", "Token.json", &artifact(json!([])));
        fs::create_dir_all(&ws.out).unwrap();
        fs::write(ws.out.join("stale.json"), "[]").unwrap();

        let report = SyncPipeline::new(ws.config(strategy))
            .run()
            .await
            .expect("run failed");

        assert!(
            !ws.out.join("stale.json").exists(),
            "stale.json survived ({strategy:?})"
        );
        assert!(ws.out.join("Token.json").exists());
        if strategy == ResetStrategy::Reconcile {
            assert_eq!(report.removed_stale, 1);
        }
    }
}

/// Test: one malformed bundle among N valid ones does not stop the run
#[tokio::test]
async fn test_malformed_bundle_isolated() {
    let ws = Workspace::new();
    let valid = ["A", "B", "C", "D"];
    for name in valid {
        ws.bundle(
            &format!("{name}.sol"),
            &format!("{name}.json"),
            &artifact(json!([{"type": "function", "name": name.to_lowercase()}])),
        );
    }
    ws.bundle("Broken.sol", "Broken.json", "{\"abi\": [");

    let report = SyncPipeline::new(ws.config(ResetStrategy::Recreate))
        .run()
        .await
        .expect("malformed bundle must not be fatal");

    assert_eq!(report.published_count(), valid.len());
    assert_eq!(report.failed_count(), 1);
    assert!(!report.is_complete());

    let failure = report.failures().next().expect("failure recorded");
    assert_eq!(failure.file(), "Broken.json");
    assert!(failure.to_string().contains("Broken.json"));
    assert_eq!(
        report.outcome("Broken.json").map(|o| o.status()),
        Some(BundleStatus::ParseFailed)
    );

    let output = ws.output();
    assert_eq!(output.len(), valid.len());
    assert!(!output.contains_key("Broken.json"));
}

/// Test: reconcile removes a previously published file whose source went bad
#[tokio::test]
async fn test_reconcile_drops_output_of_newly_malformed_bundle() {
    let ws = Workspace::new();
    ws.bundle("Token.sol", "Token.json", &artifact(json!([{"type": "fallback"}])));
    ws.bundle("Vault.sol", "Vault.json", &artifact(json!([])));

    let pipeline = SyncPipeline::new(ws.config(ResetStrategy::Reconcile));
    pipeline.run().await.expect("first run");
    assert!(ws.out.join("Token.json").exists());

    ws.bundle("Token.sol", "Token.json", "not json at all");
    let report = pipeline.run().await.expect("second run");

    assert_eq!(report.failed_count(), 1);
    assert!(
        !ws.out.join("Token.json").exists(),
        "output of a bundle that failed this run must not survive"
    );
    assert!(ws.out.join("Vault.json").exists());
}

/// Test: reconcile keeps a published file when a same-named bundle in another group fails
#[tokio::test]
async fn test_reconcile_keeps_published_duplicate_name() {
    let ws = Workspace::new();
    ws.bundle("A.sol", "X.json", &artifact(json!([{"type": "receive"}])));
    ws.bundle("B.sol", "X.json", "{ malformed");

    let report = SyncPipeline::new(ws.config(ResetStrategy::Reconcile))
        .run()
        .await
        .expect("run failed");

    assert_eq!(report.published_count(), 1);
    assert_eq!(report.failed_count(), 1);
    assert!(
        ws.out.join("X.json").exists(),
        "a file reported as published must be on disk"
    );
    let written: Value =
        serde_json::from_slice(&fs::read(ws.out.join("X.json")).unwrap()).unwrap();
    assert_eq!(written, json!([{"type": "receive"}]));
}

/// Test: an output directory that contains the build root is rejected before anything is deleted
#[tokio::test]
async fn test_output_dir_containing_build_root_is_rejected() {
    let ws = Workspace::new();
    ws.bundle("Token.sol", "Token.json", &artifact(json!([])));
    let artifacts = ws.root.parent().unwrap().to_path_buf();

    for output_dir in [artifacts.clone(), artifacts.join(".")] {
        let mut config = ws.config(ResetStrategy::Recreate);
        config.output_dir = output_dir;

        let err = SyncPipeline::new(config).run().await.unwrap_err();
        assert!(matches!(err, SyncError::Config(_)), "got {err:?}");
        assert!(
            ws.root.join("Token.sol").join("Token.json").exists(),
            "build root must survive a rejected configuration"
        );
    }
}

/// Test: a missing build root is fatal and leaves prior output untouched
#[tokio::test]
async fn test_missing_build_root_is_fatal() {
    let ws = Workspace::new();
    fs::create_dir_all(&ws.out).unwrap();
    fs::write(ws.out.join("Keep.json"), "[]").unwrap();

    let mut config = ws.config(ResetStrategy::Recreate);
    config.build_root = ws.root.join("does-not-exist");

    let err = SyncPipeline::new(config).run().await.unwrap_err();
    assert!(matches!(err, SyncError::Scan { .. }), "got {err:?}");
    assert!(
        ws.out.join("Keep.json").exists(),
        "scan failure must not touch the output directory"
    );
}

/// Test: an output path occupied by a regular file is a fatal reset error
#[tokio::test]
async fn test_output_path_collision_is_fatal() {
    let ws = Workspace::new();
    ws.bundle("Token.sol", "Token.json", &artifact(json!([])));
    fs::create_dir_all(ws.out.parent().unwrap()).unwrap();
    fs::write(&ws.out, "i am a file").unwrap();

    for strategy in [ResetStrategy::Recreate, ResetStrategy::Reconcile] {
        let err = SyncPipeline::new(ws.config(strategy))
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Reset { .. }), "got {err:?}");
    }
}

/// Test: a bundle without the descriptor field publishes `null`
#[tokio::test]
async fn test_missing_descriptor_publishes_null() {
    let ws = Workspace::new();
    ws.bundle("Lib.sol", "Lib.json", r#"{"bytecode":"0x00"}"#);

    let report = SyncPipeline::new(ws.config(ResetStrategy::Recreate))
        .run()
        .await
        .expect("run failed");

    assert_eq!(report.published_count(), 1);
    assert_eq!(fs::read_to_string(ws.out.join("Lib.json")).unwrap(), "null");
}

/// Test: key order inside descriptor objects follows the source file
#[tokio::test]
async fn test_key_order_preserved() {
    let ws = Workspace::new();
    ws.bundle(
        "Token.sol",
        "Token.json",
        r#"{"abi":[{"type":"function","stateMutability":"view","name":"balanceOf","inputs":[]}]}"#,
    );

    SyncPipeline::new(ws.config(ResetStrategy::Recreate))
        .run()
        .await
        .expect("run failed");

    let written = fs::read_to_string(ws.out.join("Token.json")).unwrap();
    let order: Vec<usize> = ["\"type\"", "\"stateMutability\"", "\"name\"", "\"inputs\""]
        .iter()
        .map(|k| written.find(k).expect("key present"))
        .collect();
    assert!(order.windows(2).all(|w| w[0] < w[1]), "{written}");
}

/// Test: an injected exclusion predicate replaces the default one
#[tokio::test]
async fn test_custom_exclusion_predicate() {
    let ws = Workspace::new();
    ws.bundle("Token.sol", "Token.json", &artifact(json!([])));
    ws.bundle("Token.sol", "Token.metadata.json", "{}");
    ws.bundle("Token.sol", "Token.dbg.json", &artifact(json!([])));

    let report = SyncPipeline::new(ws.config(ResetStrategy::Recreate))
        .with_filter(Arc::new(|name: &str| name.contains(".metadata.")))
        .run()
        .await
        .expect("run failed");

    let output = ws.output();
    assert!(output.contains_key("Token.json"));
    assert!(output.contains_key("Token.dbg.json"));
    assert!(!output.contains_key("Token.metadata.json"));
    assert_eq!(report.skipped_count(), 1);
}

/// Test: an empty build root yields an empty but existing output directory
#[tokio::test]
async fn test_empty_build_root() {
    let ws = Workspace::new();

    let report = SyncPipeline::new(ws.config(ResetStrategy::Recreate))
        .run()
        .await
        .expect("run failed");

    assert_eq!(report.discovered_count(), 0);
    assert!(ws.out.is_dir());
    assert!(ws.output().is_empty());
}
