//! E2E CLI tests for `ddifuse fuse`, `ddifuse key` and `ddifuse resolve`.
//!
//! Each test runs the binary as a subprocess in an isolated temp directory
//! with a recorded bundle written next to it.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn ddifuse_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("ddifuse"));
    cmd.current_dir(dir);
    cmd.env("DDIFUSE_LOG", "error");
    cmd.env_remove("DDIFUSE_CACHE_DIR");
    cmd
}

fn write_bundle(dir: &Path, bundle: &Value) -> PathBuf {
    let path = dir.join("bundle.json");
    std::fs::write(&path, serde_json::to_vec_pretty(bundle).expect("json")).expect("write bundle");
    path
}

fn warfarin_bundle() -> Value {
    json!({
        "pair": ["warfarin", "fluconazole"],
        "mechanistic": {
            "targets_a": ["VKORC1"],
            "targets_b": ["CYP51A1"],
            "enzymes": {
                "a": {"substrate": ["CYP2C9"]},
                "b": {"inhibitor": ["CYP2C9"]}
            }
        },
        "tabular": {"pair_prr": 2.5, "side_effects": {"warfarin": ["bleeding"]}},
        "adverse_events": {"top_reactions": {"warfarin": [["haemorrhage", 120]]}, "combination": []},
        "datasets": {"tabular": ["TwoSides"]}
    })
}

fn fuse_json(dir: &Path, extra: &[&str]) -> Value {
    let mut args = vec!["fuse", "--input", "bundle.json", "--json"];
    args.extend_from_slice(extra);
    let output = ddifuse_cmd(dir).args(&args).output().expect("fuse should not crash");
    assert!(
        output.status.success(),
        "fuse failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("fuse --json should produce valid JSON")
}

#[test]
fn fuse_renders_every_prompt_block() {
    let dir = TempDir::new().expect("tempdir");
    write_bundle(dir.path(), &warfarin_bundle());

    let report = fuse_json(dir.path(), &["--mode", "doctor"]);
    assert_eq!(report["mode"], "doctor");
    assert_eq!(report["budget"], 2400);
    assert_eq!(report["truncated"], false);
    let blocks = report["blocks"].as_object().expect("blocks object");
    for key in [
        "DRUG_A",
        "DRUG_B",
        "PK_SUMMARY",
        "PD_SUMMARY",
        "FAERS_SUMMARY",
        "RISK_FLAGS",
        "EVIDENCE_TABLE",
        "SOURCES",
        "CAVEATS",
    ] {
        assert!(blocks.contains_key(key), "missing {key}");
    }
    assert_eq!(blocks["DRUG_A"], "warfarin");
    assert_eq!(blocks["PK_SUMMARY"], "Potential ↑ exposure via inhibition at cyp2c9");
    assert!(
        blocks["RISK_FLAGS"]
            .as_str()
            .expect("text")
            .starts_with("PRR(pair)=2.5")
    );
}

#[test]
fn fuse_writes_the_context_cache_under_the_project() {
    let dir = TempDir::new().expect("tempdir");
    write_bundle(dir.path(), &warfarin_bundle());

    let report = fuse_json(dir.path(), &[]);
    let key = report["cache_key"].as_str().expect("cache key").to_string();
    assert_eq!(key.len(), 16);
    assert!(dir.path().join("data/cache/contexts").join(format!("{key}.json")).exists());

    ddifuse_cmd(dir.path())
        .args(["key", "fluconazole", "warfarin"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with(key));
}

#[test]
fn no_cache_leaves_the_project_untouched() {
    let dir = TempDir::new().expect("tempdir");
    write_bundle(dir.path(), &warfarin_bundle());

    let report = fuse_json(dir.path(), &["--no-cache"]);
    assert!(report.get("cache_key").is_none());
    assert!(!dir.path().join("data").exists());
}

#[test]
fn context_flag_prints_the_full_pair_context() {
    let dir = TempDir::new().expect("tempdir");
    write_bundle(dir.path(), &warfarin_bundle());

    let ctx = fuse_json(dir.path(), &["--context", "--no-cache"]);
    assert_eq!(ctx["drugs"]["a"]["name"], "warfarin");
    assert_eq!(ctx["signals"]["prr"], 2.5);
    assert_eq!(ctx["mechanistic"]["targets_a"], json!(["vkorc1"]));
    // structured and potency sections are absent from the bundle
    let caveats = ctx["caveats"].as_array().expect("caveats");
    assert!(caveats.iter().all(|c| !c.as_str().unwrap_or("").starts_with("Mechanistic")));
}

#[test]
fn missing_sections_surface_as_caveats() {
    let dir = TempDir::new().expect("tempdir");
    write_bundle(dir.path(), &json!({"pair": ["a", "b"]}));

    ddifuse_cmd(dir.path())
        .args(["fuse", "--input", "bundle.json", "--no-cache"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Mechanistic source unavailable"))
        .stdout(predicate::str::contains("No evidence from FAERS."));
}

#[test]
fn explicit_drugs_override_the_recorded_pair() {
    let dir = TempDir::new().expect("tempdir");
    write_bundle(dir.path(), &warfarin_bundle());

    let report = fuse_json(
        dir.path(),
        &["--no-cache", "--drug-a", "fluconazole", "--drug-b", "warfarin"],
    );
    assert_eq!(report["blocks"]["DRUG_A"], "fluconazole");
    assert_eq!(report["blocks"]["DRUG_B"], "warfarin");

    let ctx = fuse_json(
        dir.path(),
        &["--no-cache", "--context", "--drug-a", "fluconazole", "--drug-b", "warfarin"],
    );
    assert_eq!(ctx["drugs"]["a"]["name"], "fluconazole");
    assert_eq!(ctx["mechanistic"]["targets_a"], json!(["cyp51a1"]));
    assert_eq!(ctx["mechanistic"]["targets_b"], json!(["vkorc1"]));
    assert_eq!(ctx["mechanistic"]["enzymes"]["a"]["inhibitor"], json!(["cyp2c9"]));
    assert_eq!(ctx["mechanistic"]["enzymes"]["b"]["substrate"], json!(["cyp2c9"]));
    assert_eq!(ctx["mechanistic"]["enzymes"]["a"]["substrate"], json!([]));
    assert_eq!(ctx["signals"]["side_effects_a"], json!([]));
    assert_eq!(ctx["signals"]["side_effects_b"], json!(["bleeding"]));
}

#[test]
fn min_relevance_filters_the_context_and_reports_counts() {
    let dir = TempDir::new().expect("tempdir");
    write_bundle(dir.path(), &warfarin_bundle());

    let report = fuse_json(dir.path(), &["--no-cache", "--min-relevance", "0.1"]);
    let filter = &report["filter"];
    // bleeding has no per-term PRR and no target is shared
    assert_eq!(filter["items_before"], 3);
    assert_eq!(filter["items_after"], 0);
    assert_eq!(filter["filtered_sections"], json!(["side_effects", "targets"]));
    assert_eq!(filter["filter_ratio"], 1.0);

    let ctx = fuse_json(
        dir.path(),
        &["--no-cache", "--context", "--min-relevance", "0.1", "--section", "pathways"],
    );
    assert_eq!(ctx["signals"]["side_effects_a"], json!(["bleeding"]));
    assert_eq!(ctx["mechanistic"]["targets_a"], json!(["vkorc1"]));
}

#[test]
fn unfiltered_reports_carry_no_filter_stats() {
    let dir = TempDir::new().expect("tempdir");
    write_bundle(dir.path(), &warfarin_bundle());

    let report = fuse_json(dir.path(), &["--no-cache"]);
    assert!(report.get("filter").is_none());
}

#[test]
fn bundle_without_pair_requires_drug_flags() {
    let dir = TempDir::new().expect("tempdir");
    write_bundle(dir.path(), &json!({}));

    ddifuse_cmd(dir.path())
        .args(["fuse", "--input", "bundle.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--drug-a"));
}

#[test]
fn unreadable_bundle_fails() {
    let dir = TempDir::new().expect("tempdir");
    std::fs::write(dir.path().join("bundle.json"), "{ not json").expect("write");

    ddifuse_cmd(dir.path())
        .args(["fuse", "--input", "bundle.json"])
        .assert()
        .failure();
}

#[test]
fn broken_config_reports_its_error_code() {
    let dir = TempDir::new().expect("tempdir");
    write_bundle(dir.path(), &warfarin_bundle());
    std::fs::create_dir_all(dir.path().join(".ddifuse")).expect("mkdir");
    std::fs::write(dir.path().join(".ddifuse/config.toml"), "[cache\n").expect("write");

    ddifuse_cmd(dir.path())
        .args(["fuse", "--input", "bundle.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("code: E"));
}

#[test]
fn cache_dir_env_redirects_the_cache() {
    let dir = TempDir::new().expect("tempdir");
    let cache = TempDir::new().expect("tempdir");
    write_bundle(dir.path(), &warfarin_bundle());

    ddifuse_cmd(dir.path())
        .env("DDIFUSE_CACHE_DIR", cache.path())
        .args(["fuse", "--input", "bundle.json"])
        .assert()
        .success();
    assert!(cache.path().join("contexts").exists());
    assert!(!dir.path().join("data").exists());
}

fn indexed_bundle() -> Value {
    json!({
        "drug_index": {
            "names": ["warfarin", "fluconazole"],
            "similar": {"coumadin": [["warfarin", 0.92]]}
        }
    })
}

fn resolve_json(dir: &Path, args: &[&str]) -> Value {
    let mut full = vec!["resolve", "--input", "bundle.json", "--json"];
    full.extend_from_slice(args);
    let output = ddifuse_cmd(dir).args(&full).output().expect("resolve should not crash");
    assert!(
        output.status.success(),
        "resolve failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("resolve --json should produce valid JSON")
}

#[test]
fn resolve_strips_salt_suffixes() {
    let dir = TempDir::new().expect("tempdir");
    write_bundle(dir.path(), &indexed_bundle());

    let res = resolve_json(dir.path(), &["Warfarin Sodium"]);
    assert_eq!(res["resolved"], "warfarin");
    assert_eq!(res["matched_term"], "Warfarin");
    assert_eq!(res["terms"][0], "Warfarin Sodium");
}

#[test]
fn resolve_weights_semantic_hits_from_config() {
    let dir = TempDir::new().expect("tempdir");
    write_bundle(dir.path(), &indexed_bundle());

    let res = resolve_json(dir.path(), &["coumadin"]);
    assert_eq!(res["resolved"], "warfarin");
    let score = res["score"].as_f64().expect("score");
    assert!((score - 0.4 * 0.92).abs() < 1e-9, "default semantic weight: {score}");

    std::fs::create_dir_all(dir.path().join(".ddifuse")).expect("mkdir");
    std::fs::write(
        dir.path().join(".ddifuse/config.toml"),
        "[ranking]\nkeyword_weight = 0.0\nsemantic_weight = 1.0\n",
    )
    .expect("write");
    let res = resolve_json(dir.path(), &["coumadin"]);
    let score = res["score"].as_f64().expect("score");
    assert!((score - 0.92).abs() < 1e-9, "configured semantic weight: {score}");
}

#[test]
fn resolve_requires_a_drug_index() {
    let dir = TempDir::new().expect("tempdir");
    write_bundle(dir.path(), &warfarin_bundle());

    ddifuse_cmd(dir.path())
        .args(["resolve", "--input", "bundle.json", "warfarin"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("drug_index"));
}
