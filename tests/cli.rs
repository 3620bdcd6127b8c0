//! End-to-end runs of the baking tool and the evaluator it produces.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

const FIXED_EPOCH: &str = "1700000000";
const FIXED_TIMESTAMP: &str = "2023-11-14T22:13:20Z";

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn evaluator() -> Command {
    Command::new(env!("CARGO_BIN_EXE_pdf-eval"))
}

fn baker() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_pdf-eval-bake"));
    command
        .env("SOURCE_DATE_EPOCH", FIXED_EPOCH)
        .env("GIT_COMMIT", "fixture-commit")
        .env_remove("GROUND_TRUTH_PATH")
        .env_remove("PDF_EVAL_EVALUATOR");
    command
}

/// Bakes `ground_truth` into `<dir>/<name>` and waits until it can be spawned.
fn bake(dir: &Path, ground_truth: &Path, name: &str) -> PathBuf {
    let output = dir.join(name);
    baker()
        .arg("--ground-truth")
        .arg(ground_truth)
        .arg("--output")
        .arg(&output)
        .arg("--evaluator")
        .arg(env!("CARGO_BIN_EXE_pdf-eval"))
        .assert()
        .success();
    wait_until_spawnable(&output);
    output
}

// A sibling test thread may fork while holding a write handle to a freshly
// written executable, which makes exec fail with ETXTBSY for a moment.
fn wait_until_spawnable(path: &Path) {
    for _ in 0..50 {
        match std::process::Command::new(path).arg("--version").output() {
            Err(err) if err.raw_os_error() == Some(26) => {
                thread::sleep(Duration::from_millis(20));
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                panic!("baked evaluator missing at {}", path.display())
            }
            _ => return,
        }
    }
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

fn assert_metric(report: &Value, pointer: &str, expected: f64) {
    let actual = report
        .pointer(pointer)
        .and_then(Value::as_f64)
        .unwrap_or_else(|| panic!("metric {pointer} missing from {report}"));
    assert!(
        (actual - expected).abs() < 1e-9,
        "{pointer}: expected {expected}, got {actual}"
    );
}

fn assert_fixture_metrics(report: &Value) {
    assert_eq!(report["schema_version"], "1");
    assert_eq!(report["document_count_ground_truth"], 3);
    assert_eq!(report["document_count_predictions"], 3);
    assert_eq!(report["matched_document_count"], 2);
    assert_eq!(report["missing_document_count"], 1);
    assert_metric(report, "/document_coverage", 0.6667);
    assert_metric(report, "/exact_match_rate", 0.3333);
    assert_metric(report, "/per_field_accuracy/company_name", 0.6667);
    assert_metric(report, "/per_field_accuracy/company_address", 1.0);
    assert_metric(report, "/per_field_accuracy/due_date", 1.0);
    assert_metric(report, "/per_field_accuracy/currency", 1.0);
    assert_metric(report, "/per_field_accuracy/total", 0.3333);
    assert_metric(report, "/per_field_accuracy/notes", 0.0);
    assert_metric(report, "/per_field_accuracy/tax", 0.0);
    assert_eq!(
        report["per_field_accuracy"].as_object().map(|fields| fields.len()),
        Some(13)
    );
    assert_metric(report, "/structural_completeness", 0.7059);
    assert_eq!(report["missing_field_count"], 5);
    assert_eq!(report["extra_field_count"], 2);
    assert_eq!(
        report["extra_fields"],
        serde_json::json!({
            "inv-7f3a-0001": ["purchase_order"],
            "inv-9999-unknown": ["total"]
        })
    );
    assert_eq!(report["extra_documents"], serde_json::json!(["inv-9999-unknown"]));
    assert_eq!(report["unrecognized_fields"], serde_json::json!(["purchase_order"]));
}

fn ground_truth_needles() -> Vec<String> {
    let raw = fs::read(fixture("ground_truth.json")).expect("read fixture");
    let documents: Value = serde_json::from_slice(&raw).expect("fixture is JSON");
    let mut needles = Vec::new();
    for document in documents.as_array().expect("fixture is a list") {
        needles.push(document["document_id"].as_str().expect("id").to_string());
        for value in document["fields"].as_object().expect("fields").values() {
            needles.push(value.as_str().expect("string value").to_string());
        }
    }
    needles.retain(|needle| needle.len() >= 6);
    needles
}

#[test]
fn template_prints_compiled_schema_verbatim() {
    let expected = fs::read_to_string(
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("schema/page_extraction_template.json"),
    )
    .expect("read template");

    evaluator()
        .arg("--template")
        .assert()
        .success()
        .stdout(predicate::eq(expected.as_str()));
}

#[test]
fn override_scores_against_local_ground_truth() {
    let output = evaluator()
        .arg("--predictions")
        .arg(fixture("predictions.json"))
        .arg("--ground-truth")
        .arg(fixture("ground_truth.json"))
        .output()
        .expect("run evaluator");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert_fixture_metrics(&stdout_json(&output));
}

#[test]
fn unbaked_evaluator_reports_missing_payload() {
    evaluator()
        .arg("--predictions")
        .arg(fixture("predictions.json"))
        .assert()
        .code(7)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("no embedded ground truth"));

    evaluator().arg("--info").assert().code(7);
}

#[test]
fn missing_predictions_flag_is_a_usage_error() {
    evaluator()
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--predictions is required"));

    evaluator().args(["--info", "--template"]).assert().code(2);
}

#[test]
fn predictions_failures_map_to_distinct_exit_codes() {
    let gt = fixture("ground_truth.json");

    evaluator()
        .arg("--predictions")
        .arg(fixture("does-not-exist.json"))
        .arg("--ground-truth")
        .arg(&gt)
        .assert()
        .code(3)
        .stderr(predicate::str::contains("input file not found"));

    evaluator()
        .arg("--predictions")
        .arg(fixture("malformed.json"))
        .arg("--ground-truth")
        .arg(&gt)
        .assert()
        .code(4)
        .stderr(predicate::str::contains("malformed JSON"));

    evaluator()
        .arg("--predictions")
        .arg(fixture("predictions_duplicate.json"))
        .arg("--ground-truth")
        .arg(&gt)
        .assert()
        .code(5)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("duplicate document_id 'inv-dup-0001'"));
}

#[test]
fn invalid_override_ground_truth_is_a_schema_violation() {
    evaluator()
        .arg("--predictions")
        .arg(fixture("predictions.json"))
        .arg("--ground-truth")
        .arg(fixture("predictions.json"))
        .assert()
        .code(5)
        .stderr(predicate::str::contains("unrecognized field 'purchase_order'"));
}

#[test]
fn output_file_matches_stdout() {
    let dir = TempDir::new().expect("tempdir");
    let metrics_path = dir.path().join("reports").join("metrics.json");

    let output = evaluator()
        .arg("--predictions")
        .arg(fixture("predictions.json"))
        .arg("--ground-truth")
        .arg(fixture("ground_truth.json"))
        .arg("--output")
        .arg(&metrics_path)
        .output()
        .expect("run evaluator");
    assert!(output.status.success());

    let written: Value =
        serde_json::from_slice(&fs::read(&metrics_path).expect("metrics written")).expect("json");
    assert_eq!(written, stdout_json(&output));
}

#[test]
fn baked_evaluator_scores_with_embedded_ground_truth() {
    let dir = TempDir::new().expect("tempdir");
    let baked = bake(dir.path(), &fixture("ground_truth.json"), "pdf-eval-baked");

    let output = Command::new(&baked)
        .arg("--predictions")
        .arg(fixture("predictions.json"))
        .output()
        .expect("run baked evaluator");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert_fixture_metrics(&stdout_json(&output));
}

#[test]
fn baked_evaluator_info_exposes_metadata_only() {
    let dir = TempDir::new().expect("tempdir");
    let baked = bake(dir.path(), &fixture("ground_truth.json"), "pdf-eval-baked");

    let output = Command::new(&baked).arg("--info").output().expect("run --info");
    assert!(output.status.success());

    let info = stdout_json(&output);
    assert_eq!(info["schema_version"], "1");
    assert_eq!(info["build_timestamp"], FIXED_TIMESTAMP);
    assert_eq!(info["document_count"], 3);
    assert_eq!(info["payload_format"], 1);
    assert_eq!(info["source_commit"], "fixture-commit");
    assert!(
        info["builder_version"]
            .as_str()
            .is_some_and(|version| version.starts_with("pdf-eval-bake "))
    );
    assert!(
        info["content_hash"]
            .as_str()
            .is_some_and(|hash| hash.len() == 64 && hash.chars().all(|c| c.is_ascii_hexdigit()))
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    for needle in ground_truth_needles() {
        assert!(!stdout.contains(&needle), "--info leaked {needle}");
    }
}

#[test]
fn baked_artifact_contains_no_ground_truth_plaintext() {
    let dir = TempDir::new().expect("tempdir");
    let baked = bake(dir.path(), &fixture("ground_truth.json"), "pdf-eval-baked");
    let bytes = fs::read(&baked).expect("read artifact");

    for needle in ground_truth_needles() {
        assert!(
            !bytes
                .windows(needle.len())
                .any(|window| window == needle.as_bytes()),
            "artifact leaks {needle}"
        );
    }
}

#[test]
fn content_hash_ignores_input_order() {
    let dir = TempDir::new().expect("tempdir");
    let first = bake(dir.path(), &fixture("ground_truth.json"), "first");
    let second = bake(dir.path(), &fixture("ground_truth_reordered.json"), "second");

    let hash = |path: &Path| {
        let output = Command::new(path).arg("--info").output().expect("run --info");
        stdout_json(&output)["content_hash"].clone()
    };
    assert_eq!(hash(first.as_path()), hash(second.as_path()));
    assert_eq!(
        fs::read(&first).expect("first artifact"),
        fs::read(&second).expect("second artifact")
    );
}

#[test]
fn tampered_payload_is_fatal_and_quiet() {
    let dir = TempDir::new().expect("tempdir");
    let baked = bake(dir.path(), &fixture("ground_truth.json"), "pdf-eval-baked");

    let mut bytes = fs::read(&baked).expect("read artifact");
    // Last byte of the sealed blob, just ahead of the 16-byte footer.
    let position = bytes.len() - 17;
    bytes[position] ^= 0xA5;
    let tampered = dir.path().join("pdf-eval-tampered");
    fs::write(&tampered, &bytes).expect("write tampered copy");
    fs::set_permissions(&tampered, fs::metadata(&baked).expect("metadata").permissions())
        .expect("copy permissions");
    wait_until_spawnable(&tampered);

    let output = Command::new(&tampered)
        .arg("--predictions")
        .arg(fixture("predictions.json"))
        .output()
        .expect("run tampered evaluator");

    assert_eq!(output.status.code(), Some(6));
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("rebake"), "stderr: {stderr}");
    assert!(!stderr.contains("inv-7f3a"), "stderr leaked ids: {stderr}");
}

#[test]
fn bake_rejects_invalid_ground_truth_without_writing() {
    let dir = TempDir::new().expect("tempdir");
    let output = dir.path().join("never-written");

    baker()
        .arg("--ground-truth")
        .arg(fixture("predictions_duplicate.json"))
        .arg("--output")
        .arg(&output)
        .arg("--evaluator")
        .arg(env!("CARGO_BIN_EXE_pdf-eval"))
        .assert()
        .code(5)
        .stderr(predicate::str::contains("duplicate document_id"));

    assert!(!output.exists());
}

#[test]
fn bake_requires_a_ground_truth_source() {
    let dir = TempDir::new().expect("tempdir");

    baker()
        .arg("--output")
        .arg(dir.path().join("out"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("no ground truth given"));
}

#[test]
fn bake_reads_environment_fallbacks_and_writes_report() {
    let dir = TempDir::new().expect("tempdir");
    let output = dir.path().join("pdf-eval-env");
    let report_path = dir.path().join("build-report.json");

    baker()
        .env("GROUND_TRUTH_PATH", fixture("ground_truth.json"))
        .env("PDF_EVAL_EVALUATOR", env!("CARGO_BIN_EXE_pdf-eval"))
        .arg("--output")
        .arg(&output)
        .arg("--report")
        .arg(&report_path)
        .assert()
        .success();

    let report: Value =
        serde_json::from_slice(&fs::read(&report_path).expect("report written")).expect("json");
    assert_eq!(report["document_count"], 3);
    assert_eq!(report["build_info"]["build_timestamp"], FIXED_TIMESTAMP);
    assert_eq!(
        report["artifact_bytes"].as_u64(),
        Some(fs::metadata(&output).expect("artifact").len())
    );
}

#[test]
fn bake_accepts_inline_ground_truth() {
    let dir = TempDir::new().expect("tempdir");
    let output = dir.path().join("pdf-eval-inline");

    baker()
        .arg("--ground-truth-json")
        .arg(r#"[{"document_id":"doc-1","fields":{"total":"100.00"}}]"#)
        .arg("--output")
        .arg(&output)
        .arg("--evaluator")
        .arg(env!("CARGO_BIN_EXE_pdf-eval"))
        .assert()
        .success();
    wait_until_spawnable(&output);

    let predictions = dir.path().join("predictions.json");
    fs::write(
        &predictions,
        r#"[{"document_id":"doc-1","fields":{"total":"100.00"}}]"#,
    )
    .expect("write predictions");

    let result = Command::new(&output)
        .arg("--predictions")
        .arg(&predictions)
        .output()
        .expect("run baked evaluator");
    assert!(result.status.success());

    let report = stdout_json(&result);
    assert_metric(&report, "/document_coverage", 1.0);
    assert_metric(&report, "/per_field_accuracy/total", 1.0);
    assert_metric(&report, "/exact_match_rate", 1.0);
}
