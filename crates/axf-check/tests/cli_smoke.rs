use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::{json, Value};
use tempfile::{tempdir, TempDir};

fn axf_check(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_axf-check"))
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("run axf-check")
}

fn write_report(dir: &TempDir, name: &str, document: &Value) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, serde_json::to_vec_pretty(document).expect("json")).expect("write report");
    path
}

fn piece(lo: f64, hi: f64, value: f64) -> Value {
    json!({
        "interval": [lo, hi],
        "poly": { "coeffs": [1.0, 1.0] },
        "approx_error": { "value": value }
    })
}

fn error_lines(output: &Output) -> Vec<String> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter(|line| line.starts_with("[ERROR]"))
        .map(str::to_string)
        .collect()
}

fn run_on(path: &Path, extra: &[&str]) -> Output {
    let mut args = vec![path.to_str().expect("utf8 path")];
    args.extend_from_slice(extra);
    axf_check(&args)
}

#[test]
fn composition_violation_exits_one() {
    let dir = tempdir().expect("tempdir");
    let path = write_report(
        &dir,
        "overrun.json",
        &json!([{ "function": "exp(x)", "approx_error": { "value": 1e-6 },
                  "approx_list": [piece(0.0, 0.5, 2e-6)] }]),
    );
    let output = run_on(&path, &[]);
    assert_eq!(output.status.code(), Some(1));
    let lines = error_lines(&output);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("[ERROR] top[0].sub[0] composition"));
    assert!(lines[0].contains("2e-6") && lines[0].contains("1e-6"));
}

#[test]
fn exit_on_error_reports_one_of_two_violations() {
    let dir = tempdir().expect("tempdir");
    let path = write_report(
        &dir,
        "two_overruns.json",
        &json!([
            { "function": "exp(x)", "approx_error": { "value": 1e-6 },
              "approx_list": [piece(0.0, 0.5, 2e-6)] },
            { "function": "exp(x)", "approx_error": { "value": 1e-6 },
              "approx_list": [piece(0.5, 1.0, 3e-6)] }
        ]),
    );
    let fail_fast = run_on(&path, &["--exit-on-error"]);
    assert_eq!(fail_fast.status.code(), Some(1));
    assert_eq!(error_lines(&fail_fast).len(), 1);

    let accumulate = run_on(&path, &["--jobs", "2"]);
    assert_eq!(accumulate.status.code(), Some(1));
    let lines = error_lines(&accumulate);
    assert_eq!(lines.len(), 2);
    assert!(lines[1].starts_with("[ERROR] top[1].sub[0]"));
}

#[test]
fn strong_mode_recomputes_bounds() {
    let dir = tempdir().expect("tempdir");
    // exp(x) - (1 + x) peaks at exp(0.5) - 1.5 ~ 0.1487 on [0, 0.5]
    let honest = write_report(
        &dir,
        "honest.json",
        &json!([{ "function": "exp(x)", "approx_error": { "value": 0.2 },
                  "approx_list": [piece(0.0, 0.5, 0.15)] }]),
    );
    let optimistic = write_report(
        &dir,
        "optimistic.json",
        &json!([{ "function": "exp(x)", "approx_error": { "value": 0.2 },
                  "approx_list": [piece(0.0, 0.5, 0.1)] }]),
    );
    assert_eq!(run_on(&honest, &["--check-level", "strong"]).status.code(), Some(0));
    assert_eq!(run_on(&optimistic, &[]).status.code(), Some(0));

    let output = run_on(&optimistic, &["--check-level", "strong"]);
    assert_eq!(output.status.code(), Some(1));
    let lines = error_lines(&output);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("soundness") && lines[0].contains("supnorm"));
}

#[test]
fn empty_reports_exit_zero() {
    let dir = tempdir().expect("tempdir");
    for (name, document) in [
        ("none.json", json!([])),
        ("hollow.json", json!([{ "approx_error": { "value": 1e-6 }, "approx_list": [] }])),
    ] {
        let path = write_report(&dir, name, &document);
        for level in ["light", "strong"] {
            let output = run_on(&path, &["--check-level", level]);
            assert_eq!(output.status.code(), Some(0), "{name} in {level} mode");
            assert!(error_lines(&output).is_empty());
        }
    }
}

#[test]
fn malformed_input_is_fatal_before_checking() {
    let dir = tempdir().expect("tempdir");
    let broken = dir.path().join("broken.json");
    fs::write(&broken, b"[{ \"approx_error\": ").expect("write broken");
    let negative = write_report(&dir, "negative.json", &json!([{ "approx_error": { "value": -1.0 } }]));
    let missing = dir.path().join("missing.json");
    let certificate = dir.path().join("certificate.json");

    for path in [&broken, &negative, &missing] {
        let output = run_on(path, &["--report-out", certificate.to_str().expect("utf8 path")]);
        assert_eq!(output.status.code(), Some(2), "{}", path.display());
        assert!(error_lines(&output).is_empty());
        assert!(!certificate.exists());
    }
}

#[test]
fn invalid_configuration_is_fatal() {
    let dir = tempdir().expect("tempdir");
    let path = write_report(&dir, "ok.json", &json!([]));
    assert_eq!(run_on(&path, &["--precision", "0"]).status.code(), Some(2));

    let policy = dir.path().join("policy.yaml");
    fs::write(&policy, "jobs: 0\n").expect("write policy");
    let output = run_on(&path, &["--config", policy.to_str().expect("utf8 path")]);
    assert_eq!(output.status.code(), Some(2));

    fs::write(&policy, "check_level: strong\n").expect("write policy");
    let output = run_on(
        &path,
        &["--config", policy.to_str().expect("utf8 path"), "--check-level", "light"],
    );
    assert_eq!(output.status.code(), Some(0));
}

#[test]
fn certificates_are_byte_identical_across_runs() {
    let dir = tempdir().expect("tempdir");
    let path = write_report(
        &dir,
        "repeat.json",
        &json!([{ "tag": "exp", "function": "exp(x)", "approx_error": { "value": 1e-6 },
                  "approx_list": [piece(0.0, 0.5, 2e-6), piece(0.5, 1.0, 1e-7)] }]),
    );
    let first = dir.path().join("first.json");
    let second = dir.path().join("second.json");
    let a = run_on(&path, &["--report-out", first.to_str().expect("utf8 path")]);
    let b = run_on(&path, &["--report-out", second.to_str().expect("utf8 path"), "--jobs", "3"]);
    assert_eq!(a.status.code(), b.status.code());
    assert_eq!(error_lines(&a), error_lines(&b));

    let first_bytes = fs::read(&first).expect("first certificate");
    let cert: Value = serde_json::from_slice(&first_bytes).expect("json");
    assert_eq!(cert["status"], "failure");
    assert_eq!(cert["tally"]["checked"], 2);
    assert_eq!(cert["violations"].as_array().map(Vec::len), Some(1));

    let third = dir.path().join("third.json");
    run_on(&path, &["--report-out", third.to_str().expect("utf8 path")]);
    assert_eq!(first_bytes, fs::read(&third).expect("third certificate"));
}

#[test]
fn histograms_go_to_stdout_or_svg_files() {
    let dir = tempdir().expect("tempdir");
    let path = write_report(
        &dir,
        "hist.json",
        &json!([{ "function": "exp(x)", "approx_error": { "value": 1e-3 },
                  "approx_list": [piece(0.0, 0.5, 2e-7), piece(0.5, 1.0, 3e-5)] }]),
    );
    let output = run_on(&path, &["--error-hist"]);
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("error histogram for top[0] (2 values)"));

    let svg_dir = dir.path().join("svg");
    let output = run_on(
        &path,
        &["--error-hist", "--hist-dir", svg_dir.to_str().expect("utf8 path")],
    );
    assert_eq!(output.status.code(), Some(0));
    let svg = fs::read_to_string(svg_dir.join("hist_top0.svg")).expect("svg written");
    assert!(svg.starts_with("<svg"));
}
