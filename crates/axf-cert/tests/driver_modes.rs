mod common;

use axf_cert::{
    certify, CertificationReport, CertifyConfig, CheckLevel, CheckStrategy, ExitStatus,
    TextHistogram, ViolationKind, Visualizer,
};
use axf_core::errors::{AxfError, ErrorInfo};
use axf_norm::FixedNormEvaluator;

use common::{absolute, build, flat, nested, piece};

fn two_violations() -> axf_core::ApproxReport {
    flat(&[(1e-6, &[2e-6, 1e-7]), (1e-6, &[1e-7, 3e-6])])
}

#[test]
fn fail_fast_reports_exactly_one_violation() -> Result<(), AxfError> {
    let report = two_violations();
    for jobs in [1, 2, 8] {
        let config = CertifyConfig {
            exit_on_error: true,
            jobs,
            ..CertifyConfig::default()
        };
        let outcome = certify(&report, CheckStrategy::Light, &config, None)?;
        assert_eq!(outcome.status, ExitStatus::Failure);
        assert!(outcome.stopped_early);
        assert_eq!(outcome.violations.len(), 1);
        assert_eq!(outcome.violations[0].locator.to_string(), "top[0].sub[0]");
        assert_eq!(outcome.tally.composition, 1);
    }
    Ok(())
}

#[test]
fn fail_fast_stops_scheduling_later_units() -> Result<(), AxfError> {
    let report = two_violations();
    let evaluator = FixedNormEvaluator::new(0.0, 0.0);
    let config = CertifyConfig {
        check_level: CheckLevel::Strong,
        exit_on_error: true,
        ..CertifyConfig::default()
    };
    let outcome = certify(&report, CheckStrategy::Strong(&evaluator), &config, None)?;
    assert_eq!(outcome.tally.checked, 1);
    assert_eq!(evaluator.calls(), 1);
    Ok(())
}

#[test]
fn accumulate_mode_reports_every_violation_in_order() -> Result<(), AxfError> {
    let report = two_violations();
    for jobs in [1, 3] {
        let config = CertifyConfig {
            jobs,
            ..CertifyConfig::default()
        };
        let outcome = certify(&report, CheckStrategy::Light, &config, None)?;
        let locators: Vec<String> = outcome
            .violations
            .iter()
            .map(|v| v.locator.to_string())
            .collect();
        assert_eq!(locators, vec!["top[0].sub[0]", "top[1].sub[1]"]);
        assert!(!outcome.stopped_early);
        assert_eq!(outcome.tally.checked, 4);
        assert_eq!(outcome.tally.violations(), 2);
    }
    Ok(())
}

#[test]
fn one_piece_can_fail_both_checks() -> Result<(), AxfError> {
    let report = flat(&[(1e-6, &[2e-6])]);
    let evaluator = FixedNormEvaluator::new(1e-5, 1e-5);
    let config = CertifyConfig {
        check_level: CheckLevel::Strong,
        ..CertifyConfig::default()
    };
    let outcome = certify(&report, CheckStrategy::Strong(&evaluator), &config, None)?;
    let kinds: Vec<_> = outcome.violations.iter().map(|v| v.kind).collect();
    assert_eq!(kinds, vec![ViolationKind::Composition, ViolationKind::Soundness]);

    let fail_fast = CertifyConfig {
        exit_on_error: true,
        ..config
    };
    let outcome = certify(&report, CheckStrategy::Strong(&evaluator), &fail_fast, None)?;
    assert_eq!(outcome.violations.len(), 1);
    assert_eq!(outcome.violations[0].kind, ViolationKind::Composition);
    Ok(())
}

#[test]
fn empty_reports_succeed_vacuously() -> Result<(), AxfError> {
    let evaluator = FixedNormEvaluator::new(1.0, 1.0);
    for report in [flat(&[]), flat(&[(1e-6, &[]), (0.0, &[])])] {
        for strategy in [CheckStrategy::Light, CheckStrategy::Strong(&evaluator)] {
            let outcome = certify(&report, strategy, &CertifyConfig::default(), None)?;
            assert_eq!(outcome.status, ExitStatus::Success);
            assert_eq!(outcome.status.code(), 0);
            assert!(outcome.violations.is_empty());
            assert_eq!(outcome.tally.checked, 0);
        }
    }
    Ok(())
}

#[test]
fn repeated_runs_are_identical() -> Result<(), AxfError> {
    let report = build(vec![
        (
            absolute(1e-6),
            vec![nested(absolute(2e-6), vec![piece(absolute(3e-6))]), piece(absolute(1e-7))],
        ),
        (absolute(1e-4), vec![piece(absolute(2e-4))]),
    ]);
    let evaluator = FixedNormEvaluator::new(5e-7, 5e-7);
    let config = CertifyConfig {
        check_level: CheckLevel::Strong,
        jobs: 4,
        ..CertifyConfig::default()
    };
    let first = certify(&report, CheckStrategy::Strong(&evaluator), &config, None)?;
    let second = certify(&report, CheckStrategy::Strong(&evaluator), &config, None)?;
    assert_eq!(first, second);

    let sequential = CertifyConfig { jobs: 1, ..config.clone() };
    let third = certify(&report, CheckStrategy::Strong(&evaluator), &sequential, None)?;
    assert_eq!(first.violations, third.violations);

    let cert_a = CertificationReport::new("abc", &config, &first)?;
    let cert_b = CertificationReport::new("abc", &config, &second)?;
    assert_eq!(cert_a.to_bytes()?, cert_b.to_bytes()?);
    assert_eq!(cert_a.analysis_hash.len(), 64);
    let other_input = CertificationReport::new("abd", &config, &first)?;
    assert_ne!(cert_a.analysis_hash, other_input.analysis_hash);
    Ok(())
}

#[test]
fn certificate_records_verdict_and_violations() -> Result<(), AxfError> {
    let report = flat(&[(1e-6, &[2e-6])]);
    let config = CertifyConfig::default();
    let outcome = certify(&report, CheckStrategy::Light, &config, None)?;
    let cert = CertificationReport::new("deadbeef", &config, &outcome)?;
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("certificate.json");
    cert.write(&path)?;
    let value: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&path).expect("read certificate")).expect("json");
    assert_eq!(value["status"], "failure");
    assert_eq!(value["input_hash"], "deadbeef");
    assert_eq!(value["tally"]["composition"], 1);
    assert_eq!(value["violations"][0]["kind"], "composition");
    assert_eq!(value["violations"][0]["locator"]["path"][0], 0);
    assert_eq!(value["config"]["check_level"], "light");
    Ok(())
}

#[test]
fn invalid_config_is_rejected_before_checking() {
    let report = flat(&[(1e-6, &[2e-6])]);
    let config = CertifyConfig {
        jobs: 0,
        ..CertifyConfig::default()
    };
    let err = certify(&report, CheckStrategy::Light, &config, None).unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(err.info().code, "invalid-jobs");
}

struct Collecting(Vec<(usize, Option<String>, Vec<f64>)>);

impl Visualizer for Collecting {
    fn render(&mut self, top: usize, tag: Option<&str>, values: &[f64]) -> Result<(), AxfError> {
        self.0.push((top, tag.map(str::to_string), values.to_vec()));
        Ok(())
    }
}

struct Broken;

impl Visualizer for Broken {
    fn render(&mut self, _top: usize, _tag: Option<&str>, _values: &[f64]) -> Result<(), AxfError> {
        Err(AxfError::Serde(ErrorInfo::new("histogram_write", "disk full")))
    }
}

#[test]
fn visualizer_sees_direct_piece_errors_only_when_requested() -> Result<(), AxfError> {
    let report = build(vec![(
        absolute(1e-3),
        vec![nested(absolute(1e-4), vec![piece(absolute(1e-9))]), piece(absolute(2e-5))],
    )]);
    let mut collecting = Collecting(Vec::new());
    certify(&report, CheckStrategy::Light, &CertifyConfig::default(), Some(&mut collecting))?;
    assert!(collecting.0.is_empty());

    let config = CertifyConfig {
        error_hist: true,
        ..CertifyConfig::default()
    };
    certify(&report, CheckStrategy::Light, &config, Some(&mut collecting))?;
    assert_eq!(collecting.0, vec![(0, Some("top-0".to_string()), vec![1e-4, 2e-5])]);
    Ok(())
}

#[test]
fn visualizer_failure_does_not_change_the_verdict() -> Result<(), AxfError> {
    let config = CertifyConfig {
        error_hist: true,
        ..CertifyConfig::default()
    };
    let passing = flat(&[(1e-6, &[1e-7])]);
    let outcome = certify(&passing, CheckStrategy::Light, &config, Some(&mut Broken))?;
    assert_eq!(outcome.status, ExitStatus::Success);

    let mut text = TextHistogram::new(Vec::new());
    let outcome = certify(&passing, CheckStrategy::Light, &config, Some(&mut text))?;
    assert_eq!(outcome.status, ExitStatus::Success);
    let printed = String::from_utf8(text.into_inner()).expect("utf8");
    assert!(printed.starts_with("error histogram for top[0] (top-0) (1 values)"));
    Ok(())
}
