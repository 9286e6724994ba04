use axf_core::errors::AxfError;
use axf_core::{ErrorKind, FunctionDef, FunctionId, Interval, Polynomial};
use axf_norm::{
    round_to_precision, FixedAnswer, FixedNormEvaluator, NormEvaluator, NormRequest,
    SampledNormEvaluator, SampledOpts,
};
use proptest::prelude::*;

fn function(expr: &str) -> FunctionDef {
    FunctionDef {
        id: FunctionId::from_raw(0),
        expr: expr.to_string(),
    }
}

fn request<'a>(
    function: &'a FunctionDef,
    polynomial: &'a Polynomial,
    lo: f64,
    hi: f64,
    kind: ErrorKind,
) -> NormRequest<'a> {
    NormRequest {
        function,
        polynomial,
        interval: Interval::new(lo, hi).unwrap(),
        kind,
        precision_bits: 24,
    }
}

#[test]
fn absolute_norm_of_taylor_exp_matches_closed_form() -> Result<(), AxfError> {
    let exp = function("exp(x)");
    let taylor = Polynomial::from_dense(&[1.0, 1.0]);
    let estimate = SampledNormEvaluator::default().evaluate(&request(
        &exp,
        &taylor,
        0.0,
        0.5,
        ErrorKind::Absolute,
    ))?;
    let exact = 0.5f64.exp() - 1.5;
    assert_eq!(estimate.kind, ErrorKind::Absolute);
    assert!((estimate.supnorm - exact).abs() <= exact * 1e-6);
    assert_eq!(estimate.supnorm, estimate.infnorm);
    Ok(())
}

#[test]
fn relative_norm_differs_from_raw_norm() -> Result<(), AxfError> {
    let exp = function("exp(x)");
    let taylor = Polynomial::from_dense(&[1.0, 1.0]);
    let estimate = SampledNormEvaluator::default().evaluate(&request(
        &exp,
        &taylor,
        0.0,
        0.5,
        ErrorKind::Relative,
    ))?;
    let raw = 0.5f64.exp() - 1.5;
    let relative = raw / 0.5f64.exp();
    assert!((estimate.infnorm - raw).abs() <= raw * 1e-6);
    assert!((estimate.supnorm - relative).abs() <= relative * 1e-6);
    Ok(())
}

#[test]
fn refinement_finds_interior_peak_between_grid_points() -> Result<(), AxfError> {
    let bump = function("x * (1 - x)");
    let zero = Polynomial::default();
    let coarse = SampledNormEvaluator::new(SampledOpts {
        samples: 10,
        refine_iterations: 80,
        refine_candidates: 2,
    });
    let estimate = coarse.evaluate(&request(&bump, &zero, 0.0, 1.0, ErrorKind::Absolute))?;
    assert!((estimate.infnorm - 0.25).abs() < 1e-9);
    Ok(())
}

#[test]
fn degenerate_interval_evaluates_single_point() -> Result<(), AxfError> {
    let identity = function("x");
    let zero = Polynomial::default();
    let estimate = SampledNormEvaluator::default().evaluate(&request(
        &identity,
        &zero,
        0.5,
        0.5,
        ErrorKind::Absolute,
    ))?;
    assert_eq!(estimate.infnorm, 0.5);
    Ok(())
}

#[test]
fn relative_error_at_removable_zero_is_accepted() -> Result<(), AxfError> {
    let sin = function("sin(x)");
    let linear = Polynomial::from_dense(&[0.0, 1.0]);
    let estimate = SampledNormEvaluator::default().evaluate(&request(
        &sin,
        &linear,
        0.0,
        0.25,
        ErrorKind::Relative,
    ))?;
    assert!(estimate.supnorm > 0.0 && estimate.supnorm < 0.011);
    Ok(())
}

#[test]
fn relative_error_where_function_vanishes_fails() {
    let identity = function("x");
    let shifted = Polynomial::from_dense(&[1.0, 1.0]);
    let err = SampledNormEvaluator::default()
        .evaluate(&request(&identity, &shifted, 0.0, 1.0, ErrorKind::Relative))
        .unwrap_err();
    assert_eq!(err.info().code, "relative-undefined");
}

#[test]
fn non_finite_error_expression_fails() {
    let log = function("log(x)");
    let zero = Polynomial::default();
    let err = SampledNormEvaluator::default()
        .evaluate(&request(&log, &zero, 0.0, 1.0, ErrorKind::Absolute))
        .unwrap_err();
    assert!(matches!(err, AxfError::Evaluation(_)));
    assert_eq!(err.info().code, "non-finite");
}

#[test]
fn out_of_range_precision_is_rejected() {
    let identity = function("x");
    let zero = Polynomial::default();
    for bits in [0, 54] {
        let mut req = request(&identity, &zero, 0.0, 1.0, ErrorKind::Absolute);
        req.precision_bits = bits;
        let err = SampledNormEvaluator::default().evaluate(&req).unwrap_err();
        assert_eq!(err.info().code, "invalid-precision");
    }
}

#[test]
fn fixed_evaluator_answers_by_expression() {
    let stub = FixedNormEvaluator::new(1e-3, 2e-3)
        .with_answer("sin(x)", FixedAnswer::Fail("no-convergence".into()));
    let exp = function("exp(x)");
    let sin = function("sin(x)");
    let zero = Polynomial::default();
    let ok = stub
        .evaluate(&request(&exp, &zero, 0.0, 1.0, ErrorKind::Relative))
        .unwrap();
    assert_eq!((ok.supnorm, ok.infnorm, ok.kind), (1e-3, 2e-3, ErrorKind::Relative));
    let err = stub
        .evaluate(&request(&sin, &zero, 0.0, 1.0, ErrorKind::Absolute))
        .unwrap_err();
    assert_eq!(err.info().code, "no-convergence");
    assert_eq!(stub.calls(), 2);
}

#[test]
fn rounding_moves_up_to_the_next_representable_unit() {
    assert_eq!(round_to_precision(1.0 + 2f64.powi(-30), 24), 1.0 + 2f64.powi(-23));
    assert_eq!(round_to_precision(1.0 + 2f64.powi(-23), 24), 1.0 + 2f64.powi(-23));
    assert_eq!(round_to_precision(1.0, 24), 1.0);
    assert_eq!(round_to_precision(0.1, 53), 0.1);
    assert_eq!(round_to_precision(0.0, 24), 0.0);
}

#[test]
fn sampled_norms_never_round_below_the_true_error() -> Result<(), AxfError> {
    let zero = function("0");
    let poly = Polynomial::from_dense(&[1.0 + 2f64.powi(-30)]);
    let estimate = SampledNormEvaluator::default()
        .evaluate(&request(&zero, &poly, 0.0, 1.0, ErrorKind::Absolute))?;
    assert!(estimate.infnorm > 1.0);
    assert!(estimate.supnorm >= 1.0 + 2f64.powi(-30));
    Ok(())
}

proptest! {
    #[test]
    fn rounding_never_decreases_and_stays_within_one_unit(value in 1e-300f64..1e300, bits in 1u32..53) {
        let rounded = round_to_precision(value, bits);
        prop_assert!(rounded >= value);
        prop_assert!(rounded - value <= value * 2f64.powi(1 - bits as i32));
    }
}
