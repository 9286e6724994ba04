use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use axf_core::errors::{AxfError, ErrorInfo};
use axf_core::ErrorKind;

use crate::evaluator::{NormEstimate, NormEvaluator, NormRequest};

/// Canned answer returned by [`FixedNormEvaluator`].
#[derive(Debug, Clone, PartialEq)]
pub enum FixedAnswer {
    /// Succeed with these norms.
    Norms {
        /// Kind-weighted supremum norm.
        supnorm: f64,
        /// Raw infinity norm.
        infnorm: f64,
    },
    /// Fail with an evaluation error carrying this code.
    Fail(String),
}

/// Deterministic backend answering from a table keyed by function expression.
#[derive(Debug)]
pub struct FixedNormEvaluator {
    fallback: FixedAnswer,
    by_expr: BTreeMap<String, FixedAnswer>,
    reported_kind: Option<ErrorKind>,
    calls: AtomicUsize,
}

impl FixedNormEvaluator {
    /// Answers every request with the same norms.
    pub fn new(supnorm: f64, infnorm: f64) -> Self {
        Self {
            fallback: FixedAnswer::Norms { supnorm, infnorm },
            by_expr: BTreeMap::new(),
            reported_kind: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Fails every request with `code`.
    pub fn failing(code: impl Into<String>) -> Self {
        Self {
            fallback: FixedAnswer::Fail(code.into()),
            ..Self::new(0.0, 0.0)
        }
    }

    /// Overrides the answer for requests on the function `expr`.
    pub fn with_answer(mut self, expr: impl Into<String>, answer: FixedAnswer) -> Self {
        self.by_expr.insert(expr.into(), answer);
        self
    }

    /// Reports `kind` in every estimate regardless of the request.
    pub fn reporting_kind(mut self, kind: ErrorKind) -> Self {
        self.reported_kind = Some(kind);
        self
    }

    /// Number of evaluations served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl NormEvaluator for FixedNormEvaluator {
    fn name(&self) -> &str {
        "fixed"
    }

    fn evaluate(&self, request: &NormRequest<'_>) -> Result<NormEstimate, AxfError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let answer = self
            .by_expr
            .get(&request.function.expr)
            .unwrap_or(&self.fallback);
        match answer {
            FixedAnswer::Norms { supnorm, infnorm } => Ok(NormEstimate {
                kind: self.reported_kind.unwrap_or(request.kind),
                supnorm: *supnorm,
                infnorm: *infnorm,
            }),
            FixedAnswer::Fail(code) => Err(AxfError::Evaluation(
                ErrorInfo::new(code.clone(), "fixed evaluator configured to fail")
                    .with_context("function", request.function.expr.clone()),
            )),
        }
    }
}
