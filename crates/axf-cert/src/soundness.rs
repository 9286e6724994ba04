//! Soundness check of a recorded bound against recomputed norms.

use axf_core::errors::{AxfError, ErrorInfo};
use axf_core::{ApproxReport, NodeId};
use axf_norm::{NormEvaluator, NormRequest};
use tracing::debug;

use crate::policy::CertifyConfig;

/// Verdict of a soundness recomputation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    /// The claim dominates the recomputed error under the acceptance rule.
    Sound,
    /// The claim fails the acceptance rule.
    Unsound {
        /// Recomputed kind-weighted supremum norm.
        supnorm: f64,
        /// Recomputed raw infinity norm.
        infnorm: f64,
        /// Claimed value.
        claimed: f64,
    },
}

/// Recomputes the error of `node` with `evaluator` and judges its claim.
///
/// The working precision is the bound's own when recorded, otherwise the
/// configured default. Backends must echo the requested error kind; a
/// mismatch or a non-finite estimate is an evaluation error.
pub fn verify_soundness(
    report: &ApproxReport,
    node: NodeId,
    evaluator: &dyn NormEvaluator,
    config: &CertifyConfig,
) -> Result<Outcome, AxfError> {
    let sub = report.node(node)?;
    let bound = &sub.approx_error;
    let request = NormRequest {
        function: report.functions().get(sub.function)?,
        polynomial: &sub.polynomial,
        interval: sub.interval,
        kind: bound.kind().kind,
        precision_bits: config.precision_for(bound),
    };
    let estimate = evaluator.evaluate(&request)?;
    if estimate.kind != request.kind {
        return Err(AxfError::Evaluation(
            ErrorInfo::new("kind-mismatch", "backend measured a different error kind")
                .with_context("requested", request.kind.to_string())
                .with_context("returned", estimate.kind.to_string())
                .with_context("backend", evaluator.name()),
        ));
    }
    for (name, value) in [("supnorm", estimate.supnorm), ("infnorm", estimate.infnorm)] {
        if !value.is_finite() || value < 0.0 {
            return Err(AxfError::Evaluation(
                ErrorInfo::new("invalid-estimate", "backend returned an unusable norm")
                    .with_context(name, value.to_string())
                    .with_context("backend", evaluator.name()),
            ));
        }
    }

    let claimed = bound.value();
    debug!(
        node = %node,
        claimed,
        supnorm = estimate.supnorm,
        infnorm = estimate.infnorm,
        bits = request.precision_bits,
        "recomputed error norms"
    );
    if config
        .acceptance
        .accepts(claimed, estimate.supnorm, estimate.infnorm)
    {
        Ok(Outcome::Sound)
    } else {
        Ok(Outcome::Unsound {
            supnorm: estimate.supnorm,
            infnorm: estimate.infnorm,
            claimed,
        })
    }
}
