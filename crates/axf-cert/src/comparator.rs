//! Composition check: every piece must be dominated by its enclosing bound.

use axf_core::errors::AxfError;
use axf_core::{ApproxReport, ErrorBound, NodeVisit};
use tracing::debug;

use crate::report::{Violation, ViolationKind};

/// Checks one piece against its direct parent's bound.
pub fn check_node(visit: &NodeVisit<'_>, top_bound: &ErrorBound) -> Option<Violation> {
    let claimed = &visit.node.approx_error;
    let kind = match visit.parent_bound.dominates(claimed) {
        Some(true) => return None,
        Some(false) => ViolationKind::Composition,
        None => ViolationKind::IncomparableBounds,
    };
    debug!(locator = %visit.locator, %kind, claimed = %claimed, parent = %visit.parent_bound, "composition check failed");
    Some(Violation::new(
        visit.locator.clone(),
        kind,
        claimed,
        visit.parent_bound,
        top_bound,
    ))
}

/// Composition violations under top-level `top_index`, in pre-order.
///
/// Direct pieces are compared with the top-level bound and nested pieces with
/// their enclosing piece. Bounds recorded under different norm kinds are never
/// coerced and yield [`ViolationKind::IncomparableBounds`].
pub fn check_composition(report: &ApproxReport, top_index: usize) -> Result<Vec<Violation>, AxfError> {
    let top_bound = &report.top(top_index)?.approx_error;
    Ok(report
        .walk(top_index)?
        .iter()
        .filter_map(|visit| check_node(visit, top_bound))
        .collect())
}
