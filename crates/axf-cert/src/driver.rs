//! Certification driver: traversal, fail-fast policy, tally and verdict.
//!
//! Work units are the pieces of each top-level approximation in pre-order.
//! Units of one top-level run on a rayon pool; their results are re-sorted by
//! unit index so the reported order never depends on scheduling. Under
//! `exit_on_error` units are dispatched in ordered batches of `jobs`: a batch
//! always runs to completion, then the first violation in order ends the run.

use std::fmt;

use axf_core::errors::{AxfError, ErrorInfo};
use axf_core::{ApproxReport, ErrorBound, NodeVisit};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::comparator::check_node;
use crate::histogram::Visualizer;
use crate::policy::CertifyConfig;
use crate::report::{Violation, ViolationKind};
use crate::soundness::{verify_soundness, Outcome};
use crate::strategy::CheckStrategy;

/// Final verdict of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitStatus {
    /// No violation.
    Success,
    /// At least one violation.
    Failure,
}

impl ExitStatus {
    /// Process exit code.
    pub fn code(&self) -> u8 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::Failure => 1,
        }
    }
}

/// Counters accumulated over a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Tally {
    /// Pieces checked, including the whole batch in flight when fail-fast triggers.
    pub checked: usize,
    /// Composition and incomparable-bound violations.
    pub composition: usize,
    /// Soundness violations.
    pub soundness: usize,
    /// Pieces whose recomputation failed.
    pub evaluation: usize,
}

impl Tally {
    fn record(&mut self, violation: &Violation) {
        match violation.kind {
            ViolationKind::Composition | ViolationKind::IncomparableBounds => self.composition += 1,
            ViolationKind::Soundness => self.soundness += 1,
            ViolationKind::Evaluation => self.evaluation += 1,
        }
    }

    /// Total number of violations.
    pub fn violations(&self) -> usize {
        self.composition + self.soundness + self.evaluation
    }
}

/// Driver lifecycle, logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// Run started.
    Running,
    /// Checking the pieces of a top-level approximation.
    Scanning(usize),
    /// Collecting results.
    Aggregating,
    /// Verdict reached.
    Terminal(ExitStatus),
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverState::Running => write!(f, "running"),
            DriverState::Scanning(top) => write!(f, "scanning top[{top}]"),
            DriverState::Aggregating => write!(f, "aggregating"),
            DriverState::Terminal(ExitStatus::Success) => write!(f, "terminal(success)"),
            DriverState::Terminal(ExitStatus::Failure) => write!(f, "terminal(failure)"),
        }
    }
}

fn enter(state: &mut DriverState, next: DriverState) {
    debug!(from = %state, to = %next, "driver state");
    *state = next;
}

/// Result of [`certify`].
#[derive(Debug, Clone, PartialEq)]
pub struct CertificationOutcome {
    /// Verdict.
    pub status: ExitStatus,
    /// Counters.
    pub tally: Tally,
    /// Violations in (top, path) order.
    pub violations: Vec<Violation>,
    /// Whether fail-fast ended the run.
    pub stopped_early: bool,
}

struct Unit<'a> {
    visit: NodeVisit<'a>,
    top_bound: &'a ErrorBound,
}

fn check_unit(
    report: &ApproxReport,
    unit: &Unit<'_>,
    strategy: CheckStrategy<'_>,
    config: &CertifyConfig,
) -> Result<Vec<Violation>, AxfError> {
    let mut found = Vec::new();
    if let Some(violation) = check_node(&unit.visit, unit.top_bound) {
        found.push(violation);
    }
    let Some(evaluator) = strategy.evaluator() else {
        return Ok(found);
    };
    let base = |kind| {
        Violation::new(
            unit.visit.locator.clone(),
            kind,
            &unit.visit.node.approx_error,
            unit.visit.parent_bound,
            unit.top_bound,
        )
    };
    match verify_soundness(report, unit.visit.id, evaluator, config) {
        Ok(Outcome::Sound) => {}
        Ok(Outcome::Unsound {
            supnorm, infnorm, ..
        }) => found.push(base(ViolationKind::Soundness).with_norms(supnorm, infnorm)),
        Err(AxfError::Evaluation(info)) => {
            debug!(locator = %unit.visit.locator, code = %info.code, "recomputation failed");
            found.push(base(ViolationKind::Evaluation).with_error(info));
        }
        Err(other) => return Err(other),
    }
    Ok(found)
}

fn run_units(
    pool: &rayon::ThreadPool,
    report: &ApproxReport,
    units: &[Unit<'_>],
    strategy: CheckStrategy<'_>,
    config: &CertifyConfig,
) -> Result<Vec<Vec<Violation>>, AxfError> {
    let results: Result<Vec<_>, AxfError> = pool.install(|| {
        units
            .par_iter()
            .enumerate()
            .map(|(index, unit)| -> Result<(usize, Vec<Violation>), AxfError> {
                Ok((index, check_unit(report, unit, strategy, config)?))
            })
            .collect()
    });
    let mut ordered = results?;
    ordered.sort_by_key(|(index, _)| *index);
    Ok(ordered.into_iter().map(|(_, found)| found).collect())
}

fn error_values(report: &ApproxReport, top: usize) -> Result<Vec<f64>, AxfError> {
    report
        .top(top)?
        .approx_list
        .iter()
        .map(|id| report.node(*id).map(|node| node.approx_error.value()))
        .collect()
}

/// Certifies every top-level approximation of `report`.
///
/// Composition (and, for [`CheckStrategy::Strong`], soundness) is checked for
/// every piece. Evaluation failures become [`ViolationKind::Evaluation`]
/// records; only arena inconsistencies and pool setup failures abort the run.
pub fn certify(
    report: &ApproxReport,
    strategy: CheckStrategy<'_>,
    config: &CertifyConfig,
    mut visualizer: Option<&mut dyn Visualizer>,
) -> Result<CertificationOutcome, AxfError> {
    config.validate()?;
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.jobs)
        .build()
        .map_err(|err| AxfError::Config(ErrorInfo::new("thread-pool", err.to_string())))?;

    let mut state = DriverState::Running;
    debug!(state = %state, strategy = ?strategy, jobs = config.jobs, "certification started");
    let batch = if config.exit_on_error {
        config.jobs
    } else {
        usize::MAX
    };
    let mut tally = Tally::default();
    let mut violations = Vec::new();
    let mut stopped_early = false;

    'tops: for (top_index, top) in report.tops().iter().enumerate() {
        enter(&mut state, DriverState::Scanning(top_index));
        if config.error_hist {
            if let Some(visualizer) = visualizer.as_deref_mut() {
                let values = error_values(report, top_index)?;
                if let Err(err) = visualizer.render(top_index, top.tag.as_deref(), &values) {
                    warn!(top = top_index, error = %err, "visualizer failed");
                }
            }
        }

        let units: Vec<Unit<'_>> = report
            .walk(top_index)?
            .into_iter()
            .map(|visit| Unit {
                visit,
                top_bound: &top.approx_error,
            })
            .collect();
        let before = tally.violations();
        for chunk in units.chunks(batch.max(1)) {
            let results = run_units(&pool, report, chunk, strategy, config)?;
            tally.checked += chunk.len();
            for violation in results.into_iter().flatten() {
                tally.record(&violation);
                violations.push(violation);
                if config.exit_on_error {
                    stopped_early = true;
                    break 'tops;
                }
            }
        }
        info!(
            top = top_index,
            tag = top.tag.as_deref().unwrap_or(""),
            pieces = units.len(),
            violations = tally.violations() - before,
            "top-level approximation checked"
        );
    }

    enter(&mut state, DriverState::Aggregating);
    let status = if violations.is_empty() {
        ExitStatus::Success
    } else {
        ExitStatus::Failure
    };
    enter(&mut state, DriverState::Terminal(status));
    info!(
        level = %strategy.level(),
        checked = tally.checked,
        composition = tally.composition,
        soundness = tally.soundness,
        evaluation = tally.evaluation,
        stopped_early,
        ?status,
        "certification finished"
    );
    Ok(CertificationOutcome {
        status,
        tally,
        violations,
        stopped_early,
    })
}
