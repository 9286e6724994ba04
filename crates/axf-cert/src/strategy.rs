//! Check-level strategy selected once per run.

use std::fmt;

use axf_norm::NormEvaluator;

use crate::policy::CheckLevel;

/// Checking strategy chosen once per run and threaded through the driver.
#[derive(Clone, Copy)]
pub enum CheckStrategy<'a> {
    /// Composition checks only.
    Light,
    /// Composition checks plus soundness recomputation with the given backend.
    Strong(&'a dyn NormEvaluator),
}

impl<'a> CheckStrategy<'a> {
    /// Picks the strategy for `level`; strong mode needs a backend.
    pub fn for_level(level: CheckLevel, evaluator: &'a dyn NormEvaluator) -> Self {
        match level {
            CheckLevel::Light => CheckStrategy::Light,
            CheckLevel::Strong => CheckStrategy::Strong(evaluator),
        }
    }

    /// Level this strategy implements.
    pub fn level(&self) -> CheckLevel {
        match self {
            CheckStrategy::Light => CheckLevel::Light,
            CheckStrategy::Strong(_) => CheckLevel::Strong,
        }
    }

    /// Backend used for soundness checks, if any.
    pub fn evaluator(&self) -> Option<&'a dyn NormEvaluator> {
        match self {
            CheckStrategy::Light => None,
            CheckStrategy::Strong(evaluator) => Some(*evaluator),
        }
    }
}

impl fmt::Debug for CheckStrategy<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckStrategy::Light => write!(f, "Light"),
            CheckStrategy::Strong(evaluator) => write!(f, "Strong({})", evaluator.name()),
        }
    }
}
