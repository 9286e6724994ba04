//! Certification policy loaded from YAML.

use std::fmt;
use std::fs;
use std::path::Path;

use axf_core::errors::{AxfError, ErrorInfo};
use axf_core::ErrorBound;
use axf_norm::{SampledOpts, DEFAULT_PRECISION_BITS, MAX_PRECISION_BITS};
use serde::{Deserialize, Serialize};

fn config_error(code: &str, message: impl Into<String>) -> AxfError {
    AxfError::Config(ErrorInfo::new(code, message.into()))
}

/// Which invariants the driver checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CheckLevel {
    /// Composition only.
    #[default]
    Light,
    /// Composition plus recomputed soundness.
    Strong,
}

impl fmt::Display for CheckLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckLevel::Light => write!(f, "light"),
            CheckLevel::Strong => write!(f, "strong"),
        }
    }
}

/// How a claim is judged against the two recomputed norms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Acceptance {
    /// Sound when the claim dominates the supremum norm or the infinity norm.
    #[default]
    Either,
    /// Sound only when the claim dominates both norms.
    Both,
}

impl Acceptance {
    /// Applies the rule to a claimed value.
    pub fn accepts(&self, claimed: f64, supnorm: f64, infnorm: f64) -> bool {
        match self {
            Acceptance::Either => claimed >= supnorm || claimed >= infnorm,
            Acceptance::Both => claimed >= supnorm && claimed >= infnorm,
        }
    }
}

impl fmt::Display for Acceptance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Acceptance::Either => write!(f, "either"),
            Acceptance::Both => write!(f, "both"),
        }
    }
}

/// Certification settings, loadable from YAML; absent keys take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CertifyConfig {
    /// Light or strong checking.
    #[serde(default)]
    pub check_level: CheckLevel,
    /// Stop at the first violation.
    #[serde(default)]
    pub exit_on_error: bool,
    /// Hand per-top error values to the visualizer.
    #[serde(default)]
    pub error_hist: bool,
    /// Working precision used when a bound does not carry its own.
    #[serde(default = "CertifyConfig::default_precision_bits")]
    pub precision_bits: u32,
    /// Grid size of the sampling backend.
    #[serde(default = "CertifyConfig::default_samples")]
    pub samples: usize,
    /// Golden-section iterations per refined maximum.
    #[serde(default = "CertifyConfig::default_refine_iterations")]
    pub refine_iterations: u32,
    /// Local maxima refined per norm.
    #[serde(default = "CertifyConfig::default_refine_candidates")]
    pub refine_candidates: usize,
    /// Soundness acceptance rule.
    #[serde(default)]
    pub acceptance: Acceptance,
    /// Worker threads.
    #[serde(default = "CertifyConfig::default_jobs")]
    pub jobs: usize,
}

impl CertifyConfig {
    const fn default_precision_bits() -> u32 {
        DEFAULT_PRECISION_BITS
    }

    fn default_samples() -> usize {
        SampledOpts::default().samples
    }

    fn default_refine_iterations() -> u32 {
        SampledOpts::default().refine_iterations
    }

    fn default_refine_candidates() -> usize {
        SampledOpts::default().refine_candidates
    }

    const fn default_jobs() -> usize {
        1
    }

    /// Parses a YAML policy document.
    pub fn from_yaml_slice(bytes: &[u8]) -> Result<Self, AxfError> {
        let config: CertifyConfig = serde_yaml::from_slice(bytes).map_err(|err| {
            AxfError::Config(
                ErrorInfo::new("config-parse", err.to_string())
                    .with_hint("see CertifyConfig for the accepted keys"),
            )
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a YAML policy file.
    pub fn load(path: &Path) -> Result<Self, AxfError> {
        let bytes = fs::read(path).map_err(|err| {
            AxfError::Config(
                ErrorInfo::new("config-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        Self::from_yaml_slice(&bytes).map_err(|err| match err {
            AxfError::Config(info) => {
                AxfError::Config(info.with_context("path", path.display().to_string()))
            }
            other => other,
        })
    }

    /// Rejects settings no run could honour.
    pub fn validate(&self) -> Result<(), AxfError> {
        if self.precision_bits == 0 || self.precision_bits > MAX_PRECISION_BITS {
            return Err(AxfError::Config(
                ErrorInfo::new("invalid-precision", "working precision is out of range")
                    .with_context("precision_bits", self.precision_bits.to_string())
                    .with_hint(format!("use 1..={MAX_PRECISION_BITS} bits")),
            ));
        }
        if self.samples < 2 {
            return Err(config_error(
                "invalid-samples",
                "the sampling backend needs at least two points",
            ));
        }
        if self.jobs == 0 {
            return Err(config_error("invalid-jobs", "at least one worker is required"));
        }
        Ok(())
    }

    /// Tuning handed to [`axf_norm::SampledNormEvaluator`].
    pub fn sampled_opts(&self) -> SampledOpts {
        SampledOpts {
            samples: self.samples,
            refine_iterations: self.refine_iterations,
            refine_candidates: self.refine_candidates,
        }
    }

    /// Precision used to recompute `bound`.
    pub fn precision_for(&self, bound: &ErrorBound) -> u32 {
        bound.precision_bits().unwrap_or(self.precision_bits)
    }
}

impl Default for CertifyConfig {
    fn default() -> Self {
        Self {
            check_level: CheckLevel::default(),
            exit_on_error: false,
            error_hist: false,
            precision_bits: Self::default_precision_bits(),
            samples: Self::default_samples(),
            refine_iterations: Self::default_refine_iterations(),
            refine_candidates: Self::default_refine_candidates(),
            acceptance: Acceptance::default(),
            jobs: Self::default_jobs(),
        }
    }
}
