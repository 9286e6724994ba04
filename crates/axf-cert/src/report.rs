//! Violation records and the canonical certificate.

use std::fmt;
use std::fs;
use std::path::Path;

use axf_core::errors::{AxfError, ErrorInfo};
use axf_core::hash::stable_hash_string;
use axf_core::serde::to_canonical_json_bytes;
use axf_core::{ErrorBound, Locator, NormKind, SchemaVersion, ToolVersions};
use serde::{Deserialize, Serialize};

use crate::driver::{CertificationOutcome, ExitStatus, Tally};
use crate::policy::CertifyConfig;

/// Schema of the certificate written by [`CertificationReport::write`].
pub const CERTIFICATE_SCHEMA: SchemaVersion = SchemaVersion::new(1, 0, 0);

/// Category of a recorded violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// A piece claims more error than its parent.
    Composition,
    /// A piece and its parent record bounds under different norm kinds.
    ///
    /// Such a mismatch is a configuration problem of the report, but it is
    /// recorded as a violation (exit status 1) rather than aborting the run,
    /// and the bounds are never converted into each other.
    IncomparableBounds,
    /// The claim is below the recomputed norms.
    Soundness,
    /// The norm backend could not judge the piece.
    Evaluation,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ViolationKind::Composition => "composition",
            ViolationKind::IncomparableBounds => "incomparable-bounds",
            ViolationKind::Soundness => "soundness",
            ViolationKind::Evaluation => "evaluation",
        };
        f.write_str(label)
    }
}

/// Claimed value together with the norm kind it was recorded under.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    /// Claimed error.
    pub value: f64,
    /// Norm kind of the claim.
    pub kind: NormKind,
}

impl From<&ErrorBound> for Claim {
    fn from(bound: &ErrorBound) -> Self {
        Self {
            value: bound.value(),
            kind: bound.kind(),
        }
    }
}

impl fmt::Display for Claim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:e} ({})", self.value, self.kind)
    }
}

/// One failed check, located precisely enough to re-derive it by hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// Position of the offending piece.
    pub locator: Locator,
    /// What failed.
    pub kind: ViolationKind,
    /// The piece's own claim.
    pub claimed: Claim,
    /// Claim of the direct parent (the top-level for direct pieces).
    pub parent: Claim,
    /// Claim of the enclosing top-level approximation.
    pub top: Claim,
    /// Recomputed kind-weighted supremum norm.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub supnorm: Option<f64>,
    /// Recomputed raw infinity norm.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub infnorm: Option<f64>,
    /// Backend failure behind an evaluation violation.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<ErrorInfo>,
}

impl Violation {
    pub(crate) fn new(
        locator: Locator,
        kind: ViolationKind,
        claimed: &ErrorBound,
        parent: &ErrorBound,
        top: &ErrorBound,
    ) -> Self {
        Self {
            locator,
            kind,
            claimed: claimed.into(),
            parent: parent.into(),
            top: top.into(),
            supnorm: None,
            infnorm: None,
            error: None,
        }
    }

    pub(crate) fn with_norms(mut self, supnorm: f64, infnorm: f64) -> Self {
        self.supnorm = Some(supnorm);
        self.infnorm = Some(infnorm);
        self
    }

    pub(crate) fn with_error(mut self, error: ErrorInfo) -> Self {
        self.error = Some(error);
        self
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: ", self.locator, self.kind)?;
        match self.kind {
            ViolationKind::Composition => write!(
                f,
                "approx-error {} exceeds parent bound {}",
                self.claimed, self.parent
            )?,
            ViolationKind::IncomparableBounds => write!(
                f,
                "approx-error {} cannot be compared with parent bound {}",
                self.claimed, self.parent
            )?,
            ViolationKind::Soundness => write!(
                f,
                "approx-error {} does not dominate recomputed supnorm {:e} / infnorm {:e}",
                self.claimed,
                self.supnorm.unwrap_or(f64::NAN),
                self.infnorm.unwrap_or(f64::NAN)
            )?,
            ViolationKind::Evaluation => match &self.error {
                Some(info) => write!(f, "approx-error {} could not be recomputed: {info}", self.claimed)?,
                None => write!(f, "approx-error {} could not be recomputed", self.claimed)?,
            },
        }
        write!(f, " (top-level bound {})", self.top)
    }
}

/// Persisted verdict of one certification run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CertificationReport {
    /// Certificate schema.
    pub schema_version: SchemaVersion,
    /// SHA-256 of the input report bytes.
    pub input_hash: String,
    /// Effective configuration.
    pub config: CertifyConfig,
    /// Final verdict.
    pub status: ExitStatus,
    /// Counters accumulated by the driver.
    pub tally: Tally,
    /// Violations in (top, path) order.
    pub violations: Vec<Violation>,
    /// Producing tool versions.
    pub tools: ToolVersions,
    /// Content hash over every other field.
    pub analysis_hash: String,
}

impl CertificationReport {
    /// Builds the certificate for `outcome` and computes its content hash.
    pub fn new(
        input_hash: impl Into<String>,
        config: &CertifyConfig,
        outcome: &CertificationOutcome,
    ) -> Result<Self, AxfError> {
        let mut tools = ToolVersions::new();
        tools.insert("axf-cert".to_string(), env!("CARGO_PKG_VERSION").to_string());
        let mut report = Self {
            schema_version: CERTIFICATE_SCHEMA,
            input_hash: input_hash.into(),
            config: config.clone(),
            status: outcome.status,
            tally: outcome.tally,
            violations: outcome.violations.clone(),
            tools,
            analysis_hash: String::new(),
        };
        report.analysis_hash = stable_hash_string(&(
            &report.schema_version,
            &report.input_hash,
            &report.config,
            &report.status,
            &report.tally,
            &report.violations,
            &report.tools,
        ))?;
        Ok(report)
    }

    /// Canonical JSON encoding.
    pub fn to_bytes(&self) -> Result<Vec<u8>, AxfError> {
        to_canonical_json_bytes(self)
    }

    /// Writes the canonical encoding to `path`.
    pub fn write(&self, path: &Path) -> Result<(), AxfError> {
        let bytes = self.to_bytes()?;
        fs::write(path, bytes).map_err(|err| {
            AxfError::Serde(
                ErrorInfo::new("certificate-write", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }
}
