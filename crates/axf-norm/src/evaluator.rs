use axf_core::errors::{AxfError, ErrorInfo};
use axf_core::{ErrorKind, FunctionDef, Interval, Polynomial};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::expr::Expr;

pub use axf_core::MAX_PRECISION_BITS;

/// Default working precision (single-precision granularity, unit `2^-24`).
pub const DEFAULT_PRECISION_BITS: u32 = 24;

fn evaluation_error(code: &str, message: impl Into<String>) -> AxfError {
    AxfError::Evaluation(ErrorInfo::new(code, message.into()))
}

/// Everything a backend needs to measure `poly - function` over an interval.
#[derive(Debug, Clone)]
pub struct NormRequest<'a> {
    /// Target function.
    pub function: &'a FunctionDef,
    /// Approximating polynomial.
    pub polynomial: &'a Polynomial,
    /// Domain of the measurement.
    pub interval: Interval,
    /// Error kind recorded in the report.
    pub kind: ErrorKind,
    /// Working precision, in significant bits, of the returned norms.
    pub precision_bits: u32,
}

/// Norms returned by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormEstimate {
    /// Kind the supremum norm was computed under.
    pub kind: ErrorKind,
    /// Supremum of the kind-weighted error.
    pub supnorm: f64,
    /// Supremum of the raw difference `|poly - function|`.
    pub infnorm: f64,
}

/// Capability computing error norms for one sub-approximation.
pub trait NormEvaluator: Send + Sync {
    /// Short backend name for diagnostics.
    fn name(&self) -> &str;

    /// Computes both norms, or fails if no finite result exists at the requested precision.
    fn evaluate(&self, request: &NormRequest<'_>) -> Result<NormEstimate, AxfError>;
}

/// Rounds `value` up to `bits` significant bits.
///
/// Rounding is toward positive infinity so a recomputed norm never drops
/// below the sampled value and cannot make a too-small claim pass.
pub fn round_to_precision(value: f64, bits: u32) -> f64 {
    if value == 0.0 || !value.is_finite() || bits >= MAX_PRECISION_BITS {
        return value;
    }
    let magnitude = value.abs();
    let mut exponent = magnitude.log2().floor() as i32;
    // log2 may round across a power of two
    if f64::from(exponent).exp2() > magnitude {
        exponent -= 1;
    } else if f64::from(exponent + 1).exp2() <= magnitude {
        exponent += 1;
    }
    let ulp = f64::from(exponent - bits as i32 + 1).exp2();
    (value / ulp).ceil() * ulp
}

/// Tuning knobs of [`SampledNormEvaluator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampledOpts {
    /// Equispaced sample points, endpoints included.
    pub samples: usize,
    /// Golden-section iterations spent on each candidate maximum.
    pub refine_iterations: u32,
    /// Number of local maxima refined per norm.
    pub refine_candidates: usize,
}

impl Default for SampledOpts {
    fn default() -> Self {
        Self {
            samples: 1025,
            refine_iterations: 60,
            refine_candidates: 8,
        }
    }
}

/// Sampling backend: dense grid scan, golden-section refinement of the best
/// local maxima, then rounding to the working precision.
///
/// The result is an estimate from below of the true supremum before rounding;
/// narrow spikes between grid points can be missed. Raise `samples` for
/// highly oscillating error curves.
#[derive(Debug, Clone, Default)]
pub struct SampledNormEvaluator {
    opts: SampledOpts,
}

struct ErrorCurve<'a> {
    expr: Expr,
    function: &'a FunctionDef,
    polynomial: &'a Polynomial,
    kind: ErrorKind,
}

impl ErrorCurve<'_> {
    /// Returns `(|p - f|, kind-weighted error)` at `x`.
    fn at(&self, x: f64) -> Result<(f64, f64), AxfError> {
        let target = self.expr.eval(x);
        let approx = self.polynomial.eval(x);
        if !target.is_finite() || !approx.is_finite() {
            return Err(AxfError::Evaluation(
                ErrorInfo::new("non-finite", "error expression is not finite on the interval")
                    .with_context("function", self.function.expr.clone())
                    .with_context("x", x.to_string()),
            ));
        }
        let raw = (approx - target).abs();
        let weighted = match self.kind {
            ErrorKind::Absolute => raw,
            ErrorKind::Relative if target != 0.0 => raw / target.abs(),
            ErrorKind::Relative if raw == 0.0 => 0.0,
            ErrorKind::Relative => {
                return Err(AxfError::Evaluation(
                    ErrorInfo::new(
                        "relative-undefined",
                        "relative error requested where the function vanishes",
                    )
                    .with_context("function", self.function.expr.clone())
                    .with_context("x", x.to_string())
                    .with_hint("record the bound as absolute or exclude the zero from the interval"),
                ))
            }
        };
        Ok((raw, weighted))
    }
}

impl SampledNormEvaluator {
    /// Creates a backend with explicit tuning.
    pub fn new(opts: SampledOpts) -> Self {
        Self { opts }
    }

    /// Active tuning.
    pub fn opts(&self) -> &SampledOpts {
        &self.opts
    }

    fn refine<F>(&self, curve: F, grid: &[f64], values: &[f64]) -> Result<f64, AxfError>
    where
        F: Fn(f64) -> Result<f64, AxfError>,
    {
        let mut best = values.iter().copied().fold(0.0, f64::max);
        if grid.len() < 3 {
            return Ok(best);
        }
        let mut candidates: Vec<usize> = (0..values.len())
            .filter(|&idx| {
                let left = idx.checked_sub(1).map_or(f64::NEG_INFINITY, |l| values[l]);
                let right = values.get(idx + 1).copied().unwrap_or(f64::NEG_INFINITY);
                values[idx] >= left && values[idx] >= right
            })
            .collect();
        candidates.sort_by(|a, b| values[*b].total_cmp(&values[*a]).then(a.cmp(b)));
        candidates.truncate(self.opts.refine_candidates);

        for idx in candidates {
            let lo = grid[idx.saturating_sub(1)];
            let hi = grid[(idx + 1).min(grid.len() - 1)];
            let peak = golden_section_max(&curve, lo, hi, self.opts.refine_iterations)?;
            best = best.max(peak);
        }
        Ok(best)
    }
}

const INV_PHI: f64 = 0.618_033_988_749_894_9;

fn golden_section_max<F>(curve: &F, mut lo: f64, mut hi: f64, iterations: u32) -> Result<f64, AxfError>
where
    F: Fn(f64) -> Result<f64, AxfError>,
{
    let mut x1 = hi - INV_PHI * (hi - lo);
    let mut x2 = lo + INV_PHI * (hi - lo);
    let mut f1 = curve(x1)?;
    let mut f2 = curve(x2)?;
    let mut best = f1.max(f2);
    for _ in 0..iterations {
        if hi - lo <= f64::EPSILON * lo.abs().max(hi.abs()).max(1.0) {
            break;
        }
        if f1 < f2 {
            lo = x1;
            x1 = x2;
            f1 = f2;
            x2 = lo + INV_PHI * (hi - lo);
            f2 = curve(x2)?;
        } else {
            hi = x2;
            x2 = x1;
            f2 = f1;
            x1 = hi - INV_PHI * (hi - lo);
            f1 = curve(x1)?;
        }
        best = best.max(f1).max(f2);
    }
    Ok(best)
}

impl NormEvaluator for SampledNormEvaluator {
    fn name(&self) -> &str {
        "sampled"
    }

    fn evaluate(&self, request: &NormRequest<'_>) -> Result<NormEstimate, AxfError> {
        if request.precision_bits == 0 || request.precision_bits > MAX_PRECISION_BITS {
            return Err(AxfError::Evaluation(
                ErrorInfo::new("invalid-precision", "working precision is out of range")
                    .with_context("bits", request.precision_bits.to_string())
                    .with_hint(format!("use 1..={MAX_PRECISION_BITS} bits")),
            ));
        }
        if self.opts.samples < 2 {
            return Err(evaluation_error(
                "invalid-samples",
                "at least two sample points are required",
            ));
        }
        let curve = ErrorCurve {
            expr: Expr::parse(&request.function.expr)?,
            function: request.function,
            polynomial: request.polynomial,
            kind: request.kind,
        };

        let interval = request.interval;
        let grid: Vec<f64> = if interval.is_degenerate() {
            vec![interval.lo()]
        } else {
            let last = (self.opts.samples - 1) as f64;
            (0..self.opts.samples)
                .map(|i| {
                    if i + 1 == self.opts.samples {
                        interval.hi()
                    } else {
                        interval.lo() + interval.width() * (i as f64 / last)
                    }
                })
                .collect()
        };

        let mut raw_values = Vec::with_capacity(grid.len());
        let mut weighted_values = Vec::with_capacity(grid.len());
        for x in &grid {
            let (raw, weighted) = curve.at(*x)?;
            raw_values.push(raw);
            weighted_values.push(weighted);
        }

        let infnorm = self.refine(|x| curve.at(x).map(|(raw, _)| raw), &grid, &raw_values)?;
        let supnorm = match request.kind {
            ErrorKind::Absolute => infnorm,
            ErrorKind::Relative => self.refine(
                |x| curve.at(x).map(|(_, weighted)| weighted),
                &grid,
                &weighted_values,
            )?,
        };
        trace!(
            function = %request.function.expr,
            interval = %interval,
            supnorm,
            infnorm,
            "sampled error norms"
        );
        Ok(NormEstimate {
            kind: request.kind,
            supnorm: round_to_precision(supnorm, request.precision_bits),
            infnorm: round_to_precision(infnorm, request.precision_bits),
        })
    }
}
