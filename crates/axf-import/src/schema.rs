use std::collections::BTreeMap;

use axf_core::{ErrorKind, NormConvention, SchemaVersion};
use serde::Deserialize;

/// Highest document schema this importer understands.
pub const SCHEMA_VERSION: SchemaVersion = SchemaVersion::new(1, 0, 0);

/// On-disk document: a bare list of approximations or a versioned wrapper.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawDocument {
    /// `[ {...}, {...} ]`
    List(Vec<RawTop>),
    /// `{ "schema_version": "1.0.0", "approximations": [...] }`
    Wrapped {
        /// Optional schema version string.
        #[serde(default)]
        schema_version: Option<String>,
        /// Top-level approximations.
        approximations: Vec<RawTop>,
    },
}

/// Number written either as a JSON number or as a decimal string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawNumber {
    /// Plain JSON number.
    Float(f64),
    /// Decimal text such as `"1e-6"`.
    Text(String),
}

impl RawNumber {
    /// Parses the value, returning the offending text on failure.
    pub fn parse(&self) -> Result<f64, String> {
        match self {
            RawNumber::Float(value) => Ok(*value),
            RawNumber::Text(text) => text.trim().parse::<f64>().map_err(|_| text.clone()),
        }
    }
}

/// Interval written as `[lo, hi]`, `{ "lo": .., "hi": .. }` or `"[lo;hi]"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawInterval {
    /// Two-element array.
    Pair([RawNumber; 2]),
    /// Named bounds.
    Bounds {
        /// Lower bound.
        lo: RawNumber,
        /// Upper bound.
        hi: RawNumber,
    },
    /// Bracketed text with `;` or `,` separating the bounds.
    Text(String),
}

impl RawInterval {
    /// Extracts both bounds, returning the offending text on failure.
    pub fn bounds(&self) -> Result<(f64, f64), String> {
        match self {
            RawInterval::Pair([lo, hi]) | RawInterval::Bounds { lo, hi } => {
                Ok((lo.parse()?, hi.parse()?))
            }
            RawInterval::Text(text) => {
                let inner = text
                    .trim()
                    .strip_prefix('[')
                    .and_then(|rest| rest.strip_suffix(']'))
                    .ok_or_else(|| text.clone())?;
                let (lo, hi) = inner
                    .split_once(';')
                    .or_else(|| inner.split_once(','))
                    .ok_or_else(|| text.clone())?;
                let lo = lo.trim().parse::<f64>().map_err(|_| text.clone())?;
                let hi = hi.trim().parse::<f64>().map_err(|_| text.clone())?;
                Ok((lo, hi))
            }
        }
    }
}

/// Claimed error as written in the report.
#[derive(Debug, Clone, Deserialize)]
pub struct RawErrorBound {
    /// Claimed value.
    pub value: RawNumber,
    /// `absolute` (default) or `relative`.
    #[serde(default, rename = "type", alias = "error_type")]
    pub kind: ErrorKind,
    /// `supremum` (default) or `infinity`.
    #[serde(default)]
    pub norm: NormConvention,
    /// Working precision in bits requested for recomputation.
    #[serde(default)]
    pub precision: Option<u32>,
}

/// Polynomial given as a sparse exponent map or dense coefficients.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawPolynomial {
    /// `{ "coeff_map": { "0": 1.0, "2": 0.5 } }`
    Sparse {
        /// Exponent (as text) to coefficient.
        coeff_map: BTreeMap<String, RawNumber>,
    },
    /// `{ "coeffs": [1.0, 0.0, 0.5] }`
    Dense {
        /// Coefficients by increasing exponent.
        coeffs: Vec<RawNumber>,
    },
}

/// One piece of a composite approximation.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSub {
    /// Target function; inherited from the parent when absent.
    #[serde(default)]
    pub function: Option<String>,
    /// Validity domain.
    pub interval: RawInterval,
    /// Approximating polynomial.
    #[serde(alias = "polynomial")]
    pub poly: RawPolynomial,
    /// Claimed error.
    pub approx_error: RawErrorBound,
    /// Nested pieces.
    #[serde(default)]
    pub approx_list: Vec<RawSub>,
}

/// Top-level composite approximation.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTop {
    /// Free-form label.
    #[serde(default)]
    pub tag: Option<String>,
    /// Target function shared by pieces that do not name one.
    #[serde(default)]
    pub function: Option<String>,
    /// Domain of the whole composite.
    #[serde(default)]
    pub interval: Option<RawInterval>,
    /// Contractual ceiling for the whole composite.
    pub approx_error: RawErrorBound,
    /// Ordered pieces.
    #[serde(default)]
    pub approx_list: Vec<RawSub>,
}
