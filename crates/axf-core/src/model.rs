//! Arena-backed in-memory model of an approximation report.
//!
//! Top-level approximations own ordered lists of [`NodeId`]s into a flat node
//! arena; sub-approximations may own further children the same way. Target
//! functions are interned in a [`FunctionTable`] and referenced by
//! [`FunctionId`], so several nodes can point at the same function without
//! sharing ownership of it.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{AxfError, ErrorInfo};
use crate::{FunctionId, NodeId};

fn model_error(code: &str, message: impl Into<String>) -> AxfError {
    AxfError::Model(ErrorInfo::new(code, message.into()))
}

/// Closed real interval `[lo, hi]` with finite bounds and `lo <= hi`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Interval {
    lo: f64,
    hi: f64,
}

impl Interval {
    /// Creates an interval, rejecting non-finite or inverted bounds.
    pub fn new(lo: f64, hi: f64) -> Result<Self, AxfError> {
        let reject = |code: &str, message: &str| {
            AxfError::Import(
                ErrorInfo::new(code, message)
                    .with_context("lo", lo.to_string())
                    .with_context("hi", hi.to_string()),
            )
        };
        if !lo.is_finite() || !hi.is_finite() {
            return Err(reject("interval-non-finite", "interval bounds must be finite"));
        }
        if lo > hi {
            return Err(reject(
                "interval-inverted",
                "interval lower bound exceeds upper bound",
            ));
        }
        Ok(Self { lo, hi })
    }

    /// Lower bound.
    pub fn lo(&self) -> f64 {
        self.lo
    }

    /// Upper bound.
    pub fn hi(&self) -> f64 {
        self.hi
    }

    /// Width `hi - lo`.
    pub fn width(&self) -> f64 {
        self.hi - self.lo
    }

    /// Whether the interval reduces to a single point.
    pub fn is_degenerate(&self) -> bool {
        self.lo == self.hi
    }

    /// Whether `x` lies in the closed interval.
    pub fn contains(&self, x: f64) -> bool {
        x >= self.lo && x <= self.hi
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:e}, {:e}]", self.lo, self.hi)
    }
}

/// Whether the error is measured relative to the target or in absolute terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// `|p(x) - f(x)|`
    #[default]
    Absolute,
    /// `|(p(x) - f(x)) / f(x)|`
    Relative,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Absolute => write!(f, "absolute"),
            ErrorKind::Relative => write!(f, "relative"),
        }
    }
}

/// Norm convention under which a bound was measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NormConvention {
    /// Supremum of the kind-weighted error.
    #[default]
    Supremum,
    /// Infinity norm of the raw difference.
    Infinity,
}

impl fmt::Display for NormConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormConvention::Supremum => write!(f, "supremum"),
            NormConvention::Infinity => write!(f, "infinity"),
        }
    }
}

/// Full norm kind recorded alongside an error bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct NormKind {
    /// Relative or absolute measurement.
    pub kind: ErrorKind,
    /// Supremum or infinity convention.
    pub norm: NormConvention,
}

impl NormKind {
    /// Creates a norm kind from its two components.
    pub const fn new(kind: ErrorKind, norm: NormConvention) -> Self {
        Self { kind, norm }
    }
}

impl fmt::Display for NormKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.norm)
    }
}

/// Claimed error bound: a finite non-negative value under a norm kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ErrorBound {
    value: f64,
    kind: NormKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    precision_bits: Option<u32>,
}

impl ErrorBound {
    /// Creates a bound, rejecting negative, NaN or infinite values.
    pub fn new(value: f64, kind: NormKind) -> Result<Self, AxfError> {
        if !value.is_finite() || value < 0.0 {
            return Err(AxfError::Import(
                ErrorInfo::new(
                    "negative-error-bound",
                    "error bound values must be finite and non-negative",
                )
                .with_context("value", value.to_string()),
            ));
        }
        Ok(Self {
            value,
            kind,
            precision_bits: None,
        })
    }

    /// Attaches the working precision the report requests for recomputation.
    pub fn with_precision(mut self, bits: u32) -> Self {
        self.precision_bits = Some(bits);
        self
    }

    /// Claimed value.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Recorded norm kind.
    pub fn kind(&self) -> NormKind {
        self.kind
    }

    /// Working precision requested by the report, if any.
    pub fn precision_bits(&self) -> Option<u32> {
        self.precision_bits
    }

    /// Returns whether `self` dominates `other`, or `None` when the kinds differ.
    pub fn dominates(&self, other: &ErrorBound) -> Option<bool> {
        if self.kind != other.kind {
            return None;
        }
        Some(self.value >= other.value)
    }
}

impl fmt::Display for ErrorBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:e} ({})", self.value, self.kind)
    }
}

/// Target function referenced by one or more nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionDef {
    /// Identifier within the owning table.
    pub id: FunctionId,
    /// Expression text in the variable `x`.
    pub expr: String,
}

/// Interning table for target functions.
#[derive(Debug, Clone, Default)]
pub struct FunctionTable {
    defs: Vec<FunctionDef>,
    by_expr: BTreeMap<String, FunctionId>,
}

impl FunctionTable {
    /// Returns the id for `expr`, registering it on first use.
    pub fn intern(&mut self, expr: &str) -> FunctionId {
        let key = expr.trim();
        if let Some(id) = self.by_expr.get(key) {
            return *id;
        }
        let id = FunctionId::from_raw(self.defs.len() as u32);
        self.defs.push(FunctionDef {
            id,
            expr: key.to_string(),
        });
        self.by_expr.insert(key.to_string(), id);
        id
    }

    /// Looks up a function definition.
    pub fn get(&self, id: FunctionId) -> Result<&FunctionDef, AxfError> {
        self.defs.get(id.index()).ok_or_else(|| {
            model_error("unknown-function", format!("function {} is not registered", id.as_raw()))
        })
    }

    /// Number of distinct functions.
    pub fn len(&self) -> usize {
        self.defs.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Iterates over the registered definitions in id order.
    pub fn iter(&self) -> impl Iterator<Item = &FunctionDef> {
        self.defs.iter()
    }
}

/// Largest working precision, in significant bits, an `f64` can honour.
pub const MAX_PRECISION_BITS: u32 = f64::MANTISSA_DIGITS;

/// Sparse univariate polynomial stored as `(exponent, coefficient)` pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct Polynomial {
    terms: Vec<(u32, f64)>,
}

impl Polynomial {
    /// Builds a polynomial from monomials; duplicate exponents are summed.
    pub fn from_terms(terms: impl IntoIterator<Item = (u32, f64)>) -> Self {
        let mut merged: BTreeMap<u32, f64> = BTreeMap::new();
        for (exp, coeff) in terms {
            *merged.entry(exp).or_insert(0.0) += coeff;
        }
        Self {
            terms: merged.into_iter().collect(),
        }
    }

    /// Builds a polynomial from dense coefficients `c0 + c1 x + ...`.
    pub fn from_dense(coeffs: &[f64]) -> Self {
        Self::from_terms(
            coeffs
                .iter()
                .enumerate()
                .map(|(exp, coeff)| (exp as u32, *coeff)),
        )
    }

    /// Monomials sorted by increasing exponent.
    pub fn terms(&self) -> &[(u32, f64)] {
        &self.terms
    }

    /// Highest exponent, or `None` for the zero polynomial.
    pub fn degree(&self) -> Option<u32> {
        self.terms.last().map(|(exp, _)| *exp)
    }

    /// Evaluates the polynomial at `x` with a sparse Horner scheme.
    pub fn eval(&self, x: f64) -> f64 {
        let Some(mut prev) = self.degree() else {
            return 0.0;
        };
        let mut acc = 0.0;
        for (exp, coeff) in self.terms.iter().rev() {
            acc *= pow(x, prev - exp);
            acc += coeff;
            prev = *exp;
        }
        acc * pow(x, prev)
    }
}

fn pow(x: f64, exp: u32) -> f64 {
    match i32::try_from(exp) {
        Ok(exp) => x.powi(exp),
        Err(_) => x.powf(f64::from(exp)),
    }
}

impl fmt::Display for Polynomial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.terms.is_empty() {
            return write!(f, "0");
        }
        for (idx, (exp, coeff)) in self.terms.iter().enumerate() {
            if idx > 0 {
                write!(f, " + ")?;
            }
            match exp {
                0 => write!(f, "{coeff:e}")?,
                1 => write!(f, "{coeff:e}*x")?,
                _ => write!(f, "{coeff:e}*x^{exp}")?,
            }
        }
        Ok(())
    }
}

/// One piece of a composite approximation.
#[derive(Debug, Clone, PartialEq)]
pub struct SubApproximation {
    /// Target function approximated by this piece.
    pub function: FunctionId,
    /// Approximating polynomial.
    pub polynomial: Polynomial,
    /// Validity domain.
    pub interval: Interval,
    /// Claimed error over `interval`.
    pub approx_error: ErrorBound,
    /// Nested sub-approximations refining this piece.
    pub children: Vec<NodeId>,
}

/// Composite approximation whose bound is the contractual ceiling.
#[derive(Debug, Clone, PartialEq)]
pub struct TopLevelApproximation {
    /// Optional label carried by the report.
    pub tag: Option<String>,
    /// Optional target function of the whole composite.
    pub function: Option<FunctionId>,
    /// Optional domain of the whole composite.
    pub interval: Option<Interval>,
    /// Claimed error of the composite.
    pub approx_error: ErrorBound,
    /// Ordered pieces.
    pub approx_list: Vec<NodeId>,
}

/// Position of a node: top-level index plus the index path through `approx_list`s.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Locator {
    /// Index of the top-level approximation.
    pub top: usize,
    /// Indices within successive `approx_list`s.
    pub path: Vec<usize>,
}

impl Locator {
    /// Locator of the `index`-th direct piece of top-level `top`.
    pub fn sub(top: usize, index: usize) -> Self {
        Self {
            top,
            path: vec![index],
        }
    }

    /// Locator of the `index`-th child of `self`.
    pub fn child(&self, index: usize) -> Self {
        let mut path = self.path.clone();
        path.push(index);
        Self {
            top: self.top,
            path,
        }
    }

    /// Index of the node within its parent's list.
    pub fn index(&self) -> Option<usize> {
        self.path.last().copied()
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "top[{}]", self.top)?;
        for idx in &self.path {
            write!(f, ".sub[{idx}]")?;
        }
        Ok(())
    }
}

/// A node reached by [`ApproxReport::walk`], with its parent's bound.
#[derive(Debug, Clone)]
pub struct NodeVisit<'a> {
    /// Where the node sits.
    pub locator: Locator,
    /// Arena id.
    pub id: NodeId,
    /// The node itself.
    pub node: &'a SubApproximation,
    /// Bound of the direct parent (top-level or enclosing piece).
    pub parent_bound: &'a ErrorBound,
}

/// Read-only arena holding a whole imported report.
#[derive(Debug, Clone, Default)]
pub struct ApproxReport {
    tops: Vec<TopLevelApproximation>,
    nodes: Vec<SubApproximation>,
    functions: FunctionTable,
}

impl ApproxReport {
    /// Top-level approximations in import order.
    pub fn tops(&self) -> &[TopLevelApproximation] {
        &self.tops
    }

    /// Looks up a top-level approximation by index.
    pub fn top(&self, index: usize) -> Result<&TopLevelApproximation, AxfError> {
        self.tops.get(index).ok_or_else(|| {
            model_error("unknown-top", format!("top-level approximation {index} does not exist"))
        })
    }

    /// Looks up a sub-approximation.
    pub fn node(&self, id: NodeId) -> Result<&SubApproximation, AxfError> {
        self.nodes
            .get(id.index())
            .ok_or_else(|| model_error("unknown-node", format!("node {id} does not exist")))
    }

    /// Function table shared by all nodes.
    pub fn functions(&self) -> &FunctionTable {
        &self.functions
    }

    /// Total number of sub-approximations across all levels.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Visits every node under top-level `top` in pre-order, following `approx_list` order.
    pub fn walk(&self, top: usize) -> Result<Vec<NodeVisit<'_>>, AxfError> {
        let root = self.top(top)?;
        let mut visits = Vec::new();
        let mut stack: Vec<(Locator, NodeId, &ErrorBound)> = root
            .approx_list
            .iter()
            .enumerate()
            .rev()
            .map(|(idx, id)| (Locator::sub(top, idx), *id, &root.approx_error))
            .collect();
        while let Some((locator, id, parent_bound)) = stack.pop() {
            let node = self.node(id)?;
            for (idx, child) in node.children.iter().enumerate().rev() {
                stack.push((locator.child(idx), *child, &node.approx_error));
            }
            visits.push(NodeVisit {
                locator,
                id,
                node,
                parent_bound,
            });
        }
        Ok(visits)
    }
}

/// Mutable builder enforcing exclusive ownership of arena nodes.
#[derive(Debug, Default)]
pub struct ReportBuilder {
    report: ApproxReport,
    owned: Vec<bool>,
}

impl ReportBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns a target function expression.
    pub fn intern_function(&mut self, expr: &str) -> FunctionId {
        self.report.functions.intern(expr)
    }

    fn claim(&mut self, children: &[NodeId]) -> Result<(), AxfError> {
        for child in children {
            match self.owned.get(child.index()) {
                None => {
                    return Err(model_error(
                        "unknown-node",
                        format!("node {child} must be added before it is owned"),
                    ))
                }
                Some(true) => {
                    return Err(model_error(
                        "shared-node",
                        format!("node {child} already has an owner"),
                    ))
                }
                Some(false) => {}
            }
        }
        for child in children {
            self.owned[child.index()] = true;
        }
        Ok(())
    }

    /// Adds a sub-approximation, taking ownership of its children.
    pub fn add_node(&mut self, node: SubApproximation) -> Result<NodeId, AxfError> {
        self.report.functions.get(node.function)?;
        self.claim(&node.children)?;
        let id = NodeId::from_raw(self.report.nodes.len() as u32);
        self.report.nodes.push(node);
        self.owned.push(false);
        Ok(id)
    }

    /// Appends a top-level approximation, taking ownership of its pieces.
    pub fn push_top(&mut self, top: TopLevelApproximation) -> Result<usize, AxfError> {
        if let Some(function) = top.function {
            self.report.functions.get(function)?;
        }
        self.claim(&top.approx_list)?;
        self.report.tops.push(top);
        Ok(self.report.tops.len() - 1)
    }

    /// Finishes construction; nodes never attached to a parent are rejected.
    pub fn finish(self) -> Result<ApproxReport, AxfError> {
        if let Some(orphan) = self.owned.iter().position(|owned| !owned) {
            return Err(model_error(
                "orphan-node",
                format!("node n{orphan} is not reachable from any top-level approximation"),
            ));
        }
        Ok(self.report)
    }
}
