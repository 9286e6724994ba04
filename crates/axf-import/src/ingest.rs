use std::fs;
use std::path::Path;

use axf_core::errors::{AxfError, ErrorInfo};
use axf_core::hash::hash_bytes;
use axf_core::{
    ApproxReport, ErrorBound, FunctionId, Interval, Locator, NodeId, NormKind, Polynomial,
    ReportBuilder, SchemaVersion, SubApproximation, TopLevelApproximation, MAX_PRECISION_BITS,
};
use tracing::{debug, info};

use crate::schema::{
    RawDocument, RawErrorBound, RawInterval, RawPolynomial, RawSub, RawTop, SCHEMA_VERSION,
};

fn import_error(code: &str, message: impl Into<String>) -> AxfError {
    AxfError::Import(ErrorInfo::new(code, message.into()))
}

/// Tags an import error with the JSON location it was raised for.
fn at(err: AxfError, location: &str) -> AxfError {
    match err {
        AxfError::Import(info) => AxfError::Import(info.with_context("location", location)),
        AxfError::Model(info) => AxfError::Import(info.with_context("location", location)),
        other => other,
    }
}

/// Reads and imports the report stored at `path`.
pub fn import_file(path: &Path) -> Result<ApproxReport, AxfError> {
    import_file_with_hash(path).map(|(report, _)| report)
}

/// Like [`import_file`], also returning the SHA-256 of the file bytes.
pub fn import_file_with_hash(path: &Path) -> Result<(ApproxReport, String), AxfError> {
    let bytes = fs::read(path).map_err(|err| {
        AxfError::Import(
            ErrorInfo::new("read-failed", err.to_string())
                .with_context("path", path.display().to_string())
                .with_hint("check that the report file exists and is readable"),
        )
    })?;
    let report = import_slice(&bytes).map_err(|err| match err {
        AxfError::Import(info) => {
            AxfError::Import(info.with_context("path", path.display().to_string()))
        }
        other => other,
    })?;
    Ok((report, hash_bytes(&bytes)))
}

/// Imports a report from raw JSON bytes.
pub fn import_slice(bytes: &[u8]) -> Result<ApproxReport, AxfError> {
    let document: RawDocument = serde_json::from_slice(bytes).map_err(|err| {
        AxfError::Import(
            ErrorInfo::new("invalid-json", err.to_string())
                .with_context("line", err.line().to_string())
                .with_context("column", err.column().to_string()),
        )
    })?;
    let tops = match document {
        RawDocument::List(tops) => tops,
        RawDocument::Wrapped {
            schema_version,
            approximations,
        } => {
            if let Some(raw) = schema_version {
                let version: SchemaVersion = raw.parse()?;
                if !SCHEMA_VERSION.accepts(&version) {
                    return Err(AxfError::Import(
                        ErrorInfo::new("unsupported-schema", "report schema version is not supported")
                            .with_context("found", version.to_string())
                            .with_context("supported", SCHEMA_VERSION.to_string()),
                    ));
                }
            }
            approximations
        }
    };

    let mut builder = ReportBuilder::new();
    for (index, raw) in tops.iter().enumerate() {
        lower_top(&mut builder, index, raw)?;
    }
    let report = builder.finish()?;
    info!(
        tops = report.tops().len(),
        nodes = report.node_count(),
        functions = report.functions().len(),
        "imported approximation report"
    );
    Ok(report)
}

fn lower_top(builder: &mut ReportBuilder, index: usize, raw: &RawTop) -> Result<(), AxfError> {
    let location = format!("top[{index}]");
    let function = raw
        .function
        .as_deref()
        .map(|expr| intern(builder, expr, &location))
        .transpose()?;
    let interval = raw
        .interval
        .as_ref()
        .map(lower_interval)
        .transpose()
        .map_err(|err| at(err, &format!("{location}.interval")))?;
    let approx_error = lower_bound(&raw.approx_error)
        .map_err(|err| at(err, &format!("{location}.approx_error")))?;

    let mut approx_list = Vec::with_capacity(raw.approx_list.len());
    for (sub_index, sub) in raw.approx_list.iter().enumerate() {
        approx_list.push(lower_sub(builder, sub, function, Locator::sub(index, sub_index))?);
    }
    debug!(top = index, pieces = approx_list.len(), "lowered top-level approximation");
    builder
        .push_top(TopLevelApproximation {
            tag: raw.tag.clone(),
            function,
            interval,
            approx_error,
            approx_list,
        })
        .map_err(|err| at(err, &location))?;
    Ok(())
}

fn lower_sub(
    builder: &mut ReportBuilder,
    raw: &RawSub,
    inherited: Option<FunctionId>,
    locator: Locator,
) -> Result<NodeId, AxfError> {
    let location = locator.to_string();
    let function = match raw.function.as_deref() {
        Some(expr) => intern(builder, expr, &location)?,
        None => inherited.ok_or_else(|| {
            at(
                import_error(
                    "missing-function",
                    "sub-approximation names no function and its parent provides none",
                ),
                &location,
            )
        })?,
    };
    let interval =
        lower_interval(&raw.interval).map_err(|err| at(err, &format!("{location}.interval")))?;
    let polynomial =
        lower_polynomial(&raw.poly).map_err(|err| at(err, &format!("{location}.poly")))?;
    let approx_error = lower_bound(&raw.approx_error)
        .map_err(|err| at(err, &format!("{location}.approx_error")))?;

    let mut children = Vec::with_capacity(raw.approx_list.len());
    for (index, child) in raw.approx_list.iter().enumerate() {
        children.push(lower_sub(builder, child, Some(function), locator.child(index))?);
    }
    builder
        .add_node(SubApproximation {
            function,
            polynomial,
            interval,
            approx_error,
            children,
        })
        .map_err(|err| at(err, &location))
}

fn intern(builder: &mut ReportBuilder, expr: &str, location: &str) -> Result<FunctionId, AxfError> {
    if expr.trim().is_empty() {
        return Err(at(
            import_error("empty-function", "function expression must not be empty"),
            location,
        ));
    }
    Ok(builder.intern_function(expr))
}

fn lower_interval(raw: &RawInterval) -> Result<Interval, AxfError> {
    let (lo, hi) = raw.bounds().map_err(|text| {
        AxfError::Import(
            ErrorInfo::new("invalid-interval", "interval bounds are not numbers")
                .with_context("value", text),
        )
    })?;
    Interval::new(lo, hi)
}

fn lower_bound(raw: &RawErrorBound) -> Result<ErrorBound, AxfError> {
    let value = raw.value.parse().map_err(|text| {
        AxfError::Import(
            ErrorInfo::new("invalid-number", "error bound value is not a number")
                .with_context("value", text),
        )
    })?;
    let bound = ErrorBound::new(value, NormKind::new(raw.kind, raw.norm))?;
    match raw.precision {
        Some(bits) if bits == 0 || bits > MAX_PRECISION_BITS => Err(AxfError::Import(
            ErrorInfo::new(
                "invalid-precision",
                format!("working precision must be 1..={MAX_PRECISION_BITS} bits"),
            )
            .with_context("precision", bits.to_string()),
        )),
        Some(bits) => Ok(bound.with_precision(bits)),
        None => Ok(bound),
    }
}

fn lower_polynomial(raw: &RawPolynomial) -> Result<Polynomial, AxfError> {
    let invalid = |text: String| {
        AxfError::Import(
            ErrorInfo::new("invalid-coefficient", "polynomial coefficient is not a number")
                .with_context("value", text),
        )
    };
    match raw {
        RawPolynomial::Sparse { coeff_map } => {
            let mut terms = Vec::with_capacity(coeff_map.len());
            for (exp, coeff) in coeff_map {
                let exp = exp.trim().parse::<u32>().map_err(|_| {
                    AxfError::Import(
                        ErrorInfo::new("invalid-exponent", "monomial exponent must be a non-negative integer")
                            .with_context("value", exp.clone()),
                    )
                })?;
                terms.push((exp, checked_coefficient(coeff.parse().map_err(invalid)?)?));
            }
            Ok(Polynomial::from_terms(terms))
        }
        RawPolynomial::Dense { coeffs } => {
            let mut dense = Vec::with_capacity(coeffs.len());
            for coeff in coeffs {
                dense.push(checked_coefficient(coeff.parse().map_err(invalid)?)?);
            }
            Ok(Polynomial::from_dense(&dense))
        }
    }
}

fn checked_coefficient(value: f64) -> Result<f64, AxfError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(AxfError::Import(
            ErrorInfo::new("invalid-coefficient", "polynomial coefficients must be finite")
                .with_context("value", value.to_string()),
        ))
    }
}
