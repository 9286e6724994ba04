#![allow(dead_code)]

use axf_core::{
    ApproxReport, ErrorBound, ErrorKind, Interval, NodeId, NormConvention, NormKind, Polynomial,
    ReportBuilder, SubApproximation, TopLevelApproximation,
};

pub fn absolute(value: f64) -> ErrorBound {
    ErrorBound::new(value, NormKind::default()).unwrap()
}

pub fn relative(value: f64) -> ErrorBound {
    ErrorBound::new(value, NormKind::new(ErrorKind::Relative, NormConvention::Supremum)).unwrap()
}

/// Piece description: target expression, claimed bound and nested pieces.
pub struct Piece {
    pub expr: &'static str,
    pub bound: ErrorBound,
    pub children: Vec<Piece>,
}

pub fn piece(bound: ErrorBound) -> Piece {
    Piece {
        expr: "exp(x)",
        bound,
        children: Vec::new(),
    }
}

pub fn named(expr: &'static str, bound: ErrorBound) -> Piece {
    Piece {
        expr,
        bound,
        children: Vec::new(),
    }
}

pub fn nested(bound: ErrorBound, children: Vec<Piece>) -> Piece {
    Piece {
        expr: "exp(x)",
        bound,
        children,
    }
}

fn add(builder: &mut ReportBuilder, piece: Piece) -> NodeId {
    let children = piece
        .children
        .into_iter()
        .map(|child| add(builder, child))
        .collect();
    let function = builder.intern_function(piece.expr);
    builder
        .add_node(SubApproximation {
            function,
            polynomial: Polynomial::from_dense(&[1.0, 1.0]),
            interval: Interval::new(0.0, 0.5).unwrap(),
            approx_error: piece.bound,
            children,
        })
        .unwrap()
}

/// Builds a report from `(top bound, pieces)` pairs.
pub fn build(tops: Vec<(ErrorBound, Vec<Piece>)>) -> ApproxReport {
    let mut builder = ReportBuilder::new();
    for (index, (bound, pieces)) in tops.into_iter().enumerate() {
        let approx_list = pieces
            .into_iter()
            .map(|piece| add(&mut builder, piece))
            .collect();
        builder
            .push_top(TopLevelApproximation {
                tag: Some(format!("top-{index}")),
                function: None,
                interval: None,
                approx_error: bound,
                approx_list,
            })
            .unwrap();
    }
    builder.finish().unwrap()
}

/// Report with absolute bounds only: `(top value, piece values)`.
pub fn flat(tops: &[(f64, &[f64])]) -> ApproxReport {
    build(
        tops.iter()
            .map(|(top, pieces)| {
                (
                    absolute(*top),
                    pieces.iter().map(|value| piece(absolute(*value))).collect(),
                )
            })
            .collect(),
    )
}
