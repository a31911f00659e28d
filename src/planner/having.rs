//! Aggregate filter grammar and HAVING fragment emission.
//!
//! An aggregate filter is a tiny comparison language over per-user
//! aggregates: an operator followed by a numeric literal, e.g. `>= 10`.
//! The matched literal text is kept verbatim so the emitted SQL
//! reproduces exactly what the author wrote.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::metric::QuantileLevel;
use crate::sql::{lit_int, BinaryOperator, Expr, ExprExt, Predicate};

use super::aggregation;
use super::resolve::{MetricKind, ResolvedMetric};

/// Pattern for aggregate filter text: a comparison operator and a number.
static FILTER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(>=|<=|!=|>|<|=)\s*(-?[0-9]+(?:\.[0-9]+)?)\s*$").unwrap());

/// The aggregate filter text did not match the grammar.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("expected a comparison like '>= 10', got '{0}'")]
pub struct FilterParseError(pub String);

/// Comparison operator of an aggregate filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Gt,
    Gte,
    Lt,
    Lte,
    Eq,
    Ne,
}

impl CompareOp {
    fn from_symbol(symbol: &str) -> Option<CompareOp> {
        match symbol {
            ">" => Some(CompareOp::Gt),
            ">=" => Some(CompareOp::Gte),
            "<" => Some(CompareOp::Lt),
            "<=" => Some(CompareOp::Lte),
            "=" => Some(CompareOp::Eq),
            "!=" => Some(CompareOp::Ne),
            _ => None,
        }
    }

    fn operator(self) -> BinaryOperator {
        match self {
            CompareOp::Gt => BinaryOperator::Gt,
            CompareOp::Gte => BinaryOperator::Gte,
            CompareOp::Lt => BinaryOperator::Lt,
            CompareOp::Lte => BinaryOperator::Lte,
            CompareOp::Eq => BinaryOperator::Eq,
            CompareOp::Ne => BinaryOperator::Ne,
        }
    }
}

/// A parsed aggregate filter: operator plus the literal as written.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateFilter {
    pub op: CompareOp,
    pub literal: String,
}

impl AggregateFilter {
    /// Build the comparison expression against an aggregate target.
    ///
    /// The literal is emitted as raw text, which is safe because the
    /// grammar only admits plain numbers.
    pub fn to_expr(&self, target: Expr) -> Expr {
        Expr::BinaryOp {
            left: Box::new(target),
            op: self.op.operator(),
            right: Box::new(crate::sql::raw_sql(&self.literal)),
        }
    }
}

/// Parse aggregate filter text into operator and literal.
pub fn parse_aggregate_filter(input: &str) -> Result<AggregateFilter, FilterParseError> {
    let captures = FILTER_PATTERN
        .captures(input)
        .ok_or_else(|| FilterParseError(input.to_string()))?;
    let op = CompareOp::from_symbol(&captures[1]).ok_or_else(|| FilterParseError(input.to_string()))?;
    Ok(AggregateFilter {
        op,
        literal: captures[2].to_string(),
    })
}

/// HAVING predicates for the numerator query.
///
/// Unit-level quantiles exclude zero values after grouping, so the
/// exclusion compares the aggregated value expression. Everything else
/// may carry a user-level aggregate filter.
pub fn having_predicates(metric: &ResolvedMetric) -> Vec<Predicate> {
    let mut predicates = Vec::new();
    match &metric.kind {
        MetricKind::Quantile {
            level: QuantileLevel::Unit,
            ignore_zeros: true,
            ..
        } => {
            if metric.numerator.column.as_field().is_some() {
                predicates.push(
                    Predicate::new(aggregation::value_expr(&metric.numerator).gt(lit_int(0)))
                        .with_comment("Ignore zero values"),
                );
            }
        }
        MetricKind::Quantile { .. } => {}
        _ => {
            if let Some(filter) = &metric.aggregate_filter {
                let target = aggregation::aggregate_target_expr(filter.column.as_ref());
                predicates.push(
                    Predicate::new(filter.filter.to_expr(target))
                        .with_comment("Only users passing the aggregate filter"),
                );
            }
        }
    }
    predicates
}
