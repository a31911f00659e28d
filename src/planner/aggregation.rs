//! Value and aggregate-target expressions for fact queries.

use crate::metric::{Aggregation, ColumnSpec};
use crate::sql::{col, count_distinct, count_star, lit_int, max, sum, Expr, SelectItem};

use super::resolve::{ResolvedColumn, Role};

/// Per-user value expression for a resolved column.
///
/// Distinct-user metrics emit a literal `1`: any qualifying row marks
/// the user, and the rollup counts the marks.
pub fn value_expr(column: &ResolvedColumn) -> Expr {
    match &column.column {
        ColumnSpec::CountRows => count_star(),
        ColumnSpec::DistinctUsers => lit_int(1),
        ColumnSpec::Field(key) => match column.aggregation {
            Aggregation::Sum => sum(col(key)),
            Aggregation::Max => max(col(key)),
            Aggregation::CountDistinct => count_distinct(col(key)),
        },
    }
}

/// The `value` select item for a per-user query.
///
/// Ratio denominators that count distinct values carry an estimator
/// note: the SQL is exact, the execution layer may not be.
pub fn value_select_item(column: &ResolvedColumn) -> SelectItem {
    let item = SelectItem::new(value_expr(column), "value");
    let exact_distinct = column.role == Role::Denominator
        && column.aggregation == Aggregation::CountDistinct
        && matches!(column.column, ColumnSpec::Field(_));
    if exact_distinct {
        item.with_comment(
            "Exact distinct count; the execution layer may substitute a HyperLogLog approximation",
        )
    } else {
        item
    }
}

/// Aggregate the user-level filter compares against.
///
/// No column means the per-user row count.
pub fn aggregate_target_expr(spec: Option<&ColumnSpec>) -> Expr {
    match spec {
        None => count_star(),
        Some(ColumnSpec::CountRows) => count_star(),
        Some(ColumnSpec::Field(key)) => sum(col(key)),
        // Rejected during resolution; row count keeps this total.
        Some(ColumnSpec::DistinctUsers) => count_star(),
    }
}
