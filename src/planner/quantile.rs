//! Effective quantile level and value column selection.
//!
//! Event-level quantiles only make sense over a real numeric column.
//! When the definition asks for something the fact table cannot
//! deliver, the plan degrades to a unit-level row count instead of
//! failing: the metric becomes "quantile of per-user row counts".

use crate::catalog::FactTable;
use crate::metric::{ColumnSpec, QuantileLevel, QuantileSettings};

/// Pick the level and value column a quantile metric will actually use.
///
/// The requested column survives only if it is one of the fact table's
/// eligible numeric columns. Sentinel columns and ineligible fields
/// fall back to unit level over `COUNT(*)`.
pub fn effective_spec(
    settings: &QuantileSettings,
    column: &ColumnSpec,
    table: &FactTable,
) -> (QuantileLevel, ColumnSpec) {
    let eligible = match column.as_field() {
        Some(key) => table
            .eligible_quantile_columns()
            .iter()
            .any(|candidate| candidate.column == key),
        None => false,
    };
    if eligible {
        (settings.level, column.clone())
    } else {
        (QuantileLevel::Unit, ColumnSpec::CountRows)
    }
}
