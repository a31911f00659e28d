//! Validation of metric definitions against a fact catalog.
//!
//! Every check lives in the resolver ([`crate::planner::resolve`]); this
//! module owns the error type and the public entry point. Checks never
//! short-circuit: a definition with three problems reports all three.

use thiserror::Error;

use crate::catalog::Catalog;
use crate::metric::{MetricDefinition, MetricType};
use crate::planner::resolve::resolve_metric;

/// A single problem found in a metric definition.
///
/// Definitions are checked structurally first (shape, ranges, filter
/// grammar) and then against the catalog, so unresolved references and
/// shape mistakes surface together in one pass.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// The referenced fact table id is not in the catalog.
    #[error("unknown fact table '{id}'")]
    UnknownFactTable { id: String },

    /// A column key does not exist on the fact table, or is marked deleted.
    #[error("unknown column '{column}' on fact table '{fact_table}'")]
    UnknownColumn { fact_table: String, column: String },

    /// A saved row filter id does not exist on the fact table.
    #[error("unknown filter '{filter}' on fact table '{fact_table}'")]
    UnknownFilter { fact_table: String, filter: String },

    /// Ratio metrics need both sides of the fraction.
    #[error("ratio metrics require a denominator")]
    MissingDenominator,

    /// Only ratio metrics take a denominator.
    #[error("{metric_type} metrics do not take a denominator")]
    UnexpectedDenominator { metric_type: MetricType },

    /// Proportion and retention count distinct users, nothing else.
    #[error("{metric_type} metrics require the '$$distinctUsers' numerator column")]
    InvalidNumeratorColumn { metric_type: MetricType },

    /// The aggregate filter text did not match `<op> <number>`.
    #[error("aggregate filter '{input}' must look like '>= 10'")]
    InvalidAggregateFilter { input: String },

    /// The aggregate filter column must be numeric or the row-count sentinel.
    #[error("aggregate filter column '{column}' is not a numeric column")]
    InvalidAggregateFilterColumn { column: String },

    /// Percentile capping and aggregate filtering cap different populations
    /// and cannot be combined.
    #[error("percentile capping cannot be combined with an aggregate filter")]
    ConflictingCappingAndAggregateFilter,

    /// Quantile metrics are never capped.
    #[error("quantile metrics cannot be capped")]
    ConflictingCappingAndQuantile,

    /// Absolute caps must be positive, percentile caps strictly inside (0, 1).
    #[error("capping value {value} is out of range")]
    InvalidCapValue { value: f64 },

    /// Quantile levels live strictly inside (0, 1).
    #[error("quantile {value} must fall strictly between 0 and 1")]
    InvalidQuantile { value: f64 },

    /// COUNT(DISTINCT ...) is reserved for string columns.
    #[error("count-distinct aggregation is not valid for numeric column '{column}'")]
    IneligibleCountDistinct { column: String },

    /// The fact table declares no user identifier to group by.
    #[error("fact table '{fact_table}' declares no user identifier column")]
    MissingIdentifier { fact_table: String },
}

/// Check a metric definition against a catalog without producing SQL.
///
/// Returns every problem found; an `Ok(())` here guarantees that
/// [`crate::compile`] will succeed on the same inputs.
pub fn validate(
    definition: &MetricDefinition,
    catalog: &impl Catalog,
) -> Result<(), Vec<ValidationError>> {
    resolve_metric(definition, catalog).map(|_| ())
}
