//! Metric planner - turns definitions into SQL fragments.
//!
//! Three-phase pipeline:
//! 1. Resolve: definition + catalog → ResolvedMetric (or every error)
//! 2. Fragment compilers: window bounds, row filters, value
//!    expressions, HAVING fragments
//! 3. Assemble: per-role queries and the experiment rollup

pub mod aggregation;
pub mod assemble;
pub mod filters;
pub mod having;
pub mod quantile;
pub mod resolve;
pub mod window;

pub use having::{parse_aggregate_filter, AggregateFilter, CompareOp};
pub use resolve::{
    resolve_metric, Capping, MetricKind, ResolvedAggregateFilter, ResolvedColumn, ResolvedMetric,
    Role,
};
