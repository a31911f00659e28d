//! # Metriq
//!
//! Compiles declarative experiment metric definitions into warehouse SQL.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │        MetricDefinition (serde document model)           │
//! │  (metric type, column refs, windows, capping, filters)   │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [resolver]
//! ┌─────────────────────────────────────────────────────────┐
//! │        ResolvedMetric (catalog-checked, typed)           │
//! │        or every ValidationError at once                  │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [fragment compilers]
//! ┌─────────────────────────────────────────────────────────┐
//! │  window bounds, row filters, value exprs, HAVING lines   │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [assembler]
//! ┌─────────────────────────────────────────────────────────┐
//! │  CompiledQuery (value SQL, denominator SQL, rollup SQL)  │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! The engine is a pure function of its inputs: no I/O, no shared
//! state, byte-identical SQL for identical definition and catalog.

pub mod catalog;
pub mod compile;
pub mod metric;
pub mod planner;
pub mod sql;
pub mod validation;

// Re-export SQL submodules at crate level
pub use sql::expr;
pub use sql::query;
pub use sql::token;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::catalog::{Catalog, Column, ColumnType, FactFilter, FactTable, InMemoryCatalog};
    pub use crate::compile::{
        compile, compile_with_options, explain, CompileOptions, CompiledQuery,
    };
    pub use crate::metric::{
        Aggregation, CappingSettings, CappingType, ColumnRef, ColumnSpec, MetricDefinition,
        MetricType, QuantileLevel, QuantileSettings, TimeUnit, WindowSettings, WindowType,
    };
    pub use crate::validation::{validate, ValidationError};
}

// Also export at crate root for convenience
pub use compile::{compile, compile_with_options, explain, CompileOptions, CompiledQuery};
pub use validation::{validate, ValidationError};
