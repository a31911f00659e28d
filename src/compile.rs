//! End-to-end compilation from metric definitions to SQL.
//!
//! This module provides the high-level API for compiling a metric
//! definition against a fact catalog:
//!
//! ```text
//! MetricDefinition + Catalog → Resolve → Compile fragments → CompiledQuery
//! ```
//!
//! # Example
//!
//! ```ignore
//! use metriq::catalog::{Column, ColumnType, FactTable, InMemoryCatalog};
//! use metriq::compile::{compile, CompileOptions};
//! use metriq::metric::{ColumnRef, MetricDefinition};
//!
//! let catalog = InMemoryCatalog::new().with_table(
//!     FactTable::new("orders", "warehouse")
//!         .with_user_id_column("anonymous_id")
//!         .with_column(Column::new("Amount", "amount", ColumnType::Number)),
//! );
//!
//! let definition = MetricDefinition::mean(ColumnRef::new("orders", "amount"));
//! let compiled = compile(&definition, &catalog)?;
//! println!("{}", compiled.rollup_sql);
//! ```

use crate::catalog::Catalog;
use crate::metric::MetricDefinition;
use crate::planner::{assemble, resolve_metric};
use crate::validation::ValidationError;

// ============================================================================
// Options
// ============================================================================

/// Options for compilation.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileOptions {
    /// Exposure table the rollup joins against. One row per exposed
    /// user with `user`, `variation` and `exposure_timestamp` columns.
    pub exposure_table: String,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            exposure_table: "experiment_exposures".to_string(),
        }
    }
}

impl CompileOptions {
    /// Set the exposure table name.
    pub fn with_exposure_table(mut self, table: &str) -> Self {
        self.exposure_table = table.into();
        self
    }
}

// ============================================================================
// Result Types
// ============================================================================

/// Result of compiling a metric definition to SQL.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    /// Numerator per-user (or per-event) query.
    pub value_sql: String,

    /// Denominator per-user query; present only for ratio metrics.
    pub denominator_sql: Option<String>,

    /// Per-variation rollup embedding the queries above as CTEs.
    pub rollup_sql: String,
}

// ============================================================================
// Compilation Functions
// ============================================================================

/// Compile a metric definition against a catalog with default options.
pub fn compile(
    definition: &MetricDefinition,
    catalog: &impl Catalog,
) -> Result<CompiledQuery, Vec<ValidationError>> {
    compile_with_options(definition, catalog, &CompileOptions::default())
}

/// Compile a metric definition against a catalog.
///
/// Every validation problem is reported at once; no SQL text is
/// produced unless the whole definition checks out.
pub fn compile_with_options(
    definition: &MetricDefinition,
    catalog: &impl Catalog,
    options: &CompileOptions,
) -> Result<CompiledQuery, Vec<ValidationError>> {
    // Step 1: Validate and resolve against the catalog
    let resolved = resolve_metric(definition, catalog)?;

    // Step 2: Per-role queries
    let value_sql = assemble::per_role_query(&resolved, &resolved.numerator).to_sql();
    let denominator_sql = resolved
        .denominator
        .as_ref()
        .map(|denominator| assemble::per_role_query(&resolved, denominator).to_sql());

    // Step 3: Rollup embedding the per-role queries verbatim
    let rollup_sql = assemble::rollup_query(
        &resolved,
        &value_sql,
        denominator_sql.as_deref(),
        &options.exposure_table,
    )
    .to_sql();

    Ok(CompiledQuery {
        value_sql,
        denominator_sql,
        rollup_sql,
    })
}

/// Render the rollup SQL for human display.
///
/// Identical text to [`compile`] by construction: there is one
/// rendering path, not two that could drift.
pub fn explain(
    definition: &MetricDefinition,
    catalog: &impl Catalog,
) -> Result<String, Vec<ValidationError>> {
    compile(definition, catalog).map(|compiled| compiled.rollup_sql)
}

// ============================================================================
// Tests
// ============================================================================
