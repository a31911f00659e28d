//! Resolution of metric definitions into a typed, catalog-checked plan.
//!
//! The definition model is permissive so editors can round-trip
//! half-finished metrics; this is where the permissiveness ends. A
//! [`ResolvedMetric`] can only be constructed through [`resolve_metric`],
//! so everything downstream of it is infallible.

use std::collections::BTreeMap;

use crate::catalog::{Catalog, ColumnType, FactFilter, FactTable};
use crate::metric::{
    Aggregation, CappingType, ColumnRef, ColumnSpec, MetricDefinition, MetricType, QuantileLevel,
    WindowSettings,
};
use crate::validation::ValidationError;

use super::having::{self, AggregateFilter};
use super::quantile;

/// Which side of the metric a fact query feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Numerator,
    Denominator,
}

impl Role {
    pub fn label(self) -> &'static str {
        match self {
            Role::Numerator => "Numerator",
            Role::Denominator => "Denominator",
        }
    }
}

/// A column reference resolved against the catalog.
#[derive(Debug, Clone)]
pub struct ResolvedColumn<'a> {
    pub role: Role,
    pub table: &'a FactTable,
    /// Value column after any quantile fallback (see [`super::quantile`]).
    pub column: ColumnSpec,
    /// Datatype when the value column is a real field.
    pub datatype: Option<ColumnType>,
    /// Effective aggregation; sentinels never consult it.
    pub aggregation: Aggregation,
    /// User identifier column of the fact table.
    pub identifier: &'a str,
    pub saved_filters: Vec<&'a FactFilter>,
    pub inline_filters: &'a BTreeMap<String, Vec<String>>,
}

/// An aggregate filter that met its compile conditions.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedAggregateFilter {
    pub filter: AggregateFilter,
    /// Aggregate the filter compares; the numerator's own value
    /// expression when absent.
    pub column: Option<ColumnSpec>,
}

/// Capping applied to per-user values before the rollup aggregates them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Capping {
    None,
    Absolute(f64),
    Percentile(f64),
}

/// Metric shape carrying exactly the settings each emitter branches on.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricKind {
    Proportion,
    Retention,
    Mean {
        capping: Capping,
    },
    Ratio {
        capping: Capping,
    },
    Quantile {
        level: QuantileLevel,
        quantile: f64,
        ignore_zeros: bool,
    },
}

impl MetricKind {
    /// Metric type name for SQL header comments.
    pub fn type_name(&self) -> &'static str {
        match self {
            MetricKind::Proportion => "proportion",
            MetricKind::Retention => "retention",
            MetricKind::Mean { .. } => "mean",
            MetricKind::Ratio { .. } => "ratio",
            MetricKind::Quantile { .. } => "quantile",
        }
    }

    pub fn is_retention(&self) -> bool {
        matches!(self, MetricKind::Retention)
    }

    /// Event-level quantiles skip per-user grouping entirely.
    pub fn is_event_level(&self) -> bool {
        matches!(
            self,
            MetricKind::Quantile {
                level: QuantileLevel::Event,
                ..
            }
        )
    }
}

/// A fully validated metric, ready for SQL emission.
#[derive(Debug, Clone)]
pub struct ResolvedMetric<'a> {
    pub kind: MetricKind,
    pub numerator: ResolvedColumn<'a>,
    pub denominator: Option<ResolvedColumn<'a>>,
    pub window: &'a WindowSettings,
    pub aggregate_filter: Option<ResolvedAggregateFilter>,
}

/// Resolve a definition against a catalog, collecting every problem
/// instead of stopping at the first.
///
/// Checks run in a fixed order: definition shape, setting ranges, the
/// aggregate filter, then catalog resolution of the numerator and
/// denominator. The error list order is therefore stable for a given
/// input.
pub fn resolve_metric<'a>(
    definition: &'a MetricDefinition,
    catalog: &'a impl Catalog,
) -> Result<ResolvedMetric<'a>, Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_denominator_shape(definition, &mut errors);
    check_numerator_column(definition, &mut errors);
    check_capping(definition, &mut errors);
    check_quantile_range(definition, &mut errors);
    let aggregate_filter = check_aggregate_filter(definition, catalog, &mut errors);

    let mut numerator =
        resolve_column(Role::Numerator, &definition.numerator, catalog, &mut errors);
    let denominator = match &definition.denominator {
        Some(reference)
            if definition.metric_type == MetricType::Ratio
                && !reference.fact_table_id.is_empty() =>
        {
            resolve_column(Role::Denominator, reference, catalog, &mut errors)
        }
        _ => None,
    };

    let kind = metric_kind(definition, numerator.as_mut());

    if errors.is_empty() {
        if let Some(numerator) = numerator {
            return Ok(ResolvedMetric {
                kind,
                numerator,
                denominator,
                window: &definition.window_settings,
                aggregate_filter,
            });
        }
    }
    Err(errors)
}

// ============================================================================
// Shape and range checks
// ============================================================================

fn check_denominator_shape(definition: &MetricDefinition, errors: &mut Vec<ValidationError>) {
    let denominator = definition.denominator.as_ref();
    match definition.metric_type {
        // A denominator with an empty table id is as missing as no
        // denominator at all; resolution skips it either way.
        MetricType::Ratio => {
            if denominator.map_or(true, |reference| reference.fact_table_id.is_empty()) {
                errors.push(ValidationError::MissingDenominator);
            }
        }
        metric_type if denominator.is_some() => {
            errors.push(ValidationError::UnexpectedDenominator { metric_type })
        }
        _ => {}
    }
}

fn check_numerator_column(definition: &MetricDefinition, errors: &mut Vec<ValidationError>) {
    let requires_distinct_users = matches!(
        definition.metric_type,
        MetricType::Proportion | MetricType::Retention
    );
    if requires_distinct_users && definition.numerator.column != ColumnSpec::DistinctUsers {
        errors.push(ValidationError::InvalidNumeratorColumn {
            metric_type: definition.metric_type,
        });
    }
}

fn check_capping(definition: &MetricDefinition, errors: &mut Vec<ValidationError>) {
    let settings = &definition.capping_settings;
    if settings.capping_type == CappingType::None {
        return;
    }
    if definition.metric_type == MetricType::Quantile {
        errors.push(ValidationError::ConflictingCappingAndQuantile);
        return;
    }
    if settings.capping_type == CappingType::Percentile
        && definition.numerator.aggregate_filter_column.is_some()
    {
        errors.push(ValidationError::ConflictingCappingAndAggregateFilter);
    }
    // Capping only shapes mean and ratio rollups; elsewhere it is inert
    // and its value is not range-checked.
    if !matches!(
        definition.metric_type,
        MetricType::Mean | MetricType::Ratio
    ) {
        return;
    }
    let in_range = match settings.capping_type {
        CappingType::None => true,
        CappingType::Absolute => settings.value.is_finite() && settings.value > 0.0,
        CappingType::Percentile => settings.value > 0.0 && settings.value < 1.0,
    };
    if !in_range {
        errors.push(ValidationError::InvalidCapValue {
            value: settings.value,
        });
    }
}

fn check_quantile_range(definition: &MetricDefinition, errors: &mut Vec<ValidationError>) {
    if definition.metric_type != MetricType::Quantile {
        return;
    }
    let value = definition.quantile_settings.quantile;
    if !(value > 0.0 && value < 1.0) {
        errors.push(ValidationError::InvalidQuantile { value });
    }
}

// ============================================================================
// Aggregate filter
// ============================================================================

/// The aggregate filter only compiles for distinct-user numerators of
/// non-quantile metrics; anywhere else it is dropped without comment.
fn aggregate_filter_compiles(definition: &MetricDefinition) -> bool {
    definition.metric_type != MetricType::Quantile
        && definition.numerator.column == ColumnSpec::DistinctUsers
}

fn check_aggregate_filter(
    definition: &MetricDefinition,
    catalog: &impl Catalog,
    errors: &mut Vec<ValidationError>,
) -> Option<ResolvedAggregateFilter> {
    let numerator = &definition.numerator;
    let text = numerator.aggregate_filter.as_deref()?;
    if !aggregate_filter_compiles(definition) {
        return None;
    }
    let filter = match having::parse_aggregate_filter(text) {
        Ok(filter) => filter,
        Err(_) => {
            errors.push(ValidationError::InvalidAggregateFilter {
                input: text.to_string(),
            });
            return None;
        }
    };
    if let Some(spec) = &numerator.aggregate_filter_column {
        check_aggregate_filter_column(spec, &numerator.fact_table_id, catalog, errors);
    }
    Some(ResolvedAggregateFilter {
        filter,
        column: numerator.aggregate_filter_column.clone(),
    })
}

fn check_aggregate_filter_column(
    spec: &ColumnSpec,
    fact_table_id: &str,
    catalog: &impl Catalog,
    errors: &mut Vec<ValidationError>,
) {
    match spec {
        ColumnSpec::CountRows => {}
        ColumnSpec::DistinctUsers => {
            errors.push(ValidationError::InvalidAggregateFilterColumn {
                column: spec.as_str().to_string(),
            });
        }
        ColumnSpec::Field(key) => {
            // A missing table surfaces through numerator resolution.
            let table = match catalog.fact_table(fact_table_id) {
                Some(table) => table,
                None => return,
            };
            match table.column(key) {
                Some(column) if !column.deleted => {
                    if column.datatype != ColumnType::Number {
                        errors.push(ValidationError::InvalidAggregateFilterColumn {
                            column: key.clone(),
                        });
                    }
                }
                _ => errors.push(ValidationError::UnknownColumn {
                    fact_table: fact_table_id.to_string(),
                    column: key.clone(),
                }),
            }
        }
    }
}

// ============================================================================
// Catalog resolution
// ============================================================================

fn resolve_column<'a>(
    role: Role,
    reference: &'a ColumnRef,
    catalog: &'a impl Catalog,
    errors: &mut Vec<ValidationError>,
) -> Option<ResolvedColumn<'a>> {
    let table = match catalog.fact_table(&reference.fact_table_id) {
        Some(table) => table,
        None => {
            errors.push(ValidationError::UnknownFactTable {
                id: reference.fact_table_id.clone(),
            });
            return None;
        }
    };

    let mut resolved = true;

    let identifier = match table.identifier() {
        Some(identifier) => identifier,
        None => {
            errors.push(ValidationError::MissingIdentifier {
                fact_table: table.id.clone(),
            });
            resolved = false;
            ""
        }
    };

    let mut datatype = None;
    if let Some(key) = reference.column.as_field() {
        match table.column(key) {
            Some(column) if !column.deleted => datatype = Some(column.datatype),
            _ => {
                errors.push(ValidationError::UnknownColumn {
                    fact_table: table.id.clone(),
                    column: key.to_string(),
                });
                resolved = false;
            }
        }
    }

    let aggregation = reference.aggregation.unwrap_or(Aggregation::Sum);
    if aggregation == Aggregation::CountDistinct && datatype == Some(ColumnType::Number) {
        if let Some(key) = reference.column.as_field() {
            errors.push(ValidationError::IneligibleCountDistinct {
                column: key.to_string(),
            });
            resolved = false;
        }
    }

    let mut saved_filters = Vec::new();
    for id in &reference.filters {
        match table.filter(id) {
            Some(filter) => saved_filters.push(filter),
            None => {
                errors.push(ValidationError::UnknownFilter {
                    fact_table: table.id.clone(),
                    filter: id.clone(),
                });
                resolved = false;
            }
        }
    }

    for key in reference.inline_filters.keys() {
        match table.column(key) {
            Some(column) if !column.deleted => {}
            _ => {
                errors.push(ValidationError::UnknownColumn {
                    fact_table: table.id.clone(),
                    column: key.clone(),
                });
                resolved = false;
            }
        }
    }

    if !resolved {
        return None;
    }
    Some(ResolvedColumn {
        role,
        table,
        column: reference.column.clone(),
        datatype,
        aggregation,
        identifier,
        saved_filters,
        inline_filters: &reference.inline_filters,
    })
}

// ============================================================================
// Kind construction
// ============================================================================

fn metric_kind(
    definition: &MetricDefinition,
    numerator: Option<&mut ResolvedColumn<'_>>,
) -> MetricKind {
    match definition.metric_type {
        MetricType::Proportion => MetricKind::Proportion,
        MetricType::Retention => MetricKind::Retention,
        MetricType::Mean => MetricKind::Mean {
            capping: effective_capping(definition),
        },
        MetricType::Ratio => MetricKind::Ratio {
            capping: effective_capping(definition),
        },
        MetricType::Quantile => {
            let settings = &definition.quantile_settings;
            let mut level = QuantileLevel::Unit;
            if let Some(numerator) = numerator {
                let (effective_level, spec) =
                    quantile::effective_spec(settings, &numerator.column, numerator.table);
                if spec != numerator.column {
                    numerator.datatype = None;
                }
                numerator.column = spec;
                level = effective_level;
            }
            MetricKind::Quantile {
                level,
                quantile: settings.quantile,
                ignore_zeros: settings.ignore_zeros,
            }
        }
    }
}

fn effective_capping(definition: &MetricDefinition) -> Capping {
    let settings = &definition.capping_settings;
    match settings.capping_type {
        CappingType::None => Capping::None,
        CappingType::Absolute => Capping::Absolute(settings.value),
        CappingType::Percentile => Capping::Percentile(settings.value),
    }
}
