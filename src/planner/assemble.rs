//! Final SQL assembly: per-role fact queries and the experiment rollup.
//!
//! The rollup embeds the per-role queries as CTEs exactly as they were
//! rendered standalone, so there is one rendering path for preview and
//! execution alike.

use crate::metric::QuantileLevel;
use crate::sql::{
    col, count, count_distinct, func, lit_float, lit_int, name, qualified, quote_ident, sum, Cte,
    Expr, ExprExt, Predicate, Query, SelectItem, TableRef,
};

use super::resolve::{Capping, MetricKind, ResolvedColumn, ResolvedMetric, Role};
use super::{aggregation, filters, having, window};

/// Per-user (or per-event) query for one side of the metric.
pub fn per_role_query(metric: &ResolvedMetric<'_>, column: &ResolvedColumn<'_>) -> Query {
    let event_level = metric.kind.is_event_level();
    let header = format!(
        "{}: {} {} value from {}",
        column.role.label(),
        if event_level { "per-event" } else { "per-user" },
        metric.kind.type_name(),
        quote_ident(&column.table.id)
    );

    // Event-level quantiles have no grouping, so zero exclusion rides
    // in the row filter.
    let zero_exclusion = match (&metric.kind, column.column.as_field()) {
        (
            MetricKind::Quantile {
                level: QuantileLevel::Event,
                ignore_zeros: true,
                ..
            },
            Some(key),
        ) => Some(Predicate::new(col(key).gt(lit_int(0))).with_comment("Ignore zero values")),
        _ => None,
    };

    let value_item = match (&metric.kind, column.column.as_field()) {
        (
            MetricKind::Quantile {
                level: QuantileLevel::Event,
                ..
            },
            Some(key),
        ) => SelectItem::new(col(key), "value"),
        _ => aggregation::value_select_item(column),
    };

    let window_predicates = window::window_predicates(metric.window, metric.kind.is_retention());
    let predicates = filters::row_predicates(column, window_predicates, zero_exclusion);

    let mut query = Query::new()
        .header(&header)
        .select_item(SelectItem::new(col(column.identifier), "user"))
        .select_item(value_item)
        .from(TableRef::new(&column.table.id))
        .filters(predicates);

    if !event_level {
        query = query.group_by(vec![name("user")]);
        if column.role == Role::Numerator {
            query = query.havings(having::having_predicates(metric));
        }
    }
    query
}

/// Variation-level rollup joining the per-role queries against the
/// exposure table.
pub fn rollup_query(
    metric: &ResolvedMetric<'_>,
    value_sql: &str,
    denominator_sql: Option<&str>,
    exposure_table: &str,
) -> Query {
    let mut query = Query::new()
        .header(&format!(
            "Experiment rollup: {} metric per variation",
            metric.kind.type_name()
        ))
        .with_cte(Cte::new("metric_value", value_sql));
    if let Some(denominator_sql) = denominator_sql {
        query = query.with_cte(Cte::new("metric_denominator", denominator_sql));
    }

    query = query.select_item(SelectItem::new(qualified("e", "variation"), "variation"));
    for item in rollup_items(&metric.kind) {
        query = query.select_item(item);
    }

    query = query
        .from(TableRef::new(exposure_table).with_alias("e"))
        .left_join_commented(
            TableRef::cte("metric_value").with_alias("m"),
            qualified("m", "user").eq(qualified("e", "user")),
            "One row per exposed user",
        );
    if denominator_sql.is_some() {
        query = query.left_join(
            TableRef::cte("metric_denominator").with_alias("d"),
            qualified("d", "user").eq(qualified("e", "user")),
        );
    }
    query.group_by(vec![name("variation")])
}

fn rollup_items(kind: &MetricKind) -> Vec<SelectItem> {
    match kind {
        MetricKind::Proportion | MetricKind::Retention => vec![
            SelectItem::new(count(qualified("m", "user")), "numerator")
                .with_comment("Users with at least one qualifying row"),
            SelectItem::new(
                count(qualified("m", "user"))
                    .mul(lit_float(1.0))
                    .div(count_distinct(qualified("e", "user"))),
                "value",
            )
            .with_comment("Share of exposed users"),
        ],
        MetricKind::Mean { capping } => {
            let (numerator_item, capped) = capped_numerator(capping);
            vec![
                numerator_item,
                SelectItem::new(
                    sum(capped)
                        .mul(lit_float(1.0))
                        .div(count_distinct(qualified("e", "user"))),
                    "value",
                )
                .with_comment("Average value per exposed user"),
            ]
        }
        MetricKind::Ratio { capping } => {
            let (numerator_item, capped) = capped_numerator(capping);
            vec![
                numerator_item,
                SelectItem::new(sum(qualified("d", "value")), "denominator"),
                SelectItem::new(
                    sum(capped)
                        .mul(lit_float(1.0))
                        .div(sum(qualified("d", "value"))),
                    "value",
                )
                .with_comment("Ratio of the two aggregates"),
            ]
        }
        MetricKind::Quantile {
            level, quantile, ..
        } => vec![
            SelectItem::new(count(qualified("m", "value")), "numerator")
                .with_comment("Units contributing to the quantile"),
            SelectItem::new(
                func(
                    "APPROX_PERCENTILE",
                    vec![qualified("m", "value"), lit_float(*quantile)],
                ),
                "value",
            )
            .with_comment(&quantile_comment(*level, *quantile)),
        ],
    }
}

/// Numerator select item plus the capped value expression the rollup
/// reuses in its value column.
fn capped_numerator(capping: &Capping) -> (SelectItem, Expr) {
    match capping {
        Capping::None => {
            let capped = qualified("m", "value");
            (SelectItem::new(sum(capped.clone()), "numerator"), capped)
        }
        Capping::Absolute(cap) => {
            let capped = func("LEAST", vec![qualified("m", "value"), lit_float(*cap)]);
            (
                SelectItem::new(sum(capped.clone()), "numerator")
                    .with_comment(&format!("Cap each user value at {}", cap)),
                capped,
            )
        }
        Capping::Percentile(percentile) => {
            let capped = qualified("m", "value");
            (
                SelectItem::new(sum(capped.clone()), "numerator").with_comment(&format!(
                    "Values above the P{} percentile are capped by the execution layer",
                    percent_label(*percentile)
                )),
                capped,
            )
        }
    }
}

/// Percent label for a quantile in (0, 1), micro-rounded so labels
/// like P99.9 stay free of float noise.
fn percent_label(quantile: f64) -> String {
    let percent = (quantile * 100.0 * 1e6).round() / 1e6;
    format!("{}", percent)
}

fn quantile_comment(level: QuantileLevel, quantile: f64) -> String {
    match level {
        QuantileLevel::Unit => format!("P{} over per-user values", percent_label(quantile)),
        QuantileLevel::Event => format!("P{} over individual events", percent_label(quantile)),
    }
}
