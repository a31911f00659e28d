use metriq::catalog::{Column, ColumnType, FactTable, InMemoryCatalog};
use metriq::metric::{ColumnRef, MetricDefinition, TimeUnit, WindowSettings};
use metriq::compile;

fn catalog() -> InMemoryCatalog {
    InMemoryCatalog::new().with_table(
        FactTable::new("orders", "warehouse")
            .with_user_id_column("anonymous_id")
            .with_column(Column::new("Amount", "amount", ColumnType::Number)),
    )
}

fn where_lines(sql: &str) -> Vec<&str> {
    let start = sql.find("WHERE\n").map(|i| i + "WHERE\n".len()).unwrap();
    let rest = &sql[start..];
    let end = rest.find("\nGROUP BY").unwrap_or(rest.len());
    rest[..end].lines().map(str::trim).collect()
}

#[test]
fn test_no_window_keeps_only_the_exposure_bound() {
    let definition = MetricDefinition::mean(ColumnRef::new("orders", "amount"));
    let compiled = compile(&definition, &catalog()).unwrap();
    assert_eq!(
        where_lines(&compiled.value_sql),
        vec!["timestamp > exposure_timestamp -- Only after seeing the experiment"]
    );
}

#[test]
fn test_conversion_window_bounds_both_sides() {
    let definition = MetricDefinition::proportion(ColumnRef::distinct_users("orders"))
        .with_window_settings(WindowSettings::conversion(72, TimeUnit::Hours));
    let compiled = compile(&definition, &catalog()).unwrap();
    assert_eq!(
        where_lines(&compiled.value_sql),
        vec![
            "timestamp > exposure_timestamp -- Only after seeing the experiment",
            "AND timestamp < exposure_timestamp + INTERVAL '72 hours' -- Only within the conversion window",
        ]
    );
}

#[test]
fn test_delay_shifts_both_conversion_bounds() {
    let definition = MetricDefinition::proportion(ColumnRef::distinct_users("orders"))
        .with_window_settings(
            WindowSettings::conversion(72, TimeUnit::Hours).with_delay(1, TimeUnit::Days),
        );
    let compiled = compile(&definition, &catalog()).unwrap();
    assert_eq!(
        where_lines(&compiled.value_sql),
        vec![
            "timestamp > exposure_timestamp + INTERVAL '1 day' -- Only after seeing the experiment + delay",
            "AND timestamp < exposure_timestamp + INTERVAL '1 day' + INTERVAL '72 hours' -- Only within the conversion window",
        ]
    );
}

#[test]
fn test_lookback_window_counts_back_from_now() {
    let definition = MetricDefinition::mean(ColumnRef::new("orders", "amount"))
        .with_window_settings(WindowSettings::lookback(30, TimeUnit::Days));
    let compiled = compile(&definition, &catalog()).unwrap();
    assert_eq!(
        where_lines(&compiled.value_sql),
        vec![
            "timestamp > exposure_timestamp -- Only after seeing the experiment",
            "AND timestamp > NOW() - INTERVAL '30 days' -- Only within the lookback window",
        ]
    );
}

#[test]
fn test_delay_alone_shifts_the_exposure_bound() {
    let definition = MetricDefinition::mean(ColumnRef::new("orders", "amount"))
        .with_window_settings(WindowSettings::none().with_delay(2, TimeUnit::Days));
    let compiled = compile(&definition, &catalog()).unwrap();
    assert_eq!(
        where_lines(&compiled.value_sql),
        vec![
            "timestamp > exposure_timestamp + INTERVAL '2 days' -- Only after seeing the experiment + delay",
        ]
    );
}

#[test]
fn test_retention_mentions_the_delay_even_at_zero() {
    let definition = MetricDefinition::retention(ColumnRef::distinct_users("orders"));
    let compiled = compile(&definition, &catalog()).unwrap();
    assert_eq!(
        where_lines(&compiled.value_sql),
        vec![
            "timestamp > exposure_timestamp + INTERVAL '0 hours' -- Only after seeing the experiment + delay",
        ]
    );

    let delayed = MetricDefinition::retention(ColumnRef::distinct_users("orders"))
        .with_window_settings(WindowSettings::none().with_delay(1, TimeUnit::Weeks));
    let compiled = compile(&delayed, &catalog()).unwrap();
    assert_eq!(
        where_lines(&compiled.value_sql),
        vec![
            "timestamp > exposure_timestamp + INTERVAL '1 week' -- Only after seeing the experiment + delay",
        ]
    );
}

#[test]
fn test_singular_interval_labels() {
    let definition = MetricDefinition::proportion(ColumnRef::distinct_users("orders"))
        .with_window_settings(
            WindowSettings::conversion(1, TimeUnit::Days).with_delay(1, TimeUnit::Hours),
        );
    let compiled = compile(&definition, &catalog()).unwrap();
    assert!(compiled.value_sql.contains("INTERVAL '1 hour'"));
    assert!(compiled.value_sql.contains("INTERVAL '1 day'"));
}

#[test]
fn test_ratio_roles_share_the_window() {
    let definition = MetricDefinition::ratio(
        ColumnRef::new("orders", "amount"),
        ColumnRef::count_rows("orders"),
    )
    .with_window_settings(WindowSettings::lookback(14, TimeUnit::Days));
    let compiled = compile(&definition, &catalog()).unwrap();
    let fragment = "timestamp > NOW() - INTERVAL '14 days' -- Only within the lookback window";
    assert!(compiled.value_sql.contains(fragment));
    assert!(compiled.denominator_sql.unwrap().contains(fragment));
}
