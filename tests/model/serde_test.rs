use metriq::catalog::{Catalog, ColumnType, InMemoryCatalog};
use metriq::metric::{
    Aggregation, CappingSettings, CappingType, ColumnRef, ColumnSpec, MetricDefinition,
    MetricType, QuantileLevel, QuantileSettings, TimeUnit, WindowSettings, WindowType,
};
use serde_json::Value;

#[test]
fn test_definition_round_trips_through_json() {
    let definition = MetricDefinition::ratio(
        ColumnRef::new("orders", "revenue")
            .with_aggregation(Aggregation::Sum)
            .with_filter("f_paid")
            .with_inline_filter("country", vec!["US", "CA"])
            .with_aggregate_filter(">= 10")
            .with_aggregate_filter_column(ColumnSpec::CountRows),
        ColumnRef::count_rows("sessions"),
    )
    .with_window_settings(WindowSettings::conversion(7, TimeUnit::Days).with_delay(1, TimeUnit::Hours))
    .with_capping_settings(CappingSettings::absolute(500.0));

    let json = definition.to_json().unwrap();
    let parsed = MetricDefinition::from_json(&json).unwrap();
    assert_eq!(parsed, definition);
}

#[test]
fn test_wire_format_field_names() {
    let definition = MetricDefinition::proportion(
        ColumnRef::distinct_users("signups").with_aggregation(Aggregation::CountDistinct),
    )
    .with_window_settings(WindowSettings::lookback(30, TimeUnit::Days));

    let value: Value = serde_json::from_str(&definition.to_json().unwrap()).unwrap();
    assert_eq!(value["metricType"], "proportion");
    assert_eq!(value["numerator"]["factTableId"], "signups");
    assert_eq!(value["numerator"]["column"], "$$distinctUsers");
    assert_eq!(value["numerator"]["aggregation"], "count-distinct");
    assert_eq!(value["windowSettings"]["type"], "lookback");
    assert_eq!(value["windowSettings"]["windowValue"], 30);
    assert_eq!(value["windowSettings"]["windowUnit"], "days");
    assert_eq!(value["windowSettings"]["delayValue"], 0);
    // Empty filter lists are omitted from the document.
    assert!(value["numerator"].get("filters").is_none());
    assert!(value["numerator"].get("inlineFilters").is_none());
}

#[test]
fn test_minimal_document_gets_defaults() {
    let json = r#"{
        "metricType": "mean",
        "numerator": { "factTableId": "orders", "column": "amount" }
    }"#;
    let definition = MetricDefinition::from_json(json).unwrap();

    assert_eq!(definition.metric_type, MetricType::Mean);
    assert_eq!(definition.numerator.column, ColumnSpec::Field("amount".to_string()));
    assert_eq!(definition.numerator.aggregation, None);
    assert!(definition.denominator.is_none());

    let window = &definition.window_settings;
    assert_eq!(window.window_type, WindowType::None);
    assert_eq!(window.window_value, 72);
    assert_eq!(window.window_unit, TimeUnit::Hours);
    assert_eq!(window.delay_value, 0);
    assert_eq!(window.delay_unit, TimeUnit::Hours);

    assert_eq!(definition.quantile_settings.level, QuantileLevel::Unit);
    assert_eq!(definition.quantile_settings.quantile, 0.5);
    assert!(!definition.quantile_settings.ignore_zeros);
    assert_eq!(definition.capping_settings.capping_type, CappingType::None);
}

#[test]
fn test_sentinel_columns_parse_from_strings() {
    let json = r#"{
        "metricType": "ratio",
        "numerator": { "factTableId": "orders", "column": "$$distinctUsers" },
        "denominator": { "factTableId": "orders", "column": "$$count" }
    }"#;
    let definition = MetricDefinition::from_json(json).unwrap();
    assert_eq!(definition.numerator.column, ColumnSpec::DistinctUsers);
    assert_eq!(definition.denominator.unwrap().column, ColumnSpec::CountRows);
}

#[test]
fn test_unknown_metric_type_is_rejected() {
    let json = r#"{
        "metricType": "median",
        "numerator": { "factTableId": "orders", "column": "amount" }
    }"#;
    assert!(MetricDefinition::from_json(json).is_err());
}

#[test]
fn test_quantile_settings_round_trip() {
    let definition = MetricDefinition::quantile(
        ColumnRef::new("orders", "amount"),
        QuantileSettings::event(0.95).with_ignore_zeros(true),
    );
    let value: Value = serde_json::from_str(&definition.to_json().unwrap()).unwrap();
    assert_eq!(value["quantileSettings"]["level"], "event");
    assert_eq!(value["quantileSettings"]["quantile"], 0.95);
    assert_eq!(value["quantileSettings"]["ignoreZeros"], true);

    let parsed = MetricDefinition::from_json(&definition.to_json().unwrap()).unwrap();
    assert_eq!(parsed, definition);
}

#[test]
fn test_catalog_from_json() {
    let json = r#"[
        {
            "id": "orders",
            "datasource": "warehouse",
            "userIdColumns": ["anonymous_id", "user_id"],
            "columns": [
                { "name": "Amount", "column": "amount", "datatype": "number" },
                { "name": "Country", "column": "country", "datatype": "string",
                  "topValues": ["US", "CA"] },
                { "name": "Legacy", "column": "legacy", "datatype": "number", "deleted": true }
            ],
            "filters": [
                { "id": "f_paid", "name": "Paid orders", "value": "\"status\" = 'paid'" }
            ]
        }
    ]"#;
    let catalog = InMemoryCatalog::from_json(json).unwrap();
    let table = catalog.fact_table("orders").unwrap();

    assert_eq!(table.identifier(), Some("anonymous_id"));
    assert_eq!(table.column("amount").unwrap().datatype, ColumnType::Number);
    assert_eq!(table.column("country").unwrap().top_values, vec!["US", "CA"]);
    assert!(table.column("legacy").unwrap().deleted);
    assert_eq!(table.filter("f_paid").unwrap().name, "Paid orders");
    // The deleted column is excluded from quantile candidates.
    let eligible: Vec<&str> = table
        .eligible_quantile_columns()
        .iter()
        .map(|c| c.column.as_str())
        .collect();
    assert_eq!(eligible, vec!["amount"]);
}
