use metriq::catalog::{Column, ColumnType, FactFilter, FactTable, InMemoryCatalog};
use metriq::metric::{
    Aggregation, CappingSettings, ColumnRef, ColumnSpec, MetricDefinition, MetricType,
    QuantileSettings,
};
use metriq::{compile, validate, ValidationError};

fn catalog() -> InMemoryCatalog {
    InMemoryCatalog::new().with_table(
        FactTable::new("orders", "warehouse")
            .with_user_id_column("anonymous_id")
            .with_column(Column::new("Amount", "amount", ColumnType::Number))
            .with_column(Column::new("Country", "country", ColumnType::String))
            .with_column(Column::new("Session", "session_id", ColumnType::String))
            .with_filter(FactFilter::new("f_paid", "Paid orders", "\"status\" = 'paid'")),
    )
}

#[test]
fn test_valid_definitions_pass_for_every_type() {
    let catalog = catalog();
    let definitions = [
        MetricDefinition::proportion(ColumnRef::distinct_users("orders")),
        MetricDefinition::retention(ColumnRef::distinct_users("orders")),
        MetricDefinition::mean(ColumnRef::new("orders", "amount")),
        MetricDefinition::ratio(
            ColumnRef::new("orders", "amount"),
            ColumnRef::count_rows("orders"),
        ),
        MetricDefinition::quantile(
            ColumnRef::new("orders", "amount"),
            QuantileSettings::unit(0.9),
        ),
    ];
    for definition in &definitions {
        assert_eq!(validate(definition, &catalog), Ok(()));
    }
}

#[test]
fn test_unknown_fact_table() {
    let definition = MetricDefinition::mean(ColumnRef::new("clicks", "amount"));
    let errors = validate(&definition, &catalog()).unwrap_err();
    assert_eq!(
        errors,
        vec![ValidationError::UnknownFactTable {
            id: "clicks".to_string()
        }]
    );
}

#[test]
fn test_unknown_column() {
    let definition = MetricDefinition::mean(ColumnRef::new("orders", "amout"));
    let errors = validate(&definition, &catalog()).unwrap_err();
    assert_eq!(
        errors,
        vec![ValidationError::UnknownColumn {
            fact_table: "orders".to_string(),
            column: "amout".to_string()
        }]
    );
}

#[test]
fn test_unknown_filter() {
    let definition =
        MetricDefinition::mean(ColumnRef::new("orders", "amount").with_filter("f_gone"));
    let errors = validate(&definition, &catalog()).unwrap_err();
    assert_eq!(
        errors,
        vec![ValidationError::UnknownFilter {
            fact_table: "orders".to_string(),
            filter: "f_gone".to_string()
        }]
    );
}

#[test]
fn test_missing_denominator() {
    let mut definition = MetricDefinition::ratio(
        ColumnRef::new("orders", "amount"),
        ColumnRef::count_rows("orders"),
    );
    definition.denominator = None;
    let errors = validate(&definition, &catalog()).unwrap_err();
    assert_eq!(errors, vec![ValidationError::MissingDenominator]);
}

#[test]
fn test_unexpected_denominator_for_non_ratio_types() {
    let catalog = catalog();
    let cases = [
        (
            MetricDefinition::proportion(ColumnRef::distinct_users("orders")),
            MetricType::Proportion,
        ),
        (
            MetricDefinition::retention(ColumnRef::distinct_users("orders")),
            MetricType::Retention,
        ),
        (
            MetricDefinition::mean(ColumnRef::new("orders", "amount")),
            MetricType::Mean,
        ),
    ];
    for (definition, metric_type) in cases {
        let broken = definition.with_denominator(ColumnRef::count_rows("orders"));
        let errors = validate(&broken, &catalog).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::UnexpectedDenominator { metric_type }],
            "{}",
            metric_type
        );
    }
}

#[test]
fn test_numerator_column_rule_for_proportion_and_retention() {
    let catalog = catalog();
    for (definition, metric_type) in [
        (
            MetricDefinition::proportion(ColumnRef::count_rows("orders")),
            MetricType::Proportion,
        ),
        (
            MetricDefinition::retention(ColumnRef::new("orders", "amount")),
            MetricType::Retention,
        ),
    ] {
        let errors = validate(&definition, &catalog).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::InvalidNumeratorColumn { metric_type }],
            "{}",
            metric_type
        );
    }
}

#[test]
fn test_invalid_aggregate_filter_text() {
    let definition = MetricDefinition::proportion(
        ColumnRef::distinct_users("orders").with_aggregate_filter("more than ten"),
    );
    let errors = validate(&definition, &catalog()).unwrap_err();
    assert_eq!(
        errors,
        vec![ValidationError::InvalidAggregateFilter {
            input: "more than ten".to_string()
        }]
    );
}

#[test]
fn test_aggregate_filter_column_must_be_numeric() {
    let catalog = catalog();
    let string_column = MetricDefinition::proportion(
        ColumnRef::distinct_users("orders")
            .with_aggregate_filter(">= 2")
            .with_aggregate_filter_column(ColumnSpec::Field("country".to_string())),
    );
    assert_eq!(
        validate(&string_column, &catalog).unwrap_err(),
        vec![ValidationError::InvalidAggregateFilterColumn {
            column: "country".to_string()
        }]
    );

    let distinct_users = MetricDefinition::proportion(
        ColumnRef::distinct_users("orders")
            .with_aggregate_filter(">= 2")
            .with_aggregate_filter_column(ColumnSpec::DistinctUsers),
    );
    assert_eq!(
        validate(&distinct_users, &catalog).unwrap_err(),
        vec![ValidationError::InvalidAggregateFilterColumn {
            column: "$$distinctUsers".to_string()
        }]
    );

    let missing = MetricDefinition::proportion(
        ColumnRef::distinct_users("orders")
            .with_aggregate_filter(">= 2")
            .with_aggregate_filter_column(ColumnSpec::Field("nope".to_string())),
    );
    assert_eq!(
        validate(&missing, &catalog).unwrap_err(),
        vec![ValidationError::UnknownColumn {
            fact_table: "orders".to_string(),
            column: "nope".to_string()
        }]
    );
}

#[test]
fn test_percentile_capping_conflicts_with_aggregate_filter() {
    let definition = MetricDefinition::ratio(
        ColumnRef::distinct_users("orders")
            .with_aggregate_filter(">= 3")
            .with_aggregate_filter_column(ColumnSpec::CountRows),
        ColumnRef::count_rows("orders"),
    )
    .with_capping_settings(CappingSettings::percentile(0.99));
    let errors = validate(&definition, &catalog()).unwrap_err();
    assert_eq!(
        errors,
        vec![ValidationError::ConflictingCappingAndAggregateFilter]
    );
}

#[test]
fn test_quantile_capping_conflict_is_a_single_error() {
    // Scenario: quantile metrics reject capping outright.
    let definition = MetricDefinition::quantile(
        ColumnRef::new("orders", "amount"),
        QuantileSettings::unit(0.9),
    )
    .with_capping_settings(CappingSettings::percentile(0.99));

    let errors = validate(&definition, &catalog()).unwrap_err();
    assert_eq!(errors, vec![ValidationError::ConflictingCappingAndQuantile]);
    // And no SQL comes out of compile for the same input.
    assert!(compile(&definition, &catalog()).is_err());
}

#[test]
fn test_invalid_cap_values() {
    let catalog = catalog();
    for value in [0.0, -5.0] {
        let definition = MetricDefinition::mean(ColumnRef::new("orders", "amount"))
            .with_capping_settings(CappingSettings::absolute(value));
        assert_eq!(
            validate(&definition, &catalog).unwrap_err(),
            vec![ValidationError::InvalidCapValue { value }],
            "absolute {}",
            value
        );
    }
    for value in [0.0, 1.0, 1.5] {
        let definition = MetricDefinition::mean(ColumnRef::new("orders", "amount"))
            .with_capping_settings(CappingSettings::percentile(value));
        assert_eq!(
            validate(&definition, &catalog).unwrap_err(),
            vec![ValidationError::InvalidCapValue { value }],
            "percentile {}",
            value
        );
    }
}

#[test]
fn test_invalid_quantile_values() {
    let catalog = catalog();
    for value in [0.0, 1.0, -0.25] {
        let definition = MetricDefinition::quantile(
            ColumnRef::new("orders", "amount"),
            QuantileSettings::unit(value),
        );
        assert_eq!(
            validate(&definition, &catalog).unwrap_err(),
            vec![ValidationError::InvalidQuantile { value }],
            "{}",
            value
        );
    }
}

#[test]
fn test_count_distinct_only_on_string_columns() {
    let catalog = catalog();
    let numeric = MetricDefinition::mean(
        ColumnRef::new("orders", "amount").with_aggregation(Aggregation::CountDistinct),
    );
    assert_eq!(
        validate(&numeric, &catalog).unwrap_err(),
        vec![ValidationError::IneligibleCountDistinct {
            column: "amount".to_string()
        }]
    );

    let string = MetricDefinition::mean(
        ColumnRef::new("orders", "session_id").with_aggregation(Aggregation::CountDistinct),
    );
    assert_eq!(validate(&string, &catalog), Ok(()));
}

#[test]
fn test_missing_identifier() {
    let catalog = InMemoryCatalog::new().with_table(
        FactTable::new("pageviews", "warehouse")
            .with_column(Column::new("Path", "path", ColumnType::String)),
    );
    let definition = MetricDefinition::proportion(ColumnRef::distinct_users("pageviews"));
    let errors = validate(&definition, &catalog).unwrap_err();
    assert_eq!(
        errors,
        vec![ValidationError::MissingIdentifier {
            fact_table: "pageviews".to_string()
        }]
    );
}

#[test]
fn test_all_problems_reported_together() {
    // Shape problems come before catalog resolution problems, and the
    // numerator resolves before the denominator.
    let definition = MetricDefinition::ratio(
        ColumnRef::new("clicks", "amount"),
        ColumnRef::new("orders", "amout").with_filter("f_gone"),
    )
    .with_capping_settings(CappingSettings::absolute(-1.0));

    let errors = validate(&definition, &catalog()).unwrap_err();
    assert_eq!(
        errors,
        vec![
            ValidationError::InvalidCapValue { value: -1.0 },
            ValidationError::UnknownFactTable {
                id: "clicks".to_string()
            },
            ValidationError::UnknownColumn {
                fact_table: "orders".to_string(),
                column: "amout".to_string()
            },
            ValidationError::UnknownFilter {
                fact_table: "orders".to_string(),
                filter: "f_gone".to_string()
            },
        ]
    );
}

#[test]
fn test_validate_agrees_with_compile() {
    let catalog = catalog();
    let good = MetricDefinition::mean(ColumnRef::new("orders", "amount"));
    assert_eq!(validate(&good, &catalog), Ok(()));
    assert!(compile(&good, &catalog).is_ok());

    let bad = MetricDefinition::mean(ColumnRef::new("orders", "amout"));
    let validate_errors = validate(&bad, &catalog).unwrap_err();
    let compile_errors = compile(&bad, &catalog).unwrap_err();
    assert_eq!(validate_errors, compile_errors);
}
