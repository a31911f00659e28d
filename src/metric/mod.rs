//! Metric definition documents - the engine's declarative input.
//!
//! A [`MetricDefinition`] is the JSON document an editing layer produces:
//! metric type, one or two column references into the fact table catalog,
//! and window, quantile, and capping settings. The struct is intentionally
//! permissive; in-progress edit states (a ratio without its denominator, a
//! reference to a since-deleted column) are representable and the
//! validation gate reports them instead of the constructor refusing them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Sentinel column string for "count the rows".
pub const COUNT_ROWS: &str = "$$count";
/// Sentinel column string for "count distinct exposed users".
pub const DISTINCT_USERS: &str = "$$distinctUsers";

/// The five metric families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    Proportion,
    Retention,
    Mean,
    Ratio,
    Quantile,
}

impl MetricType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Proportion => "proportion",
            MetricType::Retention => "retention",
            MetricType::Mean => "mean",
            MetricType::Ratio => "ratio",
            MetricType::Quantile => "quantile",
        }
    }
}

impl std::fmt::Display for MetricType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a column reference points at: a real column key or one of the
/// two sentinels. On the wire this is a plain string; `$$count` and
/// `$$distinctUsers` select the sentinels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ColumnSpec {
    CountRows,
    DistinctUsers,
    Field(String),
}

impl ColumnSpec {
    pub fn is_sentinel(&self) -> bool {
        !matches!(self, ColumnSpec::Field(_))
    }

    /// The real column key, if this is not a sentinel.
    pub fn as_field(&self) -> Option<&str> {
        match self {
            ColumnSpec::Field(key) => Some(key),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ColumnSpec::CountRows => COUNT_ROWS,
            ColumnSpec::DistinctUsers => DISTINCT_USERS,
            ColumnSpec::Field(key) => key,
        }
    }
}

impl From<String> for ColumnSpec {
    fn from(s: String) -> Self {
        match s.as_str() {
            COUNT_ROWS => ColumnSpec::CountRows,
            DISTINCT_USERS => ColumnSpec::DistinctUsers,
            _ => ColumnSpec::Field(s),
        }
    }
}

impl From<&str> for ColumnSpec {
    fn from(s: &str) -> Self {
        ColumnSpec::from(s.to_string())
    }
}

impl From<ColumnSpec> for String {
    fn from(spec: ColumnSpec) -> Self {
        spec.as_str().to_string()
    }
}

/// How a real column aggregates into the per-user value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Aggregation {
    Sum,
    Max,
    CountDistinct,
}

/// A role's reference into a fact table: the column (or sentinel), the
/// aggregation, and the row-level and aggregate-level filters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnRef {
    pub fact_table_id: String,
    pub column: ColumnSpec,
    /// Defaults to `Sum` during resolution; ignored for sentinels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<Aggregation>,
    /// Saved filter ids, applied in this order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<String>,
    /// Column key to allowed string values; keys apply in sorted order.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub inline_filters: BTreeMap<String, Vec<String>>,
    /// Aggregate filter target: a numeric column or `$$count`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregate_filter_column: Option<ColumnSpec>,
    /// Aggregate filter text, e.g. `">= 10"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregate_filter: Option<String>,
}

impl ColumnRef {
    pub fn new(fact_table_id: impl Into<String>, column: impl Into<ColumnSpec>) -> Self {
        Self {
            fact_table_id: fact_table_id.into(),
            column: column.into(),
            aggregation: None,
            filters: vec![],
            inline_filters: BTreeMap::new(),
            aggregate_filter_column: None,
            aggregate_filter: None,
        }
    }

    /// Reference counting rows (`$$count`).
    pub fn count_rows(fact_table_id: impl Into<String>) -> Self {
        Self::new(fact_table_id, ColumnSpec::CountRows)
    }

    /// Reference counting distinct users (`$$distinctUsers`).
    pub fn distinct_users(fact_table_id: impl Into<String>) -> Self {
        Self::new(fact_table_id, ColumnSpec::DistinctUsers)
    }

    pub fn with_aggregation(mut self, aggregation: Aggregation) -> Self {
        self.aggregation = Some(aggregation);
        self
    }

    pub fn with_filter(mut self, filter_id: impl Into<String>) -> Self {
        self.filters.push(filter_id.into());
        self
    }

    pub fn with_inline_filter(mut self, column: impl Into<String>, values: Vec<&str>) -> Self {
        self.inline_filters
            .insert(column.into(), values.into_iter().map(String::from).collect());
        self
    }

    pub fn with_aggregate_filter(mut self, text: impl Into<String>) -> Self {
        self.aggregate_filter = Some(text.into());
        self
    }

    pub fn with_aggregate_filter_column(mut self, column: impl Into<ColumnSpec>) -> Self {
        self.aggregate_filter_column = Some(column.into());
        self
    }
}

/// Attribution window policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowType {
    #[default]
    None,
    Conversion,
    Lookback,
}

/// Units for window and delay durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Minutes,
    Hours,
    Days,
    Weeks,
}

impl TimeUnit {
    /// The interval unit word, singular when `value` is 1.
    pub fn label(&self, value: u32) -> &'static str {
        match (self, value) {
            (TimeUnit::Minutes, 1) => "minute",
            (TimeUnit::Minutes, _) => "minutes",
            (TimeUnit::Hours, 1) => "hour",
            (TimeUnit::Hours, _) => "hours",
            (TimeUnit::Days, 1) => "day",
            (TimeUnit::Days, _) => "days",
            (TimeUnit::Weeks, 1) => "week",
            (TimeUnit::Weeks, _) => "weeks",
        }
    }
}

/// Attribution window and post-exposure delay.
///
/// The window value and unit only apply when `window_type` is not
/// `None`; the delay applies to every metric type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowSettings {
    #[serde(rename = "type", default)]
    pub window_type: WindowType,
    #[serde(default = "default_window_value")]
    pub window_value: u32,
    #[serde(default = "default_window_unit")]
    pub window_unit: TimeUnit,
    #[serde(default)]
    pub delay_value: u32,
    #[serde(default = "default_delay_unit")]
    pub delay_unit: TimeUnit,
}

fn default_window_value() -> u32 {
    72
}

fn default_window_unit() -> TimeUnit {
    TimeUnit::Hours
}

fn default_delay_unit() -> TimeUnit {
    TimeUnit::Hours
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            window_type: WindowType::None,
            window_value: default_window_value(),
            window_unit: default_window_unit(),
            delay_value: 0,
            delay_unit: default_delay_unit(),
        }
    }
}

impl WindowSettings {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn conversion(value: u32, unit: TimeUnit) -> Self {
        Self {
            window_type: WindowType::Conversion,
            window_value: value,
            window_unit: unit,
            ..Self::default()
        }
    }

    pub fn lookback(value: u32, unit: TimeUnit) -> Self {
        Self {
            window_type: WindowType::Lookback,
            window_value: value,
            window_unit: unit,
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, value: u32, unit: TimeUnit) -> Self {
        self.delay_value = value;
        self.delay_unit = unit;
        self
    }
}

/// Whether a quantile aggregates per user first or ranks raw events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuantileLevel {
    #[default]
    Unit,
    Event,
}

/// Quantile metric settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantileSettings {
    #[serde(default)]
    pub level: QuantileLevel,
    #[serde(default = "default_quantile")]
    pub quantile: f64,
    #[serde(default)]
    pub ignore_zeros: bool,
}

fn default_quantile() -> f64 {
    0.5
}

impl Default for QuantileSettings {
    fn default() -> Self {
        Self {
            level: QuantileLevel::Unit,
            quantile: default_quantile(),
            ignore_zeros: false,
        }
    }
}

impl QuantileSettings {
    pub fn unit(quantile: f64) -> Self {
        Self {
            level: QuantileLevel::Unit,
            quantile,
            ignore_zeros: false,
        }
    }

    pub fn event(quantile: f64) -> Self {
        Self {
            level: QuantileLevel::Event,
            quantile,
            ignore_zeros: false,
        }
    }

    pub fn with_ignore_zeros(mut self, ignore_zeros: bool) -> Self {
        self.ignore_zeros = ignore_zeros;
        self
    }
}

/// Outlier capping policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CappingType {
    #[default]
    None,
    Absolute,
    Percentile,
}

/// Outlier capping for mean and ratio numerator values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CappingSettings {
    #[serde(rename = "type", default)]
    pub capping_type: CappingType,
    #[serde(default)]
    pub value: f64,
}

impl CappingSettings {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn absolute(value: f64) -> Self {
        Self {
            capping_type: CappingType::Absolute,
            value,
        }
    }

    pub fn percentile(value: f64) -> Self {
        Self {
            capping_type: CappingType::Percentile,
            value,
        }
    }
}

/// A complete metric definition document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricDefinition {
    pub metric_type: MetricType,
    pub numerator: ColumnRef,
    /// Required for ratio metrics, forbidden otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denominator: Option<ColumnRef>,
    #[serde(default)]
    pub window_settings: WindowSettings,
    #[serde(default)]
    pub quantile_settings: QuantileSettings,
    #[serde(default)]
    pub capping_settings: CappingSettings,
}

impl MetricDefinition {
    fn new(metric_type: MetricType, numerator: ColumnRef) -> Self {
        Self {
            metric_type,
            numerator,
            denominator: None,
            window_settings: WindowSettings::default(),
            quantile_settings: QuantileSettings::default(),
            capping_settings: CappingSettings::default(),
        }
    }

    pub fn proportion(numerator: ColumnRef) -> Self {
        Self::new(MetricType::Proportion, numerator)
    }

    pub fn retention(numerator: ColumnRef) -> Self {
        Self::new(MetricType::Retention, numerator)
    }

    pub fn mean(numerator: ColumnRef) -> Self {
        Self::new(MetricType::Mean, numerator)
    }

    pub fn ratio(numerator: ColumnRef, denominator: ColumnRef) -> Self {
        let mut def = Self::new(MetricType::Ratio, numerator);
        def.denominator = Some(denominator);
        def
    }

    pub fn quantile(numerator: ColumnRef, settings: QuantileSettings) -> Self {
        let mut def = Self::new(MetricType::Quantile, numerator);
        def.quantile_settings = settings;
        def
    }

    pub fn with_denominator(mut self, denominator: ColumnRef) -> Self {
        self.denominator = Some(denominator);
        self
    }

    pub fn with_window_settings(mut self, settings: WindowSettings) -> Self {
        self.window_settings = settings;
        self
    }

    pub fn with_quantile_settings(mut self, settings: QuantileSettings) -> Self {
        self.quantile_settings = settings;
        self
    }

    pub fn with_capping_settings(mut self, settings: CappingSettings) -> Self {
        self.capping_settings = settings;
        self
    }

    /// Parse a definition from its JSON document form.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize back to the JSON document form.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
