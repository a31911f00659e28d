//! Fact table catalog - the read-only metadata the engine compiles against.
//!
//! A [`FactTable`] describes one event table in the warehouse: its columns,
//! its user-identifier columns, and its named saved filters. The engine
//! never mutates catalog data; it only resolves references into it. The
//! caller hands a [`Catalog`] to `compile`, usually an [`InMemoryCatalog`]
//! snapshot loaded from the metadata service's JSON.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Datatype of a fact table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Number,
    String,
}

/// A column of a fact table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    /// Display name.
    pub name: String,
    /// Physical column key referenced by metric definitions.
    pub column: String,
    pub datatype: ColumnType,
    /// Sampled values, used by editors for inline filter suggestions.
    #[serde(default)]
    pub top_values: Vec<String>,
    /// Soft-deleted columns stay listed but no longer resolve.
    #[serde(default)]
    pub deleted: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, column: impl Into<String>, datatype: ColumnType) -> Self {
        Self {
            name: name.into(),
            column: column.into(),
            datatype,
            top_values: vec![],
            deleted: false,
        }
    }

    pub fn with_top_values(mut self, values: Vec<&str>) -> Self {
        self.top_values = values.into_iter().map(String::from).collect();
        self
    }

    pub fn mark_deleted(mut self) -> Self {
        self.deleted = true;
        self
    }
}

/// A saved row filter: a named, reusable SQL predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactFilter {
    pub id: String,
    pub name: String,
    /// Verbatim SQL predicate text, authored in the catalog.
    pub value: String,
}

impl FactFilter {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            value: value.into(),
        }
    }
}

/// One event table plus its metric-relevant metadata.
///
/// Every fact table implicitly exposes a `timestamp` event-time column;
/// window fragments reference it by that fixed name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactTable {
    pub id: String,
    /// Owning datasource id.
    pub datasource: String,
    #[serde(default)]
    pub columns: Vec<Column>,
    /// Declared user-identifier column keys; the first one is the
    /// grouping identifier for per-user queries.
    #[serde(default)]
    pub user_id_columns: Vec<String>,
    #[serde(default)]
    pub filters: Vec<FactFilter>,
}

impl FactTable {
    pub fn new(id: impl Into<String>, datasource: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            datasource: datasource.into(),
            columns: vec![],
            user_id_columns: vec![],
            filters: vec![],
        }
    }

    pub fn with_column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_user_id_column(mut self, key: impl Into<String>) -> Self {
        self.user_id_columns.push(key.into());
        self
    }

    pub fn with_filter(mut self, filter: FactFilter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Look up a column by its key.
    pub fn column(&self, key: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.column == key)
    }

    /// Look up a saved filter by id.
    pub fn filter(&self, id: &str) -> Option<&FactFilter> {
        self.filters.iter().find(|f| f.id == id)
    }

    /// The grouping identifier: the first declared user-id column.
    pub fn identifier(&self) -> Option<&str> {
        self.user_id_columns.first().map(String::as_str)
    }

    /// Numeric columns a quantile metric can aggregate at event level.
    ///
    /// Excludes deleted columns, user-id columns, and the event-time
    /// column.
    pub fn eligible_quantile_columns(&self) -> Vec<&Column> {
        self.columns
            .iter()
            .filter(|c| {
                !c.deleted
                    && c.datatype == ColumnType::Number
                    && c.column != "timestamp"
                    && !self.user_id_columns.contains(&c.column)
            })
            .collect()
    }
}

/// Read-only lookup surface the engine compiles against.
///
/// Implementations are assumed synchronous; callers fetch and cache
/// whatever the definition might reference before compiling.
pub trait Catalog {
    fn fact_table(&self, id: &str) -> Option<&FactTable>;
}

/// A catalog snapshot held in memory, keyed by fact table id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InMemoryCatalog {
    tables: BTreeMap<String, FactTable>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, table: FactTable) -> Self {
        self.tables.insert(table.id.clone(), table);
        self
    }

    /// Load a snapshot from a JSON array of fact tables.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let tables: Vec<FactTable> = serde_json::from_str(json)?;
        let mut catalog = Self::new();
        for table in tables {
            catalog.tables.insert(table.id.clone(), table);
        }
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl Catalog for InMemoryCatalog {
    fn fact_table(&self, id: &str) -> Option<&FactTable> {
        self.tables.get(id)
    }
}
