//! In-memory table of observation rows.
//!
//! [`Table`] is the named, column-aware collection that the merge appends to and that is
//! encoded into the snapshot. Rows are JSON objects; a row that lacks a column reads as null
//! for it, so records introducing new fields are accepted at any point.

use std::collections::HashSet;

use arrow::datatypes::{FieldRef, SchemaRef};
use serde_json::{Map, Value};

/// A single table row keyed by column name.
pub type Row = Map<String, Value>;

/// Ordered collection of rows with a first-seen-ordered column list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    name: String,
    columns: Vec<String>,
    rows: Vec<Row>,
    /// Arrow schema of the committed snapshot this table was decoded from.
    schema: Option<SchemaRef>,
}

impl Table {
    /// Creates a table without columns or rows.
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            rows: Vec::new(),
            schema: None,
        }
    }

    /// Creates a table from decoded columns and rows.
    ///
    /// Columns present in rows but missing from `columns` are appended in row order.
    pub fn from_parts(name: impl Into<String>, columns: Vec<String>, rows: Vec<Row>) -> Self {
        let mut table = Self {
            name: name.into(),
            columns,
            rows: Vec::with_capacity(rows.len()),
            schema: None,
        };

        for row in rows {
            table.append_row(row);
        }

        table
    }

    /// Records the Arrow schema the rows were committed with.
    ///
    /// Columns of that schema keep their Arrow type when the table is encoded again.
    pub fn with_committed_schema(mut self, schema: SchemaRef) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Returns the committed Arrow field of `column`, if the table came from a snapshot
    /// holding it.
    pub fn committed_field(&self, column: &str) -> Option<&FieldRef> {
        let schema = self.schema.as_ref()?;
        let (index, _) = schema.column_with_name(column)?;

        Some(&schema.fields()[index])
    }

    /// Returns the table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the column names in first-seen order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns the rows in insertion order.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Returns the number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` when the table holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns `true` when `column` is part of the table schema.
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|existing| existing == column)
    }

    /// Returns `true` when some row holds the string `key` in `column`.
    pub fn contains_key(&self, column: &str, key: &str) -> bool {
        self.rows
            .iter()
            .any(|row| row.get(column).and_then(Value::as_str) == Some(key))
    }

    /// Collects the distinct string values of `column`.
    pub fn key_set(&self, column: &str) -> HashSet<String> {
        self.rows
            .iter()
            .filter_map(|row| row.get(column).and_then(Value::as_str))
            .map(str::to_owned)
            .collect()
    }

    /// Returns the values of `column`, with [`Value::Null`] for rows lacking it.
    pub fn column_values<'a>(&'a self, column: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
        static NULL: Value = Value::Null;

        self.rows
            .iter()
            .map(move |row| row.get(column).unwrap_or(&NULL))
    }

    /// Appends `row`, extending the schema with any column it introduces.
    pub fn append_row(&mut self, row: Row) {
        for column in row.keys() {
            if !self.has_column(column) {
                self.columns.push(column.clone());
            }
        }

        self.rows.push(row);
    }
}
