//! Tabular sources the engine can ingest.

use std::collections::BTreeSet;

use m2io_model::{Record, Value};

/// Column names plus cells, read row by row.
///
/// Cells may be typed (a frame column of integers) or untyped text (a CSV
/// file); ingestion coerces either to the declared attribute datatype.
pub trait TabularSource {
    fn column_names(&self) -> Vec<String>;

    fn row_count(&self) -> usize;

    /// Cells of row `index` in column order. Missing cells read as null.
    fn row(&self, index: usize) -> Vec<Value>;
}

/// In-memory table of typed cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row. Short rows are padded with nulls and extra cells dropped.
    pub fn push_row<I, V>(&mut self, cells: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let mut row: Vec<Value> = cells
            .into_iter()
            .take(self.columns.len())
            .map(Into::into)
            .collect();
        row.resize(self.columns.len(), Value::Null);
        self.rows.push(row);
    }

    pub fn with_row<I, V>(mut self, cells: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.push_row(cells);
        self
    }

    /// Table whose columns are the union of the records' attributes, in name
    /// order. Attributes a record lacks are null.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a Record>) -> Self {
        let records: Vec<&Record> = records.into_iter().collect();
        let columns: BTreeSet<&str> = records
            .iter()
            .flat_map(|record| record.attributes())
            .collect();
        let columns: Vec<String> = columns.into_iter().map(str::to_string).collect();
        let rows = records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|column| record.value(column).clone())
                    .collect()
            })
            .collect();
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl TabularSource for Table {
    fn column_names(&self) -> Vec<String> {
        self.columns.clone()
    }

    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn row(&self, index: usize) -> Vec<Value> {
        self.rows
            .get(index)
            .cloned()
            .unwrap_or_else(|| vec![Value::Null; self.columns.len()])
    }
}
