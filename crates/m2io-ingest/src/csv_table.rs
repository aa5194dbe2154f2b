use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use csv::ReaderBuilder;

use m2io_model::Value;

use crate::source::TabularSource;

/// A CSV file read into memory. The first non-blank row is the header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

fn normalize_header(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('\u{feff}');
    trimmed.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn normalize_cell(raw: &str) -> String {
    raw.trim().trim_matches('\u{feff}').to_string()
}

impl CsvTable {
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("read csv: {}", path.display()))?;
        Self::from_reader(file).with_context(|| format!("parse csv: {}", path.display()))
    }

    pub fn from_reader(reader: impl Read) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);
        let mut raw_rows: Vec<Vec<String>> = Vec::new();
        for (idx, record) in reader.records().enumerate() {
            let record = record.with_context(|| format!("read record {}", idx + 1))?;
            let row: Vec<String> = record.iter().map(normalize_cell).collect();
            if row.iter().all(|value| value.is_empty()) {
                continue;
            }
            raw_rows.push(row);
        }
        let mut raw_rows = raw_rows.into_iter();
        let Some(header_row) = raw_rows.next() else {
            return Ok(Self::default());
        };
        let headers: Vec<String> = header_row
            .iter()
            .map(|value| normalize_header(value))
            .collect();
        let rows = raw_rows
            .map(|record| {
                (0..headers.len())
                    .map(|idx| record.get(idx).cloned().unwrap_or_default())
                    .collect()
            })
            .collect();
        Ok(Self { headers, rows })
    }
}

/// Empty CSV cells carry no value and read as null.
impl TabularSource for CsvTable {
    fn column_names(&self) -> Vec<String> {
        self.headers.clone()
    }

    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn row(&self, index: usize) -> Vec<Value> {
        let Some(row) = self.rows.get(index) else {
            return vec![Value::Null; self.headers.len()];
        };
        row.iter()
            .map(|cell| {
                if cell.is_empty() {
                    Value::Null
                } else {
                    Value::Text(cell.clone())
                }
            })
            .collect()
    }
}
