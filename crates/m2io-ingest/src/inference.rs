//! Candidate bundles inferred from tabular samples.
//!
//! Inference is a best-effort guess: attribute names come from column names
//! and each datatype from the column's cells. The result is a starting point
//! for a curated bundle, not a substitute for one.

use polars::prelude::DataFrame;

use m2io_bundle::{Bundle, BundleError, CaptureBase};
use m2io_model::{AttributeType, Value};

use crate::frame::dtype_attribute_type;
use crate::source::TabularSource;

/// Guess a datatype for every column by looking at its non-null cells.
///
/// A column is `Numeric` when every cell is a number or numeric text,
/// `Boolean` when every cell is a boolean, `DateTime` when every cell is a
/// timestamp or date-like text, and `Text` otherwise (including all-null
/// columns).
pub fn infer_bundle(source: &dyn TabularSource) -> Result<Bundle, BundleError> {
    let columns = source.column_names();
    let mut samples: Vec<Vec<Value>> = vec![Vec::new(); columns.len()];
    for index in 0..source.row_count() {
        for (column, cell) in source.row(index).into_iter().enumerate() {
            if let Some(sample) = samples.get_mut(column)
                && !cell.is_null()
            {
                sample.push(cell);
            }
        }
    }
    let attributes = columns
        .into_iter()
        .zip(samples)
        .map(|(name, cells)| (name, guess_type(&cells)));
    let bundle = Bundle::new(CaptureBase::new(attributes), Vec::new())?;
    tracing::debug!(
        digest = %bundle.digest().short(),
        attributes = bundle.capture_base().len(),
        "inferred candidate bundle"
    );
    Ok(bundle)
}

/// Guess datatypes from a frame's column dtypes.
pub fn infer_frame_bundle(frame: &DataFrame) -> Result<Bundle, BundleError> {
    let attributes = frame
        .get_columns()
        .iter()
        .map(|column| (column.name().to_string(), dtype_attribute_type(column.dtype())));
    Bundle::new(CaptureBase::new(attributes), Vec::new())
}

fn guess_type(cells: &[Value]) -> AttributeType {
    if cells.is_empty() {
        return AttributeType::Text;
    }
    let all = |ty: AttributeType, accept: fn(&Value) -> bool| {
        cells.iter().all(|cell| accept(cell) && cell.coerce(ty).is_ok())
    };
    if all(AttributeType::Numeric, |cell| {
        matches!(cell, Value::Integer(_) | Value::Float(_) | Value::Text(_))
    }) {
        AttributeType::Numeric
    } else if cells.iter().all(|cell| matches!(cell, Value::Bool(_))) {
        AttributeType::Boolean
    } else if all(AttributeType::DateTime, |cell| match cell {
        Value::DateTime(_) => true,
        Value::Text(text) => text.contains('-') && text.len() >= 10,
        _ => false,
    }) {
        AttributeType::DateTime
    } else {
        AttributeType::Text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Table;
    use polars::prelude::{Column, DataType};

    #[test]
    fn guesses_from_cell_values() {
        let table = Table::new(["name", "hgt", "visit", "smoker", "notes"])
            .with_row([
                Value::from("Ann"),
                Value::from("165"),
                Value::from("2024-03-01"),
                Value::Bool(true),
                Value::Null,
            ])
            .with_row([
                Value::from("Bob"),
                Value::Float(180.5),
                Value::from("2024-03-02T10:00:00"),
                Value::Bool(false),
                Value::Null,
            ]);
        let bundle = infer_bundle(&table).unwrap();
        let cb = bundle.capture_base();
        assert_eq!(cb.attribute_type("name"), Some(AttributeType::Text));
        assert_eq!(cb.attribute_type("hgt"), Some(AttributeType::Numeric));
        assert_eq!(cb.attribute_type("visit"), Some(AttributeType::DateTime));
        assert_eq!(cb.attribute_type("smoker"), Some(AttributeType::Boolean));
        assert_eq!(cb.attribute_type("notes"), Some(AttributeType::Text));
    }

    #[test]
    fn frame_dtypes_drive_inference() {
        let df = DataFrame::new(vec![
            Column::new("height".into(), vec![165i64, 180]),
            Column::new("weight".into(), vec![60.5f64, 82.0]),
            Column::new("name".into(), vec!["Ann", "Bob"]),
            Column::new("visit".into(), vec![19783i32, 19784])
                .cast(&DataType::Date)
                .unwrap(),
        ])
        .unwrap();
        let bundle = infer_frame_bundle(&df).unwrap();
        let cb = bundle.capture_base();
        assert_eq!(cb.attribute_type("visit"), Some(AttributeType::DateTime));
        assert_eq!(cb.attribute_type("height"), Some(AttributeType::Numeric));
        assert_eq!(cb.attribute_type("weight"), Some(AttributeType::Numeric));
        assert_eq!(cb.attribute_type("name"), Some(AttributeType::Text));
        assert_eq!(dtype_attribute_type(&DataType::Boolean), AttributeType::Boolean);
        assert_eq!(dtype_attribute_type(&DataType::Date), AttributeType::DateTime);
    }
}
