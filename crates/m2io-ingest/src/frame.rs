//! Polars adapter.
//!
//! A `DataFrame` is a [`TabularSource`] with typed cells, and dataset records
//! can be exported back to a frame shaped by the bundle's capture base.

use polars::prelude::*;

use m2io_bundle::CaptureBase;
use m2io_model::{AttributeType, Record, Value};

use crate::source::TabularSource;

/// Converts a Polars AnyValue to a cell value.
pub fn any_to_value(value: AnyValue<'_>) -> Value {
    match value {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(flag) => Value::Bool(flag),
        AnyValue::Int8(v) => Value::Integer(i64::from(v)),
        AnyValue::Int16(v) => Value::Integer(i64::from(v)),
        AnyValue::Int32(v) => Value::Integer(i64::from(v)),
        AnyValue::Int64(v) => Value::Integer(v),
        AnyValue::UInt8(v) => Value::Integer(i64::from(v)),
        AnyValue::UInt16(v) => Value::Integer(i64::from(v)),
        AnyValue::UInt32(v) => Value::Integer(i64::from(v)),
        AnyValue::UInt64(v) => i64::try_from(v).map_or(Value::Float(v as f64), Value::Integer),
        AnyValue::Float32(v) => Value::Float(f64::from(v)),
        AnyValue::Float64(v) => Value::Float(v),
        AnyValue::String(s) => Value::Text(s.to_string()),
        AnyValue::StringOwned(s) => Value::Text(s.to_string()),
        other => Value::Text(other.to_string()),
    }
}

/// Best datatype for a frame column, from its polars dtype.
pub fn dtype_attribute_type(dtype: &DataType) -> AttributeType {
    if dtype.is_integer() || dtype.is_float() {
        AttributeType::Numeric
    } else if dtype.is_bool() {
        AttributeType::Boolean
    } else if dtype.is_temporal() {
        AttributeType::DateTime
    } else if matches!(dtype, DataType::Binary | DataType::BinaryOffset) {
        AttributeType::Binary
    } else {
        AttributeType::Text
    }
}

impl TabularSource for DataFrame {
    fn column_names(&self) -> Vec<String> {
        self.get_column_names_owned()
            .into_iter()
            .map(|name| name.to_string())
            .collect()
    }

    fn row_count(&self) -> usize {
        self.height()
    }

    fn row(&self, index: usize) -> Vec<Value> {
        self.get_columns()
            .iter()
            .map(|column| {
                column
                    .get(index)
                    .map(any_to_value)
                    .unwrap_or(Value::Null)
            })
            .collect()
    }
}

/// Build a frame with one column per capture-base attribute, in name order.
///
/// Numeric columns are `Int64` when every value is an integer and `Float64`
/// otherwise. DateTime columns are rendered as ISO 8601 text. Values that do
/// not fit the column datatype become null.
pub fn records_to_dataframe(
    capture_base: &CaptureBase,
    records: &[Record],
) -> PolarsResult<DataFrame> {
    let columns: Vec<Column> = capture_base
        .attributes()
        .map(|(name, ty)| build_column(name, ty, records))
        .collect();
    DataFrame::new(columns)
}

fn build_column(name: &str, ty: AttributeType, records: &[Record]) -> Column {
    let values = records.iter().map(|record| record.value(name));
    match ty {
        AttributeType::Numeric => {
            let integral = records
                .iter()
                .all(|record| matches!(record.value(name), Value::Integer(_) | Value::Null));
            if integral {
                let ints: Vec<Option<i64>> = values
                    .map(|value| match value {
                        Value::Integer(v) => Some(*v),
                        _ => None,
                    })
                    .collect();
                Column::new(name.into(), ints)
            } else {
                let floats: Vec<Option<f64>> = values.map(Value::as_f64).collect();
                Column::new(name.into(), floats)
            }
        }
        AttributeType::Boolean => {
            let flags: Vec<Option<bool>> = values
                .map(|value| match value {
                    Value::Bool(flag) => Some(*flag),
                    _ => None,
                })
                .collect();
            Column::new(name.into(), flags)
        }
        AttributeType::Text | AttributeType::DateTime | AttributeType::Binary => {
            let texts: Vec<Option<String>> = values
                .map(|value| (!value.is_null()).then(|| value.render()))
                .collect();
            Column::new(name.into(), texts)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_cells_keep_their_types() {
        let df = DataFrame::new(vec![
            Column::new("name".into(), vec!["Ann", "Bob"]),
            Column::new("height".into(), vec![Some(165i64), None]),
            Column::new("weight".into(), vec![60.5f64, 82.0]),
        ])
        .unwrap();
        assert_eq!(
            TabularSource::column_names(&df),
            vec!["name", "height", "weight"]
        );
        assert_eq!(
            TabularSource::row(&df, 0),
            vec![Value::from("Ann"), Value::Integer(165), Value::Float(60.5)]
        );
        assert_eq!(TabularSource::row(&df, 1)[1], Value::Null);
    }

    #[test]
    fn export_uses_capture_base_types() {
        let capture_base = CaptureBase::new([
            ("hgt", AttributeType::Numeric),
            ("name", AttributeType::Text),
            ("wgt", AttributeType::Numeric),
        ]);
        let records: Vec<Record> = vec![
            [
                ("hgt", Value::Integer(165)),
                ("name", Value::from("Ann")),
                ("wgt", Value::Float(60.5)),
            ]
            .into_iter()
            .collect(),
            [("hgt", Value::Null), ("name", Value::Null), ("wgt", Value::Integer(82))]
                .into_iter()
                .collect(),
        ];
        let df = records_to_dataframe(&capture_base, &records).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.column("hgt").unwrap().dtype(), &DataType::Int64);
        assert_eq!(df.column("wgt").unwrap().dtype(), &DataType::Float64);
        assert_eq!(df.column("name").unwrap().null_count(), 1);
    }
}
