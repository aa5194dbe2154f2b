//! Typed cell values and coercion between datatypes.
//!
//! Ingestion coerces raw cells to the declared attribute type, and the
//! transform engine coerces resolved values to the target attribute type. Both
//! go through [`Value::coerce`], so a value that survives ingestion survives an
//! identity transform into the same datatype unchanged.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::{AttributeType, CoercionError};

const DATETIME_FORMATS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

/// One cell of a record.
///
/// Serializes untagged so records render as plain JSON objects.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    DateTime(NaiveDateTime),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The datatype this value naturally belongs to, if any.
    pub fn natural_type(&self) -> Option<AttributeType> {
        match self {
            Value::Null => None,
            Value::Bool(_) => Some(AttributeType::Boolean),
            Value::Integer(_) | Value::Float(_) => Some(AttributeType::Numeric),
            Value::DateTime(_) => Some(AttributeType::DateTime),
            Value::Text(_) => Some(AttributeType::Text),
        }
    }

    /// Convert this value to the representation of `target`.
    ///
    /// Null stays null for every datatype, and blank text becomes null for
    /// every datatype except `Text`.
    pub fn coerce(&self, target: AttributeType) -> Result<Value, CoercionError> {
        if self.is_null() {
            return Ok(Value::Null);
        }
        if let Value::Text(text) = self
            && target != AttributeType::Text
            && text.trim().is_empty()
        {
            return Ok(Value::Null);
        }
        match target {
            AttributeType::Text => Ok(Value::Text(self.render())),
            AttributeType::Numeric => self.to_numeric(),
            AttributeType::Boolean => self.to_boolean(),
            AttributeType::DateTime => self.to_datetime(),
            AttributeType::Binary => match self {
                Value::Text(text) => Ok(Value::Text(text.clone())),
                _ => Err(self.mismatch(target)),
            },
        }
    }

    /// Numeric view of the value, without parsing text.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(value) => Some(*value as f64),
            Value::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Text rendering used for text coercion and combinators. Null renders empty.
    pub fn render(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(value) => value.to_string(),
            Value::Integer(value) => value.to_string(),
            Value::Float(value) => value.to_string(),
            Value::DateTime(value) => value.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
            Value::Text(text) => text.clone(),
        }
    }

    fn mismatch(&self, expected: AttributeType) -> CoercionError {
        CoercionError {
            value: self.render(),
            expected,
        }
    }

    fn to_numeric(&self) -> Result<Value, CoercionError> {
        match self {
            Value::Integer(_) => Ok(self.clone()),
            Value::Float(value) if value.is_finite() => Ok(self.clone()),
            Value::Text(text) => {
                let trimmed = text.trim();
                if let Ok(value) = trimmed.parse::<i64>() {
                    return Ok(Value::Integer(value));
                }
                match trimmed.parse::<f64>() {
                    Ok(value) if value.is_finite() => Ok(Value::Float(value)),
                    _ => Err(self.mismatch(AttributeType::Numeric)),
                }
            }
            _ => Err(self.mismatch(AttributeType::Numeric)),
        }
    }

    fn to_boolean(&self) -> Result<Value, CoercionError> {
        match self {
            Value::Bool(_) => Ok(self.clone()),
            Value::Integer(0) => Ok(Value::Bool(false)),
            Value::Integer(1) => Ok(Value::Bool(true)),
            Value::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
                "true" | "t" | "yes" | "y" | "1" => Ok(Value::Bool(true)),
                "false" | "f" | "no" | "n" | "0" => Ok(Value::Bool(false)),
                _ => Err(self.mismatch(AttributeType::Boolean)),
            },
            _ => Err(self.mismatch(AttributeType::Boolean)),
        }
    }

    fn to_datetime(&self) -> Result<Value, CoercionError> {
        match self {
            Value::DateTime(_) => Ok(self.clone()),
            Value::Text(text) => {
                parse_datetime(text.trim()).ok_or_else(|| self.mismatch(AttributeType::DateTime))
            }
            _ => Err(self.mismatch(AttributeType::DateTime)),
        }
    }
}

fn parse_datetime(text: &str) -> Option<Value> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(Value::DateTime(parsed.naive_utc()));
    }
    for format in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(text, format) {
            return Some(Value::DateTime(parsed));
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(Value::DateTime)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::DateTime(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// JSON cells keep their JSON type; nested arrays and objects become their
/// compact JSON text.
impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(flag) => Value::Bool(flag),
            serde_json::Value::Number(number) => number
                .as_i64()
                .map(Value::Integer)
                .or_else(|| number.as_f64().map(Value::Float))
                .unwrap_or(Value::Null),
            serde_json::Value::String(text) => Value::Text(text),
            other => Value::Text(other.to_string()),
        }
    }
}
