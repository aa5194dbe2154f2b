//! Attribute datatypes declared by a capture base.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{ModelError, Value};

/// Datatype tag of a capture-base attribute.
///
/// The set is closed: a bundle declaring any other tag is malformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AttributeType {
    Text,
    Numeric,
    Boolean,
    DateTime,
    Binary,
}

impl AttributeType {
    pub const ALL: [AttributeType; 5] = [
        AttributeType::Text,
        AttributeType::Numeric,
        AttributeType::Boolean,
        AttributeType::DateTime,
        AttributeType::Binary,
    ];

    /// Returns the tag as it appears in bundle documents.
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeType::Text => "Text",
            AttributeType::Numeric => "Numeric",
            AttributeType::Boolean => "Boolean",
            AttributeType::DateTime => "DateTime",
            AttributeType::Binary => "Binary",
        }
    }

    /// Value used to fill an attribute nobody supplied, under
    /// [`FillPolicy::TypeDefault`](crate::FillPolicy::TypeDefault).
    ///
    /// DateTime and Binary have no meaningful zero value and stay null.
    pub fn default_value(&self) -> Value {
        match self {
            AttributeType::Text => Value::Text(String::new()),
            AttributeType::Numeric => Value::Integer(0),
            AttributeType::Boolean => Value::Bool(false),
            AttributeType::DateTime | AttributeType::Binary => Value::Null,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, AttributeType::Numeric)
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttributeType {
    type Err = ModelError;

    /// Tags are matched case-insensitively; `Date`/`Timestamp` are accepted as
    /// spellings of `DateTime`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        match normalized.as_str() {
            "TEXT" => Ok(AttributeType::Text),
            "NUMERIC" => Ok(AttributeType::Numeric),
            "BOOLEAN" => Ok(AttributeType::Boolean),
            "DATETIME" | "DATE" | "TIMESTAMP" => Ok(AttributeType::DateTime),
            "BINARY" => Ok(AttributeType::Binary),
            _ => Err(ModelError::UnknownAttributeType(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_document_tags() {
        assert_eq!("Text".parse::<AttributeType>().unwrap(), AttributeType::Text);
        assert_eq!(
            "numeric".parse::<AttributeType>().unwrap(),
            AttributeType::Numeric
        );
        assert_eq!(
            "DateTime".parse::<AttributeType>().unwrap(),
            AttributeType::DateTime
        );
        assert!("Array[Text]".parse::<AttributeType>().is_err());
    }

    #[test]
    fn tags_round_trip_through_display() {
        for ty in AttributeType::ALL {
            assert_eq!(ty.to_string().parse::<AttributeType>().unwrap(), ty);
        }
    }
}
