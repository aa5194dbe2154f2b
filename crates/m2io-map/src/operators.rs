//! Closed sets of aggregate operators and combinators.
//!
//! Names are parsed once, at resolution time, so an unknown operation never
//! reaches the transform engine.

use std::fmt;

use serde::{Deserialize, Serialize};

use m2io_model::AttributeType;

/// Fold over several source attributes of one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateOp {
    Sum,
    Mean,
    Min,
    Max,
    /// First non-null value in source order.
    First,
    /// Last non-null value in source order.
    Last,
    /// Text renderings of the non-null values, concatenated.
    Concat,
    /// Number of non-null values.
    Count,
}

impl AggregateOp {
    pub const ALL: [AggregateOp; 8] = [
        AggregateOp::Sum,
        AggregateOp::Mean,
        AggregateOp::Min,
        AggregateOp::Max,
        AggregateOp::First,
        AggregateOp::Last,
        AggregateOp::Concat,
        AggregateOp::Count,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateOp::Sum => "sum",
            AggregateOp::Mean => "mean",
            AggregateOp::Min => "min",
            AggregateOp::Max => "max",
            AggregateOp::First => "first",
            AggregateOp::Last => "last",
            AggregateOp::Concat => "concat",
            AggregateOp::Count => "count",
        }
    }

    /// Case-insensitive lookup by name.
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|op| op.as_str().eq_ignore_ascii_case(name))
    }

    /// Whether the operator only accepts numeric inputs.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            AggregateOp::Sum | AggregateOp::Mean | AggregateOp::Min | AggregateOp::Max
        )
    }

    /// Datatype of the folded value, given the type of the first source.
    pub fn output_type(&self, first_source: AttributeType) -> AttributeType {
        match self {
            AggregateOp::Sum
            | AggregateOp::Mean
            | AggregateOp::Min
            | AggregateOp::Max
            | AggregateOp::Count => AttributeType::Numeric,
            AggregateOp::Concat => AttributeType::Text,
            AggregateOp::First | AggregateOp::Last => first_source,
        }
    }
}

impl fmt::Display for AggregateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derives one value from several source attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Combinator {
    JoinSpace,
    JoinComma,
    JoinHyphen,
    Concat,
    /// First non-null value.
    Coalesce,
}

impl Combinator {
    pub const ALL: [Combinator; 5] = [
        Combinator::JoinSpace,
        Combinator::JoinComma,
        Combinator::JoinHyphen,
        Combinator::Concat,
        Combinator::Coalesce,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Combinator::JoinSpace => "join_space",
            Combinator::JoinComma => "join_comma",
            Combinator::JoinHyphen => "join_hyphen",
            Combinator::Concat => "concat",
            Combinator::Coalesce => "coalesce",
        }
    }

    /// Case-insensitive lookup by name.
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|combinator| combinator.as_str().eq_ignore_ascii_case(name))
    }

    /// Separator placed between joined values, for the joining combinators.
    pub fn separator(&self) -> Option<&'static str> {
        match self {
            Combinator::JoinSpace => Some(" "),
            Combinator::JoinComma => Some(", "),
            Combinator::JoinHyphen => Some("-"),
            Combinator::Concat => Some(""),
            Combinator::Coalesce => None,
        }
    }

    pub fn output_type(&self, first_source: AttributeType) -> AttributeType {
        match self {
            Combinator::Coalesce => first_source,
            _ => AttributeType::Text,
        }
    }
}

impl fmt::Display for Combinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for op in AggregateOp::ALL {
            assert_eq!(AggregateOp::parse(op.as_str()), Some(op));
        }
        for combinator in Combinator::ALL {
            assert_eq!(Combinator::parse(combinator.as_str()), Some(combinator));
        }
        assert_eq!(AggregateOp::parse(" SUM "), Some(AggregateOp::Sum));
        assert_eq!(AggregateOp::parse("median"), None);
        assert_eq!(Combinator::parse("join_tab"), None);
    }

    #[test]
    fn output_types() {
        assert_eq!(
            AggregateOp::Count.output_type(AttributeType::Text),
            AttributeType::Numeric
        );
        assert_eq!(
            AggregateOp::First.output_type(AttributeType::Boolean),
            AttributeType::Boolean
        );
        assert_eq!(
            Combinator::JoinSpace.output_type(AttributeType::Numeric),
            AttributeType::Text
        );
    }
}
