//! Error types for crosswalk resolution.

use std::fmt;

/// Which bundle an attribute was looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Source,
    Target,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Side::Source => "source",
            Side::Target => "target",
        })
    }
}

/// Resolution failures. Each is fatal to the resolution call only.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    #[error("target bundle {reference} is unknown")]
    TargetBundleUnknown { reference: String },

    #[error("{side} attribute {attribute} does not exist")]
    AttributeNotFound { side: Side, attribute: String },

    #[error("aggregate operator {op:?} for {target} is not supported")]
    OperatorUnsupported { target: String, op: String },

    #[error("combinator {combinator:?} for {target} is not supported")]
    CombinatorUnsupported { target: String, combinator: String },

    #[error("directive for {target} names no source attributes")]
    NoSourceAttributes { target: String },

    #[error("directive for {target} cannot be published as a link overlay: {reason}")]
    Unpublishable { target: String, reason: String },
}

impl LinkError {
    pub(crate) fn missing(side: Side, attribute: impl Into<String>) -> Self {
        Self::AttributeNotFound {
            side,
            attribute: attribute.into(),
        }
    }
}
