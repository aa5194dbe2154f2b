use thiserror::Error;

use crate::AttributeType;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("invalid digest: {0:?}")]
    InvalidDigest(String),
    #[error("unknown attribute type: {0}")]
    UnknownAttributeType(String),
}

/// A value could not be represented as the requested datatype.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("cannot coerce {value:?} to {expected}")]
pub struct CoercionError {
    pub value: String,
    pub expected: AttributeType,
}
