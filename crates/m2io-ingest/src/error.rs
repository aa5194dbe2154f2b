use m2io_model::{CoercionError, FailureReason};

/// Why one input row was rejected. Never fatal to the batch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IngestError {
    #[error("attribute {attribute}: {source}")]
    TypeMismatch {
        attribute: String,
        #[source]
        source: CoercionError,
    },

    #[error("column {column} matches no attribute of the capture base")]
    UnknownAttribute { column: String },

    #[error("required attribute {attribute} has no value")]
    MissingRequiredAttribute { attribute: String },
}

impl IngestError {
    pub fn reason(&self) -> FailureReason {
        match self {
            IngestError::TypeMismatch { .. } => FailureReason::TypeMismatch,
            IngestError::UnknownAttribute { .. } => FailureReason::UnknownAttribute,
            IngestError::MissingRequiredAttribute { .. } => FailureReason::MissingRequiredAttribute,
        }
    }

    /// The attribute or column the failure is about.
    pub fn attribute(&self) -> &str {
        match self {
            IngestError::TypeMismatch { attribute, .. }
            | IngestError::MissingRequiredAttribute { attribute } => attribute,
            IngestError::UnknownAttribute { column } => column,
        }
    }
}

/// A source that cannot be fed at all. Raised before any state change.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeedError {
    #[error("column {column} appears more than once")]
    DuplicateColumn { column: String },

    #[error("columns {first} and {second} both map to attribute {attribute}")]
    AmbiguousColumns {
        attribute: String,
        first: String,
        second: String,
    },
}
