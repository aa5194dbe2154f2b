use m2io_map::AggregateOp;
use m2io_model::{CoercionError, Digest, FailureReason};

/// A plan that cannot be applied to the dataset at all.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransformError {
    #[error("plan resolves from bundle {plan} but the dataset conforms to {dataset}")]
    SourceMismatch { plan: Digest, dataset: Digest },
}

/// Why one source record produced no target record. Never fatal to the batch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransformFailure {
    #[error("record {record}: {target}: {source}")]
    TypeMismatch {
        record: usize,
        target: String,
        #[source]
        source: CoercionError,
    },

    #[error("record {record}: {op} for {target} needs numeric values but {attribute} is not numeric")]
    NonNumeric {
        record: usize,
        target: String,
        attribute: String,
        op: AggregateOp,
    },

    #[error("record {record}: required attribute {target} has no value")]
    MissingRequired { record: usize, target: String },
}

impl TransformFailure {
    /// 1-based position of the record in the source snapshot.
    pub fn record(&self) -> usize {
        match self {
            Self::TypeMismatch { record, .. }
            | Self::NonNumeric { record, .. }
            | Self::MissingRequired { record, .. } => *record,
        }
    }

    /// Target attribute that could not be produced.
    pub fn target(&self) -> &str {
        match self {
            Self::TypeMismatch { target, .. }
            | Self::NonNumeric { target, .. }
            | Self::MissingRequired { target, .. } => target,
        }
    }

    pub fn reason(&self) -> FailureReason {
        match self {
            Self::TypeMismatch { .. } | Self::NonNumeric { .. } => FailureReason::TypeMismatch,
            Self::MissingRequired { .. } => FailureReason::MissingRequiredAttribute,
        }
    }
}
