//! Shared data model for the m2io interoperability engine.
//!
//! - **ids**: content digests and dataset identifiers
//! - **types**: the closed set of attribute datatypes a capture base may declare
//! - **value**: typed cell values and datatype coercion
//! - **record**: one row of attribute-name-to-value data
//! - **events**: the append-only provenance log
//! - **options**: ingestion and transformation policies

pub mod error;
pub mod events;
pub mod ids;
pub mod options;
pub mod record;
pub mod types;
pub mod value;

pub use error::{CoercionError, ModelError};
pub use events::{
    Event, EventDraft, EventKind, EventLog, EventPayload, EventQuery, FailureReason, FailureStage,
    SystemInfo,
};
pub use ids::{DatasetId, Digest};
pub use options::{FillPolicy, IngestOptions, TransformOptions, UnknownAttributePolicy};
pub use record::Record;
pub use types::AttributeType;
pub use value::Value;
