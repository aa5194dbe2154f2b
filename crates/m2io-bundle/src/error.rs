#![deny(unsafe_code)]

use m2io_model::Digest;

/// Structural failure while parsing or assembling a bundle.
///
/// Every variant is fatal to the call that produced it; no partial bundle is
/// ever returned.
#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    #[error("malformed bundle: invalid JSON: {source}")]
    Json {
        #[source]
        source: serde_json::Error,
    },

    #[error("malformed bundle: document matches no known bundle shape")]
    UnrecognizedShape,

    #[error("malformed bundle: capture base is missing")]
    MissingCaptureBase,

    #[error("malformed bundle: field {field} in {context}: {message}")]
    InvalidField {
        context: String,
        field: String,
        message: String,
    },

    #[error("malformed bundle: attribute {attribute} declares unknown datatype {tag:?}")]
    UnknownAttributeType { attribute: String, tag: String },

    #[error("malformed bundle: {kind} overlay has no capture_base back-reference")]
    MissingBackReference { kind: String },

    #[error(
        "malformed bundle: {kind} overlay references capture base {found}, expected {expected}"
    )]
    BackReferenceMismatch {
        kind: String,
        expected: Digest,
        found: String,
    },

    #[error("malformed bundle: {kind} overlay names attribute {attribute} missing from the capture base")]
    UnknownOverlayAttribute { kind: String, attribute: String },
}

impl BundleError {
    pub(crate) fn field(
        context: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidField {
            context: context.into(),
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for BundleError {
    fn from(source: serde_json::Error) -> Self {
        Self::Json { source }
    }
}
