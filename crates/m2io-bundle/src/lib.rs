//! Content-addressed schema bundles.
//!
//! A [`Bundle`] is a capture base (attribute name to datatype) plus overlays.
//! Bundles are immutable and identified by a digest over their canonical
//! content, so the same schema published by two sources with different key
//! order or formatting has one identity.

pub mod bundle;
pub mod capture_base;
pub mod digest;
pub mod error;
pub mod overlay;
pub mod registry;
mod wire;

pub use bundle::Bundle;
pub use capture_base::{CAPTURE_BASE_TYPE, CaptureBase};
pub use digest::{Canonical, canonical_digest, canonical_text, digest_of};
pub use error::BundleError;
pub use overlay::{
    Conformance, LinkOverlay, LinkSource, MappingTable, Overlay, OverlayBody, OverlayKind,
};
pub use registry::{BundleRegistry, BundleStore};
