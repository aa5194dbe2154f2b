#![deny(unsafe_code)]

use std::collections::BTreeSet;

use m2io_model::Digest;
use serde_json::{Map, Value as JsonValue, json};

use crate::capture_base::CaptureBase;
use crate::digest::{Canonical, digest_of};
use crate::error::BundleError;
use crate::overlay::{Conformance, LinkOverlay, MappingTable, Overlay, OverlayBody, OverlayKind};
use crate::wire;

/// An immutable, content-addressed schema: a capture base plus overlays.
///
/// The digest is computed once at construction. There are no setters; every
/// change goes through a constructor such as [`Bundle::with_overlay`] and
/// yields a new bundle with a new digest.
#[derive(Debug, Clone, PartialEq)]
pub struct Bundle {
    version: Option<String>,
    declared: Option<Digest>,
    capture_base: CaptureBase,
    overlays: Vec<Overlay>,
    envelope: Map<String, JsonValue>,
    digest: Digest,
}

impl Bundle {
    pub fn new(capture_base: CaptureBase, overlays: Vec<Overlay>) -> Result<Self, BundleError> {
        Self::assemble(None, None, capture_base, overlays, Map::new())
    }

    pub(crate) fn assemble(
        version: Option<String>,
        declared: Option<Digest>,
        capture_base: CaptureBase,
        mut overlays: Vec<Overlay>,
        envelope: Map<String, JsonValue>,
    ) -> Result<Self, BundleError> {
        validate_overlays(&capture_base, &overlays)?;
        overlays.sort_by_cached_key(|overlay| (overlay.kind(), overlay.digest()));
        let mut bundle = Self {
            version,
            declared,
            capture_base,
            overlays,
            envelope,
            digest: Digest::from_sha256([0; 32]),
        };
        bundle.digest = digest_of(&bundle);
        Ok(bundle)
    }

    /// Parse a bundle document in any accepted wire shape.
    pub fn parse(raw: &str) -> Result<Self, BundleError> {
        let value: JsonValue = serde_json::from_str(raw)?;
        Self::from_json(&value)
    }

    pub fn from_json(value: &JsonValue) -> Result<Self, BundleError> {
        let bundle = wire::decode(value)?;
        tracing::debug!(
            digest = %bundle.digest.short(),
            attributes = bundle.capture_base.len(),
            overlays = bundle.overlays.len(),
            "parsed bundle"
        );
        Ok(bundle)
    }

    /// Plain wire form with every `d` set to the computed digests.
    pub fn to_json(&self) -> JsonValue {
        wire::encode(self)
    }

    pub fn digest(&self) -> &Digest {
        &self.digest
    }

    /// The `d` value the source document declared, if any.
    pub fn declared_digest(&self) -> Option<&Digest> {
        self.declared.as_ref()
    }

    /// True when `reference` is this bundle's computed or declared digest.
    pub fn answers_to(&self, reference: &str) -> bool {
        self.digest.as_str() == reference
            || self
                .declared
                .as_ref()
                .is_some_and(|declared| declared.as_str() == reference)
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn capture_base(&self) -> &CaptureBase {
        &self.capture_base
    }

    pub fn overlays(&self) -> &[Overlay] {
        &self.overlays
    }

    /// First overlay of `kind`.
    pub fn overlay(&self, kind: &OverlayKind) -> Option<&Overlay> {
        self.overlays.iter().find(|overlay| &overlay.kind() == kind)
    }

    /// Every overlay of `kind`; `meta`, `label` and `link` may repeat.
    pub fn overlays_of<'a>(&'a self, kind: &'a OverlayKind) -> impl Iterator<Item = &'a Overlay> {
        self.overlays
            .iter()
            .filter(move |overlay| &overlay.kind() == kind)
    }

    pub fn links(&self) -> impl Iterator<Item = &LinkOverlay> {
        self.overlays.iter().filter_map(Overlay::as_link)
    }

    pub fn mapping_tables(&self) -> impl Iterator<Item = &MappingTable> {
        self.overlays.iter().filter_map(Overlay::as_mapping_table)
    }

    /// Envelope metadata of an `oca_bundle` package.
    pub fn envelope(&self) -> &Map<String, JsonValue> {
        &self.envelope
    }

    /// Human alias such as `Standard1@1.0`, from the package envelope.
    pub fn alias(&self) -> Option<&str> {
        self.envelope.get("alias").and_then(JsonValue::as_str)
    }

    /// Name from the first `meta` overlay, falling back to the alias.
    pub fn name(&self) -> Option<&str> {
        self.overlays
            .iter()
            .find_map(|overlay| match overlay.body() {
                OverlayBody::Meta { name, .. } if !name.is_empty() => Some(name.as_str()),
                _ => None,
            })
            .or_else(|| self.alias())
    }

    /// Attributes a `conformance` overlay marks mandatory.
    pub fn mandatory_attributes(&self) -> BTreeSet<&str> {
        self.overlays
            .iter()
            .filter_map(|overlay| match overlay.body() {
                OverlayBody::Conformance { attributes } => Some(attributes),
                _ => None,
            })
            .flat_map(|attributes| {
                attributes
                    .iter()
                    .filter(|(_, conformance)| **conformance == Conformance::Mandatory)
                    .map(|(name, _)| name.as_str())
            })
            .collect()
    }

    /// Attribute whose `label` overlay entry equals `label`.
    pub fn attribute_for_label(&self, label: &str) -> Option<&str> {
        self.overlays.iter().find_map(|overlay| match overlay.body() {
            OverlayBody::Label { labels, .. } => labels
                .iter()
                .find(|(_, text)| text.as_str() == label)
                .map(|(name, _)| name.as_str()),
            _ => None,
        })
    }

    /// A new bundle with `overlay` added. `self` is untouched.
    pub fn with_overlay(&self, overlay: Overlay) -> Result<Bundle, BundleError> {
        let mut overlays = self.overlays.clone();
        overlays.push(overlay);
        Self::assemble(
            self.version.clone(),
            None,
            self.capture_base.clone(),
            overlays,
            self.envelope.clone(),
        )
    }

    /// A new bundle carrying `link`, replacing any link overlay that already
    /// targets the same bundle.
    pub fn with_link(&self, link: LinkOverlay) -> Result<Bundle, BundleError> {
        let mut overlays: Vec<Overlay> = self
            .overlays
            .iter()
            .filter(|overlay| {
                overlay
                    .as_link()
                    .is_none_or(|existing| existing.target_bundle != link.target_bundle)
            })
            .cloned()
            .collect();
        overlays.push(Overlay::new(
            &self.capture_base.digest(),
            OverlayBody::Link(link),
        ));
        Self::assemble(
            self.version.clone(),
            None,
            self.capture_base.clone(),
            overlays,
            self.envelope.clone(),
        )
    }

    /// A new bundle whose envelope carries `alias`.
    pub fn with_alias(&self, alias: impl Into<String>) -> Bundle {
        let mut bundle = self.clone();
        bundle.envelope.insert("alias".to_string(), json!(alias.into()));
        bundle
    }
}

/// Bundle identity covers the capture base and the set of overlays. The wire
/// version tag, declared digests and envelope metadata are not content.
impl Canonical for Bundle {
    fn canonical(&self) -> JsonValue {
        let mut overlays: Vec<String> = self
            .overlays
            .iter()
            .map(|overlay| overlay.digest().as_str().to_string())
            .collect();
        overlays.sort();
        json!({
            "capture_base": self.capture_base.digest().as_str(),
            "overlays": overlays,
        })
    }
}

fn validate_overlays(capture_base: &CaptureBase, overlays: &[Overlay]) -> Result<(), BundleError> {
    let computed = capture_base.digest();
    let expected = capture_base
        .declared_digest()
        .cloned()
        .unwrap_or_else(|| computed.clone());
    for overlay in overlays {
        let kind = overlay.kind();
        match overlay.capture_base_ref() {
            Some(reference) => {
                let matches = reference == computed.as_str()
                    || capture_base
                        .declared_digest()
                        .is_some_and(|declared| declared.as_str() == reference);
                if !matches {
                    return Err(BundleError::BackReferenceMismatch {
                        kind: kind.to_string(),
                        expected,
                        found: reference.to_string(),
                    });
                }
            }
            None if kind == OverlayKind::MappingTable => {}
            None => {
                return Err(BundleError::MissingBackReference {
                    kind: kind.to_string(),
                });
            }
        }
        if let Some(attribute) = overlay
            .body()
            .annotated_attributes()
            .into_iter()
            .find(|name| !capture_base.contains(name))
        {
            return Err(BundleError::UnknownOverlayAttribute {
                kind: kind.to_string(),
                attribute: attribute.to_string(),
            });
        }
    }
    Ok(())
}
