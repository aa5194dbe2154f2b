//! Overlays: typed annotations layered on a capture base.
//!
//! Recognized kinds are parsed into [`OverlayBody`] variants; any other kind
//! is kept as opaque JSON so it still round-trips and still contributes to
//! the bundle digest.

#![deny(unsafe_code)]

use std::collections::BTreeMap;
use std::fmt;

use m2io_model::Digest;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue, json};

use crate::digest::{Canonical, digest_of};
use crate::error::BundleError;

/// Overlay kind, keyed as in the `overlays` object of a bundle document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OverlayKind {
    CharacterEncoding,
    Meta,
    Link,
    Label,
    Conformance,
    MappingTable,
    Other(String),
}

impl OverlayKind {
    pub fn as_str(&self) -> &str {
        match self {
            OverlayKind::CharacterEncoding => "character_encoding",
            OverlayKind::Meta => "meta",
            OverlayKind::Link => "link",
            OverlayKind::Label => "label",
            OverlayKind::Conformance => "conformance",
            OverlayKind::MappingTable => "mapping_table",
            OverlayKind::Other(kind) => kind,
        }
    }

    pub fn parse(kind: &str) -> Self {
        match kind.trim().to_ascii_lowercase().as_str() {
            "character_encoding" => OverlayKind::CharacterEncoding,
            "meta" => OverlayKind::Meta,
            "link" => OverlayKind::Link,
            "label" => OverlayKind::Label,
            "conformance" => OverlayKind::Conformance,
            "mapping_table" => OverlayKind::MappingTable,
            _ => OverlayKind::Other(kind.trim().to_string()),
        }
    }

    fn default_type(&self) -> String {
        format!("spec/overlays/{}/1.0", self.as_str())
    }
}

impl fmt::Display for OverlayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source side of one link-overlay entry: a single attribute, or several
/// attributes folded into one target (many-to-one).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LinkSource {
    One(String),
    Many(Vec<String>),
}

impl LinkSource {
    pub fn attributes(&self) -> Vec<&str> {
        match self {
            LinkSource::One(name) => vec![name.as_str()],
            LinkSource::Many(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

/// A published crosswalk from the owning bundle to `target_bundle`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkOverlay {
    pub target_bundle: String,
    /// Attribute pairs as published. Entries are normally target attribute to
    /// source attribute(s); the resolver also accepts the reverse orientation.
    pub attribute_mapping: BTreeMap<String, LinkSource>,
}

/// Presence requirement from a conformance overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Conformance {
    #[serde(rename = "M")]
    Mandatory,
    #[serde(rename = "O")]
    Optional,
}

/// An attribute-to-attribute mapping table shipped next to a bundle (`t`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingTable {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_bundle: Option<String>,
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OverlayBody {
    CharacterEncoding {
        default: Option<String>,
        attributes: BTreeMap<String, String>,
    },
    Meta {
        language: String,
        name: String,
        description: String,
    },
    Link(LinkOverlay),
    Label {
        language: Option<String>,
        labels: BTreeMap<String, String>,
    },
    Conformance {
        attributes: BTreeMap<String, Conformance>,
    },
    MappingTable(MappingTable),
    Other {
        kind: String,
        content: Map<String, JsonValue>,
    },
}

impl OverlayBody {
    pub fn kind(&self) -> OverlayKind {
        match self {
            OverlayBody::CharacterEncoding { .. } => OverlayKind::CharacterEncoding,
            OverlayBody::Meta { .. } => OverlayKind::Meta,
            OverlayBody::Link(_) => OverlayKind::Link,
            OverlayBody::Label { .. } => OverlayKind::Label,
            OverlayBody::Conformance { .. } => OverlayKind::Conformance,
            OverlayBody::MappingTable(_) => OverlayKind::MappingTable,
            OverlayBody::Other { kind, .. } => OverlayKind::Other(kind.clone()),
        }
    }

    /// Capture-base attributes this body annotates, for kinds whose keys must
    /// all be capture-base attributes.
    pub(crate) fn annotated_attributes(&self) -> Vec<&str> {
        match self {
            OverlayBody::CharacterEncoding { attributes, .. } => {
                attributes.keys().map(String::as_str).collect()
            }
            OverlayBody::Label { labels, .. } => labels.keys().map(String::as_str).collect(),
            OverlayBody::Conformance { attributes } => {
                attributes.keys().map(String::as_str).collect()
            }
            _ => Vec::new(),
        }
    }

    fn content(&self) -> Map<String, JsonValue> {
        let value = match self {
            OverlayBody::CharacterEncoding {
                default,
                attributes,
            } => {
                let mut value = json!({ "attribute_character_encoding": attributes });
                if let Some(default) = default {
                    value["default_character_encoding"] = json!(default);
                }
                value
            }
            OverlayBody::Meta {
                language,
                name,
                description,
            } => json!({
                "language": language,
                "name": name,
                "description": description,
            }),
            OverlayBody::Link(link) => json!(link),
            OverlayBody::Label { language, labels } => {
                let mut value = json!({ "attribute_labels": labels });
                if let Some(language) = language {
                    value["language"] = json!(language);
                }
                value
            }
            OverlayBody::Conformance { attributes } => {
                json!({ "attribute_conformance": attributes })
            }
            OverlayBody::MappingTable(table) => json!(table),
            OverlayBody::Other { content, .. } => JsonValue::Object(content.clone()),
        };
        match value {
            JsonValue::Object(map) => map,
            _ => Map::new(),
        }
    }
}

/// One overlay of a bundle.
#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    declared: Option<Digest>,
    overlay_type: String,
    capture_base: Option<String>,
    body: OverlayBody,
}

#[derive(Deserialize)]
struct EncodingWire {
    #[serde(default)]
    default_character_encoding: Option<String>,
    #[serde(default)]
    attribute_character_encoding: BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct MetaWire {
    #[serde(default)]
    language: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
}

#[derive(Deserialize)]
struct LabelWire {
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    attribute_labels: BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct ConformanceWire {
    #[serde(default)]
    attribute_conformance: BTreeMap<String, Conformance>,
}

impl Overlay {
    /// A new overlay for the capture base with digest `capture_base`.
    pub fn new(capture_base: &Digest, body: OverlayBody) -> Self {
        Self {
            declared: None,
            overlay_type: body.kind().default_type(),
            capture_base: Some(capture_base.as_str().to_string()),
            body,
        }
    }

    /// A mapping table as carried in the `t` list of a bundle package.
    pub fn mapping_table(table: MappingTable) -> Self {
        Self {
            declared: None,
            overlay_type: OverlayKind::MappingTable.default_type(),
            capture_base: None,
            body: OverlayBody::MappingTable(table),
        }
    }

    /// Parse one overlay object of the given kind.
    pub fn from_json(kind: &str, value: &JsonValue) -> Result<Self, BundleError> {
        let kind = OverlayKind::parse(kind);
        let JsonValue::Object(map) = value else {
            return Err(BundleError::field(
                format!("{kind} overlay"),
                kind.as_str(),
                "expected an object",
            ));
        };
        let context = format!("{kind} overlay");
        let declared = optional_digest(map, "d", &context)?;
        let overlay_type = match map.get("type") {
            Some(JsonValue::String(tag)) => tag.clone(),
            Some(_) => return Err(BundleError::field(&context, "type", "expected a string")),
            None => kind.default_type(),
        };
        let capture_base = match map.get("capture_base") {
            Some(JsonValue::String(reference)) => Some(reference.clone()),
            Some(_) => {
                return Err(BundleError::field(
                    &context,
                    "capture_base",
                    "expected a digest string",
                ));
            }
            None => None,
        };
        let body = match &kind {
            OverlayKind::CharacterEncoding => {
                let wire: EncodingWire = from_object(map, &context)?;
                OverlayBody::CharacterEncoding {
                    default: wire.default_character_encoding,
                    attributes: wire.attribute_character_encoding,
                }
            }
            OverlayKind::Meta => {
                let wire: MetaWire = from_object(map, &context)?;
                OverlayBody::Meta {
                    language: wire.language,
                    name: wire.name,
                    description: wire.description,
                }
            }
            OverlayKind::Link => OverlayBody::Link(from_object(map, &context)?),
            OverlayKind::Label => {
                let wire: LabelWire = from_object(map, &context)?;
                OverlayBody::Label {
                    language: wire.language,
                    labels: wire.attribute_labels,
                }
            }
            OverlayKind::Conformance => {
                let wire: ConformanceWire = from_object(map, &context)?;
                OverlayBody::Conformance {
                    attributes: wire.attribute_conformance,
                }
            }
            OverlayKind::MappingTable => OverlayBody::MappingTable(from_object(map, &context)?),
            OverlayKind::Other(name) => {
                let mut content = map.clone();
                for key in ["d", "type", "capture_base"] {
                    content.remove(key);
                }
                OverlayBody::Other {
                    kind: name.clone(),
                    content,
                }
            }
        };
        Ok(Self {
            declared,
            overlay_type,
            capture_base,
            body,
        })
    }

    pub fn kind(&self) -> OverlayKind {
        self.body.kind()
    }

    pub fn body(&self) -> &OverlayBody {
        &self.body
    }

    pub fn overlay_type(&self) -> &str {
        &self.overlay_type
    }

    pub fn declared_digest(&self) -> Option<&Digest> {
        self.declared.as_ref()
    }

    /// Capture-base reference carried by the overlay, as written.
    pub fn capture_base_ref(&self) -> Option<&str> {
        self.capture_base.as_deref()
    }

    pub fn digest(&self) -> Digest {
        digest_of(self)
    }

    pub fn as_link(&self) -> Option<&LinkOverlay> {
        match &self.body {
            OverlayBody::Link(link) => Some(link),
            _ => None,
        }
    }

    pub fn as_mapping_table(&self) -> Option<&MappingTable> {
        match &self.body {
            OverlayBody::MappingTable(table) => Some(table),
            _ => None,
        }
    }

    /// Wire form with `d` set to the computed digest and the back-reference
    /// pointing at `capture_base`.
    pub fn to_json(&self, capture_base: &Digest) -> JsonValue {
        let mut map = self.body.content();
        map.insert("type".to_string(), json!(self.overlay_type));
        map.insert("d".to_string(), json!(self.digest().as_str()));
        if self.capture_base.is_some() {
            map.insert("capture_base".to_string(), json!(capture_base.as_str()));
        }
        JsonValue::Object(map)
    }
}

impl Canonical for Overlay {
    fn canonical(&self) -> JsonValue {
        let mut map = self.body.content();
        map.insert("type".to_string(), json!(self.overlay_type));
        json!({ "kind": self.kind().as_str(), "content": map })
    }
}

fn optional_digest(
    map: &Map<String, JsonValue>,
    field: &str,
    context: &str,
) -> Result<Option<Digest>, BundleError> {
    match map.get(field) {
        None | Some(JsonValue::Null) => Ok(None),
        Some(JsonValue::String(raw)) if raw.trim().is_empty() => Ok(None),
        Some(JsonValue::String(raw)) => Digest::new(raw.as_str())
            .map(Some)
            .map_err(|err| BundleError::field(context, field, err.to_string())),
        Some(_) => Err(BundleError::field(context, field, "expected a digest string")),
    }
}

pub(crate) fn declared_digest(
    map: &Map<String, JsonValue>,
    context: &str,
) -> Result<Option<Digest>, BundleError> {
    optional_digest(map, "d", context)
}

fn from_object<T: for<'de> Deserialize<'de>>(
    map: &Map<String, JsonValue>,
    context: &str,
) -> Result<T, BundleError> {
    serde_json::from_value(JsonValue::Object(map.clone()))
        .map_err(|err| BundleError::field(context, "body", err.to_string()))
}
