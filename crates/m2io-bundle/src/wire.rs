//! Bundle document shapes.
//!
//! Three shapes are accepted and normalized to the same [`Bundle`]:
//!
//! ```text
//! plain    {"v", "d", "capture_base": {...}, "overlays": {...}}
//! package  {"m" | "meta": <plain>, "t": [<mapping table>, ...]}
//! envelope {"oca_bundle": <plain>, "meta": {"alias": "Name@1.0", ...}}
//! ```
//!
//! Each entry of `overlays` is either one overlay object or an array of them.

#![deny(unsafe_code)]

use std::collections::BTreeMap;

use m2io_model::AttributeType;
use serde_json::{Map, Value as JsonValue, json};

use crate::bundle::Bundle;
use crate::capture_base::CaptureBase;
use crate::error::BundleError;
use crate::overlay::{MappingTable, Overlay, OverlayKind, declared_digest};

pub(crate) fn decode(value: &JsonValue) -> Result<Bundle, BundleError> {
    let JsonValue::Object(root) = value else {
        return Err(BundleError::UnrecognizedShape);
    };

    if let Some(inner) = root.get("oca_bundle") {
        let envelope = match root.get("meta") {
            Some(JsonValue::Object(meta)) => meta.clone(),
            None | Some(JsonValue::Null) => Map::new(),
            Some(_) => return Err(BundleError::field("envelope", "meta", "expected an object")),
        };
        return decode_plain(inner, Vec::new(), envelope);
    }

    let packaged = root
        .get("m")
        .or_else(|| root.get("meta").filter(|meta| is_plain(meta)));
    if let Some(inner) = packaged {
        let tables = decode_tables(root.get("t"))?;
        return decode_plain(inner, tables, Map::new());
    }

    if root.contains_key("capture_base") {
        return decode_plain(value, Vec::new(), Map::new());
    }

    Err(BundleError::UnrecognizedShape)
}

fn is_plain(value: &JsonValue) -> bool {
    value
        .as_object()
        .is_some_and(|map| map.contains_key("capture_base"))
}

fn decode_tables(value: Option<&JsonValue>) -> Result<Vec<Overlay>, BundleError> {
    let items = match value {
        None | Some(JsonValue::Null) => return Ok(Vec::new()),
        Some(JsonValue::Array(items)) => items,
        Some(_) => return Err(BundleError::field("package", "t", "expected an array")),
    };
    items
        .iter()
        .map(|item| {
            let table: MappingTable = serde_json::from_value(item.clone())
                .map_err(|err| BundleError::field("mapping table", "attributes", err.to_string()))?;
            Ok(Overlay::mapping_table(table))
        })
        .collect()
}

fn decode_plain(
    value: &JsonValue,
    mut overlays: Vec<Overlay>,
    envelope: Map<String, JsonValue>,
) -> Result<Bundle, BundleError> {
    let JsonValue::Object(map) = value else {
        return Err(BundleError::UnrecognizedShape);
    };
    let version = match map.get("v") {
        Some(JsonValue::String(tag)) => Some(tag.clone()),
        None | Some(JsonValue::Null) => None,
        Some(_) => return Err(BundleError::field("bundle", "v", "expected a string")),
    };
    let declared = declared_digest(map, "bundle")?;
    let capture_base = match map.get("capture_base") {
        Some(JsonValue::Object(cb)) => decode_capture_base(cb)?,
        None | Some(JsonValue::Null) => return Err(BundleError::MissingCaptureBase),
        Some(_) => {
            return Err(BundleError::field(
                "bundle",
                "capture_base",
                "expected an object",
            ));
        }
    };

    match map.get("overlays") {
        None | Some(JsonValue::Null) => {}
        Some(JsonValue::Object(entries)) => {
            for (kind, entry) in entries {
                match entry {
                    JsonValue::Array(items) => {
                        for item in items {
                            overlays.push(Overlay::from_json(kind, item)?);
                        }
                    }
                    other => overlays.push(Overlay::from_json(kind, other)?),
                }
            }
        }
        Some(_) => return Err(BundleError::field("bundle", "overlays", "expected an object")),
    }

    Bundle::assemble(version, declared, capture_base, overlays, envelope)
}

fn decode_capture_base(map: &Map<String, JsonValue>) -> Result<CaptureBase, BundleError> {
    let context = "capture base";
    let declared = declared_digest(map, context)?;
    let schema_type = string_field(map, "type", context)?;
    let classification = string_field(map, "classification", context)?;

    let attributes = match map.get("attributes") {
        Some(JsonValue::Object(entries)) => entries,
        _ => {
            return Err(BundleError::field(
                context,
                "attributes",
                "expected an object of attribute datatypes",
            ));
        }
    };
    let mut typed = BTreeMap::new();
    for (name, tag) in attributes {
        let Some(tag) = tag.as_str() else {
            return Err(BundleError::UnknownAttributeType {
                attribute: name.clone(),
                tag: tag.to_string(),
            });
        };
        let ty: AttributeType = tag.parse().map_err(|_| BundleError::UnknownAttributeType {
            attribute: name.clone(),
            tag: tag.to_string(),
        })?;
        typed.insert(name.clone(), ty);
    }

    let flagged: Vec<String> = match map.get("flagged_attributes") {
        None | Some(JsonValue::Null) => Vec::new(),
        Some(value) => serde_json::from_value(value.clone())
            .map_err(|err| BundleError::field(context, "flagged_attributes", err.to_string()))?,
    };

    let mut capture_base = CaptureBase::new(typed)
        .with_classification(classification.unwrap_or_default())
        .with_flagged(flagged)
        .with_declared(declared);
    if let Some(schema_type) = schema_type {
        capture_base = capture_base.with_schema_type(schema_type);
    }
    Ok(capture_base)
}

fn string_field(
    map: &Map<String, JsonValue>,
    field: &str,
    context: &str,
) -> Result<Option<String>, BundleError> {
    match map.get(field) {
        None | Some(JsonValue::Null) => Ok(None),
        Some(JsonValue::String(text)) => Ok(Some(text.clone())),
        Some(_) => Err(BundleError::field(context, field, "expected a string")),
    }
}

pub(crate) fn encode(bundle: &Bundle) -> JsonValue {
    let cb_digest = bundle.capture_base().digest();
    let mut grouped: BTreeMap<String, Vec<JsonValue>> = BTreeMap::new();
    for overlay in bundle.overlays() {
        grouped
            .entry(overlay.kind().as_str().to_string())
            .or_default()
            .push(overlay.to_json(&cb_digest));
    }
    let overlays: Map<String, JsonValue> = grouped
        .into_iter()
        .map(|(kind, mut items)| {
            let single = OverlayKind::parse(&kind) == OverlayKind::CharacterEncoding
                && items.len() == 1;
            let value = if single {
                items.remove(0)
            } else {
                JsonValue::Array(items)
            };
            (kind, value)
        })
        .collect();

    let mut plain = json!({
        "d": bundle.digest().as_str(),
        "capture_base": bundle.capture_base().to_json(),
        "overlays": overlays,
    });
    if let Some(version) = bundle.version() {
        plain["v"] = json!(version);
    }
    if bundle.envelope().is_empty() {
        plain
    } else {
        json!({ "oca_bundle": plain, "meta": bundle.envelope() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_shapes() {
        assert!(matches!(
            decode(&json!({"bundle": {}})),
            Err(BundleError::UnrecognizedShape)
        ));
        assert!(matches!(decode(&json!([1])), Err(BundleError::UnrecognizedShape)));
    }

    #[test]
    fn missing_capture_base_is_malformed() {
        assert!(matches!(
            decode(&json!({"m": {"v": "x"}, "t": []})),
            Err(BundleError::MissingCaptureBase)
        ));
        assert!(matches!(
            decode(&json!({"oca_bundle": {"overlays": {}}})),
            Err(BundleError::MissingCaptureBase)
        ));
    }

    #[test]
    fn rejects_unknown_datatype() {
        let err = decode(&json!({
            "capture_base": {"attributes": {"hgt": "Quantity"}}
        }))
        .unwrap_err();
        assert!(matches!(err, BundleError::UnknownAttributeType { ref tag, .. } if tag == "Quantity"));
    }

    #[test]
    fn meta_key_carries_a_packaged_bundle() {
        let bundle = decode(&json!({
            "meta": {"capture_base": {"attributes": {"hgt": "Numeric"}}},
            "t": [{"attributes": {"height": "hgt"}}]
        }))
        .unwrap();
        assert_eq!(bundle.mapping_tables().count(), 1);
    }
}
