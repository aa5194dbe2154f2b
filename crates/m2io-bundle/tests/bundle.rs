use std::path::PathBuf;

use m2io_bundle::{
    Bundle, BundleError, BundleRegistry, BundleStore, CaptureBase, OverlayKind, digest_of,
};
use m2io_model::AttributeType;
use proptest::prelude::*;
use serde_json::Value as JsonValue;

fn fixture(name: &str) -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../mockdata/bundles")
        .join(name);
    std::fs::read_to_string(&path).unwrap_or_else(|err| panic!("read {}: {err}", path.display()))
}

/// Re-serialize `value` with object keys shuffled by `seed` and optional
/// indentation, producing a differently formatted but equivalent document.
fn render(value: &JsonValue, seed: &mut u64, pretty: bool, out: &mut String) {
    match value {
        JsonValue::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            for idx in (1..entries.len()).rev() {
                *seed ^= *seed << 13;
                *seed ^= *seed >> 7;
                *seed ^= *seed << 17;
                let pick = (*seed % (idx as u64 + 1)) as usize;
                entries.swap(idx, pick);
            }
            out.push('{');
            for (idx, (key, item)) in entries.into_iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                if pretty {
                    out.push_str("\n    ");
                }
                out.push_str(&JsonValue::String(key.clone()).to_string());
                out.push_str(if pretty { " : " } else { ":" });
                render(item, seed, pretty, out);
            }
            if pretty {
                out.push('\n');
            }
            out.push('}');
        }
        JsonValue::Array(items) => {
            out.push('[');
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    out.push_str(if pretty { ", " } else { "," });
                }
                render(item, seed, pretty, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

#[test]
fn parses_packaged_standard() {
    let bundle = Bundle::parse(&fixture("standard2.json")).expect("parse standard2");
    let cb = bundle.capture_base();
    assert_eq!(cb.attribute_type("height"), Some(AttributeType::Numeric));
    assert_eq!(cb.attribute_type("surname"), Some(AttributeType::Text));
    assert_eq!(cb.len(), 4);
    assert_eq!(
        bundle.declared_digest().map(|d| d.as_str()),
        Some("ENnxCGDxYDGQpQw5r1u5zMc0C-u0Q_ixNGDFJ1U9yfxo")
    );
    assert!(bundle.answers_to("ENnxCGDxYDGQpQw5r1u5zMc0C-u0Q_ixNGDFJ1U9yfxo"));
    assert!(bundle.overlay(&OverlayKind::CharacterEncoding).is_some());
    assert_eq!(bundle.name(), Some("FAKE Patient"));

    let table = bundle.mapping_tables().next().expect("mapping table");
    assert_eq!(table.attributes["name"], "first_name");
    assert!(table.target_bundle.is_none());
}

#[test]
fn digest_covers_every_component() {
    let bundle = Bundle::parse(&fixture("standard1.json")).expect("parse standard1");
    assert_eq!(&digest_of(&bundle), bundle.digest());
    assert_eq!(bundle.digest().as_str().len(), 64);
    for overlay in bundle.overlays() {
        assert_eq!(digest_of(overlay), overlay.digest());
    }
    assert_ne!(
        digest_of(bundle.capture_base()),
        *bundle.digest(),
        "bundle digest is more than its capture base"
    );
}

#[test]
fn wire_round_trip_keeps_identity() {
    for name in ["standard1.json", "standard2.json"] {
        let bundle = Bundle::parse(&fixture(name)).expect("parse fixture");
        let reparsed = Bundle::from_json(&bundle.to_json()).expect("reparse");
        assert_eq!(reparsed.digest(), bundle.digest(), "{name}");
        assert_eq!(reparsed.overlays().len(), bundle.overlays().len());
    }
}

#[test]
fn envelope_shape_registers_alias() {
    let plain: JsonValue = serde_json::from_str(&fixture("standard1.json")).expect("json");
    let enveloped = serde_json::json!({
        "oca_bundle": plain["m"].clone(),
        "meta": {"alias": "Standard1@1.0"}
    });
    let bundle = Bundle::from_json(&enveloped).expect("parse envelope");
    let packaged = Bundle::parse(&fixture("standard1.json")).expect("parse package");
    assert_eq!(bundle.digest(), packaged.digest());
    assert_eq!(bundle.alias(), Some("Standard1@1.0"));

    let registry = BundleRegistry::new();
    registry.insert(bundle);
    let found = registry.lookup("Standard1@1.0").expect("alias lookup");
    assert_eq!(found.digest(), packaged.digest());
    assert!(registry.lookup("EBA3iXoZRgnJzu9L1OwR0Ke8bcTQ4B8IeJYFatiXMfh7").is_some());
}

#[test]
fn reloading_under_an_alias_keeps_the_first_copy() {
    let registry = BundleRegistry::new();
    let packaged = Bundle::parse(&fixture("standard1.json")).expect("parse package");
    let first = registry.insert(packaged.clone());
    assert!(registry.lookup("Standard1@1.0").is_none());

    let again = registry.insert(packaged.with_alias("Standard1@1.0"));
    assert!(std::sync::Arc::ptr_eq(&first, &again));
    assert_eq!(registry.len(), 1);
    let found = registry.lookup("Standard1@1.0").expect("alias lookup");
    assert_eq!(found.digest(), first.digest());
}

#[test]
fn tampered_back_reference_is_malformed() {
    let mut doc: JsonValue = serde_json::from_str(&fixture("standard1.json")).expect("json");
    doc["m"]["overlays"]["character_encoding"]["capture_base"] =
        JsonValue::String("EAnotherCaptureBase".to_string());
    let err = Bundle::from_json(&doc).expect_err("foreign back-reference");
    assert!(matches!(err, BundleError::BackReferenceMismatch { .. }));
}

#[test]
fn content_change_changes_digest() {
    let mut doc: JsonValue = serde_json::from_str(&fixture("standard1.json")).expect("json");
    let original = Bundle::from_json(&doc).expect("parse");
    doc["m"]["capture_base"]["attributes"]["wgt"] = JsonValue::String("Text".to_string());
    let changed = Bundle::from_json(&doc).expect("parse changed");
    assert_ne!(changed.digest(), original.digest());
}

#[test]
fn constructed_bundles_match_parsed_ones() {
    let cb = CaptureBase::new([
        ("first_name", AttributeType::Text),
        ("hgt", AttributeType::Numeric),
    ]);
    let built = Bundle::new(cb, Vec::new()).expect("build");
    let parsed = Bundle::parse(
        r#"{"capture_base": {"type": "spec/capture_base/1.0", "classification": "",
            "attributes": {"hgt": "Numeric", "first_name": "Text"}, "flagged_attributes": []}}"#,
    )
    .expect("parse");
    assert_eq!(built.digest(), parsed.digest());
}

proptest! {
    #[test]
    fn digest_is_independent_of_key_order_and_whitespace(seed in 1u64.., pretty in any::<bool>()) {
        for name in ["standard1.json", "standard2.json"] {
            let raw = fixture(name);
            let value: JsonValue = serde_json::from_str(&raw).expect("json");
            let mut shuffled = String::new();
            let mut state = seed;
            render(&value, &mut state, pretty, &mut shuffled);

            let expected = Bundle::parse(&raw).expect("parse original");
            let actual = Bundle::parse(&shuffled).expect("parse shuffled");
            prop_assert_eq!(actual.digest(), expected.digest());
        }
    }
}
