//! Digest service.
//!
//! Components are reduced to a canonical JSON text (object keys sorted, no
//! insignificant whitespace, numbers in serde_json's shortest form) and hashed
//! with SHA-256. Key order and formatting of the source document therefore
//! never reach the hash.

#![deny(unsafe_code)]

use m2io_model::Digest;
use serde_json::Value as JsonValue;
use sha2::Digest as _;

/// A component with a canonical content form.
pub trait Canonical {
    /// Canonical content of the component. Declared `d` fields and
    /// back-references are never part of it.
    fn canonical(&self) -> JsonValue;
}

/// Digest of any canonical component.
pub fn digest_of<C: Canonical + ?Sized>(component: &C) -> Digest {
    canonical_digest(&component.canonical())
}

/// SHA-256 over the canonical text of a JSON value.
pub fn canonical_digest(value: &JsonValue) -> Digest {
    let text = canonical_text(value);
    Digest::from_sha256(sha2::Sha256::digest(text.as_bytes()).into())
}

/// Canonical text of a JSON value.
///
/// Keys are sorted here rather than relying on the map type, which may keep
/// insertion order depending on enabled serde_json features.
pub fn canonical_text(value: &JsonValue) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &JsonValue, out: &mut String) {
    match value {
        JsonValue::Object(map) => {
            let mut entries: Vec<(&String, &JsonValue)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (idx, (key, item)) in entries.into_iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                out.push_str(&JsonValue::String(key.clone()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        JsonValue::Array(items) => {
            out.push('[');
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
