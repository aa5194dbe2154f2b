#![deny(unsafe_code)]

use std::collections::{BTreeMap, BTreeSet};

use m2io_model::{AttributeType, Digest};
use serde_json::{Value as JsonValue, json};

use crate::digest::{Canonical, digest_of};

pub const CAPTURE_BASE_TYPE: &str = "spec/capture_base/1.0";

/// The attribute-name-to-datatype core of a bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureBase {
    declared: Option<Digest>,
    schema_type: String,
    classification: String,
    attributes: BTreeMap<String, AttributeType>,
    flagged_attributes: BTreeSet<String>,
}

impl CaptureBase {
    pub fn new<I, S>(attributes: I) -> Self
    where
        I: IntoIterator<Item = (S, AttributeType)>,
        S: Into<String>,
    {
        Self {
            declared: None,
            schema_type: CAPTURE_BASE_TYPE.to_string(),
            classification: String::new(),
            attributes: attributes
                .into_iter()
                .map(|(name, ty)| (name.into(), ty))
                .collect(),
            flagged_attributes: BTreeSet::new(),
        }
    }

    pub fn with_classification(mut self, classification: impl Into<String>) -> Self {
        self.classification = classification.into();
        self
    }

    pub fn with_schema_type(mut self, schema_type: impl Into<String>) -> Self {
        self.schema_type = schema_type.into();
        self
    }

    pub fn with_flagged<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.flagged_attributes
            .extend(attributes.into_iter().map(Into::into));
        self
    }

    pub(crate) fn with_declared(mut self, declared: Option<Digest>) -> Self {
        self.declared = declared;
        self
    }

    /// The `d` value the source document declared, if any.
    pub fn declared_digest(&self) -> Option<&Digest> {
        self.declared.as_ref()
    }

    pub fn digest(&self) -> Digest {
        digest_of(self)
    }

    /// True when `reference` names this capture base, either by its computed
    /// digest or by the digest its document declared.
    pub fn answers_to(&self, reference: &str) -> bool {
        self.declared
            .as_ref()
            .is_some_and(|declared| declared.as_str() == reference)
            || self.digest().as_str() == reference
    }

    pub fn schema_type(&self) -> &str {
        &self.schema_type
    }

    pub fn classification(&self) -> &str {
        &self.classification
    }

    pub fn attribute_type(&self, name: &str) -> Option<AttributeType> {
        self.attributes.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Attributes in name order.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, AttributeType)> {
        self.attributes.iter().map(|(name, ty)| (name.as_str(), *ty))
    }

    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn flagged_attributes(&self) -> impl Iterator<Item = &str> {
        self.flagged_attributes.iter().map(String::as_str)
    }

    /// Wire form, with `d` set to the computed digest.
    pub fn to_json(&self) -> JsonValue {
        let mut value = self.canonical();
        if let JsonValue::Object(map) = &mut value {
            map.insert("d".to_string(), json!(self.digest().as_str()));
        }
        value
    }
}

impl Canonical for CaptureBase {
    fn canonical(&self) -> JsonValue {
        let attributes: serde_json::Map<String, JsonValue> = self
            .attributes
            .iter()
            .map(|(name, ty)| (name.clone(), json!(ty.as_str())))
            .collect();
        json!({
            "type": self.schema_type,
            "classification": self.classification,
            "attributes": attributes,
            "flagged_attributes": self.flagged_attributes.iter().collect::<Vec<_>>(),
        })
    }
}
