//! Policies for ingestion and transformation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// What to do with a non-null cell whose column matches no attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownAttributePolicy {
    /// Reject the row with `UnknownAttribute`.
    #[default]
    Reject,
    /// Ignore the cell and keep the row.
    Drop,
}

/// How to fill an attribute that has no value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillPolicy {
    /// Leave the attribute null.
    #[default]
    Null,
    /// Use the datatype's default value (empty text, zero, false).
    TypeDefault,
}

/// Options for feeding tabular batches into a dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestOptions {
    pub unknown_attributes: UnknownAttributePolicy,

    /// Fill policy for attributes missing from a row.
    pub missing_values: FillPolicy,

    /// Extra column-name aliases: source column -> capture-base attribute.
    /// Checked before label overlay aliases.
    pub aliases: BTreeMap<String, String>,
}

impl IngestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_unknown_attributes(mut self, policy: UnknownAttributePolicy) -> Self {
        self.unknown_attributes = policy;
        self
    }

    pub fn with_missing_values(mut self, policy: FillPolicy) -> Self {
        self.missing_values = policy;
        self
    }

    pub fn with_alias(mut self, column: impl Into<String>, attribute: impl Into<String>) -> Self {
        self.aliases.insert(column.into(), attribute.into());
        self
    }
}

/// Options for applying a crosswalk plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformOptions {
    /// Fill policy for target attributes the plan leaves unmapped.
    pub unmapped: FillPolicy,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            unmapped: FillPolicy::TypeDefault,
        }
    }
}

impl TransformOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_unmapped(mut self, policy: FillPolicy) -> Self {
        self.unmapped = policy;
        self
    }
}
