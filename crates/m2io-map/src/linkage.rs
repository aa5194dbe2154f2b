//! Caller-declared linkage between two bundles.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue, json};

use m2io_bundle::{Canonical, digest_of};
use m2io_model::Digest;

/// How one target attribute is derived, as declared by a caller.
///
/// Operator and combinator names are kept as written; they are checked
/// against [`AggregateOp`](crate::AggregateOp) and
/// [`Combinator`](crate::Combinator) during resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformDirective {
    /// Copy the source value verbatim, coerced to the target datatype.
    Identity(String),
    /// Copy a differently-named source attribute.
    Rename(String),
    Aggregate { op: String, sources: Vec<String> },
    Combine { sources: Vec<String>, combinator: String },
}

impl TransformDirective {
    pub fn identity(source: impl Into<String>) -> Self {
        Self::Identity(source.into())
    }

    pub fn rename(source: impl Into<String>) -> Self {
        Self::Rename(source.into())
    }

    pub fn aggregate<I, S>(op: impl Into<String>, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Aggregate {
            op: op.into(),
            sources: sources.into_iter().map(Into::into).collect(),
        }
    }

    pub fn combine<I, S>(sources: I, combinator: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Combine {
            sources: sources.into_iter().map(Into::into).collect(),
            combinator: combinator.into(),
        }
    }

    /// Source attributes the directive reads, in declaration order.
    pub fn source_attributes(&self) -> Vec<&str> {
        match self {
            Self::Identity(source) | Self::Rename(source) => vec![source.as_str()],
            Self::Aggregate { sources, .. } | Self::Combine { sources, .. } => {
                sources.iter().map(String::as_str).collect()
            }
        }
    }
}

impl Canonical for TransformDirective {
    fn canonical(&self) -> JsonValue {
        match self {
            Self::Identity(source) => json!({ "identity": source }),
            Self::Rename(source) => json!({ "rename": source }),
            Self::Aggregate { op, sources } => {
                json!({ "aggregate": { "op": op, "sources": sources } })
            }
            Self::Combine {
                sources,
                combinator,
            } => json!({ "combine": { "combinator": combinator, "sources": sources } }),
        }
    }
}

/// Target attribute name to directive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkageSpec {
    directives: BTreeMap<String, TransformDirective>,
}

impl LinkageSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, target: impl Into<String>, directive: TransformDirective) -> Self {
        self.insert(target, directive);
        self
    }

    /// Set the directive for `target`, replacing any earlier one.
    pub fn insert(&mut self, target: impl Into<String>, directive: TransformDirective) {
        self.directives.insert(target.into(), directive);
    }

    pub fn get(&self, target: &str) -> Option<&TransformDirective> {
        self.directives.get(target)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TransformDirective)> {
        self.directives
            .iter()
            .map(|(target, directive)| (target.as_str(), directive))
    }

    pub fn len(&self) -> usize {
        self.directives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    /// Content digest of the spec; part of the resolution cache key.
    pub fn spec_hash(&self) -> Digest {
        digest_of(self)
    }
}

impl Canonical for LinkageSpec {
    fn canonical(&self) -> JsonValue {
        let map: Map<String, JsonValue> = self
            .directives
            .iter()
            .map(|(target, directive)| (target.clone(), directive.canonical()))
            .collect();
        JsonValue::Object(map)
    }
}

impl<K: Into<String>> FromIterator<(K, TransformDirective)> for LinkageSpec {
    fn from_iter<I: IntoIterator<Item = (K, TransformDirective)>>(iter: I) -> Self {
        Self {
            directives: iter
                .into_iter()
                .map(|(target, directive)| (target.into(), directive))
                .collect(),
        }
    }
}
