//! Resolved, executable crosswalk plans.

use std::sync::Arc;

use serde::Serialize;

use m2io_bundle::Bundle;
use m2io_model::{AttributeType, Digest};

use crate::operators::{AggregateOp, Combinator};

/// A directive after validation against both capture bases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "directive", rename_all = "snake_case")]
pub enum ResolvedDirective {
    Identity { source: String },
    Rename { source: String },
    Aggregate { op: AggregateOp, sources: Vec<String> },
    Combine { combinator: Combinator, sources: Vec<String> },
    /// No source feeds the target; it is filled per the transform options.
    Unmapped,
}

impl ResolvedDirective {
    pub fn sources(&self) -> Vec<&str> {
        match self {
            Self::Identity { source } | Self::Rename { source } => vec![source.as_str()],
            Self::Aggregate { sources, .. } | Self::Combine { sources, .. } => {
                sources.iter().map(String::as_str).collect()
            }
            Self::Unmapped => Vec::new(),
        }
    }

    pub fn is_mapped(&self) -> bool {
        !matches!(self, Self::Unmapped)
    }

    /// Short label for logs.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Identity { .. } => "identity",
            Self::Rename { .. } => "rename",
            Self::Aggregate { .. } => "aggregate",
            Self::Combine { .. } => "combine",
            Self::Unmapped => "unmapped",
        }
    }
}

/// Where a plan entry's directive came from. Variants are listed in
/// precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectiveOrigin {
    /// The caller's linkage spec.
    Spec,
    /// A `link` overlay published on the source bundle.
    Overlay,
    /// A mapping table shipped with the source bundle.
    MappingTable,
    /// Same-named attribute in both capture bases.
    Implicit,
    /// Nothing matched.
    Unresolved,
}

/// How a derived value reaches the target datatype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum Coercion {
    /// The derived value already has the target datatype.
    Passthrough,
    Convert {
        from: AttributeType,
        to: AttributeType,
    },
    /// No value is derived; the target is filled.
    Fill { to: AttributeType },
}

impl Coercion {
    pub(crate) fn between(from: AttributeType, to: AttributeType) -> Self {
        if from == to {
            Coercion::Passthrough
        } else {
            Coercion::Convert { from, to }
        }
    }
}

/// One target attribute of a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanEntry {
    pub target: String,
    pub target_type: AttributeType,
    pub directive: ResolvedDirective,
    pub coercion: Coercion,
    pub origin: DirectiveOrigin,
}

/// Attribute coverage of a plan, as reported in audit events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanCoverage {
    pub mapped: usize,
    pub unmapped: usize,
    pub aggregated: usize,
    pub combined: usize,
    pub from_spec: usize,
    pub from_overlay: usize,
    pub from_table: usize,
    pub implicit: usize,
}

/// A validated mapping from one bundle's records to another bundle's shape.
///
/// Entries cover every target attribute exactly once, ordered by name.
#[derive(Debug, Clone, PartialEq)]
pub struct CrosswalkPlan {
    source: Arc<Bundle>,
    target: Arc<Bundle>,
    spec_hash: Digest,
    entries: Vec<PlanEntry>,
}

impl CrosswalkPlan {
    pub(crate) fn new(
        source: Arc<Bundle>,
        target: Arc<Bundle>,
        spec_hash: Digest,
        mut entries: Vec<PlanEntry>,
    ) -> Self {
        entries.sort_by(|a, b| a.target.cmp(&b.target));
        Self {
            source,
            target,
            spec_hash,
            entries,
        }
    }

    pub fn source(&self) -> &Arc<Bundle> {
        &self.source
    }

    pub fn target(&self) -> &Arc<Bundle> {
        &self.target
    }

    pub fn source_digest(&self) -> &Digest {
        self.source.digest()
    }

    pub fn target_digest(&self) -> &Digest {
        self.target.digest()
    }

    pub fn spec_hash(&self) -> &Digest {
        &self.spec_hash
    }

    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    pub fn entry(&self, target: &str) -> Option<&PlanEntry> {
        self.entries
            .binary_search_by(|entry| entry.target.as_str().cmp(target))
            .ok()
            .map(|index| &self.entries[index])
    }

    /// Target attributes fed by some source.
    pub fn mapped(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|entry| entry.directive.is_mapped())
            .map(|entry| entry.target.as_str())
            .collect()
    }

    pub fn unmapped(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|entry| !entry.directive.is_mapped())
            .map(|entry| entry.target.as_str())
            .collect()
    }

    pub fn coverage(&self) -> PlanCoverage {
        let mut coverage = PlanCoverage::default();
        for entry in &self.entries {
            match entry.directive {
                ResolvedDirective::Unmapped => coverage.unmapped += 1,
                ResolvedDirective::Aggregate { .. } => coverage.aggregated += 1,
                ResolvedDirective::Combine { .. } => coverage.combined += 1,
                _ => {}
            }
            if entry.directive.is_mapped() {
                coverage.mapped += 1;
            }
            match entry.origin {
                DirectiveOrigin::Spec => coverage.from_spec += 1,
                DirectiveOrigin::Overlay => coverage.from_overlay += 1,
                DirectiveOrigin::MappingTable => coverage.from_table += 1,
                DirectiveOrigin::Implicit => coverage.implicit += 1,
                DirectiveOrigin::Unresolved => {}
            }
        }
        coverage
    }
}
