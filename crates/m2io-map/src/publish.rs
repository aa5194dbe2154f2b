//! Publishing a resolved plan as a `link` overlay.

use std::collections::BTreeMap;

use m2io_bundle::{LinkOverlay, LinkSource};

use crate::error::LinkError;
use crate::operators::{AggregateOp, Combinator};
use crate::plan::{CrosswalkPlan, DirectiveOrigin, ResolvedDirective};

/// The link overlay form of `plan`, pointing at the target's digest.
///
/// Only explicit entries are published; implicit identities and unmapped
/// targets are re-derived by every resolution. A link overlay can express a
/// copy, a space join into a non-numeric target and a sum into a numeric one.
/// Any other explicit directive is [`LinkError::Unpublishable`].
pub fn link_overlay(plan: &CrosswalkPlan) -> Result<LinkOverlay, LinkError> {
    let mut attribute_mapping = BTreeMap::new();
    for entry in plan.entries() {
        if matches!(
            entry.origin,
            DirectiveOrigin::Implicit | DirectiveOrigin::Unresolved
        ) {
            continue;
        }
        let numeric_target = entry.target_type.is_numeric();
        let source = match &entry.directive {
            ResolvedDirective::Identity { source } | ResolvedDirective::Rename { source } => {
                LinkSource::One(source.clone())
            }
            ResolvedDirective::Aggregate {
                op: AggregateOp::Sum,
                sources,
            } if numeric_target => LinkSource::Many(sources.clone()),
            ResolvedDirective::Combine {
                combinator: Combinator::JoinSpace,
                sources,
            } if !numeric_target => LinkSource::Many(sources.clone()),
            other => {
                return Err(LinkError::Unpublishable {
                    target: entry.target.clone(),
                    reason: format!(
                        "{} into a {} attribute has no link overlay form",
                        describe(other),
                        entry.target_type
                    ),
                });
            }
        };
        attribute_mapping.insert(entry.target.clone(), source);
    }
    Ok(LinkOverlay {
        target_bundle: plan.target_digest().as_str().to_string(),
        attribute_mapping,
    })
}

fn describe(directive: &ResolvedDirective) -> String {
    match directive {
        ResolvedDirective::Aggregate { op, .. } => format!("aggregate {op}"),
        ResolvedDirective::Combine { combinator, .. } => format!("combine {combinator}"),
        other => other.display_name().to_string(),
    }
}
