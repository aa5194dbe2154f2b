//! Crosswalk resolution.
//!
//! A plan is built from four sources, highest precedence first: the caller's
//! linkage spec, `link` overlays on the source bundle that name the target,
//! mapping tables that name the target, and same-named attributes. The first
//! source with a directive for a target attribute wins.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, info_span, warn};

use m2io_bundle::{Bundle, BundleStore, CaptureBase};
use m2io_model::{AttributeType, Event, EventLog, EventPayload};

use crate::cache::{ResolutionCache, ResolutionKey};
use crate::error::{LinkError, Side};
use crate::linkage::{LinkageSpec, TransformDirective};
use crate::operators::{AggregateOp, Combinator};
use crate::plan::{Coercion, CrosswalkPlan, DirectiveOrigin, PlanEntry, ResolvedDirective};

/// Build a plan from `source` to `target`. Pure: no events, no cache.
///
/// Published overlays are matched against the target's digests and its own
/// alias only; use [`resolve_plan_in`] to also honor aliases known to a store.
pub fn resolve_plan(
    source: &Arc<Bundle>,
    target: &Arc<Bundle>,
    spec: &LinkageSpec,
) -> Result<CrosswalkPlan, LinkError> {
    build_plan(source, target, spec, |reference| names_bundle(target, reference))
}

/// Like [`resolve_plan`], but an overlay's `target_bundle` also names the
/// target when `store` resolves it to the target's digest.
pub fn resolve_plan_in(
    store: &dyn BundleStore,
    source: &Arc<Bundle>,
    target: &Arc<Bundle>,
    spec: &LinkageSpec,
) -> Result<CrosswalkPlan, LinkError> {
    build_plan(source, target, spec, |reference| {
        names_bundle(target, reference)
            || store
                .lookup(reference)
                .is_some_and(|found| found.digest() == target.digest())
    })
}

fn build_plan(
    source: &Arc<Bundle>,
    target: &Arc<Bundle>,
    spec: &LinkageSpec,
    names_target: impl Fn(&str) -> bool,
) -> Result<CrosswalkPlan, LinkError> {
    let source_cb = source.capture_base();
    let target_cb = target.capture_base();

    let mut chosen: BTreeMap<String, (ResolvedDirective, DirectiveOrigin)> = BTreeMap::new();
    for (attribute, directive) in spec.iter() {
        if !target_cb.contains(attribute) {
            return Err(LinkError::missing(Side::Target, attribute));
        }
        let resolved = validate_directive(attribute, directive, source_cb)?;
        chosen.insert(attribute.to_string(), (resolved, DirectiveOrigin::Spec));
    }

    for link in source.links() {
        if !names_target(&link.target_bundle) {
            continue;
        }
        let pairs = link
            .attribute_mapping
            .iter()
            .map(|(key, value)| (key.as_str(), value.attributes()));
        for (attribute, sources) in orient(pairs, source_cb, target_cb) {
            chosen.entry(attribute.clone()).or_insert_with(|| {
                (published_directive(&attribute, sources, target_cb), DirectiveOrigin::Overlay)
            });
        }
    }

    for table in source.mapping_tables() {
        let Some(reference) = table.target_bundle.as_deref() else {
            continue;
        };
        if !names_target(reference) {
            continue;
        }
        let pairs = table
            .attributes
            .iter()
            .map(|(key, value)| (key.as_str(), vec![value.as_str()]));
        for (attribute, sources) in orient(pairs, source_cb, target_cb) {
            chosen.entry(attribute.clone()).or_insert_with(|| {
                (
                    published_directive(&attribute, sources, target_cb),
                    DirectiveOrigin::MappingTable,
                )
            });
        }
    }

    let entries = target_cb
        .attributes()
        .map(|(attribute, target_type)| {
            let (directive, origin) = chosen.remove(attribute).unwrap_or_else(|| {
                if source_cb.contains(attribute) {
                    (
                        ResolvedDirective::Identity {
                            source: attribute.to_string(),
                        },
                        DirectiveOrigin::Implicit,
                    )
                } else {
                    (ResolvedDirective::Unmapped, DirectiveOrigin::Unresolved)
                }
            });
            let coercion = coercion_for(&directive, source_cb, target_type);
            debug!(
                target = attribute,
                directive = directive.display_name(),
                origin = ?origin,
                "resolved target attribute"
            );
            PlanEntry {
                target: attribute.to_string(),
                target_type,
                directive,
                coercion,
                origin,
            }
        })
        .collect();

    Ok(CrosswalkPlan::new(
        Arc::clone(source),
        Arc::clone(target),
        spec.spec_hash(),
        entries,
    ))
}

/// Resolves linkages against a bundle store, caching plans and logging each
/// fresh resolution.
pub struct CrosswalkResolver {
    store: Arc<dyn BundleStore>,
    cache: ResolutionCache,
    log: EventLog,
}

impl std::fmt::Debug for CrosswalkResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrosswalkResolver")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl CrosswalkResolver {
    pub fn new(store: Arc<dyn BundleStore>, log: EventLog) -> Self {
        Self {
            store,
            cache: ResolutionCache::new(),
            log,
        }
    }

    pub fn cache(&self) -> &ResolutionCache {
        &self.cache
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    /// Resolve `source` against the bundle named by `target`, reusing a cached
    /// plan for the same `(source, target, spec)` when there is one.
    pub fn resolve(
        &self,
        source: &Arc<Bundle>,
        target: &str,
        spec: &LinkageSpec,
    ) -> Result<Arc<CrosswalkPlan>, LinkError> {
        let target = self.target(target)?;
        let key: ResolutionKey = (
            source.digest().clone(),
            target.digest().clone(),
            spec.spec_hash(),
        );
        let cached = self
            .cache
            .get_or_resolve(key, || self.resolve_logged(source, &target, spec));
        if !cached.computed {
            debug!(
                source = %source.digest().short(),
                target = %target.digest().short(),
                "crosswalk plan served from cache"
            );
        }
        cached.outcome
    }

    /// Resolve without consulting or filling the cache.
    pub fn resolve_uncached(
        &self,
        source: &Arc<Bundle>,
        target: &str,
        spec: &LinkageSpec,
    ) -> Result<Arc<CrosswalkPlan>, LinkError> {
        let target = self.target(target)?;
        self.resolve_logged(source, &target, spec)
    }

    fn target(&self, reference: &str) -> Result<Arc<Bundle>, LinkError> {
        self.store
            .lookup(reference)
            .ok_or_else(|| LinkError::TargetBundleUnknown {
                reference: reference.to_string(),
            })
    }

    fn resolve_logged(
        &self,
        source: &Arc<Bundle>,
        target: &Arc<Bundle>,
        spec: &LinkageSpec,
    ) -> Result<Arc<CrosswalkPlan>, LinkError> {
        let span = info_span!(
            "resolve",
            source = %source.digest().short(),
            target = %target.digest().short()
        );
        let _guard = span.enter();

        let plan = match resolve_plan_in(self.store.as_ref(), source, target, spec) {
            Ok(plan) => plan,
            Err(error) => {
                warn!(%error, "resolution failed");
                return Err(error);
            }
        };
        let coverage = plan.coverage();
        self.log.append(
            Event::draft(EventPayload::LinkResolved {
                spec_hash: plan.spec_hash().clone(),
                mapped: plan.mapped().into_iter().map(str::to_string).collect(),
                unmapped: plan.unmapped().into_iter().map(str::to_string).collect(),
                from_spec: coverage.from_spec,
                from_overlay: coverage.from_overlay,
                from_table: coverage.from_table,
                implicit: coverage.implicit,
            })
            .bundle(source.digest())
            .bundle(target.digest()),
        );
        info!(
            mapped = coverage.mapped,
            unmapped = coverage.unmapped,
            "crosswalk resolved"
        );
        Ok(Arc::new(plan))
    }
}

fn names_bundle(bundle: &Bundle, reference: &str) -> bool {
    bundle.answers_to(reference) || bundle.alias() == Some(reference)
}

fn validate_directive(
    target: &str,
    directive: &TransformDirective,
    source_cb: &CaptureBase,
) -> Result<ResolvedDirective, LinkError> {
    let sources = directive.source_attributes();
    if sources.is_empty() {
        return Err(LinkError::NoSourceAttributes {
            target: target.to_string(),
        });
    }
    if let Some(missing) = sources.iter().find(|name| !source_cb.contains(name)) {
        return Err(LinkError::missing(Side::Source, *missing));
    }
    let owned = || -> Vec<String> { sources.iter().map(ToString::to_string).collect() };
    Ok(match directive {
        TransformDirective::Identity(source) => ResolvedDirective::Identity {
            source: source.clone(),
        },
        TransformDirective::Rename(source) => ResolvedDirective::Rename {
            source: source.clone(),
        },
        TransformDirective::Aggregate { op, .. } => ResolvedDirective::Aggregate {
            op: AggregateOp::parse(op).ok_or_else(|| LinkError::OperatorUnsupported {
                target: target.to_string(),
                op: op.clone(),
            })?,
            sources: owned(),
        },
        TransformDirective::Combine { combinator, .. } => ResolvedDirective::Combine {
            combinator: Combinator::parse(combinator).ok_or_else(|| {
                LinkError::CombinatorUnsupported {
                    target: target.to_string(),
                    combinator: combinator.clone(),
                }
            })?,
            sources: owned(),
        },
    })
}

/// Normalize published attribute pairs to `target <- sources`.
///
/// An entry is read as target-to-source when its key is a target attribute
/// and every value is a source attribute, and as source-to-target when the
/// reverse holds for a single value. Several source attributes pointing at the
/// same target form one many-to-one entry. Entries matching neither way are
/// skipped.
fn orient<'a>(
    pairs: impl Iterator<Item = (&'a str, Vec<&'a str>)>,
    source_cb: &CaptureBase,
    target_cb: &CaptureBase,
) -> Vec<(String, Vec<String>)> {
    let mut forward: Vec<(String, Vec<String>)> = Vec::new();
    let mut reversed: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (key, values) in pairs {
        if values.is_empty() {
            continue;
        }
        if target_cb.contains(key) && values.iter().all(|value| source_cb.contains(value)) {
            forward.push((key.to_string(), values.iter().map(ToString::to_string).collect()));
        } else if let [value] = values.as_slice()
            && source_cb.contains(key)
            && target_cb.contains(value)
        {
            reversed
                .entry(value.to_string())
                .or_default()
                .push(key.to_string());
        } else {
            warn!(entry = key, "published mapping entry matches neither bundle");
        }
    }
    forward.extend(reversed);
    forward
}

/// Directive for a published `target <- sources` entry: a copy for one
/// source, otherwise a sum into numeric targets and a space join into others.
fn published_directive(
    target: &str,
    sources: Vec<String>,
    target_cb: &CaptureBase,
) -> ResolvedDirective {
    match <[String; 1]>::try_from(sources) {
        Ok([source]) if source == target => ResolvedDirective::Identity { source },
        Ok([source]) => ResolvedDirective::Rename { source },
        Err(sources) => {
            if target_cb
                .attribute_type(target)
                .is_some_and(|ty| ty.is_numeric())
            {
                ResolvedDirective::Aggregate {
                    op: AggregateOp::Sum,
                    sources,
                }
            } else {
                ResolvedDirective::Combine {
                    combinator: Combinator::JoinSpace,
                    sources,
                }
            }
        }
    }
}

fn coercion_for(
    directive: &ResolvedDirective,
    source_cb: &CaptureBase,
    target_type: AttributeType,
) -> Coercion {
    let first_source = directive
        .sources()
        .first()
        .and_then(|name| source_cb.attribute_type(name))
        .unwrap_or(AttributeType::Text);
    let derived = match directive {
        ResolvedDirective::Identity { .. } | ResolvedDirective::Rename { .. } => first_source,
        ResolvedDirective::Aggregate { op, .. } => op.output_type(first_source),
        ResolvedDirective::Combine { combinator, .. } => combinator.output_type(first_source),
        ResolvedDirective::Unmapped => return Coercion::Fill { to: target_type },
    };
    Coercion::between(derived, target_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capture_base(attributes: &[(&str, AttributeType)]) -> CaptureBase {
        CaptureBase::new(attributes.iter().copied())
    }

    #[test]
    fn orientation_is_detected_per_entry() {
        let source = capture_base(&[
            ("name", AttributeType::Text),
            ("surname", AttributeType::Text),
            ("hgt", AttributeType::Numeric),
        ]);
        let target = capture_base(&[
            ("full_name", AttributeType::Text),
            ("height", AttributeType::Numeric),
        ]);
        let pairs = vec![
            ("name", vec!["full_name"]),
            ("surname", vec!["full_name"]),
            ("height", vec!["hgt"]),
            ("bogus", vec!["nothing"]),
        ];
        let oriented = orient(pairs.into_iter(), &source, &target);
        assert_eq!(
            oriented,
            vec![
                ("height".to_string(), vec!["hgt".to_string()]),
                (
                    "full_name".to_string(),
                    vec!["name".to_string(), "surname".to_string()]
                ),
            ]
        );
    }

    #[test]
    fn many_to_one_follows_target_type() {
        let target = capture_base(&[
            ("full_name", AttributeType::Text),
            ("total", AttributeType::Numeric),
        ]);
        let sources = vec!["a".to_string(), "b".to_string()];
        assert!(matches!(
            published_directive("total", sources.clone(), &target),
            ResolvedDirective::Aggregate {
                op: AggregateOp::Sum,
                ..
            }
        ));
        assert!(matches!(
            published_directive("full_name", sources, &target),
            ResolvedDirective::Combine {
                combinator: Combinator::JoinSpace,
                ..
            }
        ));
        assert_eq!(
            published_directive("total", vec!["total".to_string()], &target),
            ResolvedDirective::Identity {
                source: "total".to_string()
            }
        );
    }
}
