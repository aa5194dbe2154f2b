//! Crosswalks between bundles.
//!
//! A [`LinkageSpec`] declares how target attributes derive from source
//! attributes. The resolver validates it against both capture bases, merges
//! it with crosswalks already published on the source bundle and produces a
//! [`CrosswalkPlan`] covering every target attribute.

pub mod cache;
pub mod error;
pub mod linkage;
pub mod operators;
pub mod plan;
pub mod publish;
pub mod resolver;

pub use cache::{Cached, ResolutionCache, ResolutionKey};
pub use error::{LinkError, Side};
pub use linkage::{LinkageSpec, TransformDirective};
pub use operators::{AggregateOp, Combinator};
pub use plan::{
    Coercion, CrosswalkPlan, DirectiveOrigin, PlanCoverage, PlanEntry, ResolvedDirective,
};
pub use publish::link_overlay;
pub use resolver::{CrosswalkResolver, resolve_plan, resolve_plan_in};
