//! Crosswalk plan execution.
//!
//! - **engine**: [`apply`] runs a plan over a dataset snapshot
//! - **executors**: per-directive derivation (aggregates and combinators)
//! - **report**: counts and coverage returned to the caller

pub mod engine;
pub mod error;
mod executors;
pub mod report;

pub use engine::{TransformOutcome, apply};
pub use error::{TransformError, TransformFailure};
pub use report::TransformReport;
