//! Plan application.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info, info_span, warn};

use m2io_ingest::Dataset;
use m2io_map::{CrosswalkPlan, PlanEntry, ResolvedDirective};
use m2io_model::{
    Event, EventDraft, EventPayload, FailureStage, FillPolicy, Record, TransformOptions, Value,
};

use crate::error::{TransformError, TransformFailure};
use crate::executors::{NotNumeric, derive_value};
use crate::report::TransformReport;

/// A transformed dataset with the report of how it was produced.
#[derive(Debug)]
pub struct TransformOutcome {
    pub dataset: Dataset,
    pub report: TransformReport,
}

/// Apply `plan` to a snapshot of `dataset`.
///
/// # Arguments
///
/// * `dataset` - Source records; must conform to the plan's source bundle
/// * `plan` - Resolved crosswalk to the target bundle
/// * `options` - Fill policy for unmapped target attributes
///
/// # Returns
///
/// A new dataset bound to the target bundle and sharing the source's event
/// log. Records that fail are excluded and logged as `ValidationFailed`; each
/// unmapped attribute gets a `Warning`; a `Transformed` event closes the run.
/// The source dataset is never modified.
pub fn apply(
    dataset: &Dataset,
    plan: &CrosswalkPlan,
    options: &TransformOptions,
) -> Result<TransformOutcome, TransformError> {
    if plan.source_digest() != dataset.bundle().digest() {
        return Err(TransformError::SourceMismatch {
            plan: plan.source_digest().clone(),
            dataset: dataset.bundle().digest().clone(),
        });
    }

    let span = info_span!(
        "apply",
        dataset = %dataset.id(),
        source = %plan.source_digest().short(),
        target = %plan.target_digest().short()
    );
    let _guard = span.enter();

    let snapshot = dataset.snapshot();
    let mandatory: BTreeSet<&str> = plan.target().mandatory_attributes();

    let mut records = Vec::with_capacity(snapshot.len());
    let mut failures = Vec::new();
    for (index, record) in snapshot.iter().enumerate() {
        match transform_record(index + 1, record, plan, options, &mandatory) {
            Ok(transformed) => records.push(transformed),
            Err(failure) => {
                warn!(
                    record = failure.record(),
                    target = failure.target(),
                    reason = ?failure.reason(),
                    "record not transformed"
                );
                failures.push(failure);
            }
        }
    }

    let names = |keep: fn(&ResolvedDirective) -> bool| -> Vec<String> {
        plan.entries()
            .iter()
            .filter(|entry| keep(&entry.directive))
            .map(|entry| entry.target.clone())
            .collect()
    };
    let report = TransformReport {
        attempted: snapshot.len(),
        succeeded: records.len(),
        failed: failures.len(),
        failures,
        mapped: names(ResolvedDirective::is_mapped),
        unmapped: names(|directive| !directive.is_mapped()),
        aggregated: names(|directive| matches!(directive, ResolvedDirective::Aggregate { .. })),
        combined: names(|directive| matches!(directive, ResolvedDirective::Combine { .. })),
    };

    let target = Dataset::from_records(Arc::clone(plan.target()), records, dataset.log().clone());
    let draft = |payload: EventPayload| -> EventDraft {
        Event::draft(payload)
            .bundle(plan.source_digest())
            .bundle(plan.target_digest())
            .dataset(dataset.id())
            .dataset(target.id())
    };

    let mut drafts: Vec<EventDraft> = report
        .failures
        .iter()
        .map(|failure| {
            draft(EventPayload::ValidationFailed {
                stage: FailureStage::Transform,
                row: failure.record(),
                reason: failure.reason(),
                attribute: Some(failure.target().to_string()),
                message: failure.to_string(),
            })
        })
        .collect();
    for entry in plan.entries().iter().filter(|e| !e.directive.is_mapped()) {
        let required = mandatory.contains(entry.target.as_str());
        warn!(target = %entry.target, required, "target attribute unmapped");
        drafts.push(draft(EventPayload::Warning {
            attribute: Some(entry.target.clone()),
            message: format!(
                "no source for {}{}; filled with {}",
                entry.target,
                if required { " (required)" } else { "" },
                fill_description(options.unmapped, entry)
            ),
        }));
    }
    drafts.push(draft(EventPayload::Transformed {
        attempted: report.attempted,
        succeeded: report.succeeded,
        failed: report.failed,
        mapped: report.mapped.clone(),
        unmapped: report.unmapped.clone(),
        aggregated: report.aggregated.clone(),
        combined: report.combined.clone(),
    }));
    dataset.log().append_batch(drafts);

    info!(
        attempted = report.attempted,
        succeeded = report.succeeded,
        failed = report.failed,
        "plan applied"
    );
    Ok(TransformOutcome {
        dataset: target,
        report,
    })
}

fn transform_record(
    number: usize,
    record: &Record,
    plan: &CrosswalkPlan,
    options: &TransformOptions,
    mandatory: &BTreeSet<&str>,
) -> Result<Record, TransformFailure> {
    let mut out = Record::new();
    for entry in plan.entries() {
        // Unmapped targets are filled, never failed, even when mandatory.
        if matches!(entry.directive, ResolvedDirective::Unmapped) {
            out.insert(entry.target.clone(), fill(options.unmapped, entry));
            continue;
        }
        let value = derive_value(&entry.directive, record)
            .map_err(|NotNumeric { attribute, op }| TransformFailure::NonNumeric {
                record: number,
                target: entry.target.clone(),
                attribute: attribute.to_string(),
                op,
            })?
            .coerce(entry.target_type)
            .map_err(|source| TransformFailure::TypeMismatch {
                record: number,
                target: entry.target.clone(),
                source,
            })?;
        if value.is_null() && mandatory.contains(entry.target.as_str()) {
            return Err(TransformFailure::MissingRequired {
                record: number,
                target: entry.target.clone(),
            });
        }
        out.insert(entry.target.clone(), value);
    }
    debug!(record = number, attributes = out.len(), "record transformed");
    Ok(out)
}

fn fill(policy: FillPolicy, entry: &PlanEntry) -> Value {
    match policy {
        FillPolicy::Null => Value::Null,
        FillPolicy::TypeDefault => entry.target_type.default_value(),
    }
}

fn fill_description(policy: FillPolicy, entry: &PlanEntry) -> String {
    match fill(policy, entry) {
        Value::Null => "null".to_string(),
        Value::Text(_) => "empty text".to_string(),
        value => value.render(),
    }
}
