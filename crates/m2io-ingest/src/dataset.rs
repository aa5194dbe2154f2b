//! Datasets: records bound to the bundle they conform to.

use std::collections::BTreeSet;
use std::sync::{Arc, PoisonError, RwLock};

use polars::prelude::{DataFrame, PolarsResult};
use tracing::{info, info_span, warn};

use m2io_bundle::Bundle;
use m2io_model::{
    DatasetId, Event, EventDraft, EventLog, EventPayload, FailureStage, IngestOptions, Record,
};

use crate::error::{FeedError, IngestError};
use crate::frame::records_to_dataframe;
use crate::source::TabularSource;
use crate::validate::RowValidator;

/// One rejected input row.
#[derive(Debug, Clone, PartialEq)]
pub struct RowFailure {
    /// 1-based row number within the batch.
    pub row: usize,
    pub error: IngestError,
}

/// Outcome of one `feed` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedReport {
    pub accepted: usize,
    pub rejected: usize,
    pub failures: Vec<RowFailure>,
}

/// Records conforming to one bundle.
///
/// Records are only ever appended. Rows are validated outside any lock; the
/// append itself takes the dataset's write lock, and a batch's events are
/// logged while it is held so concurrent `feed` calls never interleave.
/// Readers take [`Dataset::snapshot`], which never observes a partially
/// appended batch.
#[derive(Debug)]
pub struct Dataset {
    id: DatasetId,
    bundle: Arc<Bundle>,
    records: RwLock<Arc<Vec<Record>>>,
    log: EventLog,
    options: IngestOptions,
}

impl Dataset {
    /// An empty dataset with its own event log.
    pub fn new(bundle: impl Into<Arc<Bundle>>) -> Self {
        Self::with_log(bundle, EventLog::new())
    }

    /// An empty dataset appending to a shared event log.
    pub fn with_log(bundle: impl Into<Arc<Bundle>>, log: EventLog) -> Self {
        Self {
            id: DatasetId::new(),
            bundle: bundle.into(),
            records: RwLock::new(Arc::new(Vec::new())),
            log,
            options: IngestOptions::default(),
        }
    }

    /// A dataset holding already-validated records, as produced by a transform.
    pub fn from_records(bundle: Arc<Bundle>, records: Vec<Record>, log: EventLog) -> Self {
        let dataset = Self::with_log(bundle, log);
        *dataset
            .records
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(records);
        dataset
    }

    pub fn with_options(mut self, options: IngestOptions) -> Self {
        self.options = options;
        self
    }

    pub fn id(&self) -> DatasetId {
        self.id
    }

    pub fn bundle(&self) -> &Arc<Bundle> {
        &self.bundle
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn options(&self) -> &IngestOptions {
        &self.options
    }

    /// Consistent view of the records appended so far.
    pub fn snapshot(&self) -> Arc<Vec<Record>> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&*records)
    }

    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Export the records as a frame with one column per capture-base attribute.
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        records_to_dataframe(self.bundle.capture_base(), &self.snapshot())
    }

    /// Validate a batch and append the rows that pass.
    ///
    /// Rejected rows are reported and logged as `ValidationFailed` events but
    /// never fail the call; only a structurally unusable source does, and then
    /// nothing is appended.
    pub fn feed(&self, source: &dyn TabularSource) -> Result<FeedReport, FeedError> {
        let span = info_span!(
            "feed",
            dataset = %self.id,
            bundle = %self.bundle.digest().short(),
            rows = source.row_count()
        );
        let _guard = span.enter();

        let columns = source.column_names();
        let validator = RowValidator::new(&self.bundle, &self.options, &columns)?;

        let mut accepted = Vec::with_capacity(source.row_count());
        let mut failures = Vec::new();
        for index in 0..source.row_count() {
            match validator.validate(&source.row(index)) {
                Ok(record) => accepted.push(record),
                Err(error) => {
                    warn!(
                        row = index + 1,
                        reason = ?error.reason(),
                        attribute = error.attribute(),
                        "row rejected"
                    );
                    failures.push(RowFailure {
                        row: index + 1,
                        error,
                    });
                }
            }
        }

        let populated: BTreeSet<String> = accepted
            .iter()
            .flat_map(|record| {
                record
                    .iter()
                    .filter(|(_, value)| !value.is_null())
                    .map(|(name, _)| name.to_string())
            })
            .collect();
        let report = FeedReport {
            accepted: accepted.len(),
            rejected: failures.len(),
            failures,
        };

        let mut drafts: Vec<EventDraft> = report
            .failures
            .iter()
            .map(|failure| {
                self.draft(EventPayload::ValidationFailed {
                    stage: FailureStage::Ingest,
                    row: failure.row,
                    reason: failure.error.reason(),
                    attribute: Some(failure.error.attribute().to_string()),
                    message: failure.error.to_string(),
                })
            })
            .collect();
        drafts.push(self.draft(EventPayload::Ingest {
            accepted: report.accepted,
            rejected: report.rejected,
            attributes: populated.into_iter().collect(),
        }));

        {
            let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
            if !accepted.is_empty() {
                Arc::make_mut(&mut *records).extend(accepted);
            }
            self.log.append_batch(drafts);
        }

        info!(
            accepted = report.accepted,
            rejected = report.rejected,
            "batch ingested"
        );
        Ok(report)
    }

    fn draft(&self, payload: EventPayload) -> EventDraft {
        Event::draft(payload)
            .bundle(self.bundle.digest())
            .dataset(self.id)
    }
}
