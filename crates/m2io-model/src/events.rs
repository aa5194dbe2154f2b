//! Append-only provenance log.
//!
//! Every bundle load, ingestion batch, link resolution and transformation
//! appends to an [`EventLog`]. Events are never edited or removed; the log
//! is the audit trail of every data-shaping decision and can be replayed by
//! reading it in sequence order.
//!
//! # Event kinds
//!
//! - **BundleLoaded**: a bundle entered a session
//! - **Ingest**: one `feed` batch, with accepted/rejected counts
//! - **ValidationFailed**: one rejected row (ingestion) or record (transform)
//! - **LinkResolved**: a crosswalk plan was built
//! - **Transformed**: a plan was applied, with attribute coverage
//! - **Warning**: a non-fatal condition such as an unmapped target attribute

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{DatasetId, Digest};

/// Discriminant of an [`EventPayload`], used for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum EventKind {
    BundleLoaded,
    Ingest,
    ValidationFailed,
    LinkResolved,
    Transformed,
    Warning,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::BundleLoaded => "BundleLoaded",
            EventKind::Ingest => "Ingest",
            EventKind::ValidationFailed => "ValidationFailed",
            EventKind::LinkResolved => "LinkResolved",
            EventKind::Transformed => "Transformed",
            EventKind::Warning => "Warning",
        }
    }
}

/// Where a row or record was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Ingest,
    Transform,
}

/// Reason code of a rejected row or record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FailureReason {
    TypeMismatch,
    UnknownAttribute,
    MissingRequiredAttribute,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum EventPayload {
    BundleLoaded {
        attributes: usize,
        overlays: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        alias: Option<String>,
    },
    Ingest {
        accepted: usize,
        rejected: usize,
        /// Attributes populated by at least one accepted row.
        attributes: Vec<String>,
    },
    ValidationFailed {
        stage: FailureStage,
        /// 1-based row number within the batch (ingest) or dataset (transform).
        row: usize,
        reason: FailureReason,
        #[serde(skip_serializing_if = "Option::is_none")]
        attribute: Option<String>,
        message: String,
    },
    LinkResolved {
        spec_hash: Digest,
        mapped: Vec<String>,
        unmapped: Vec<String>,
        /// Directive count by origin: explicit spec, published overlay,
        /// mapping table, implicit same-name identity.
        from_spec: usize,
        from_overlay: usize,
        from_table: usize,
        implicit: usize,
    },
    Transformed {
        attempted: usize,
        succeeded: usize,
        failed: usize,
        mapped: Vec<String>,
        unmapped: Vec<String>,
        aggregated: Vec<String>,
        combined: Vec<String>,
    },
    Warning {
        #[serde(skip_serializing_if = "Option::is_none")]
        attribute: Option<String>,
        message: String,
    },
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::BundleLoaded { .. } => EventKind::BundleLoaded,
            EventPayload::Ingest { .. } => EventKind::Ingest,
            EventPayload::ValidationFailed { .. } => EventKind::ValidationFailed,
            EventPayload::LinkResolved { .. } => EventKind::LinkResolved,
            EventPayload::Transformed { .. } => EventKind::Transformed,
            EventPayload::Warning { .. } => EventKind::Warning,
        }
    }
}

/// An entry of the log. Sequence number and timestamp are assigned on append.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bundles: Vec<Digest>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub datasets: Vec<DatasetId>,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl Event {
    pub fn draft(payload: EventPayload) -> EventDraft {
        EventDraft {
            bundles: Vec::new(),
            datasets: Vec::new(),
            payload,
        }
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    pub fn references_bundle(&self, digest: &Digest) -> bool {
        self.bundles.contains(digest)
    }

    pub fn references_dataset(&self, id: DatasetId) -> bool {
        self.datasets.contains(&id)
    }
}

/// An event not yet appended.
#[derive(Debug, Clone)]
pub struct EventDraft {
    bundles: Vec<Digest>,
    datasets: Vec<DatasetId>,
    payload: EventPayload,
}

impl EventDraft {
    pub fn bundle(mut self, digest: &Digest) -> Self {
        if !self.bundles.contains(digest) {
            self.bundles.push(digest.clone());
        }
        self
    }

    pub fn dataset(mut self, id: DatasetId) -> Self {
        if !self.datasets.contains(&id) {
            self.datasets.push(id);
        }
        self
    }
}

/// Who and what produced a log, captured once when the log is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemInfo {
    pub user: Option<String>,
    pub engine_version: String,
}

impl SystemInfo {
    pub fn detect() -> Self {
        let user = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .ok()
            .filter(|name| !name.trim().is_empty());
        Self {
            user,
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Filter over the log. Unset fields match everything; time bounds are inclusive.
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    kind: Option<EventKind>,
    since: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
    bundle: Option<Digest>,
    dataset: Option<DatasetId>,
}

impl EventQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: EventKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn since(mut self, time: DateTime<Utc>) -> Self {
        self.since = Some(time);
        self
    }

    pub fn until(mut self, time: DateTime<Utc>) -> Self {
        self.until = Some(time);
        self
    }

    pub fn bundle(mut self, digest: Digest) -> Self {
        self.bundle = Some(digest);
        self
    }

    pub fn dataset(mut self, id: DatasetId) -> Self {
        self.dataset = Some(id);
        self
    }

    pub fn matches(&self, event: &Event) -> bool {
        self.kind.is_none_or(|kind| event.kind() == kind)
            && self.since.is_none_or(|since| event.timestamp >= since)
            && self.until.is_none_or(|until| event.timestamp <= until)
            && self
                .bundle
                .as_ref()
                .is_none_or(|digest| event.references_bundle(digest))
            && self.dataset.is_none_or(|id| event.references_dataset(id))
    }
}

#[derive(Debug)]
struct LogInner {
    system: SystemInfo,
    events: RwLock<Vec<Event>>,
}

/// Shared handle to an append-only event log.
///
/// Cloning the handle shares the log; a session hands the same log to every
/// dataset it creates so their events interleave in one ordered trail.
#[derive(Debug, Clone)]
pub struct EventLog {
    inner: Arc<LogInner>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog {
    pub fn new() -> Self {
        Self::with_system(SystemInfo::detect())
    }

    pub fn with_system(system: SystemInfo) -> Self {
        Self {
            inner: Arc::new(LogInner {
                system,
                events: RwLock::new(Vec::new()),
            }),
        }
    }

    pub fn system(&self) -> &SystemInfo {
        &self.inner.system
    }

    /// Append one event and return its sequence number.
    pub fn append(&self, draft: EventDraft) -> u64 {
        let mut events = self
            .inner
            .events
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        push(&mut events, draft)
    }

    /// Append several events contiguously; no other append interleaves.
    pub fn append_batch(&self, drafts: impl IntoIterator<Item = EventDraft>) {
        let mut events = self
            .inner
            .events
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        for draft in drafts {
            push(&mut events, draft);
        }
    }

    /// Snapshot of all events in sequence order.
    pub fn events(&self) -> Vec<Event> {
        self.inner
            .events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn query(&self, query: &EventQuery) -> Vec<Event> {
        self.inner
            .events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|event| query.matches(event))
            .cloned()
            .collect()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.inner
            .events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|event| event.kind() == kind)
            .count()
    }

    pub fn len(&self) -> usize {
        self.inner
            .events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when both handles share the same underlying log.
    pub fn same_log(&self, other: &EventLog) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// The full log, with system info, as pretty JSON for external reporting.
    pub fn to_json(&self) -> serde_json::Result<String> {
        #[derive(Serialize)]
        struct Export<'a> {
            system: &'a SystemInfo,
            events: Vec<Event>,
        }
        serde_json::to_string_pretty(&Export {
            system: self.system(),
            events: self.events(),
        })
    }
}

fn push(events: &mut Vec<Event>, draft: EventDraft) -> u64 {
    let seq = events.len() as u64;
    events.push(Event {
        seq,
        timestamp: Utc::now(),
        bundles: draft.bundles,
        datasets: draft.datasets,
        payload: draft.payload,
    });
    seq
}

#[cfg(test)]
mod tests {
    use super::*;

    fn warning(message: &str) -> EventDraft {
        Event::draft(EventPayload::Warning {
            attribute: None,
            message: message.to_string(),
        })
    }

    #[test]
    fn sequence_numbers_follow_append_order() {
        let log = EventLog::new();
        assert_eq!(log.append(warning("a")), 0);
        log.append_batch([warning("b"), warning("c")]);
        let seqs: Vec<u64> = log.events().iter().map(|event| event.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
    }

    #[test]
    fn query_filters_by_kind_and_reference() {
        let log = EventLog::new();
        let digest = Digest::new("abc").unwrap();
        let dataset = DatasetId::new();
        log.append(warning("unrelated"));
        log.append(
            Event::draft(EventPayload::Ingest {
                accepted: 2,
                rejected: 0,
                attributes: vec!["hgt".to_string()],
            })
            .bundle(&digest)
            .dataset(dataset),
        );

        assert_eq!(log.query(&EventQuery::new().kind(EventKind::Ingest)).len(), 1);
        assert_eq!(log.query(&EventQuery::new().bundle(digest)).len(), 1);
        assert_eq!(log.query(&EventQuery::new().dataset(dataset)).len(), 1);
        assert_eq!(log.count(EventKind::Warning), 1);
    }

    #[test]
    fn query_time_bounds_are_inclusive() {
        let log = EventLog::new();
        log.append(warning("a"));
        let stamp = log.events()[0].timestamp;
        let hits = log.query(&EventQuery::new().since(stamp).until(stamp));
        assert_eq!(hits.len(), 1);
        let later = stamp + chrono::Duration::seconds(1);
        assert!(log.query(&EventQuery::new().since(later)).is_empty());
    }

    #[test]
    fn clones_share_the_log() {
        let log = EventLog::new();
        let handle = log.clone();
        handle.append(warning("shared"));
        assert_eq!(log.len(), 1);
        assert!(log.same_log(&handle));
        assert!(!log.same_log(&EventLog::new()));
    }

    #[test]
    fn exports_kind_tag() {
        let log = EventLog::with_system(SystemInfo {
            user: Some("analyst".to_string()),
            engine_version: "0.1.0".to_string(),
        });
        log.append(warning("note"));
        let json = log.to_json().unwrap();
        assert!(json.contains(r#""kind": "Warning""#));
        assert!(json.contains(r#""user": "analyst""#));
    }
}
