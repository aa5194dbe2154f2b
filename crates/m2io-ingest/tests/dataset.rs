use std::path::PathBuf;
use std::sync::Arc;

use m2io_bundle::Bundle;
use m2io_ingest::{CsvTable, Dataset, FeedError, IngestError, Table, infer_bundle};
use m2io_model::{
    EventKind, EventPayload, EventQuery, FailureReason, IngestOptions, UnknownAttributePolicy,
    Value,
};

fn mockdata(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../mockdata")
        .join(path)
}

fn standard2() -> Arc<Bundle> {
    let raw = std::fs::read_to_string(mockdata("bundles/standard2.json")).expect("read bundle");
    Arc::new(Bundle::parse(&raw).expect("parse bundle"))
}

fn patient(name: &str, surname: &str, height: i64, weight: i64, bmi: Value) -> Vec<Value> {
    vec![
        Value::from(name),
        Value::from(surname),
        Value::Integer(height),
        Value::Integer(weight),
        bmi,
    ]
}

fn patients_with_stray_column() -> Table {
    Table::new(["name", "surname", "height", "weight", "bmi"])
        .with_row(patient("Ann", "Lee", 165, 60, Value::Null))
        .with_row(patient("Bob", "Stone", 180, 82, Value::Null))
        .with_row(patient("Cleo", "Park", 171, 64, Value::Float(21.9)))
        .with_row(patient("Dan", "Ruiz", 175, 77, Value::Null))
        .with_row(patient("Eve", "Moss", 158, 51, Value::Null))
}

#[test]
fn one_unknown_attribute_rejects_one_row() {
    let dataset = Dataset::new(standard2());
    let report = dataset
        .feed(&patients_with_stray_column())
        .expect("feed batch");

    assert_eq!(report.accepted, 4);
    assert_eq!(report.rejected, 1);
    assert_eq!(report.failures[0].row, 3);
    assert_eq!(
        report.failures[0].error,
        IngestError::UnknownAttribute {
            column: "bmi".to_string()
        }
    );
    assert_eq!(dataset.len(), 4);

    let failures = dataset
        .log()
        .query(&EventQuery::new().kind(EventKind::ValidationFailed));
    assert_eq!(failures.len(), 1);
    assert!(matches!(
        failures[0].payload,
        EventPayload::ValidationFailed {
            reason: FailureReason::UnknownAttribute,
            row: 3,
            ..
        }
    ));
    assert!(failures[0].references_dataset(dataset.id()));
    assert!(failures[0].references_bundle(dataset.bundle().digest()));
}

#[test]
fn drop_policy_keeps_rows_with_unknown_columns() {
    let dataset = Dataset::new(standard2())
        .with_options(IngestOptions::new().with_unknown_attributes(UnknownAttributePolicy::Drop));
    let report = dataset
        .feed(&patients_with_stray_column())
        .expect("feed batch");
    assert_eq!(report.accepted, 5);
    assert!(dataset.snapshot().iter().all(|record| !record.contains("bmi")));
}

#[test]
fn empty_and_fully_invalid_batches_succeed_with_zero() {
    let dataset = Dataset::new(standard2());
    let empty = dataset
        .feed(&Table::new(["name", "height"]))
        .expect("empty batch");
    assert_eq!(empty.accepted, 0);
    assert_eq!(empty.rejected, 0);

    let invalid = Table::new(["name", "height"])
        .with_row(["Ann", "tall"])
        .with_row(["Bob", "short"]);
    let report = dataset.feed(&invalid).expect("invalid batch");
    assert_eq!(report.accepted, 0);
    assert_eq!(report.rejected, 2);
    assert!(dataset.is_empty());
    assert_eq!(dataset.log().count(EventKind::ValidationFailed), 2);
    assert_eq!(dataset.log().count(EventKind::Ingest), 2);
}

#[test]
fn duplicate_columns_abort_without_state_change() {
    let dataset = Dataset::new(standard2());
    let table = Table::new(["name", "name"]).with_row(["Ann", "Ann"]);
    let err = dataset.feed(&table).expect_err("duplicate column");
    assert_eq!(
        err,
        FeedError::DuplicateColumn {
            column: "name".to_string()
        }
    );
    assert!(dataset.is_empty());
    assert!(dataset.log().is_empty());
}

#[test]
fn csv_batch_from_disk() {
    let table = CsvTable::from_path(&mockdata("patients_standard2.csv")).expect("read csv");
    let dataset = Dataset::new(standard2());
    let report = dataset.feed(&table).expect("feed csv");

    assert_eq!(report.accepted, 4);
    assert_eq!(report.rejected, 1);
    assert_eq!(report.failures[0].error.reason(), FailureReason::TypeMismatch);
    assert_eq!(report.failures[0].error.attribute(), "height");

    let records = dataset.snapshot();
    assert_eq!(records[0].value("height"), &Value::Integer(165));
    assert_eq!(records[1].value("weight"), &Value::Float(82.5));
    assert!(records[2].value("weight").is_null());
}

#[test]
fn csv_path_errors_carry_context() {
    let dir = tempfile::tempdir().expect("temp dir");
    let missing = dir.path().join("absent.csv");
    let err = CsvTable::from_path(&missing).expect_err("missing file");
    assert!(format!("{err:#}").contains("absent.csv"));

    let path = dir.path().join("batch.csv");
    std::fs::write(&path, "name,height\nAnn,165\n").expect("write csv");
    let table = CsvTable::from_path(&path).expect("read csv");
    assert_eq!(table.headers, vec!["name", "height"]);
}

#[test]
fn concurrent_feeds_never_interleave_events() {
    let dataset = Dataset::new(standard2());
    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                let batch = Table::new(["name", "height"])
                    .with_row(["Ann", "165"])
                    .with_row(["Bob", "tall"])
                    .with_row(["Cleo", "?"]);
                dataset.feed(&batch).expect("feed");
            });
        }
    });

    assert_eq!(dataset.len(), 4);
    let kinds: Vec<EventKind> = dataset.log().events().iter().map(|e| e.kind()).collect();
    assert_eq!(kinds.len(), 12);
    for batch in kinds.chunks(3) {
        assert_eq!(
            batch,
            [
                EventKind::ValidationFailed,
                EventKind::ValidationFailed,
                EventKind::Ingest
            ]
        );
    }
}

#[test]
fn snapshots_are_stable_while_feeding() {
    let dataset = Dataset::new(standard2());
    dataset
        .feed(&Table::new(["name"]).with_row(["Ann"]))
        .expect("feed");
    let before = dataset.snapshot();
    dataset
        .feed(&Table::new(["name"]).with_row(["Bob"]))
        .expect("feed");
    assert_eq!(before.len(), 1);
    assert_eq!(dataset.snapshot().len(), 2);
}

#[test]
fn records_export_to_a_frame() {
    let dataset = Dataset::new(standard2());
    dataset
        .feed(&patients_with_stray_column())
        .expect("feed batch");
    let frame = dataset.to_dataframe().expect("frame");
    assert_eq!(frame.height(), 4);
    assert_eq!(frame.width(), 4);
}

#[test]
fn inferred_bundle_accepts_its_own_sample() {
    let table = CsvTable::from_path(&mockdata("patients_standard2.csv")).expect("read csv");
    let bundle = infer_bundle(&table).expect("infer");
    let cb = bundle.capture_base();
    assert_eq!(
        cb.attribute_type("weight"),
        Some(m2io_model::AttributeType::Numeric)
    );
    assert_eq!(
        cb.attribute_type("height"),
        Some(m2io_model::AttributeType::Text)
    );

    let dataset = Dataset::new(bundle);
    let report = dataset.feed(&table).expect("feed");
    assert_eq!(report.rejected, 0);
}
