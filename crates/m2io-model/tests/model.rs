use m2io_model::{
    AttributeType, DatasetId, Digest, Event, EventKind, EventLog, EventPayload, EventQuery,
    FailureReason, FailureStage, FillPolicy, IngestOptions, Record, TransformOptions,
    UnknownAttributePolicy, Value,
};

#[test]
fn ingest_options_deserialize_with_defaults() {
    let options: IngestOptions =
        serde_json::from_str(r#"{"aliases": {"Height (cm)": "hgt"}}"#).expect("options");
    assert_eq!(options.unknown_attributes, UnknownAttributePolicy::Reject);
    assert_eq!(options.missing_values, FillPolicy::Null);
    assert_eq!(options.aliases.get("Height (cm)").map(String::as_str), Some("hgt"));

    let built = IngestOptions::new()
        .with_unknown_attributes(UnknownAttributePolicy::Drop)
        .with_alias("Height (cm)", "hgt");
    assert_eq!(built.unknown_attributes, UnknownAttributePolicy::Drop);
}

#[test]
fn transform_options_default_to_type_defaults() {
    assert_eq!(TransformOptions::default().unmapped, FillPolicy::TypeDefault);
    let options: TransformOptions = serde_json::from_str(r#"{"unmapped": "null"}"#).expect("options");
    assert_eq!(options.unmapped, FillPolicy::Null);
}

#[test]
fn coercion_round_trip_is_stable_for_every_datatype() {
    let samples = [
        (AttributeType::Text, Value::from("Ann")),
        (AttributeType::Numeric, Value::from("165")),
        (AttributeType::Numeric, Value::from("60.5")),
        (AttributeType::Boolean, Value::from("yes")),
        (AttributeType::DateTime, Value::from("2024-03-01 08:30:00")),
        (AttributeType::Binary, Value::from("AAEC")),
    ];
    for (ty, raw) in samples {
        let once = raw.coerce(ty).expect("first coercion");
        let twice = once.coerce(ty).expect("second coercion");
        assert_eq!(once, twice, "{ty} coercion should be idempotent");
    }
}

#[test]
fn records_collect_typed_values() {
    let record: Record = [
        ("first_name", Value::from("Ann")),
        ("hgt", Value::Integer(165)),
        ("smoker", Value::Null),
    ]
    .into_iter()
    .collect();
    assert_eq!(record.len(), 3);
    assert_eq!(
        record.attributes().collect::<Vec<_>>(),
        vec!["first_name", "hgt", "smoker"]
    );
    assert!(record.value("smoker").is_null());
}

#[test]
fn validation_failures_are_queryable_per_dataset() {
    let log = EventLog::new();
    let bundle = Digest::new("EBA3iXoZRgnJzu9L1OwR0Ke8bcTQ4B8IeJYFatiXMfh7").expect("digest");
    let first = DatasetId::new();
    let second = DatasetId::new();

    for (dataset, row) in [(first, 2), (second, 1), (first, 5)] {
        log.append(
            Event::draft(EventPayload::ValidationFailed {
                stage: FailureStage::Ingest,
                row,
                reason: FailureReason::UnknownAttribute,
                attribute: Some("bmi".to_string()),
                message: "column bmi matches no attribute".to_string(),
            })
            .bundle(&bundle)
            .dataset(dataset),
        );
    }

    let hits = log.query(
        &EventQuery::new()
            .kind(EventKind::ValidationFailed)
            .dataset(first),
    );
    let rows: Vec<usize> = hits
        .iter()
        .map(|event| match &event.payload {
            EventPayload::ValidationFailed { row, .. } => *row,
            _ => 0,
        })
        .collect();
    assert_eq!(rows, vec![2, 5]);
    assert_eq!(log.query(&EventQuery::new().bundle(bundle)).len(), 3);
}

#[test]
fn concurrent_appends_keep_dense_sequence_numbers() {
    let log = EventLog::new();
    std::thread::scope(|scope| {
        for _ in 0..4 {
            let log = log.clone();
            scope.spawn(move || {
                for _ in 0..25 {
                    log.append(Event::draft(EventPayload::Warning {
                        attribute: None,
                        message: "tick".to_string(),
                    }));
                }
            });
        }
    });
    let seqs: Vec<u64> = log.events().iter().map(|event| event.seq).collect();
    assert_eq!(seqs, (0..100).collect::<Vec<u64>>());
}
