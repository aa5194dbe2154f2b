use std::path::PathBuf;

use serde_json::json;

use m2io_core::{
    ConfigError, CsvTable, EventKind, LinkageSpec, Session, SessionConfig, SessionError,
    TransformDirective, Value,
};
use m2io_map::LinkError;
use m2io_model::{Event, EventPayload};

fn mockdata(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../mockdata")
        .join(path)
}

fn configured_session() -> Session {
    let config = SessionConfig::load(&mockdata("standards.toml")).expect("load config");
    Session::with_config(config).expect("session")
}

fn summary_spec() -> LinkageSpec {
    LinkageSpec::new()
        .with(
            "full_name",
            TransformDirective::combine(["first_name", "last_name"], "join_space"),
        )
        .with("height", TransformDirective::rename("hgt"))
        .with("weight", TransformDirective::rename("wgt"))
}

fn standard2_to_standard1() -> LinkageSpec {
    LinkageSpec::new()
        .with("first_name", TransformDirective::rename("name"))
        .with("last_name", TransformDirective::rename("surname"))
        .with("hgt", TransformDirective::rename("height"))
        .with("wgt", TransformDirective::rename("weight"))
}

fn trail_line(event: &Event) -> String {
    let detail = match &event.payload {
        EventPayload::BundleLoaded { alias, .. } => alias
            .as_ref()
            .map(|alias| format!(" alias={alias}"))
            .unwrap_or_default(),
        EventPayload::Ingest {
            accepted, rejected, ..
        } => format!(" accepted={accepted} rejected={rejected}"),
        EventPayload::ValidationFailed {
            stage,
            row,
            reason,
            attribute,
            ..
        } => format!(
            " {stage:?} row={row} {reason:?} {}",
            attribute.as_deref().unwrap_or("-")
        ),
        EventPayload::LinkResolved {
            mapped, unmapped, ..
        } => format!(
            " mapped={} unmapped={}",
            mapped.join(","),
            unmapped.join(",")
        ),
        EventPayload::Transformed {
            attempted,
            succeeded,
            failed,
            ..
        } => format!(" attempted={attempted} succeeded={succeeded} failed={failed}"),
        EventPayload::Warning { attribute, .. } => {
            format!(" {}", attribute.as_deref().unwrap_or("-"))
        }
    };
    format!("{} {}{}", event.seq, event.kind().as_str(), detail)
}

#[test]
fn patients_flow_into_the_summary_shape() {
    let session = configured_session();
    session
        .load_bundle_file(&mockdata("bundles/standard1.json"))
        .expect("standard1");
    let summary = session
        .load_bundle_file(&mockdata("bundles/patient_summary.json"))
        .expect("summary");
    assert_eq!(summary.name(), Some("Patient Summary"));

    let dataset = session.dataset("Standard1@1.0").expect("dataset");
    let table = CsvTable::from_path(&mockdata("patients_standard1.csv")).expect("csv");
    let report = dataset.feed(&table).expect("feed");
    assert_eq!((report.accepted, report.rejected), (3, 1));

    let outcome = session
        .transform(&dataset, "PatientSummary@1.0", &summary_spec())
        .expect("transform");
    assert_eq!(outcome.report.succeeded, 3);
    assert_eq!(outcome.report.unmapped, vec!["country"]);

    let records = outcome.dataset.snapshot();
    assert_eq!(
        serde_json::to_value(&records[0]).expect("json"),
        json!({"country": "", "full_name": "Ann Lee", "height": 165, "weight": 60})
    );
    assert_eq!(records[1].value("weight"), &Value::Float(82.5));
    assert_eq!(records[2].value("full_name"), &Value::from("Cleo"));

    let trail: Vec<String> = session.log().events().iter().map(trail_line).collect();
    insta::assert_snapshot!(trail.join("\n"), @r"
    0 BundleLoaded
    1 BundleLoaded alias=PatientSummary@1.0
    2 ValidationFailed Ingest row=4 TypeMismatch hgt
    3 Ingest accepted=3 rejected=1
    4 LinkResolved mapped=full_name,height,weight unmapped=country
    5 Warning country
    6 Transformed attempted=3 succeeded=3 failed=0
    ");
}

#[test]
fn published_link_drives_later_transforms() {
    let session = configured_session();
    let standard1 = session
        .load_bundle_file(&mockdata("bundles/standard1.json"))
        .expect("standard1");
    let standard2 = session
        .load_bundle_file(&mockdata("bundles/standard2.json"))
        .expect("standard2");

    let published = session
        .publish_link("Standard2@1.0", "Standard1@1.0", &standard2_to_standard1())
        .expect("publish");
    assert_ne!(published.digest(), standard2.digest());
    assert_eq!(standard2.links().count(), 0);
    let link = published.links().next().expect("link overlay");
    assert_eq!(link.target_bundle, standard1.digest().as_str());
    assert_eq!(session.log().count(EventKind::BundleLoaded), 3);

    let dataset = session
        .dataset(published.digest().as_str())
        .expect("dataset");
    let table = CsvTable::from_path(&mockdata("patients_standard2.csv")).expect("csv");
    dataset.feed(&table).expect("feed");

    let outcome = session
        .transform(&dataset, "Standard1@1.0", &LinkageSpec::new())
        .expect("transform");
    assert!(outcome.report.is_clean());
    assert_eq!(outcome.report.succeeded, 4);
    let first = &outcome.dataset.snapshot()[0];
    assert_eq!(first.value("first_name"), &Value::from("Ann"));
    assert_eq!(first.value("hgt"), &Value::Integer(165));
}

#[test]
fn unpublishable_directives_are_refused() {
    let session = configured_session();
    session
        .load_bundle_file(&mockdata("bundles/standard1.json"))
        .expect("standard1");
    session
        .load_bundle_file(&mockdata("bundles/standard2.json"))
        .expect("standard2");
    let spec = standard2_to_standard1().with(
        "first_name",
        TransformDirective::combine(["name", "surname"], "join_comma"),
    );
    let err = session
        .publish_link("Standard2@1.0", "Standard1@1.0", &spec)
        .unwrap_err();
    assert!(matches!(
        err,
        SessionError::Link(LinkError::Unpublishable { .. })
    ));
    assert_eq!(session.log().count(EventKind::BundleLoaded), 2);
}

#[test]
fn resolution_cache_follows_config() {
    for (cached, expected) in [(true, 1), (false, 2)] {
        let session =
            Session::with_config(SessionConfig::new().with_resolution_cache(cached)).expect("session");
        let standard1 = session
            .load_bundle_file(&mockdata("bundles/standard1.json"))
            .expect("standard1");
        session
            .load_bundle_file(&mockdata("bundles/patient_summary.json"))
            .expect("summary");
        for _ in 0..2 {
            session
                .resolve(standard1.digest().as_str(), "PatientSummary@1.0", &summary_spec())
                .expect("resolve");
        }
        assert_eq!(session.log().count(EventKind::LinkResolved), expected);
    }
}

#[test]
fn unknown_references_fail_cleanly() {
    let session = configured_session();
    assert!(matches!(
        session.dataset("Standard1@1.0"),
        Err(SessionError::UnknownBundle { .. })
    ));
    let standard1 = session
        .load_bundle_file(&mockdata("bundles/standard1.json"))
        .expect("standard1");
    let dataset = session
        .dataset(standard1.digest().as_str())
        .expect("dataset");
    assert!(matches!(
        session.transform(&dataset, "Standard9@1.0", &LinkageSpec::new()),
        Err(SessionError::Link(LinkError::TargetBundleUnknown { .. }))
    ));
    assert!(matches!(
        session.load_bundle(r#"{"overlays": {}}"#),
        Err(SessionError::Bundle(_))
    ));
}

#[test]
fn config_errors_name_their_source() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("session.toml");
    std::fs::write(&path, "use_resolution_cache = \"often\"\n").expect("write");
    let err = SessionConfig::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Toml { .. }));
    assert!(err.to_string().contains("session.toml"));

    let missing = SessionConfig::load(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(missing, ConfigError::Io { .. }));

    let bad_standard = SessionConfig::new().with_standard("Standard1@1.0", "not a digest");
    assert!(matches!(
        Session::with_config(bad_standard),
        Err(SessionError::Config(ConfigError::InvalidStandard { .. }))
    ));
}

#[test]
fn log_exports_as_json() {
    let session = configured_session();
    session
        .load_bundle_file(&mockdata("bundles/standard2.json"))
        .expect("standard2");
    let exported: serde_json::Value =
        serde_json::from_str(&session.log().to_json().expect("export")).expect("parse");
    assert!(exported["system"]["engine_version"].is_string());
    assert_eq!(exported["events"][0]["kind"], "BundleLoaded");
    assert_eq!(exported["events"][0]["seq"], 0);
}
