use covid_stats_core::{
    export_json_file, export_xml_file, import_json_file, read_document, read_xml_file,
    rewrite_xml_file, run_pipeline, xml_to_json_file, ExportError, JsonLayout, MalformedReason,
    PipelineConfig, PipelineError, XmlError,
};
use serde_json::{json, Value};
use std::fs;
use std::path::Path;

const FEED: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<statistics country="Poland" source="GUS" lastUpdate="2021-03-01">
  <year value="2021">
    <month name="January">
      <unemployment national="6.5">
        <gender sex="male">6.2</gender>
        <gender sex="female">6.9</gender>
      </unemployment>
      <deaths total="41000">
        <cause type="COVID-19">9000</cause>
        <cause type="other">32000</cause>
      </deaths>
    </month>
  </year>
  <year value="2020">
    <month name="November">
      <unemployment national="6.1">
        <gender sex="male">5.8</gender>
        <gender sex="female">6.5</gender>
      </unemployment>
      <deaths total="65000">
        <cause type="COVID-19">20000</cause>
        <cause type="other">45000</cause>
      </deaths>
    </month>
    <month name="December">
      <unemployment national="6.2">
        <gender sex="male">5.9</gender>
        <gender sex="female">6.6</gender>
      </unemployment>
      <deaths total="60000">
        <cause type="COVID-19">18000</cause>
        <cause type="other">42000</cause>
      </deaths>
    </month>
  </year>
</statistics>
"#;

fn write_feed(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("raw").join("covid_stats.xml");
    fs::create_dir_all(path.parent().expect("target should have a parent dir"))
        .expect("parent dir should be created");
    fs::write(&path, FEED).expect("file should be written");
    path
}

fn read_json(path: &Path) -> Value {
    let text = fs::read_to_string(path).expect("output file should be readable");
    serde_json::from_str(&text).expect("JSON text should deserialize")
}

#[test]
fn xml_to_json_writes_primary_document() {
    let dir = tempfile::tempdir().expect("temp dir should be created");
    let xml_path = write_feed(dir.path());
    let json_path = dir.path().join("processed").join("covid_stats.json");

    xml_to_json_file(&xml_path, &json_path).expect("xml to json file should succeed");

    let value = read_json(&json_path);
    assert_eq!(value["country"], json!("Poland"));
    assert_eq!(value["source"], json!("GUS"));
    assert_eq!(value["lastUpdate"], json!("2021-03-01"));
    assert_eq!(value["data"][0]["year"], json!(2021));
    assert_eq!(
        value["data"][1]["months"][1],
        json!({
            "name": "December",
            "unemployment": {"national": 6.2, "male": 5.9, "female": 6.6},
            "deaths": {"total": 60000, "COVID-19": 18000, "other": 42000}
        })
    );
}

#[test]
fn json_import_then_xml_export_reproduces_feed_rows() {
    let dir = tempfile::tempdir().expect("temp dir should be created");
    let xml_path = write_feed(dir.path());
    let json_path = dir.path().join("covid_stats.json");
    let db_path = dir.path().join("stats.sqlite3");
    let xml_out = dir.path().join("out").join("exported.xml");

    let source = xml_to_json_file(&xml_path, &json_path).expect("xml to json file should succeed");
    let summary = import_json_file(&db_path, &json_path).expect("import json file should succeed");
    assert_eq!(summary.months_inserted, 3);

    export_xml_file(&db_path, &xml_out).expect("export xml file should succeed");
    let text = fs::read_to_string(&xml_out).expect("output file should be readable");
    let exported = read_document(&text).expect("feed should parse");

    let mut expected = source.to_records();
    expected.sort_by_key(|record| record.year);
    assert_eq!(exported.to_records(), expected);
    assert_eq!(exported.country, None);
}

#[test]
fn rewrite_xml_round_trips_document() {
    let dir = tempfile::tempdir().expect("temp dir should be created");
    let xml_path = write_feed(dir.path());
    let out_path = dir.path().join("processed").join("covid_stats_exported.xml");

    let original = rewrite_xml_file(&xml_path, &out_path).expect("rewrite xml file should succeed");
    assert_eq!(read_xml_file(&out_path).expect("read xml file should succeed"), original);
}

#[test]
fn missing_source_files_are_reported() {
    let dir = tempfile::tempdir().expect("temp dir should be created");
    let missing_xml = dir.path().join("absent.xml");
    let json_path = dir.path().join("out.json");

    let err = xml_to_json_file(&missing_xml, &json_path).expect_err("xml to json file should fail");
    assert!(matches!(err, PipelineError::SourceNotFound(ref path) if path == &missing_xml));
    assert!(!json_path.exists());

    let err = import_json_file(dir.path().join("stats.db"), dir.path().join("absent.json"))
        .expect_err("import json file should fail");
    assert!(matches!(err, PipelineError::SourceNotFound(_)));
}

#[test]
fn malformed_sources_are_reported() {
    let dir = tempfile::tempdir().expect("temp dir should be created");
    let xml_path = dir.path().join("broken.xml");
    fs::write(
        &xml_path,
        r#"<statistics><year value="2020"><month><unemployment national="1"/><deaths total="1"/></month></year></statistics>"#,
    )
    .expect("file should be written");
    let json_path = dir.path().join("out.json");

    let err = xml_to_json_file(&xml_path, &json_path).expect_err("xml to json file should fail");
    assert!(matches!(
        err,
        PipelineError::MalformedSource {
            reason: MalformedReason::Xml(XmlError::MissingAttribute {
                element: "month",
                attribute: "name",
                ..
            }),
            ..
        }
    ));
    assert!(!json_path.exists());

    let bad_json = dir.path().join("bad.json");
    fs::write(&bad_json, r#"{"country": "Poland"}"#).expect("file should be written");
    let err = import_json_file(dir.path().join("stats.db"), &bad_json)
        .expect_err("import json file should fail");
    assert!(matches!(
        err,
        PipelineError::MalformedSource {
            reason: MalformedReason::Json(_),
            ..
        }
    ));
}

#[test]
fn xml_export_keeps_months_with_null_statistics_and_no_death_row() {
    let dir = tempfile::tempdir().expect("temp dir should be created");
    let json_path = dir.path().join("nulls.json");
    let db_path = dir.path().join("stats.db");
    let xml_out = dir.path().join("exported.xml");
    fs::write(
        &json_path,
        json!({"data": [{"year": 2020, "months": [
            {"name": "May", "unemployment": {"national": 5.0}},
            {"name": "June"}
        ]}]})
        .to_string(),
    )
    .expect("file should be written");

    import_json_file(&db_path, &json_path).expect("import json file should succeed");
    rusqlite::Connection::open(&db_path)
        .expect("raw connection should open")
        .execute("DELETE FROM deaths;", [])
        .expect("raw SQL should execute");
    let exported = export_xml_file(&db_path, &xml_out).expect("export xml file should succeed");

    let text = fs::read_to_string(&xml_out).expect("output file should be readable");
    assert_eq!(read_document(&text).expect("feed should parse"), exported);
    let records = exported.to_records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].national, Some(5.0));
    assert_eq!(records[0].deaths_total, None);
    assert_eq!(records[1].national, None);
}

#[test]
fn failing_xml_export_leaves_no_output_file() {
    let dir = tempfile::tempdir().expect("temp dir should be created");
    let xml_path = write_feed(dir.path());
    let json_path = dir.path().join("covid_stats.json");
    let db_path = dir.path().join("stats.db");
    let blocker = dir.path().join("blocker");
    fs::write(&blocker, "not a directory").expect("file should be written");
    let xml_out = blocker.join("exported.xml");

    xml_to_json_file(&xml_path, &json_path).expect("xml to json file should succeed");
    import_json_file(&db_path, &json_path).expect("import json file should succeed");
    let err = export_xml_file(&db_path, &xml_out).expect_err("export xml file should fail");

    assert!(matches!(
        err,
        PipelineError::ExportFailure(ExportError::Write { ref path, .. }) if path == &xml_out
    ));
    assert!(!xml_out.exists());
}

#[test]
fn legacy_layout_export_writes_years_key() {
    let dir = tempfile::tempdir().expect("temp dir should be created");
    let xml_path = write_feed(dir.path());
    let json_path = dir.path().join("covid_stats.json");
    let db_path = dir.path().join("stats.db");
    let out_path = dir.path().join("exported.json");

    xml_to_json_file(&xml_path, &json_path).expect("xml to json file should succeed");
    import_json_file(&db_path, &json_path).expect("import json file should succeed");
    export_json_file(&db_path, &out_path, JsonLayout::Legacy)
        .expect("export json file should succeed");

    let value = read_json(&out_path);
    assert!(value.get("data").is_none());
    assert_eq!(value["years"][0]["value"], json!(2020));
    assert_eq!(value["years"][1]["value"], json!(2021));
}

#[test]
fn run_pipeline_executes_every_step_and_is_repeatable() {
    let dir = tempfile::tempdir().expect("temp dir should be created");
    let config = PipelineConfig {
        source_xml: write_feed(dir.path()),
        json_path: dir.path().join("processed").join("covid_stats.json"),
        database_path: dir.path().join("covid_stats.sqlite3"),
        exported_json: dir.path().join("processed").join("covid_exported.json"),
        exported_json_layout: JsonLayout::Primary,
        exported_xml: dir.path().join("processed").join("covid_stats_exported.xml"),
        log_level: None,
        log_dir: dir.path().join("logs"),
    };

    let first = run_pipeline(&config).expect("run pipeline should succeed");
    assert_eq!(first.source_months, 3);
    assert_eq!(first.import.months_inserted, 3);
    assert!(config.json_path.exists());
    assert!(config.exported_json.exists());
    assert!(config.exported_xml.exists());

    let second = run_pipeline(&config).expect("run pipeline should succeed");
    assert_eq!(second.import.months_inserted, 0);
    assert_eq!(second.import.months_updated, 3);
    assert_eq!(second.exported, first.exported);
}
