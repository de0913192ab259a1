#![cfg(feature = "ingest")]

use tuple_archive::ingest::json::parse_document;
use tuple_archive::{ArchiveConfig, Value};

#[test_log::test]
fn scenario_s3_json_nested_record_round_trips() -> tuple_archive::Result<()> {
    let folder = tempfile::tempdir()?;
    let store = ArchiveConfig::new(folder.path()).open()?;

    let json = r#"{
        "http://example.root": {
            "p1": [{"value": "v1", "time": 1}],
            "nested": [{
                "value": {
                    "a": {"@id": "http://example.org/value"},
                    "b": 2
                },
                "time": 2
            }]
        }
    }"#;
    let tuples = parse_document(json).expect("document parses");
    assert_eq!(tuples.len(), 2);

    store.put(tuples)?;

    let results = store.fetch("http://example.root", Some("nested"), None, 0)?;
    assert_eq!(results.len(), 1);
    match &results[0].value {
        Value::Record(record) => {
            let entries: Vec<_> = record.iter().collect();
            assert_eq!(entries.len(), 2);
            assert_eq!(entries[0].0, "a");
            assert_eq!(entries[0].1, &Value::Uri("http://example.org/value".to_string()));
            assert_eq!(entries[1].0, "b");
            assert_eq!(entries[1].1, &Value::Int64(2));
        }
        other => panic!("expected a record value, got {other:?}"),
    }
    Ok(())
}
