#![cfg(feature = "ingest")]

use tuple_archive::ingest::line_protocol::parse_line;
use tuple_archive::{ArchiveConfig, Value};

#[test_log::test]
fn scenario_s1_int_field_default_timestamp() -> tuple_archive::Result<()> {
    let folder = tempfile::tempdir()?;
    let store = ArchiveConfig::new(folder.path()).open()?;

    let tuple = parse_line("http://example.org/p,item=http://example.org/i value=42i", || 1_700_000_000)
        .expect("line parses");
    store.put(vec![tuple])?;

    let results = store.fetch("http://example.org/i", None, None, 0)?;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].property, "http://example.org/p");
    assert_eq!(results[0].time, 1_700_000_000);
    assert_eq!(results[0].value, Value::Int64(42));
    Ok(())
}

#[test_log::test]
fn scenario_s2_escaped_string_with_explicit_timestamp() -> tuple_archive::Result<()> {
    let folder = tempfile::tempdir()?;
    let store = ArchiveConfig::new(folder.path()).open()?;

    let line = r#"http://example.org/p,item=http://example.org/i value="escaped\,string" 1529592952925259295"#;
    let tuple = parse_line(line, || 0).expect("line parses");
    assert_eq!(tuple.time, 1_529_592_952_925);
    assert_eq!(tuple.value, Value::String("escaped,string".to_string()));

    store.put(vec![tuple])?;
    let results = store.fetch("http://example.org/i", None, None, 0)?;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].time, 1_529_592_952_925);
    Ok(())
}
