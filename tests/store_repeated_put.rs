use tuple_archive::{ArchiveConfig, Tuple, Value};

/// A second `put` to the same archive, reusing ids already allocated within
/// the current calendar year, used to fail with `ENOTEMPTY`: both calls'
/// final week/year directory names are identical (same `Pmin`/`Pmax`), so
/// the second `put`'s provisional directories could not simply replace the
/// first's. Both calls' tuples must stay readable afterwards.
#[test_log::test]
fn second_put_reusing_ids_in_same_year_does_not_fail() -> tuple_archive::Result<()> {
    let folder = tempfile::tempdir()?;
    let store = ArchiveConfig::new(folder.path()).open()?;

    let base = 1_700_000_000i64;
    store.put(vec![Tuple::new(
        "http://i1",
        "http://p1",
        "http://c",
        base,
        0,
        Value::Int32(1),
    )])?;

    store.put(vec![Tuple::new(
        "http://i1",
        "http://p1",
        "http://c",
        base + 10,
        0,
        Value::Int32(2),
    )])?;

    let results = store.fetch("http://i1", Some("http://p1"), Some("http://c"), 0)?;
    assert_eq!(results.len(), 2);
    let values: Vec<_> = results.iter().map(|t| t.value.clone()).collect();
    assert_eq!(values, vec![Value::Int32(2), Value::Int32(1)]);
    Ok(())
}
