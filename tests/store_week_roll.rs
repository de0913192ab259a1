use tuple_archive::{ArchiveConfig, Tuple, Value};

const WEEK_SECONDS: i64 = 604_800;

#[test_log::test]
fn scenario_s4_week_roll_produces_two_week_directories() -> tuple_archive::Result<()> {
    let folder = tempfile::tempdir()?;
    let store = ArchiveConfig::new(folder.path()).open()?;

    let base = 1_700_000_000i64;
    store.put(vec![
        Tuple::new("http://i1", "http://p1", "http://c", base, 0, Value::Int32(1)),
        Tuple::new("http://i1", "http://p1", "http://c", base + WEEK_SECONDS - 1, 0, Value::Int32(2)),
        Tuple::new("http://i2", "http://p1", "http://c", base + WEEK_SECONDS, 0, Value::Int32(3)),
    ])?;

    let year_dirs: Vec<_> = std::fs::read_dir(folder.path())?
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.file_name().and_then(|n| n.to_str()) != Some("metadata"))
        .collect();
    assert_eq!(year_dirs.len(), 1, "both tuples stay within the same calendar year");

    let week_dirs: Vec<_> = std::fs::read_dir(&year_dirs[0])?.filter_map(Result::ok).collect();
    assert_eq!(week_dirs.len(), 2, "time advancing past one week boundary rolls a new week directory");

    let results = store.fetch("http://i1", None, None, 0)?;
    assert_eq!(results.len(), 2);
    let results2 = store.fetch("http://i2", None, None, 0)?;
    assert_eq!(results2.len(), 1);
    Ok(())
}
