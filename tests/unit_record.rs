//! Records on disk


use std::fs;

use brentsat::record::{self, Record};
use brentsat::{Dims, RecordError, Ring, Scheme};
use generators::strassen;
use tempfile::TempDir;

#[test]
fn test_save_and_load() {
    let dir = TempDir::new().unwrap();
    for ring in [Ring::Gf2, Ring::Integer] {
        let scheme = strassen(ring);
        let path = dir.path().join(record::file_name(&scheme, 1));
        record::save(&scheme, &path).unwrap();
        assert_eq!(record::load(&path).unwrap(), scheme);
    }
}

#[test]
fn test_saved_record_carries_invariants() {
    let dir = TempDir::new().unwrap();
    let scheme = strassen(Ring::Gf2);
    let path = dir.path().join("strassen.json");
    record::save(&scheme, &path).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    let record: Record = serde_json::from_str(&text).unwrap();
    assert_eq!(record.m, 7);
    assert!(record.z2);
    assert_eq!(record.n, Dims::square(2));
    assert_eq!(record.multiplications.len(), 7);
    assert_eq!(record.elements.len(), 4);
    assert_eq!(record.weight, scheme.weight());
    assert_eq!(record.complexity, scheme.complexity());
    assert_eq!(record.ranks.len(), 7);
    assert_eq!(record.invariant_f, scheme.invariant_f());
}

#[test]
fn test_load_dir_skips_bad_files() {
    let dir = TempDir::new().unwrap();
    let first = strassen(Ring::Gf2);
    let second = Scheme::naive(Dims::new(1, 2, 2), Ring::Gf2);
    record::save(&first, &dir.path().join(record::file_name(&first, 1))).unwrap();
    record::save(&second, &dir.path().join(record::file_name(&second, 2))).unwrap();
    fs::write(dir.path().join("broken.json"), "{ not json").unwrap();
    fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let loaded = record::load_dir(dir.path()).unwrap();
    assert_eq!(loaded.len(), 2);
    // sorted by file name: 1x2x2_... before 2x2x2_...
    assert_eq!(loaded[0].1, second);
    assert_eq!(loaded[1].1, first);
}

#[test]
fn test_load_errors() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing.json");
    assert!(matches!(record::load(&missing), Err(RecordError::Io { .. })));
    assert!(matches!(record::load_dir(&missing), Err(RecordError::Io { .. })));

    let invalid = dir.path().join("invalid.json");
    fs::write(&invalid, r#"{"n": 1, "m": 1, "z2": true, "u": [[1]], "v": [[1]], "w": [[0]]}"#).unwrap();
    assert!(matches!(record::load(&invalid), Err(RecordError::Scheme(_))));
}

#[test]
fn test_file_names_are_distinct_per_index() {
    let scheme = strassen(Ring::Gf2);
    assert_eq!(record::file_name(&scheme, 7), format!("2x2x2_m7_c{}_000007_Z2.json", scheme.complexity()));
    assert_ne!(record::file_name(&scheme, 1), record::file_name(&scheme, 2));
}
