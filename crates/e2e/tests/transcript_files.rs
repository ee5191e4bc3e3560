//! Transcript loading from files on disk

use compare_qa_common::TranscriptRow;
use compare_qa_e2e::{load_transcript, E2eError};
use test_case::test_case;

fn write(dir: &tempfile::TempDir, name: &str, content: &[u8]) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_quoted_export_matches_plain() {
    let dir = tempfile::tempdir().unwrap();
    let plain = write(
        &dir,
        "plain.csv",
        b"Speaker,Message\nCompare,\"Hello, welcome\"\nAnant,Live in it\n",
    );
    let quoted = write(
        &dir,
        "quoted.csv",
        b"\"Speaker,Message\"\n\"Compare,\"\"Hello, welcome\"\"\"\n\"Anant,Live in it\"\n",
    );

    let a = load_transcript(&plain).unwrap();
    let b = load_transcript(&quoted).unwrap();
    assert_eq!(a.len(), 2);
    assert_eq!(a, b);
    assert_eq!(b[0], TranscriptRow::new("Compare", "Hello, welcome"));
}

#[test_case(0)]
#[test_case(1)]
#[test_case(25)]
fn test_row_count_preserved(n: usize) {
    let dir = tempfile::tempdir().unwrap();
    let mut content = String::from("\u{feff}Speaker;Message;Notes\n");
    for i in 0..n {
        content.push_str(&format!("Anant;message {};x\n", i));
    }
    let path = write(&dir, "rows.csv", content.as_bytes());

    let rows = load_transcript(&path).unwrap();
    assert_eq!(rows.len(), n);
    for (i, row) in rows.iter().enumerate() {
        assert_eq!(row.message, format!("message {}", i));
    }
}

#[test]
fn test_unsupported_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "chat.json", b"[]");
    match load_transcript(&path) {
        Err(E2eError::UnsupportedFormat(ext)) => assert_eq!(ext, ".json"),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_transcript(&dir.path().join("absent.csv")).unwrap_err();
    assert!(matches!(err, E2eError::TranscriptNotFound(_)));
}

#[test]
fn test_missing_columns_reports_found_headers() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "bad.csv", b"Name,Text\nA,B\n");
    match load_transcript(&path) {
        Err(E2eError::MissingColumns { found, .. }) => assert_eq!(found, vec!["Name", "Text"]),
        other => panic!("unexpected result: {other:?}"),
    }
}
