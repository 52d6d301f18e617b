//! Snapshot tests for Markdown to ADF conversion
//!
//! These tests convert Markdown fixture files and snapshot the resulting
//! ADF JSON to detect unintended changes in conversion.

use std::fs;
use std::path::PathBuf;

use md2adf::convert_to_json_pretty;

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn convert_fixture(name: &str) -> String {
    let path = fixtures_dir().join(format!("{}.md", name));
    let source = fs::read_to_string(&path).expect("Failed to read fixture file");
    convert_to_json_pretty(&source).expect("Failed to serialize ADF")
}

macro_rules! snapshot_test {
    ($name:ident) => {
        #[test]
        fn $name() {
            let adf_json = convert_fixture(stringify!($name));
            insta::assert_snapshot!(adf_json);
        }
    };
}

snapshot_test!(ticket);
snapshot_test!(table);
