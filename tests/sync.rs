use std::fs;
use std::path::Path;

use tabmerge_tools::config::{MergeConfig, PartialMergeConfig};
use tabmerge_tools::error::ErrorKind;
use tabmerge_tools::io::csv_read::{ReadOptions, RowPolicy};
use tabmerge_tools::io::xml::read_document;
use tabmerge_tools::sync::{self, MergeOptions, default_output_path};
use tempfile::tempdir;

const AUTHORS_CSV: &str = "id,name\n1,Alice\n2,Bob\n1,Carol\n3,\n";

const BOOKS_XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<root>
  <item>
    <id>2</id>
    <author>X</author>
  </item>
  <item>
    <id>1</id>
    <author>Y</author>
  </item>
  <item>
    <id>9</id>
    <author>Z</author>
  </item>
</root>
"#;

fn write_inputs(dir: &Path) -> (std::path::PathBuf, std::path::PathBuf) {
    let csv = dir.join("authors.csv");
    let xml = dir.join("books.xml");
    fs::write(&csv, AUTHORS_CSV).expect("CSV input written");
    fs::write(&xml, BOOKS_XML).expect("XML input written");
    (csv, xml)
}

fn config() -> MergeConfig {
    MergeConfig::new("id", "name", "id", "matched_name")
}

#[test]
fn merge_writes_new_file_and_reports_summary() {
    let temp_dir = tempdir().expect("temporary directory");
    let (csv, xml) = write_inputs(temp_dir.path());

    let summary = sync::merge_files(&csv, &xml, None, &config(), &MergeOptions::default())
        .expect("merge succeeded");

    assert_eq!(summary.output, temp_dir.path().join("books_merged.xml"));
    assert_eq!(summary.records_processed, 4);
    assert_eq!(summary.records_skipped, 1);
    assert_eq!(summary.duplicate_keys, 1);
    assert_eq!(summary.elements_merged, 2);
    assert_eq!(summary.elements_unresolved, 1);

    let merged = read_document(&summary.output).expect("merged XML parsed");
    let names: Vec<Option<&str>> = merged
        .root
        .children
        .iter()
        .map(|item| item.child_text("matched_name"))
        .collect();
    assert_eq!(names, vec![Some("Bob"), Some("Carol"), None]);
    assert_eq!(
        merged.declaration.encoding.as_deref(),
        Some("utf-8"),
        "declaration carried over"
    );

    let original = fs::read_to_string(&xml).expect("input re-read");
    assert_eq!(original, BOOKS_XML);

    let mut entries: Vec<String> = fs::read_dir(temp_dir.path())
        .expect("directory listed")
        .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
        .collect();
    entries.sort();
    assert_eq!(entries, vec!["authors.csv", "books.xml", "books_merged.xml"]);
}

#[test]
fn summary_is_rendered_even_without_problems() {
    let temp_dir = tempdir().expect("temporary directory");
    let csv = temp_dir.path().join("authors.csv");
    let xml = temp_dir.path().join("books.xml");
    fs::write(&csv, "id,name\n2,Bob\n").expect("CSV input written");
    fs::write(&xml, "<root><item><id>2</id></item></root>").expect("XML input written");

    let summary = sync::merge_files(&csv, &xml, None, &config(), &MergeOptions::default())
        .expect("merge succeeded");
    let rendered = summary.to_string();

    assert!(rendered.contains("records processed:   1"), "{rendered}");
    assert!(rendered.contains("records skipped:     0"), "{rendered}");
    assert!(rendered.contains("elements merged:     1"), "{rendered}");
    assert!(rendered.contains("elements unresolved: 0"), "{rendered}");
}

#[test]
fn explicit_output_path_is_used() {
    let temp_dir = tempdir().expect("temporary directory");
    let (csv, xml) = write_inputs(temp_dir.path());
    let output = temp_dir.path().join("out").join("result.xml");
    fs::create_dir(temp_dir.path().join("out")).expect("output directory created");

    let summary = sync::merge_files(
        &csv,
        &xml,
        Some(&output),
        &config(),
        &MergeOptions::default(),
    )
    .expect("merge succeeded");

    assert_eq!(summary.output, output);
    assert!(output.exists());
}

#[test]
fn configuration_errors_stop_before_output_is_written() {
    let temp_dir = tempdir().expect("temporary directory");
    let (csv, xml) = write_inputs(temp_dir.path());

    let cases = [
        MergeConfig::new("isbn", "name", "id", "matched_name"),
        MergeConfig::new("id", "title", "id", "matched_name"),
        MergeConfig::new("id", "name", "isbn", "matched_name"),
        MergeConfig::new("id", "name", "id", "matched name"),
        MergeConfig::new("id", "", "id", "matched_name"),
    ];

    for config in cases {
        let error = sync::merge_files(&csv, &xml, None, &config, &MergeOptions::default())
            .expect_err("configuration rejected");
        assert_eq!(error.kind(), ErrorKind::Config, "{config:?}: {error}");
    }
    assert!(!default_output_path(&xml).exists());
}

#[test]
fn output_may_not_replace_the_input_document() {
    let temp_dir = tempdir().expect("temporary directory");
    let (csv, xml) = write_inputs(temp_dir.path());

    let error = sync::merge_files(&csv, &xml, Some(&xml), &config(), &MergeOptions::default())
        .expect_err("overwrite rejected");

    assert_eq!(error.kind(), ErrorKind::Config);
    assert_eq!(fs::read_to_string(&xml).expect("input re-read"), BOOKS_XML);
}

#[test]
fn output_may_not_replace_the_tabular_input() {
    let temp_dir = tempdir().expect("temporary directory");
    let (csv, xml) = write_inputs(temp_dir.path());

    let error = sync::merge_files(&csv, &xml, Some(&csv), &config(), &MergeOptions::default())
        .expect_err("overwrite rejected");

    assert_eq!(error.kind(), ErrorKind::Config);
    assert_eq!(fs::read_to_string(&csv).expect("input re-read"), AUTHORS_CSV);
}

#[test]
fn deeply_nested_input_fails_without_output() {
    let temp_dir = tempdir().expect("temporary directory");
    let (csv, xml) = write_inputs(temp_dir.path());
    let depth = 200_000;
    fs::write(
        &xml,
        format!(
            "<root><item><id>1</id></item>{}{}</root>",
            "<a>".repeat(depth),
            "</a>".repeat(depth)
        ),
    )
    .expect("XML input rewritten");

    let error = sync::merge_files(&csv, &xml, None, &config(), &MergeOptions::default())
        .expect_err("nesting rejected");

    assert_eq!(error.kind(), ErrorKind::Cycle);
    assert!(!default_output_path(&xml).exists());
}

#[test]
fn failures_leave_no_partial_output() {
    let temp_dir = tempdir().expect("temporary directory");
    let (csv, xml) = write_inputs(temp_dir.path());
    let options = MergeOptions {
        max_depth: 2,
        ..MergeOptions::default()
    };

    let error = sync::merge_files(&csv, &xml, None, &config(), &options)
        .expect_err("depth guard triggered");

    assert_eq!(error.kind(), ErrorKind::Cycle);
    assert_eq!(
        fs::read_dir(temp_dir.path()).expect("directory listed").count(),
        2
    );
}

#[test]
fn malformed_rows_are_fatal_unless_skipped() {
    let temp_dir = tempdir().expect("temporary directory");
    let (csv, xml) = write_inputs(temp_dir.path());
    fs::write(&csv, "id,name\n2,Bob\n1\n").expect("CSV input rewritten");

    let error = sync::merge_files(&csv, &xml, None, &config(), &MergeOptions::default())
        .expect_err("ragged row rejected");
    assert_eq!(error.kind(), ErrorKind::Format);
    assert!(!default_output_path(&xml).exists());

    let options = MergeOptions {
        read: ReadOptions {
            row_policy: RowPolicy::Skip,
            ..ReadOptions::default()
        },
        ..MergeOptions::default()
    };
    let summary = sync::merge_files(&csv, &xml, None, &config(), &options)
        .expect("merge succeeded");
    assert_eq!(summary.rows_rejected, 1);
    assert_eq!(summary.elements_merged, 1);
    assert_eq!(summary.elements_unresolved, 2);
}

#[test]
fn missing_inputs_are_io_errors() {
    let temp_dir = tempdir().expect("temporary directory");
    let (csv, _xml) = write_inputs(temp_dir.path());
    let absent = temp_dir.path().join("absent.xml");

    let error = sync::merge_files(&csv, &absent, None, &config(), &MergeOptions::default())
        .expect_err("missing input rejected");

    assert_eq!(error.kind(), ErrorKind::Io);
}

#[test]
fn converted_exports_can_be_merged() {
    let temp_dir = tempdir().expect("temporary directory");
    let books_csv = temp_dir.path().join("books.csv");
    let books_xml = temp_dir.path().join("books.xml");
    let authors_csv = temp_dir.path().join("authors.csv");
    fs::write(&books_csv, "title,author_id\nDune,2\nEmma,1\n").expect("books written");
    fs::write(&authors_csv, "author_id,name\n1,Austen\n2,Herbert\n").expect("authors written");

    let items = sync::csv_to_xml(&books_csv, &books_xml, ReadOptions::default())
        .expect("CSV converted");
    assert_eq!(items, 2);

    let config = MergeConfig::new("author_id", "name", "author_id", "author_name");
    let summary = sync::merge_files(
        &authors_csv,
        &books_xml,
        None,
        &config,
        &MergeOptions::default(),
    )
    .expect("merge succeeded");

    let merged = read_document(&summary.output).expect("merged XML parsed");
    let authors: Vec<Option<&str>> = merged
        .root
        .children
        .iter()
        .map(|item| item.child_text("author_name"))
        .collect();
    assert_eq!(authors, vec![Some("Herbert"), Some("Austen")]);
}

#[test]
fn configuration_file_values_yield_to_overrides() {
    let temp_dir = tempdir().expect("temporary directory");
    let path = temp_dir.path().join("merge.json");
    fs::write(
        &path,
        r#"{"key_field": "id", "value_field": "name", "original_field": "id", "novel_field": "author_name"}"#,
    )
    .expect("configuration written");

    let config = PartialMergeConfig::load(&path)
        .expect("configuration loaded")
        .merged_with(PartialMergeConfig {
            novel_field: Some("matched_name".to_string()),
            ..PartialMergeConfig::default()
        })
        .resolve()
        .expect("configuration resolved");

    assert_eq!(config, MergeConfig::new("id", "name", "id", "matched_name"));

    let incomplete = PartialMergeConfig {
        key_field: Some("id".to_string()),
        ..PartialMergeConfig::default()
    }
    .resolve()
    .expect_err("missing names rejected");
    assert_eq!(incomplete.kind(), ErrorKind::Config);
}

#[test]
fn default_output_sits_next_to_the_input() {
    assert_eq!(
        default_output_path(Path::new("data/books.xml")),
        Path::new("data/books_merged.xml")
    );
    assert_eq!(
        default_output_path(Path::new("books")),
        Path::new("books_merged.xml")
    );
}
