use std::collections::BTreeMap;

use tabmerge_tools::Result;
use tabmerge_tools::error::ErrorKind;
use tabmerge_tools::index::KeyIndexBuilder;
use tabmerge_tools::io::csv_read::{ReadOptions, RowPolicy, TabularReader};
use tabmerge_tools::model::Record;

fn open(source: &str) -> TabularReader<&[u8]> {
    open_with(source, RowPolicy::Strict)
}

fn open_with(source: &str, row_policy: RowPolicy) -> TabularReader<&[u8]> {
    let options = ReadOptions {
        row_policy,
        ..ReadOptions::default()
    };
    TabularReader::from_reader(source.as_bytes(), options).expect("header parsed")
}

#[test]
fn later_records_win_on_duplicate_keys() {
    let mut reader = open("id,name\n1,Alice\n2,Bob\n1,Carol");
    let fields = reader.fields().clone();

    let (index, stats) = KeyIndexBuilder::new("id", "name")
        .build(&fields, &mut reader)
        .expect("index built");

    assert_eq!(index.len(), 2);
    assert_eq!(index.get("1"), Some("Carol"));
    assert_eq!(index.get("2"), Some("Bob"));
    assert_eq!(stats.records_seen, 3);
    assert_eq!(stats.duplicate_keys, 1);
    assert_eq!(stats.distinct_keys, 2);
    assert_eq!(stats.records_skipped, 0);
}

#[test]
fn records_without_value_are_skipped_and_counted() {
    let mut reader = open("id,name\n1,Alice\n3,\n,Nobody\n");
    let fields = reader.fields().clone();

    let (index, stats) = KeyIndexBuilder::new("id", "name")
        .build(&fields, &mut reader)
        .expect("index built");

    assert_eq!(index.len(), 1);
    assert!(!index.contains_key("3"));
    assert_eq!(stats.records_seen, 3);
    assert_eq!(stats.records_skipped, 2);
}

#[test]
fn unknown_fields_fail_before_reading_records() {
    let mut reader = open("id,name\n1,Alice\n");
    let fields = reader.fields().clone();

    let error = KeyIndexBuilder::new("id", "title")
        .build(&fields, &mut reader)
        .expect_err("unknown value field rejected");

    assert_eq!(error.kind(), ErrorKind::Config);
    assert_eq!(reader.stats().rows_read, 0);
}

#[test]
fn keys_are_trimmed_and_values_kept_verbatim() {
    let mut reader = open("id,name\n 7 , Seven \n");
    let fields = reader.fields().clone();

    let (index, _) = KeyIndexBuilder::new("id", "name")
        .build(&fields, &mut reader)
        .expect("index built");

    assert_eq!(index.get("7"), Some(" Seven "));
}

#[test]
fn index_holds_last_value_of_every_distinct_key() {
    let fields: std::sync::Arc<[String]> = vec!["key".to_string(), "value".to_string()].into();
    let records: Vec<Record> = (0..50)
        .map(|row| {
            Record::new(
                fields.clone(),
                vec![format!("k{}", row % 7), format!("v{row}")],
            )
        })
        .collect();

    let mut expected = BTreeMap::new();
    for record in &records {
        expected.insert(
            record.get("key").unwrap().to_string(),
            record.get("value").unwrap().to_string(),
        );
    }

    let (index, stats) = KeyIndexBuilder::new("key", "value")
        .build(&fields, records.into_iter().map(Result::Ok))
        .expect("index built");

    let actual: BTreeMap<String, String> = index
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    assert_eq!(actual, expected);
    assert_eq!(stats.duplicate_keys, 50 - 7);
}

#[test]
fn ragged_rows_abort_in_strict_mode() {
    let reader = open("id,name\n1,Alice\n2\n");

    let error = reader
        .collect::<Result<Vec<_>>>()
        .expect_err("short row rejected");

    assert_eq!(error.kind(), ErrorKind::Format);
    assert!(error.to_string().contains("line 3"), "{error}");
}

#[test]
fn ragged_rows_are_counted_when_skipped() {
    let mut reader = open_with("id,name\n1,Alice\n2\n3,Carol,extra\n4,Dan\n", RowPolicy::Skip);

    let records = (&mut reader)
        .collect::<Result<Vec<_>>>()
        .expect("rows read");

    assert_eq!(records.len(), 2);
    assert_eq!(records[1].get("name"), Some("Dan"));
    assert_eq!(reader.stats().rows_read, 2);
    assert_eq!(reader.stats().rows_rejected, 2);
}

#[test]
fn header_problems_are_format_errors() {
    for source in ["", "id,id\n1,2\n"] {
        let error = TabularReader::from_reader(source.as_bytes(), ReadOptions::default())
            .expect_err("header rejected");
        assert_eq!(error.kind(), ErrorKind::Format);
    }
}

#[test]
fn byte_order_mark_is_not_part_of_the_first_field() {
    let reader = open("\u{feff}id,name\n1,Alice\n");

    assert_eq!(&reader.fields()[..], ["id", "name"]);
}

#[test]
fn custom_delimiters_are_honoured() {
    let options = ReadOptions {
        delimiter: b';',
        ..ReadOptions::default()
    };
    let reader = TabularReader::from_reader("id;name\n1;Alice, Jr.\n".as_bytes(), options)
        .expect("header parsed");

    let records = reader.collect::<Result<Vec<_>>>().expect("rows read");
    assert_eq!(records[0].get("name"), Some("Alice, Jr."));
}
