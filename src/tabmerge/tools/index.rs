use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::tabmerge::tools::error::{Result, ToolError};
use crate::tabmerge::tools::model::Record;

/// Lookup table from a key field's value to a value field's value.
///
/// Built once from a record sequence and read-only afterwards. When several
/// records share a key the value of the last one wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyIndex {
    entries: BTreeMap<String, String>,
}

impl KeyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value mapped to `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Inserts `value` under `key`, returning the value it superseded.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.entries.insert(key.into(), value.into())
    }

    /// Removes `key` and returns the value it mapped to.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for KeyIndex {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut index = KeyIndex::new();
        for (key, value) in iter {
            index.insert(key, value);
        }
        index
    }
}

/// Counters collected while building a [`KeyIndex`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    /// Records consumed from the source.
    pub records_seen: usize,
    /// Records left out because the key or the value was missing.
    pub records_skipped: usize,
    /// Records whose key was already present and got superseded.
    pub duplicate_keys: usize,
    /// Distinct keys in the finished index.
    pub distinct_keys: usize,
}

/// Builds a [`KeyIndex`] from a record sequence.
#[derive(Debug, Clone)]
pub struct KeyIndexBuilder<'a> {
    key_field: &'a str,
    value_field: &'a str,
}

impl<'a> KeyIndexBuilder<'a> {
    pub fn new(key_field: &'a str, value_field: &'a str) -> Self {
        Self {
            key_field,
            value_field,
        }
    }

    /// Checks that both configured fields exist in `fields`.
    pub fn validate(&self, fields: &[String]) -> Result<()> {
        for field in [self.key_field, self.value_field] {
            if !fields.iter().any(|name| name == field) {
                return Err(ToolError::UnknownField {
                    field: field.to_string(),
                    dataset: "tabular input".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Consumes `records` and returns the finished index with its counters.
    ///
    /// The field names are validated before the first record is pulled.
    /// Records lacking the key or the value (absent or empty) are skipped and
    /// counted; keys are trimmed, values are kept verbatim. A later record
    /// replaces the value of an earlier record with the same key.
    #[instrument(
        level = "debug",
        skip_all,
        fields(key_field = self.key_field, value_field = self.value_field)
    )]
    pub fn build<I>(&self, fields: &[String], records: I) -> Result<(KeyIndex, IndexStats)>
    where
        I: IntoIterator<Item = Result<Record>>,
    {
        self.validate(fields)?;

        let mut entries: BTreeMap<String, String> = BTreeMap::new();
        let mut stats = IndexStats::default();

        for record in records {
            let record = record?;
            stats.records_seen += 1;

            let key = record.get(self.key_field).map(str::trim).unwrap_or_default();
            let value = record.get(self.value_field).unwrap_or_default();
            if key.is_empty() || value.is_empty() {
                stats.records_skipped += 1;
                debug!(
                    record = stats.records_seen,
                    "skipping record without key or value"
                );
                continue;
            }

            match entries.entry(key.to_string()) {
                Entry::Vacant(slot) => {
                    slot.insert(value.to_string());
                }
                Entry::Occupied(mut slot) => {
                    stats.duplicate_keys += 1;
                    debug!(
                        key,
                        previous = slot.get().as_str(),
                        replacement = value,
                        "duplicate key superseded"
                    );
                    slot.insert(value.to_string());
                }
            }
        }

        stats.distinct_keys = entries.len();
        info!(
            records = stats.records_seen,
            skipped = stats.records_skipped,
            duplicates = stats.duplicate_keys,
            keys = stats.distinct_keys,
            "key index built"
        );
        Ok((KeyIndex { entries }, stats))
    }
}
