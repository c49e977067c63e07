use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use csv::{ReaderBuilder, StringRecord, StringRecordsIntoIter};
use serde::Serialize;
use tracing::warn;

use crate::tabmerge::tools::error::{Result, ToolError};
use crate::tabmerge::tools::model::{FieldNames, Record};

/// What to do with a row whose field count differs from the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowPolicy {
    /// Abort the read with a format error.
    #[default]
    Strict,
    /// Drop the row, count it, and keep reading.
    Skip,
}

/// Options controlling how delimited files are parsed.
#[derive(Debug, Clone, Copy)]
pub struct ReadOptions {
    pub delimiter: u8,
    pub row_policy: RowPolicy,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            row_policy: RowPolicy::Strict,
        }
    }
}

/// Counters collected while reading rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReadStats {
    /// Data rows yielded as records.
    pub rows_read: usize,
    /// Data rows dropped because their field count did not match the header.
    pub rows_rejected: usize,
}

/// Lazily yields [`Record`]s from a delimited stream whose first row holds
/// the field names.
pub struct TabularReader<R: Read> {
    fields: FieldNames,
    rows: StringRecordsIntoIter<R>,
    row_policy: RowPolicy,
    stats: ReadStats,
}

impl<R: Read> std::fmt::Debug for TabularReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TabularReader")
            .field("fields", &self.fields)
            .field("row_policy", &self.row_policy)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl TabularReader<File> {
    /// Opens the delimited file at `path`.
    pub fn open(path: &Path, options: ReadOptions) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(file, options)
    }
}

impl<R: Read> TabularReader<R> {
    /// Reads the header row from `reader` and prepares to stream the rest.
    pub fn from_reader(reader: R, options: ReadOptions) -> Result<Self> {
        let mut csv_reader = ReaderBuilder::new()
            .delimiter(options.delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        let fields = parse_header(&headers)?;

        Ok(Self {
            fields,
            rows: csv_reader.into_records(),
            row_policy: options.row_policy,
            stats: ReadStats::default(),
        })
    }

    /// Field names taken from the header row.
    pub fn fields(&self) -> &FieldNames {
        &self.fields
    }

    /// Counters for the rows consumed so far.
    pub fn stats(&self) -> ReadStats {
        self.stats
    }

    fn next_record(&mut self) -> Option<Result<Record>> {
        loop {
            let row = match self.rows.next()? {
                Ok(row) => row,
                Err(err) => return Some(Err(ToolError::from(err))),
            };

            if row.len() == self.fields.len() {
                self.stats.rows_read += 1;
                let values = row.iter().map(str::to_string).collect();
                return Some(Ok(Record::new(Arc::clone(&self.fields), values)));
            }

            let line = row.position().map(|position| position.line()).unwrap_or(0);
            match self.row_policy {
                RowPolicy::Strict => {
                    return Some(Err(ToolError::Format(format!(
                        "line {line}: expected {} fields but found {}",
                        self.fields.len(),
                        row.len()
                    ))));
                }
                RowPolicy::Skip => {
                    self.stats.rows_rejected += 1;
                    warn!(
                        line,
                        expected = self.fields.len(),
                        found = row.len(),
                        "skipping row with mismatched field count"
                    );
                }
            }
        }
    }
}

impl<R: Read> Iterator for TabularReader<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record()
    }
}

fn parse_header(headers: &StringRecord) -> Result<FieldNames> {
    if headers.is_empty() {
        return Err(ToolError::Format("missing header row".into()));
    }

    let mut seen = HashSet::new();
    let mut fields = Vec::with_capacity(headers.len());
    for (index, header) in headers.iter().enumerate() {
        let name = if index == 0 {
            header.trim_start_matches('\u{feff}')
        } else {
            header
        };
        if !seen.insert(name.to_string()) {
            return Err(ToolError::Format(format!("duplicate header field '{name}'")));
        }
        fields.push(name.to_string());
    }

    Ok(fields.into())
}
