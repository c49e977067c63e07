use std::fmt::Write as _;
use std::path::Path;

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use serde::Serialize;
use tracing::{info, instrument};

use crate::tabmerge::tools::error::{Result, ToolError};
use crate::tabmerge::tools::io::csv_write;

/// A base table of the source database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableInfo {
    pub schema: String,
    pub name: String,
}

/// Read-only handle on a SQLite database.
///
/// The connection is closed when the handle is dropped.
pub struct Database {
    connection: Connection,
}

impl Database {
    /// Opens the database file at `path` without write access.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ToolError::MissingInput(path.to_path_buf()));
        }
        let connection = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self { connection })
    }

    /// Lists user tables ordered by schema and name.
    pub fn list_tables(&self) -> Result<Vec<TableInfo>> {
        let mut statement = self.connection.prepare(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
             ORDER BY name",
        )?;
        let tables = statement
            .query_map([], |row| {
                Ok(TableInfo {
                    schema: "main".to_string(),
                    name: row.get(0)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tables)
    }

    /// Writes every row of `table` to the CSV file at `output`, column names
    /// first. Returns the number of data rows written.
    #[instrument(level = "info", skip_all, fields(table = table, output = %output.display()))]
    pub fn export_table(&self, table: &str, output: &Path) -> Result<usize> {
        validate_table_name(table)?;

        let mut statement = self.connection.prepare(&format!("SELECT * FROM \"{table}\""))?;
        let columns: Vec<String> = statement
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        let column_count = columns.len();

        let mut rows = statement.query([])?;
        let cells = std::iter::from_fn(move || match rows.next() {
            Ok(Some(row)) => Some(
                (0..column_count)
                    .map(|index| -> Result<String> { Ok(cell_to_string(row.get_ref(index)?)) })
                    .collect::<Result<Vec<String>>>(),
            ),
            Ok(None) => None,
            Err(err) => Some(Err(ToolError::from(err))),
        });

        let written = csv_write::write_rows(output, &columns, cells)?;
        info!(rows = written, columns = column_count, "table exported");
        Ok(written)
    }
}

/// Rejects table names that are not plain identifiers.
pub fn validate_table_name(table: &str) -> Result<()> {
    let valid = !table.is_empty()
        && table
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_');
    if valid {
        Ok(())
    } else {
        Err(ToolError::InvalidTableName(table.to_string()))
    }
}

/// Whole reals keep a fractional digit so `1.0` does not read back as an
/// integer.
fn real_to_string(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

fn cell_to_string(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => String::new(),
        ValueRef::Integer(value) => value.to_string(),
        ValueRef::Real(value) => real_to_string(value),
        ValueRef::Text(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        ValueRef::Blob(bytes) => bytes.iter().fold(String::new(), |mut hex, byte| {
            let _ = write!(hex, "{byte:02x}");
            hex
        }),
    }
}
