use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::tabmerge::tools::config::MergeConfig;
use crate::tabmerge::tools::convert::build_document;
use crate::tabmerge::tools::error::{Result, ToolError};
use crate::tabmerge::tools::export::{Database, TableInfo};
use crate::tabmerge::tools::index::KeyIndexBuilder;
use crate::tabmerge::tools::io::csv_read::{ReadOptions, TabularReader};
use crate::tabmerge::tools::io::xml;
use crate::tabmerge::tools::merge::{DEFAULT_MAX_DEPTH, MergeEngine};

/// Suffix appended to the input file stem to name the merged output.
pub const MERGED_SUFFIX: &str = "_merged";

/// Knobs for [`merge_files`].
#[derive(Debug, Clone, Copy)]
pub struct MergeOptions {
    pub read: ReadOptions,
    pub max_depth: usize,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            read: ReadOptions::default(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// End-of-run report of a merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub output: PathBuf,
    pub records_processed: usize,
    pub records_skipped: usize,
    pub rows_rejected: usize,
    pub duplicate_keys: usize,
    pub elements_merged: usize,
    pub elements_unresolved: usize,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "merged file written to {}", self.output.display())?;
        writeln!(f, "records processed:   {}", self.records_processed)?;
        writeln!(f, "records skipped:     {}", self.records_skipped)?;
        writeln!(f, "rows rejected:       {}", self.rows_rejected)?;
        writeln!(f, "duplicate keys:      {}", self.duplicate_keys)?;
        writeln!(f, "elements merged:     {}", self.elements_merged)?;
        write!(f, "elements unresolved: {}", self.elements_unresolved)
    }
}

/// Default location of the merged document: `<stem>_merged.<ext>` next to
/// the input.
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let extension = input
        .extension()
        .map(|extension| extension.to_string_lossy().into_owned())
        .unwrap_or_else(|| "xml".to_string());
    input.with_file_name(format!("{stem}{MERGED_SUFFIX}.{extension}"))
}

/// Merges the value column of `csv_input` into the elements of `xml_input`
/// and writes the result to `output` (or [`default_output_path`]).
///
/// Every configured name is checked before any record is read or any element
/// modified. Neither input is ever written.
#[instrument(
    level = "info",
    skip_all,
    fields(csv = %csv_input.display(), xml = %xml_input.display())
)]
pub fn merge_files(
    csv_input: &Path,
    xml_input: &Path,
    output: Option<&Path>,
    config: &MergeConfig,
    options: &MergeOptions,
) -> Result<RunSummary> {
    config.validate_names()?;
    for input in [csv_input, xml_input] {
        if !input.exists() {
            return Err(ToolError::MissingInput(input.to_path_buf()));
        }
    }

    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_output_path(xml_input));
    for input in [csv_input, xml_input] {
        if same_file(&output, input) {
            return Err(ToolError::InvalidConfig(format!(
                "output {} would overwrite the input {}",
                output.display(),
                input.display()
            )));
        }
    }

    let mut reader = TabularReader::open(csv_input, options.read)?;
    config.validate_fields(reader.fields())?;

    let mut document = xml::read_document_within(xml_input, options.max_depth)?;
    config.validate_tree(&document.root)?;
    if config.is_in_place() {
        warn!(
            field = config.original_field.as_str(),
            "merged values replace the join key"
        );
    }

    let fields = reader.fields().clone();
    let (index, index_stats) =
        KeyIndexBuilder::new(&config.key_field, &config.value_field).build(&fields, &mut reader)?;
    let read_stats = reader.stats();

    let merge_stats = MergeEngine::new(&index, config)
        .with_max_depth(options.max_depth)
        .merge(&mut document.root)?;

    xml::write_document(&output, &document)?;

    let summary = RunSummary {
        output,
        records_processed: index_stats.records_seen,
        records_skipped: index_stats.records_skipped,
        rows_rejected: read_stats.rows_rejected,
        duplicate_keys: index_stats.duplicate_keys,
        elements_merged: merge_stats.merged,
        elements_unresolved: merge_stats.unresolved,
    };
    info!(
        records = summary.records_processed,
        skipped = summary.records_skipped,
        rejected = summary.rows_rejected,
        merged = summary.elements_merged,
        unresolved = summary.elements_unresolved,
        "merge run complete"
    );
    Ok(summary)
}

/// Converts a CSV file into an XML document with one item per row.
/// Returns the number of items written.
#[instrument(
    level = "info",
    skip_all,
    fields(input = %input.display(), output = %output.display())
)]
pub fn csv_to_xml(input: &Path, output: &Path, options: ReadOptions) -> Result<usize> {
    if !input.exists() {
        return Err(ToolError::MissingInput(input.to_path_buf()));
    }
    let mut reader = TabularReader::open(input, options)?;
    let fields = reader.fields().clone();
    let document = build_document(&fields, &mut reader)?;
    let items = document.root.children.len();
    xml::write_document(output, &document)?;
    info!(items, rejected = reader.stats().rows_rejected, "CSV converted to XML");
    Ok(items)
}

/// Lists the base tables of the database at `database`.
pub fn list_tables(database: &Path) -> Result<Vec<TableInfo>> {
    Database::open(database)?.list_tables()
}

/// Files produced by [`export_table`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    pub rows: usize,
    pub csv: PathBuf,
    pub xml: Option<PathBuf>,
}

/// Exports `table` to `<output_dir>/<table>.csv` and, when `with_xml` is set,
/// converts it to `<output_dir>/<table>.xml` as well.
#[instrument(level = "info", skip_all, fields(database = %database.display(), table = table))]
pub fn export_table(
    database: &Path,
    table: &str,
    output_dir: &Path,
    with_xml: bool,
) -> Result<ExportSummary> {
    let csv = output_dir.join(format!("{table}.csv"));
    let rows = {
        let database = Database::open(database)?;
        database.export_table(table, &csv)?
    };

    let xml = if with_xml {
        let xml = output_dir.join(format!("{table}.xml"));
        csv_to_xml(&csv, &xml, ReadOptions::default())?;
        Some(xml)
    } else {
        None
    };

    Ok(ExportSummary { rows, csv, xml })
}

fn same_file(lhs: &Path, rhs: &Path) -> bool {
    if lhs == rhs {
        return true;
    }
    match (fs::canonicalize(lhs), fs::canonicalize(rhs)) {
        (Ok(lhs), Ok(rhs)) => lhs == rhs,
        _ => false,
    }
}
