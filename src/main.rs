use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tabmerge_tools::config::PartialMergeConfig;
use tabmerge_tools::io::csv_read::{ReadOptions, RowPolicy};
use tabmerge_tools::merge::DEFAULT_MAX_DEPTH;
use tabmerge_tools::sync::{self, MergeOptions};
use tabmerge_tools::{Result, ToolError};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    if let Err(error) = init_tracing().and_then(|()| run(cli)) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| ToolError::Logging(err.to_string()))
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Tables(args) => execute_tables(args),
        Command::Export(args) => execute_export(args),
        Command::Convert(args) => execute_convert(args),
        Command::Merge(args) => execute_merge(args),
    }
}

fn execute_tables(args: TablesArgs) -> Result<()> {
    for table in sync::list_tables(&args.database)? {
        println!("Schema: {}, Table: {}", table.schema, table.name);
    }
    Ok(())
}

fn execute_export(args: ExportArgs) -> Result<()> {
    let summary = sync::export_table(&args.database, &args.table, &args.output_dir, args.xml)?;
    println!(
        "Data from table '{}' has been written to {} ({} rows)",
        args.table,
        summary.csv.display(),
        summary.rows
    );
    if let Some(xml) = &summary.xml {
        println!("'{}' has been converted to {}", summary.csv.display(), xml.display());
    }
    Ok(())
}

fn execute_convert(args: ConvertArgs) -> Result<()> {
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| args.input.with_extension("xml"));
    let items = sync::csv_to_xml(&args.input, &output, args.csv.read_options()?)?;
    println!(
        "CSV file '{}' has been converted to XML file '{}' ({items} items)",
        args.input.display(),
        output.display()
    );
    Ok(())
}

fn execute_merge(args: MergeArgs) -> Result<()> {
    let from_file = match &args.config {
        Some(path) => PartialMergeConfig::load(path)?,
        None => PartialMergeConfig::default(),
    };
    let config = from_file
        .merged_with(PartialMergeConfig {
            key_field: args.key_field.clone(),
            value_field: args.value_field.clone(),
            original_field: args.original_field.clone(),
            novel_field: args.novel_field.clone(),
        })
        .resolve()?;

    let options = MergeOptions {
        read: args.csv.read_options()?,
        max_depth: args.max_depth,
    };
    let summary = sync::merge_files(
        &args.csv_input,
        &args.xml_input,
        args.output.as_deref(),
        &config,
        &options,
    )?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{summary}");
    }
    Ok(())
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Export tables to CSV/XML and merge CSV columns into XML documents."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the tables of a database.
    Tables(TablesArgs),
    /// Write a database table to a CSV file.
    Export(ExportArgs),
    /// Turn a CSV file into an XML file.
    Convert(ConvertArgs),
    /// Import a CSV column into an XML file by matching a shared key.
    Merge(MergeArgs),
}

#[derive(clap::Args)]
struct TablesArgs {
    /// SQLite database file.
    #[arg(long)]
    database: PathBuf,
}

#[derive(clap::Args)]
struct ExportArgs {
    /// SQLite database file.
    #[arg(long)]
    database: PathBuf,

    /// Table to export.
    #[arg(long)]
    table: String,

    /// Directory receiving `<table>.csv`.
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Also convert the exported CSV into `<table>.xml`.
    #[arg(long)]
    xml: bool,
}

#[derive(clap::Args)]
struct ConvertArgs {
    /// CSV input file.
    #[arg(long)]
    input: PathBuf,

    /// XML output file; defaults to the input with an `.xml` extension.
    #[arg(long)]
    output: Option<PathBuf>,

    #[command(flatten)]
    csv: CsvArgs,
}

#[derive(clap::Args)]
struct MergeArgs {
    /// CSV file supplying keys and values.
    #[arg(long = "csv")]
    csv_input: PathBuf,

    /// XML file receiving the merged values.
    #[arg(long = "xml")]
    xml_input: PathBuf,

    /// Destination file; defaults to `<xml stem>_merged.xml`.
    #[arg(long)]
    output: Option<PathBuf>,

    /// JSON file holding `key_field`, `value_field`, `original_field` and `novel_field`.
    #[arg(long)]
    config: Option<PathBuf>,

    /// CSV column identifying a record.
    #[arg(long)]
    key_field: Option<String>,

    /// CSV column supplying the merged value.
    #[arg(long)]
    value_field: Option<String>,

    /// XML field carrying the key of each element.
    #[arg(long)]
    original_field: Option<String>,

    /// XML field receiving the merged value.
    #[arg(long)]
    novel_field: Option<String>,

    /// Deepest element nesting accepted before the tree is rejected.
    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: usize,

    /// Print the run summary as JSON.
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    csv: CsvArgs,
}

#[derive(clap::Args)]
struct CsvArgs {
    /// Field delimiter of the CSV input.
    #[arg(long, default_value_t = ',')]
    delimiter: char,

    /// Skip rows whose field count differs from the header instead of failing.
    #[arg(long)]
    skip_malformed_rows: bool,
}

impl CsvArgs {
    fn read_options(&self) -> Result<ReadOptions> {
        let delimiter = u8::try_from(self.delimiter).map_err(|_| {
            ToolError::InvalidConfig(format!("delimiter '{}' does not fit in one byte", self.delimiter))
        })?;
        Ok(ReadOptions {
            delimiter,
            row_policy: if self.skip_malformed_rows {
                RowPolicy::Skip
            } else {
                RowPolicy::Strict
            },
        })
    }
}
