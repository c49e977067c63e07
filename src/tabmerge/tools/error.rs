use std::path::PathBuf;

use thiserror::Error;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, ToolError>;

/// Error type covering the different failure cases that can occur when the
/// tool reads, merges, or emits data.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Wrapper for IO failures such as reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised when a JSON configuration file cannot be parsed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors bubbled up from the CSV reader and writer.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Errors bubbled up from the XML reader and writer.
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Errors bubbled up from the SQLite driver.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Raised when an input file does not follow the expected structure.
    #[error("malformed input: {0}")]
    Format(String),

    /// Raised when a configured field name is not present in a dataset.
    #[error("field '{field}' does not exist in the {dataset}")]
    UnknownField { field: String, dataset: String },

    /// Raised when the merge configuration itself is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Raised when a table name is not safe to interpolate into SQL.
    #[error("invalid table name '{0}': only alphanumeric characters and underscores are allowed")]
    InvalidTableName(String),

    /// Raised when a tree is nested deeper than the traversal guard allows.
    #[error("element tree exceeds the maximum depth of {limit}; the tree is malformed or cyclic")]
    DepthExceeded { limit: usize },

    /// Raised when the user provides a path that does not exist.
    #[error("input file not found: {0}")]
    MissingInput(PathBuf),

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}

/// Coarse classification of [`ToolError`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input file.
    Format,
    /// A referenced field or name does not exist or is unusable.
    Config,
    /// Structurally invalid tree.
    Cycle,
    /// File or database could not be read or written.
    Io,
}

impl ToolError {
    /// Returns the class this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ToolError::Format(_) | ToolError::Json(_) => ErrorKind::Format,
            ToolError::Csv(err) if err.is_io_error() => ErrorKind::Io,
            ToolError::Csv(_) => ErrorKind::Format,
            ToolError::Xml(quick_xml::Error::Io(_)) => ErrorKind::Io,
            ToolError::Xml(_) => ErrorKind::Format,
            ToolError::UnknownField { .. }
            | ToolError::InvalidConfig(_)
            | ToolError::InvalidTableName(_) => ErrorKind::Config,
            ToolError::DepthExceeded { .. } => ErrorKind::Cycle,
            ToolError::Io(_)
            | ToolError::Database(_)
            | ToolError::MissingInput(_)
            | ToolError::Logging(_) => ErrorKind::Io,
        }
    }
}
