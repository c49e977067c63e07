pub mod csv_read;
pub mod csv_write;
pub mod xml;

use std::io::{BufWriter, Write};
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::debug;

use crate::tabmerge::tools::error::{Result, ToolError};

/// Writes a file through a temporary sibling that replaces `path` only once
/// `write` has completed successfully.
///
/// When `write` fails the temporary file is removed and `path` is untouched.
pub fn write_atomically<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut dyn Write) -> Result<()>,
{
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let temporary = NamedTempFile::new_in(directory)?;
    {
        let mut writer = BufWriter::new(temporary.as_file());
        write(&mut writer)?;
        writer.flush()?;
    }
    temporary.as_file().sync_all()?;
    temporary
        .persist(path)
        .map_err(|err| ToolError::Io(err.error))?;
    debug!(path = %path.display(), "file written");
    Ok(())
}
