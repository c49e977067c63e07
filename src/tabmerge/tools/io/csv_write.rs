use std::path::Path;

use csv::WriterBuilder;

use crate::tabmerge::tools::error::Result;
use crate::tabmerge::tools::io::write_atomically;

/// Writes a header row followed by `rows` to the CSV file at `path`.
pub fn write_rows<I, Row>(path: &Path, columns: &[String], rows: I) -> Result<usize>
where
    I: IntoIterator<Item = Result<Row>>,
    Row: AsRef<[String]>,
{
    let mut written = 0;
    write_atomically(path, |sink| {
        let mut writer = WriterBuilder::new().from_writer(sink);
        writer.write_record(columns)?;
        for row in rows {
            writer.write_record(row?.as_ref())?;
            written += 1;
        }
        writer.flush()?;
        Ok(())
    })?;
    Ok(written)
}
