//! Corpus size report: one CSV record per table.

use std::fs::{self, File};
use std::io::{BufReader, Write};
use std::path::Path;

use csv::WriterBuilder;

use crate::corpus::{METADATA_DIR, TableLayout, tables_dir};
use crate::error::{Error, Result};
use crate::trim::count_rows;

/// Writes `table_name,rows,file_size` records for every table under the
/// root, sorted by table name. Missing samples report zero rows and bytes.
///
/// # Errors
///
/// Returns an error when the tree cannot be walked or the writer fails.
pub fn report<W: Write>(root: &Path, out: W) -> Result<()> {
    let mut writer = WriterBuilder::new().from_writer(out);
    let write_err = |e: &csv::Error| Error::csv(root.join("report.csv"), e);
    writer
        .write_record(["table_name", "rows", "file_size"])
        .map_err(|e| write_err(&e))?;

    let tables = tables_dir(root);
    if !tables.is_dir() {
        writer.flush()?;
        return Ok(());
    }
    let mut names: Vec<String> = fs::read_dir(&tables)?
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name != METADATA_DIR)
        .collect();
    names.sort();

    let mut row_buf = itoa::Buffer::new();
    let mut size_buf = itoa::Buffer::new();
    for name in names {
        let sample = TableLayout::new(root, &name).sample_path();
        let (rows, size) = match sample.metadata() {
            Ok(meta) => {
                let mut reader = BufReader::new(File::open(&sample)?);
                (count_rows(&mut reader, false)?, meta.len())
            }
            Err(_) => (0, 0),
        };
        writer
            .write_record([name.as_str(), row_buf.format(rows), size_buf.format(size)])
            .map_err(|e| write_err(&e))?;
    }
    writer.flush()?;
    Ok(())
}
