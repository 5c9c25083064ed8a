//! Raw float32 column files to a sample.
//!
//! Each input file is one column of little-endian f32 values; columns are
//! ordered by file name.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt};
use csv::{ByteRecord, WriterBuilder};
use ryu::Buffer as RyuBuffer;

use crate::corpus::TableLayout;
use crate::error::Result;
use crate::logger::log_warn;
use crate::reformat::SAMPLE_DELIMITER;
use crate::schema::{ColumnDef, ColumnType, TableSchema, write_sidecars};

/// Reads the first `budget` values of each input column file and writes the
/// sample (pipe-delimited, no header) plus sidecars with every column typed
/// `FLOAT`, `NOT NULL`. A file shorter than the budget is skipped with a
/// warning. Returns the number of rows written.
///
/// # Errors
///
/// Returns an error when a file cannot be read or the sample cannot be
/// written.
pub fn floats_to_sample(inputs: &[PathBuf], layout: &TableLayout, budget: u64) -> Result<u64> {
    let mut ordered: Vec<&PathBuf> = inputs.iter().collect();
    ordered.sort_by_key(|path| path.file_name().map(std::ffi::OsStr::to_owned));

    let mut columns: Vec<Vec<f32>> = Vec::new();
    for path in ordered {
        match read_column(path, budget)? {
            Some(values) => columns.push(values),
            None => log_warn(&format!(
                "{} holds fewer than {budget} values, skipping column",
                path.display()
            )),
        }
    }

    let rows = if columns.is_empty() {
        0
    } else {
        usize::try_from(budget).unwrap_or(usize::MAX)
    };
    fs::create_dir_all(layout.table_dir())?;
    let out = BufWriter::new(File::create(layout.sample_path())?);
    let mut writer = WriterBuilder::new()
        .delimiter(SAMPLE_DELIMITER)
        .from_writer(out);
    let mut record = ByteRecord::new();
    let mut ryu = RyuBuffer::new();
    for row in 0..rows {
        record.clear();
        for column in &columns {
            record.push_field(ryu.format(column[row]).as_bytes());
        }
        writer
            .write_byte_record(&record)
            .map_err(|e| crate::error::Error::csv(layout.sample_path(), &e))?;
    }
    writer.flush()?;

    let schema = TableSchema {
        table: layout.table().to_owned(),
        columns: columns
            .iter()
            .enumerate()
            .map(|(index, _)| ColumnDef {
                name: format!("column{index}"),
                column_type: ColumnType::Float,
                nullable: false,
                index,
            })
            .collect(),
    };
    write_sidecars(layout, &schema)?;
    Ok(rows as u64)
}

/// Reads up to `budget` f32 values; `None` when the file ends early.
fn read_column(path: &Path, budget: u64) -> Result<Option<Vec<f32>>> {
    let mut reader = BufReader::new(File::open(path)?);
    let capacity = usize::try_from(budget).unwrap_or(usize::MAX);
    let mut values = Vec::with_capacity(capacity.min(1 << 20));
    while (values.len() as u64) < budget {
        match reader.read_f32::<LittleEndian>() {
            Ok(value) => values.push(value),
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(err) => return Err(err.into()),
        }
    }
    Ok(Some(values))
}
