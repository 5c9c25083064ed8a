//! Per-table sample production: trim to the row budget, then reformat to
//! the corpus delimiter.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;

use encoding_rs::Encoding;
use tempfile::NamedTempFile;

use crate::corpus::TableLayout;
use crate::error::Result;
use crate::logger::{log_info, log_warn};
use crate::reformat::{ReformatOptions, reformat};
use crate::trim::{head_bytes, head_rows};

#[derive(Debug, Clone, Copy)]
pub struct SampleOptions {
    /// Input delimiter.
    pub delimiter: u8,
    /// Whether the inputs carry a header row.
    pub header: bool,
    /// Source encoding; `None` means sniff the first input.
    pub encoding: Option<&'static Encoding>,
    /// Logical data rows to keep.
    pub budget: u64,
    /// When set, trim by bytes instead of rows.
    pub max_bytes: Option<u64>,
}

/// Builds a table's sample from one or more raw data files. Inputs are
/// concatenated in the given order; with a header, only the first file's
/// header survives. Skips work when the sample already exists and is
/// non-empty. Returns the number of data rows in the sample.
///
/// # Errors
///
/// Returns an error when an input cannot be read or the sample cannot be
/// written.
pub fn sample_table(
    inputs: &[PathBuf],
    layout: &TableLayout,
    options: &SampleOptions,
) -> Result<Option<u64>> {
    let sample = layout.sample_path();
    if sample.metadata().is_ok_and(|m| m.len() > 0) {
        log_info("sample already present, skipping");
        return Ok(None);
    }
    fs::create_dir_all(layout.table_dir())?;

    let mut trimmed = NamedTempFile::new_in(layout.table_dir())?;
    let rows = trim_inputs(inputs, trimmed.as_file_mut(), options)?;
    if options.max_bytes.is_none() && rows < options.budget {
        log_warn(&format!(
            "source held {rows} rows, under the {} row budget",
            options.budget
        ));
    }

    let encoding = match options.encoding {
        Some(encoding) => encoding,
        None => match inputs.first() {
            Some(first) => crate::encoding::sniff(first)?,
            None => encoding_rs::UTF_8,
        },
    };
    reformat(
        trimmed.path(),
        &sample,
        &ReformatOptions {
            delimiter: options.delimiter,
            header: options.header,
            encoding,
        },
    )?;
    Ok(Some(rows))
}

/// Concatenates the head of each input into `out`, budget shared across
/// all of them.
fn trim_inputs(inputs: &[PathBuf], out: &mut File, options: &SampleOptions) -> Result<u64> {
    let mut writer = BufWriter::new(out);
    let mut total = 0u64;
    let mut bytes_left = options.max_bytes;
    for (index, input) in inputs.iter().enumerate() {
        let keep_header = options.header && index == 0;
        let mut reader = BufReader::new(File::open(input)?);
        if options.header && index > 0 {
            // Later chunks repeat the header; drop it.
            skip_header(&mut reader)?;
        }
        if let Some(max_bytes) = bytes_left {
            let (rows, written) = head_bytes(&mut reader, &mut writer, max_bytes, keep_header)?;
            total += rows;
            bytes_left = Some(max_bytes.saturating_sub(written));
            if bytes_left == Some(0) {
                break;
            }
        } else {
            let remaining = options.budget - total;
            total += head_rows(&mut reader, &mut writer, remaining, keep_header)?;
            if total == options.budget {
                break;
            }
        }
    }
    writer.flush()?;
    Ok(total)
}

fn skip_header(reader: &mut impl std::io::BufRead) -> Result<()> {
    let mut sink = std::io::sink();
    head_rows(reader, &mut sink, 0, true)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{SampleOptions, sample_table};
    use crate::corpus::TableLayout;
    use std::fs;

    fn options(budget: u64) -> SampleOptions {
        SampleOptions {
            delimiter: b',',
            header: true,
            encoding: None,
            budget,
            max_bytes: None,
        }
    }

    #[test]
    fn trims_reformats_and_reports_rows() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("raw.csv");
        fs::write(&input, "id,note\n1,\"a\nb\"\n2,\n3,c\n").expect("write input");
        let layout = TableLayout::new(dir.path(), "notes");

        let rows = sample_table(&[input], &layout, &options(2)).expect("sample");
        assert_eq!(rows, Some(2));
        assert_eq!(
            fs::read_to_string(layout.sample_path()).expect("read sample"),
            "id|note\n1|\"a\nb\"\n2|NULL\n"
        );
    }

    #[test]
    fn concatenates_chunks_and_drops_repeated_headers() {
        let dir = tempfile::tempdir().expect("tempdir");
        let a = dir.path().join("part_000.csv");
        let b = dir.path().join("part_001.csv");
        fs::write(&a, "id,v\n1,x\n").expect("write a");
        fs::write(&b, "id,v\n2,y\n3,z\n").expect("write b");
        let layout = TableLayout::new(dir.path(), "parts");

        let rows = sample_table(&[a, b], &layout, &options(10)).expect("sample");
        assert_eq!(rows, Some(3));
        assert_eq!(
            fs::read_to_string(layout.sample_path()).expect("read sample"),
            "id|v\n1|x\n2|y\n3|z\n"
        );
    }

    #[test]
    fn existing_sample_is_left_alone() {
        let dir = tempfile::tempdir().expect("tempdir");
        let layout = TableLayout::new(dir.path(), "t");
        fs::create_dir_all(layout.table_dir()).expect("mkdir");
        fs::write(layout.sample_path(), "already|here\n").expect("write sample");

        let rows = sample_table(&[], &layout, &options(10)).expect("sample");
        assert_eq!(rows, None);
        assert_eq!(
            fs::read_to_string(layout.sample_path()).expect("read sample"),
            "already|here\n"
        );
    }
}
