//! Delimiter reformatting: re-emit a delimited file as pipe-separated
//! UTF-8 with empty fields filled as `NULL`.

use std::borrow::Cow;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use csv::{ByteRecord, ReaderBuilder, WriterBuilder};
use encoding_rs::{Encoding, UTF_8};
use tempfile::NamedTempFile;

use crate::encoding::decode;
use crate::error::{Error, Result};

/// Output delimiter shared by every sample in the corpus.
pub const SAMPLE_DELIMITER: u8 = b'|';

/// Token written for empty fields.
pub const NULL_TOKEN: &str = "NULL";

#[derive(Debug, Clone, Copy)]
pub struct ReformatOptions {
    /// Input delimiter.
    pub delimiter: u8,
    /// Whether the first record is a header row.
    pub header: bool,
    /// Source encoding; fields are decoded to UTF-8 before writing.
    pub encoding: &'static Encoding,
}

impl Default for ReformatOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            header: false,
            encoding: UTF_8,
        }
    }
}

/// What a reformat pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReformatStats {
    /// Data rows written.
    pub rows: u64,
    /// Rows dropped because their field count disagreed with the first row.
    pub skipped: u64,
}

/// Rewrites `src` to `dest` with the sample delimiter, `NULL` fill, and
/// UTF-8 fields. Rows whose width disagrees with the first row are skipped
/// and counted. When `dest == src` the rewrite is atomic.
///
/// # Errors
///
/// Returns an error when either file cannot be accessed or a record cannot
/// be parsed at all.
pub fn reformat(src: &Path, dest: &Path, options: &ReformatOptions) -> Result<ReformatStats> {
    let input = BufReader::new(File::open(src)?);
    let mut reader = ReaderBuilder::new()
        .delimiter(options.delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(input);

    if dest == src {
        let dir = dest.parent().ok_or_else(|| Error::Csv {
            path: dest.to_path_buf(),
            details: Cow::from("destination has no parent directory"),
        })?;
        let mut tmp = NamedTempFile::new_in(dir)?;
        let stats = write_records(&mut reader, tmp.as_file_mut(), src, options)?;
        tmp.persist(dest).map_err(|e| e.error)?;
        Ok(stats)
    } else {
        let mut out = BufWriter::new(File::create(dest)?);
        write_records(&mut reader, &mut out, src, options)
    }
}

fn write_records<R: std::io::Read, W: Write>(
    reader: &mut csv::Reader<R>,
    out: W,
    src: &Path,
    options: &ReformatOptions,
) -> Result<ReformatStats> {
    let mut writer = WriterBuilder::new()
        .delimiter(SAMPLE_DELIMITER)
        .from_writer(out);

    let mut record = ByteRecord::new();
    let mut width: Option<usize> = None;
    let mut stats = ReformatStats { rows: 0, skipped: 0 };
    let mut header_pending = options.header;

    while reader
        .read_byte_record(&mut record)
        .map_err(|e| Error::csv(src, &e))?
    {
        let expected = *width.get_or_insert(record.len());
        if record.len() != expected {
            stats.skipped += 1;
            continue;
        }
        let mut fields = Vec::with_capacity(record.len());
        for raw in &record {
            let field = decode(raw, options.encoding);
            if field.is_empty() && !header_pending {
                fields.push(Cow::Borrowed(NULL_TOKEN));
            } else {
                fields.push(field);
            }
        }
        writer
            .write_record(fields.iter().map(Cow::as_ref))
            .map_err(|e| Error::csv(src, &e))?;
        if header_pending {
            header_pending = false;
        } else {
            stats.rows += 1;
        }
    }
    writer.flush()?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::{ReformatOptions, reformat};
    use encoding_rs::WINDOWS_1252;
    use std::fs;

    #[test]
    fn redelimits_and_fills_null() {
        let dir = tempfile::tempdir().expect("tempdir");
        let src = dir.path().join("in.csv");
        let dest = dir.path().join("out.csv");
        fs::write(&src, "a,b,c\n1,,3\n4,5,6\n").expect("write input");

        let stats = reformat(
            &src,
            &dest,
            &ReformatOptions {
                header: true,
                ..ReformatOptions::default()
            },
        )
        .expect("reformat");
        assert_eq!(stats.rows, 2);
        assert_eq!(stats.skipped, 0);
        let out = fs::read_to_string(&dest).expect("read output");
        assert_eq!(out, "a|b|c\n1|NULL|3\n4|5|6\n");
    }

    #[test]
    fn ragged_rows_are_skipped_not_fatal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let src = dir.path().join("in.csv");
        let dest = dir.path().join("out.csv");
        fs::write(&src, "1,2\n1,2,3\n3,4\n").expect("write input");

        let stats = reformat(&src, &dest, &ReformatOptions::default()).expect("reformat");
        assert_eq!(stats.rows, 2);
        assert_eq!(stats.skipped, 1);
        assert_eq!(
            fs::read_to_string(&dest).expect("read output"),
            "1|2\n3|4\n"
        );
    }

    #[test]
    fn in_place_rewrite_is_atomic_replacement() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("data.csv");
        fs::write(&path, "x;y\n1;2\n").expect("write input");

        let stats = reformat(
            &path,
            &path,
            &ReformatOptions {
                delimiter: b';',
                header: true,
                ..ReformatOptions::default()
            },
        )
        .expect("reformat");
        assert_eq!(stats.rows, 1);
        assert_eq!(
            fs::read_to_string(&path).expect("read output"),
            "x|y\n1|2\n"
        );
    }

    #[test]
    fn pipe_in_field_gets_quoted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let src = dir.path().join("in.csv");
        let dest = dir.path().join("out.csv");
        fs::write(&src, "a,b|c\n").expect("write input");

        reformat(&src, &dest, &ReformatOptions::default()).expect("reformat");
        assert_eq!(
            fs::read_to_string(&dest).expect("read output"),
            "a|\"b|c\"\n"
        );
    }

    #[test]
    fn decodes_legacy_encoding() {
        let dir = tempfile::tempdir().expect("tempdir");
        let src = dir.path().join("in.csv");
        let dest = dir.path().join("out.csv");
        fs::write(&src, b"caf\xe9,1\n").expect("write input");

        reformat(
            &src,
            &dest,
            &ReformatOptions {
                encoding: WINDOWS_1252,
                ..ReformatOptions::default()
            },
        )
        .expect("reformat");
        assert_eq!(
            fs::read_to_string(&dest).expect("read output"),
            "caf\u{e9}|1\n"
        );
    }
}
