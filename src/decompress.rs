//! Extension-detected streaming decompression and zip extraction.

use std::borrow::Cow;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read};
use std::path::{Path, PathBuf};

use zip::ZipArchive;

use crate::error::{Error, Result};
use crate::logger::log_warn;

/// Compression scheme detected from a file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Bz2,
    Gz,
    Xz,
    Zst,
    Zip,
    None,
}

impl Compression {
    #[must_use]
    pub fn detect(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("bz2") => Self::Bz2,
            Some("gz") => Self::Gz,
            Some("xz") => Self::Xz,
            Some("zst") => Self::Zst,
            Some("zip") => Self::Zip,
            _ => Self::None,
        }
    }
}

/// `data_name("x.csv.bz2") == "x.csv"`: the name a compressed file carries
/// once decoded. Names without a compression extension pass through.
#[must_use]
pub fn data_name(name: &str) -> &str {
    for suffix in [".bz2", ".gz", ".xz", ".zst"] {
        if name.len() > suffix.len()
            && name
                .get(name.len() - suffix.len()..)
                .is_some_and(|tail| tail.eq_ignore_ascii_case(suffix))
        {
            return &name[..name.len() - suffix.len()];
        }
    }
    name
}

/// What a decompression pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Written,
    Skipped,
}

fn decoder(src: &Path, input: BufReader<File>) -> Result<Box<dyn Read>> {
    match Compression::detect(src) {
        Compression::Bz2 => Ok(Box::new(bzip2::read::BzDecoder::new(input))),
        Compression::Gz => Ok(Box::new(flate2::read::MultiGzDecoder::new(input))),
        Compression::Xz => Ok(Box::new(xz2::read::XzDecoder::new(input))),
        Compression::Zst => {
            let decoder = zstd::stream::read::Decoder::new(input).map_err(|e| Error::Decompress {
                path: src.to_path_buf(),
                details: Cow::Owned(e.to_string()),
            })?;
            Ok(Box::new(decoder))
        }
        Compression::Zip => Err(Error::Decompress {
            path: src.to_path_buf(),
            details: Cow::from("zip archives go through extract_zip"),
        }),
        Compression::None => Ok(Box::new(input)),
    }
}

/// Streams `src` through the decoder matching its extension into `dest`.
/// Skips when `dest` already exists and is non-empty. The write goes to
/// `dest.part` first and is renamed into place.
///
/// # Errors
///
/// Returns an error when the stream cannot be decoded or written.
pub fn decompress(src: &Path, dest: &Path) -> Result<Outcome> {
    if dest.metadata().is_ok_and(|m| m.len() > 0) {
        return Ok(Outcome::Skipped);
    }
    let input = BufReader::new(File::open(src)?);
    let mut reader = decoder(src, input)?;

    let part = part_path(dest);
    let mut writer = BufWriter::new(File::create(&part)?);
    io::copy(&mut reader, &mut writer).map_err(|e| Error::Decompress {
        path: src.to_path_buf(),
        details: Cow::Owned(e.to_string()),
    })?;
    // Flush failures must surface before the rename, or a truncated file
    // passes every later skip-if-exists check.
    writer.into_inner().map_err(io::IntoInnerError::into_error)?;
    fs::rename(&part, dest)?;
    Ok(Outcome::Written)
}

/// Extracts every zip entry whose extension matches `suffix` into
/// `dest_dir`, preserving archive-safe entry paths. Entries that escape the
/// target directory are skipped. Returns the extracted paths.
///
/// # Errors
///
/// Returns an error when the archive cannot be read or an entry cannot be
/// written.
pub fn extract_zip(src: &Path, dest_dir: &Path, suffix: &str) -> Result<Vec<PathBuf>> {
    let file = File::open(src)?;
    let mut archive = ZipArchive::new(file).map_err(|e| Error::Decompress {
        path: src.to_path_buf(),
        details: Cow::Owned(e.to_string()),
    })?;

    let mut extracted = Vec::new();
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(|e| Error::Decompress {
            path: src.to_path_buf(),
            details: Cow::Owned(e.to_string()),
        })?;
        let Some(enclosed_name) = entry.enclosed_name() else {
            log_warn(&format!(
                "skipping zip entry with unsafe path in {}",
                src.display()
            ));
            continue;
        };
        if entry.is_dir() {
            continue;
        }
        if !enclosed_name
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(suffix))
        {
            continue;
        }

        let output_path = dest_dir.join(&enclosed_name);
        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut outfile = File::create(&output_path)?;
        io::copy(&mut entry, &mut outfile).map_err(|e| Error::Decompress {
            path: src.to_path_buf(),
            details: Cow::Owned(e.to_string()),
        })?;
        extracted.push(output_path);
    }
    Ok(extracted)
}

/// Extensions the sampler recognizes as data files.
const DATA_EXTENSIONS: [&str; 3] = ["csv", "tbl", "parquet"];

fn is_data_file(path: &Path) -> bool {
    path.extension()
        .is_some_and(|e| DATA_EXTENSIONS.iter().any(|ext| e.eq_ignore_ascii_case(ext)))
}

/// Decompresses every file in `dir`, extracts data entries from zip
/// archives, and returns the sorted data files.
///
/// # Errors
///
/// Returns an error when a stream cannot be decoded or the directory cannot
/// be read.
pub fn prepare_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    entries.sort();

    for path in &entries {
        match Compression::detect(path) {
            Compression::None => {}
            Compression::Zip => {
                for suffix in DATA_EXTENSIONS {
                    extract_zip(path, dir, suffix)?;
                }
            }
            _ => {
                let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                decompress(path, &dir.join(data_name(name)))?;
            }
        }
    }

    let mut data_files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_data_file(path))
        .collect();
    data_files.sort();
    Ok(data_files)
}

pub(crate) fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::{Compression, Outcome, data_name, decompress};
    use std::fs;
    use std::io::Write;
    use std::path::Path;

    #[test]
    fn detects_by_extension() {
        assert_eq!(Compression::detect(Path::new("a.csv.bz2")), Compression::Bz2);
        assert_eq!(Compression::detect(Path::new("a.csv.GZ")), Compression::Gz);
        assert_eq!(Compression::detect(Path::new("a.tbl.xz")), Compression::Xz);
        assert_eq!(Compression::detect(Path::new("a.csv.zst")), Compression::Zst);
        assert_eq!(Compression::detect(Path::new("a.zip")), Compression::Zip);
        assert_eq!(Compression::detect(Path::new("a.csv")), Compression::None);
        assert_eq!(Compression::detect(Path::new("archive")), Compression::None);
    }

    #[test]
    fn data_name_strips_one_compression_suffix() {
        assert_eq!(data_name("x.csv.bz2"), "x.csv");
        assert_eq!(data_name("x.csv.GZ"), "x.csv");
        assert_eq!(data_name("x.csv"), "x.csv");
        assert_eq!(data_name(".gz"), ".gz");
    }

    #[test]
    fn gz_roundtrip_and_skip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let src = dir.path().join("data.csv.gz");
        let dest = dir.path().join("data.csv");

        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(b"a,b\n1,2\n").expect("encode");
        fs::write(&src, encoder.finish().expect("finish")).expect("write gz");

        assert_eq!(decompress(&src, &dest).expect("decompress"), Outcome::Written);
        assert_eq!(fs::read_to_string(&dest).expect("read"), "a,b\n1,2\n");
        // Second pass sees the non-empty output and skips.
        assert_eq!(decompress(&src, &dest).expect("decompress"), Outcome::Skipped);
    }
}
