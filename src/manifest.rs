//! Per-table delimiter manifest at `metadata/manifest.csv`.

use std::borrow::Cow;
use std::fs::File;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, WriterBuilder};
use serde::Deserialize;

use crate::corpus::{manifest_path, tables_dir};
use crate::decompress::data_name;
use crate::error::{Error, Result};

/// One manifest row: a table's data file name and how to parse it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub filename: String,
    pub delimiter: u8,
    pub header: bool,
}

impl ManifestEntry {
    /// Table name the entry refers to: the file stem of its data file.
    #[must_use]
    pub fn table(&self) -> &str {
        Path::new(&self.filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.filename)
    }
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    filename: String,
    delimiter: String,
    #[serde(default)]
    header: Option<String>,
}

/// The delimiter map for a corpus.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// Reads a manifest CSV. The delimiter field unescapes `\t` and an
    /// empty delimiter defaults to `,`; a missing `header` column defaults
    /// to false.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or a row does not fit
    /// the expected shape.
    pub fn read(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mut reader = ReaderBuilder::new().flexible(true).from_reader(file);
        let mut entries = Vec::new();
        for raw in reader.deserialize::<RawEntry>() {
            let raw = raw.map_err(|e| Error::InvalidManifest {
                details: Cow::Owned(format!("{}: {e}", path.display())),
            })?;
            entries.push(ManifestEntry {
                filename: raw.filename,
                delimiter: parse_delimiter(&raw.delimiter)?,
                header: parse_header(raw.header.as_deref())?,
            });
        }
        Ok(Self { entries })
    }

    /// Writes the manifest back out, header row included.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be written.
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = WriterBuilder::new().from_path(path).map_err(|e| {
            Error::InvalidManifest {
                details: Cow::Owned(format!("{}: {e}", path.display())),
            }
        })?;
        let write_err = |e: &csv::Error| Error::InvalidManifest {
            details: Cow::Owned(format!("{}: {e}", path.display())),
        };
        writer
            .write_record(["filename", "delimiter", "header"])
            .map_err(|e| write_err(&e))?;
        for entry in &self.entries {
            let delimiter = if entry.delimiter == b'\t' {
                "\\t".to_owned()
            } else {
                char::from(entry.delimiter).to_string()
            };
            writer
                .write_record([
                    entry.filename.as_str(),
                    delimiter.as_str(),
                    if entry.header { "true" } else { "false" },
                ])
                .map_err(|e| write_err(&e))?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Drops entries whose table has no data file under the corpus root and
    /// rewrites the manifest. Returns the dropped table names.
    ///
    /// # Errors
    ///
    /// Returns an error when the manifest cannot be rewritten.
    pub fn retain_present(&mut self, root: &Path) -> Result<Vec<String>> {
        let mut dropped = Vec::new();
        self.entries.retain(|entry| {
            if data_file_for(root, entry).is_some() {
                true
            } else {
                dropped.push(entry.table().to_owned());
                false
            }
        });
        if !dropped.is_empty() {
            self.write(&manifest_path(root))?;
        }
        Ok(dropped)
    }
}

fn parse_delimiter(field: &str) -> Result<u8> {
    let unescaped = match field {
        "" => ",",
        "\\t" => "\t",
        other => other,
    };
    let mut bytes = unescaped.bytes();
    match (bytes.next(), bytes.next()) {
        (Some(b), None) => Ok(b),
        _ => Err(Error::InvalidManifest {
            details: Cow::Owned(format!("delimiter {field:?} is not a single byte")),
        }),
    }
}

fn parse_header(field: Option<&str>) -> Result<bool> {
    match field {
        None | Some("") => Ok(false),
        Some(text) => text.parse().map_err(|_| Error::InvalidManifest {
            details: Cow::Owned(format!("header {text:?} is not a bool")),
        }),
    }
}

/// Finds the data file a manifest entry points at: the listed file itself,
/// its decompressed name, or a compressed variant.
fn data_file_for(root: &Path, entry: &ManifestEntry) -> Option<PathBuf> {
    let table_dir = tables_dir(root).join(entry.table());
    let mut candidates = vec![
        table_dir.join(&entry.filename),
        table_dir.join(data_name(&entry.filename)),
    ];
    for suffix in ["bz2", "gz", "xz", "zst", "zip"] {
        candidates.push(table_dir.join(format!("{}.{suffix}", entry.filename)));
    }
    candidates.into_iter().find(|c| c.is_file())
}

/// Checks every manifest entry against the corpus tree and returns the
/// tables with no data file.
#[must_use]
pub fn verify(root: &Path, manifest: &Manifest) -> Vec<String> {
    manifest
        .entries
        .iter()
        .filter(|entry| data_file_for(root, entry).is_none())
        .map(|entry| entry.table().to_owned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{Manifest, ManifestEntry};
    use std::fs;

    #[test]
    fn reads_delimiters_and_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("manifest.csv");
        fs::write(
            &path,
            "filename,delimiter,header\nlineitem.csv,|,true\nnation.csv,\\t,\nregion.csv,,\n",
        )
        .expect("write manifest");

        let manifest = Manifest::read(&path).expect("read");
        assert_eq!(
            manifest.entries,
            vec![
                ManifestEntry {
                    filename: "lineitem.csv".into(),
                    delimiter: b'|',
                    header: true,
                },
                ManifestEntry {
                    filename: "nation.csv".into(),
                    delimiter: b'\t',
                    header: false,
                },
                ManifestEntry {
                    filename: "region.csv".into(),
                    delimiter: b',',
                    header: false,
                },
            ]
        );
        assert_eq!(manifest.entries[0].table(), "lineitem");
    }

    #[test]
    fn bad_header_field_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("manifest.csv");
        fs::write(&path, "filename,delimiter,header\na.csv,|,maybe\n").expect("write manifest");
        assert!(Manifest::read(&path).is_err());
    }

    #[test]
    fn roundtrips_through_write() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("manifest.csv");
        let manifest = Manifest {
            entries: vec![ManifestEntry {
                filename: "orders.csv".into(),
                delimiter: b'\t',
                header: false,
            }],
        };
        manifest.write(&path).expect("write");
        assert_eq!(Manifest::read(&path).expect("read"), manifest);
    }
}
