//! Corpus model and on-disk layout.
//!
//! A corpus is a directory tree of tables:
//!
//! ```text
//! <root>/
//!   tables/<table>/raw/        downloaded + decompressed inputs
//!   tables/<table>/<table>.csv the sample
//!   tables/<table>/schema.json
//!   tables/<table>/schema.yaml
//!   metadata/manifest.csv      per-table delimiter map (optional)
//!   report.csv
//! ```

use std::borrow::Cow;
use std::fs::File;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

/// Directory name reserved for the manifest; never a table.
pub const METADATA_DIR: &str = "metadata";

/// A corpus spec deserialized from YAML.
#[derive(Debug, Clone, Deserialize)]
pub struct CorpusSpec {
    pub name: String,
    pub tables: Vec<TableSpec>,
}

/// One table of a corpus and where its data comes from.
#[derive(Debug, Clone, Deserialize)]
pub struct TableSpec {
    pub name: String,
    pub source: Source,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    #[serde(default)]
    pub header: bool,
    #[serde(default)]
    pub encoding: Option<String>,
}

const fn default_delimiter() -> char {
    ','
}

/// Where a table's raw data lives. Variants are told apart by their fields.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged, deny_unknown_fields)]
pub enum Source {
    /// Direct downloads.
    Urls { urls: Vec<String> },
    /// Scrape an HTML directory listing and download every file link.
    Index {
        url: String,
        #[serde(default)]
        suffix: Option<String>,
    },
    /// A Google Drive file id.
    Drive { id: String, file_name: String },
    /// Public S3-compatible bucket listing.
    Bucket {
        endpoint: String,
        prefix: String,
        #[serde(default)]
        key_pattern: Option<String>,
    },
}

impl CorpusSpec {
    /// Loads and validates a corpus spec from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read, the YAML does not
    /// match the model, or a table name is invalid.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let spec: Self = serde_yaml::from_reader(file).map_err(|e| Error::InvalidSpec {
            details: Cow::Owned(format!("{}: {e}", path.display())),
        })?;
        spec.validate()?;
        Ok(spec)
    }

    fn validate(&self) -> Result<()> {
        for table in &self.tables {
            if table.name.is_empty()
                || table.name.contains('/')
                || table.name.contains('\\')
                || table.name == METADATA_DIR
            {
                return Err(Error::InvalidSpec {
                    details: Cow::Owned(format!("invalid table name '{}'", table.name)),
                });
            }
        }
        Ok(())
    }
}

/// Pure path construction for one table under a corpus root.
#[derive(Debug, Clone)]
pub struct TableLayout {
    root: PathBuf,
    table: String,
}

impl TableLayout {
    pub fn new(root: impl Into<PathBuf>, table: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            table: table.into(),
        }
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub fn table_dir(&self) -> PathBuf {
        self.root.join("tables").join(&self.table)
    }

    #[must_use]
    pub fn raw_dir(&self) -> PathBuf {
        self.table_dir().join("raw")
    }

    #[must_use]
    pub fn sample_path(&self) -> PathBuf {
        self.table_dir().join(format!("{}.csv", self.table))
    }

    #[must_use]
    pub fn schema_json_path(&self) -> PathBuf {
        self.table_dir().join("schema.json")
    }

    #[must_use]
    pub fn schema_yaml_path(&self) -> PathBuf {
        self.table_dir().join("schema.yaml")
    }
}

/// `<root>/tables`, where every table dir lives.
#[must_use]
pub fn tables_dir(root: &Path) -> PathBuf {
    root.join("tables")
}

/// `<root>/metadata/manifest.csv`.
#[must_use]
pub fn manifest_path(root: &Path) -> PathBuf {
    root.join(METADATA_DIR).join("manifest.csv")
}

/// `<root>/report.csv`.
#[must_use]
pub fn report_path(root: &Path) -> PathBuf {
    root.join("report.csv")
}
