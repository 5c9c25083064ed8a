//! Removal of tables that fail the corpus gates.

use std::fmt;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

use crate::corpus::{METADATA_DIR, TableLayout, tables_dir};
use crate::error::Result;
use crate::logger::log_info;
use crate::trim::count_rows;

/// Why a table was removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reason {
    /// The sample holds fewer logical rows than the budget. A missing
    /// sample counts as zero rows.
    UnderBudget { rows: u64 },
    /// The sample file exceeds the size cap.
    Oversized { bytes: u64 },
    /// The table name was excluded on the command line.
    Excluded,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnderBudget { rows } => write!(f, "{rows} rows under budget"),
            Self::Oversized { bytes } => write!(f, "sample is {bytes} bytes"),
            Self::Excluded => write!(f, "excluded by name"),
        }
    }
}

/// One removed table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removed {
    pub table: String,
    pub reason: Reason,
}

/// Removes every table dir whose sample is under the row budget, over the
/// byte cap, or whose name is excluded. Returns what was removed and why.
///
/// # Errors
///
/// Returns an error when the tree cannot be walked or a dir cannot be
/// removed.
pub fn prune(
    root: &Path,
    budget: u64,
    max_bytes: u64,
    exclude: &[String],
    has_header: bool,
) -> Result<Vec<Removed>> {
    let tables = tables_dir(root);
    if !tables.is_dir() {
        return Ok(Vec::new());
    }

    let mut names: Vec<String> = fs::read_dir(&tables)?
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name != METADATA_DIR)
        .collect();
    names.sort();

    let mut removed = Vec::new();
    for name in names {
        let layout = TableLayout::new(root, &name);
        let reason = removal_reason(&layout, budget, max_bytes, exclude, has_header)?;
        if let Some(reason) = reason {
            log_info(&format!("removing table {name}: {reason}"));
            fs::remove_dir_all(layout.table_dir())?;
            removed.push(Removed {
                table: name,
                reason,
            });
        }
    }
    Ok(removed)
}

fn removal_reason(
    layout: &TableLayout,
    budget: u64,
    max_bytes: u64,
    exclude: &[String],
    has_header: bool,
) -> Result<Option<Reason>> {
    if exclude.iter().any(|name| name == layout.table()) {
        return Ok(Some(Reason::Excluded));
    }
    let sample = layout.sample_path();
    let Ok(meta) = sample.metadata() else {
        return Ok(Some(Reason::UnderBudget { rows: 0 }));
    };
    if meta.len() > max_bytes {
        return Ok(Some(Reason::Oversized { bytes: meta.len() }));
    }
    let mut reader = BufReader::new(File::open(&sample)?);
    let rows = count_rows(&mut reader, has_header)?;
    if rows < budget {
        return Ok(Some(Reason::UnderBudget { rows }));
    }
    Ok(None)
}
