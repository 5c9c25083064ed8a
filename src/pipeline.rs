//! Staged corpus build: fetch, decompress, sample, schema per table, then
//! corpus-wide verify, prune, and report.

use std::borrow::Cow;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use regex::Regex;

use crate::corpus::{CorpusSpec, Source, TableLayout, TableSpec, manifest_path, report_path};
use crate::decompress::prepare_dir;
use crate::error::{Error, Result, Stage};
use crate::fetch::{Fetcher, download_drive, download_object, list_bucket, list_index};
use crate::logger::{log_error, log_info, set_log_prefix};
use crate::manifest::{Manifest, verify};
use crate::prune::prune;
use crate::report::report;
use crate::sample::{SampleOptions, sample_table};
use crate::schema::{InferOptions, infer_schema, write_sidecars};

/// Data rows retained per sample.
pub const ROW_BUDGET: u64 = 65_536;
/// Cap on a sample's size before its table is pruned.
pub const SAMPLE_MAX_BYTES: u64 = 100 * 1024 * 1024;
/// Byte budget for small fixed-size samples.
pub const SMALL_SAMPLE_BYTES: u64 = 64 * 1024;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub budget: u64,
    pub jobs: Option<usize>,
    pub fail_fast: bool,
    pub exclude: Vec<String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            budget: ROW_BUDGET,
            jobs: None,
            fail_fast: false,
            exclude: Vec::new(),
        }
    }
}

/// Executes the full pipeline over a corpus spec. Failures are collected
/// per table; unless `fail_fast` is set the run continues and the error
/// carries the failure count.
///
/// # Errors
///
/// Returns an error when any table fails, when verification finds missing
/// tables, or when a corpus-wide stage fails.
pub fn run(spec: &CorpusSpec, root: &Path, options: &RunOptions) -> Result<()> {
    if let Some(jobs) = options.jobs {
        // Best-effort: configure global rayon pool once. Ignore error if already set.
        let _ = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build_global();
    }
    let fetcher = Fetcher::new()?;
    log_info(&format!(
        "building corpus '{}' with {} tables",
        spec.name,
        spec.tables.len()
    ));

    let process = |table: &TableSpec| -> Result<()> {
        let _guard = set_log_prefix(&table.name);
        run_table(&fetcher, table, root, options.budget)
    };

    if options.fail_fast {
        spec.tables
            .par_iter()
            .map(process)
            .collect::<Result<Vec<_>>>()?;
    } else {
        let results = spec
            .tables
            .par_iter()
            .map(|table| {
                let result = process(table);
                if let Err(ref e) = result {
                    let _guard = set_log_prefix(&table.name);
                    log_error(&e.to_string());
                }
                result
            })
            .collect::<Vec<_>>();
        let failures = results.iter().filter(|r| r.is_err()).count();
        if failures > 0 {
            log_info(&format!("completed with {failures} failures"));
            return Err(Error::Failures { count: failures });
        }
    }

    verify_corpus(root)?;
    prune(root, options.budget, SAMPLE_MAX_BYTES, &options.exclude, false)?;
    let out = BufWriter::new(File::create(report_path(root))?);
    report(root, out)?;
    log_info("corpus build complete");
    Ok(())
}

/// Fetch and decompress only, serially per table.
///
/// # Errors
///
/// Returns the first failure.
pub fn fetch_only(spec: &CorpusSpec, root: &Path) -> Result<()> {
    let fetcher = Fetcher::new()?;
    for table in &spec.tables {
        let _guard = set_log_prefix(&table.name);
        let layout = TableLayout::new(root, &table.name);
        fs::create_dir_all(layout.raw_dir())?;
        staged(Stage::Fetch, || fetch_table(&fetcher, table, &layout))?;
        staged(Stage::Decompress, || prepare_dir(&layout.raw_dir()))?;
    }
    Ok(())
}

/// Runs a closure, logging a stage-tagged line on failure.
fn staged<T>(stage: Stage, f: impl FnOnce() -> Result<T>) -> Result<T> {
    f().inspect_err(|e| log_error(&format!("{stage} failed: {e}")))
}

/// fetch -> decompress -> sample -> schema for one table. Every stage
/// honors skip-if-exists so re-runs are cheap.
fn run_table(fetcher: &Fetcher, table: &TableSpec, root: &Path, budget: u64) -> Result<()> {
    let layout = TableLayout::new(root, &table.name);
    fs::create_dir_all(layout.raw_dir())?;

    staged(Stage::Fetch, || fetch_table(fetcher, table, &layout))?;
    let data_files = staged(Stage::Decompress, || prepare_dir(&layout.raw_dir()))?;

    if let Some(parquet) = lone_parquet(&data_files) {
        if !layout.sample_path().metadata().is_ok_and(|m| m.len() > 0) {
            staged(Stage::Convert, || {
                crate::convert::parquet_to_sample(&parquet, &layout, budget)
            })?;
        }
        return Ok(());
    }

    let encoding = table
        .encoding
        .as_deref()
        .and_then(crate::encoding::resolve_label);
    staged(Stage::Sample, || {
        sample_table(
            &data_files,
            &layout,
            &SampleOptions {
                delimiter: delimiter_byte(table.delimiter),
                header: table.header,
                encoding,
                budget,
                max_bytes: None,
            },
        )
    })?;

    if layout.schema_json_path().is_file() {
        return Ok(());
    }
    staged(Stage::Schema, || {
        let reader = BufReader::new(File::open(layout.sample_path())?);
        let schema = infer_schema(
            reader,
            &table.name,
            &layout.sample_path(),
            &InferOptions {
                has_header: table.header,
                sample_rows: budget,
                ..InferOptions::default()
            },
        )?;
        write_sidecars(&layout, &schema)
    })
}

fn fetch_table(fetcher: &Fetcher, table: &TableSpec, layout: &TableLayout) -> Result<()> {
    let raw_dir = layout.raw_dir();
    match &table.source {
        Source::Urls { urls } => {
            for url in urls {
                let name = url_file_name(url)?;
                fetcher.download(url, &raw_dir.join(name))?;
            }
        }
        Source::Index { url, suffix } => {
            for entry in list_index(fetcher, url)? {
                if let Some(suffix) = suffix
                    && !entry.file_name.ends_with(suffix.as_str())
                {
                    continue;
                }
                fetcher.download(&entry.url, &raw_dir.join(&entry.file_name))?;
            }
        }
        Source::Drive { id, file_name } => {
            download_drive(fetcher, id, &raw_dir.join(file_name))?;
        }
        Source::Bucket {
            endpoint,
            prefix,
            key_pattern,
        } => {
            let pattern = key_pattern
                .as_deref()
                .map(Regex::new)
                .transpose()
                .map_err(|e| Error::InvalidSpec {
                    details: Cow::Owned(format!("bad key_pattern for {}: {e}", table.name)),
                })?;
            for key in list_bucket(fetcher, endpoint, prefix, pattern.as_ref())? {
                let name = key.rsplit('/').next().unwrap_or(&key);
                download_object(fetcher, endpoint, &key, &raw_dir.join(name))?;
            }
        }
    }
    Ok(())
}

fn lone_parquet(data_files: &[PathBuf]) -> Option<PathBuf> {
    match data_files {
        [only]
            if only
                .extension()
                .is_some_and(|e| e.eq_ignore_ascii_case("parquet")) =>
        {
            Some(only.clone())
        }
        _ => None,
    }
}

fn verify_corpus(root: &Path) -> Result<()> {
    let path = manifest_path(root);
    if !path.is_file() {
        return Ok(());
    }
    let manifest = Manifest::read(&path)?;
    let missing = verify(root, &manifest);
    if missing.is_empty() {
        return Ok(());
    }
    for table in &missing {
        log_error(&format!("manifest table '{table}' has no data file"));
    }
    Err(Error::InvalidManifest {
        details: Cow::Owned(format!("{} tables missing", missing.len())),
    })
}

fn url_file_name(url: &str) -> Result<&str> {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty() && !name.contains('?'))
        .ok_or_else(|| Error::Http {
            url: url.to_owned(),
            details: Cow::from("url has no usable file name"),
        })
}

/// Converts a spec delimiter char to the single byte the csv layer wants.
pub(crate) fn delimiter_byte(delimiter: char) -> u8 {
    u8::try_from(delimiter).unwrap_or(b',')
}
