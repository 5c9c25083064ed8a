use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use rayon::prelude::*;
use walkdir::WalkDir;

use corpus_prep::corpus::{CorpusSpec, TableLayout, report_path};
use corpus_prep::logger::{log_error, log_info, set_log_file, set_log_prefix};
use corpus_prep::manifest::{Manifest, verify};
use corpus_prep::pipeline::{ROW_BUDGET, RunOptions, SAMPLE_MAX_BYTES, SMALL_SAMPLE_BYTES};
use corpus_prep::sample::{SampleOptions, sample_table};
use corpus_prep::schema::{InferOptions, infer_schema, write_sidecars_at};
use corpus_prep::{convert, pipeline, prune, report};

#[derive(Parser)]
#[command(
    name = "corprep",
    version,
    about = "Build a benchmark corpus: fetch, trim, reformat, and describe datasets"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full pipeline for a corpus spec.
    Run(RunArgs),
    /// Fetch and decompress only.
    Fetch(FetchArgs),
    /// Trim and reformat explicit files into table dirs.
    Sample(SampleArgs),
    /// Infer schemas and write sidecars for existing samples.
    Schema(SchemaArgs),
    /// Check every manifest entry has a data file.
    Verify(VerifyArgs),
    /// Remove tables that fail the corpus gates.
    Prune(PruneArgs),
    /// Write the corpus size report.
    Report(ReportArgs),
    /// Convert non-CSV inputs into samples.
    #[command(subcommand)]
    Convert(ConvertCommand),
}

#[derive(Parser)]
struct RunArgs {
    /// Corpus spec (YAML).
    #[arg(long)]
    corpus: PathBuf,
    /// Corpus root directory.
    #[arg(long)]
    root: PathBuf,
    /// Row budget per sample.
    #[arg(long, default_value_t = ROW_BUDGET)]
    budget: u64,
    /// Number of concurrent worker threads.
    #[arg(long)]
    jobs: Option<usize>,
    /// Stop on first error.
    #[arg(long)]
    fail_fast: bool,
    /// Mirror log output into this file.
    #[arg(long)]
    log_file: Option<PathBuf>,
    /// Table names to remove unconditionally (repeatable).
    #[arg(long = "exclude")]
    exclude: Vec<String>,
}

#[derive(Parser)]
struct FetchArgs {
    #[arg(long)]
    corpus: PathBuf,
    #[arg(long)]
    root: PathBuf,
}

#[derive(Parser)]
struct SampleArgs {
    /// Input files or directories (recurses directories for .csv).
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
    #[arg(long)]
    root: PathBuf,
    /// Input delimiter.
    #[arg(long, default_value_t = ',')]
    delimiter: char,
    /// Inputs carry a header row.
    #[arg(long)]
    header: bool,
    /// Row budget per sample.
    #[arg(long, default_value_t = ROW_BUDGET)]
    budget: u64,
    /// Trim by bytes instead of rows; without a value uses 64 KiB.
    #[arg(long, num_args = 0..=1)]
    bytes: Option<Option<u64>>,
}

#[derive(Parser)]
struct SchemaArgs {
    /// Sample files or directories (recurses directories for .csv).
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
    /// Samples carry a header row.
    #[arg(long)]
    header: bool,
    /// Rewrite sidecars even when schema.json exists.
    #[arg(long)]
    force: bool,
}

#[derive(Parser)]
struct VerifyArgs {
    #[arg(long)]
    root: PathBuf,
}

#[derive(Parser)]
struct PruneArgs {
    #[arg(long)]
    root: PathBuf,
    /// Minimum rows a sample must hold.
    #[arg(long, default_value_t = ROW_BUDGET)]
    budget: u64,
    /// Maximum sample size in bytes.
    #[arg(long = "max-bytes", default_value_t = SAMPLE_MAX_BYTES)]
    max_bytes: u64,
    /// Samples carry a header row.
    #[arg(long)]
    header: bool,
    /// Table names to remove unconditionally (repeatable).
    #[arg(long = "exclude")]
    exclude: Vec<String>,
}

#[derive(Parser)]
struct ReportArgs {
    #[arg(long)]
    root: PathBuf,
    /// Output path; defaults to <root>/report.csv.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Subcommand)]
enum ConvertCommand {
    /// Parquet file to a sample plus sidecars.
    Parquet(ConvertParquetArgs),
    /// Raw little-endian f32 column files to a sample plus sidecars.
    Floats(ConvertFloatsArgs),
}

#[derive(Parser)]
struct ConvertParquetArgs {
    input: PathBuf,
    #[arg(long)]
    table: String,
    #[arg(long)]
    root: PathBuf,
    #[arg(long, default_value_t = ROW_BUDGET)]
    budget: u64,
}

#[derive(Parser)]
struct ConvertFloatsArgs {
    /// Column files or directories, one f32 column per file.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
    #[arg(long)]
    table: String,
    #[arg(long)]
    root: PathBuf,
    #[arg(long, default_value_t = ROW_BUDGET)]
    budget: u64,
}

type AnyError = Box<dyn std::error::Error + Send + Sync>;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = match cli.command {
        Command::Run(args) => run_run(&args),
        Command::Fetch(args) => run_fetch(&args),
        Command::Sample(args) => run_sample(&args),
        Command::Schema(args) => run_schema(&args),
        Command::Verify(args) => run_verify(&args),
        Command::Prune(args) => run_prune(&args),
        Command::Report(args) => run_report(&args),
        Command::Convert(args) => run_convert(&args),
    };
    match result {
        Ok(code) => code,
        Err(e) => {
            log_error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

fn run_run(args: &RunArgs) -> Result<ExitCode, AnyError> {
    if let Some(path) = &args.log_file {
        set_log_file(path)?;
    }
    let spec = CorpusSpec::load(&args.corpus)?;
    let options = RunOptions {
        budget: args.budget,
        jobs: args.jobs,
        fail_fast: args.fail_fast,
        exclude: args.exclude.clone(),
    };
    pipeline::run(&spec, &args.root, &options)?;
    Ok(ExitCode::SUCCESS)
}

fn run_fetch(args: &FetchArgs) -> Result<ExitCode, AnyError> {
    let spec = CorpusSpec::load(&args.corpus)?;
    pipeline::fetch_only(&spec, &args.root)?;
    Ok(ExitCode::SUCCESS)
}

fn run_sample(args: &SampleArgs) -> Result<ExitCode, AnyError> {
    let files = discover_inputs(&args.inputs, "csv");
    if files.is_empty() {
        return Err("no input files found".into());
    }
    for input in &files {
        let table = table_name_of(input)?;
        let _guard = set_log_prefix(&table);
        let layout = TableLayout::new(&args.root, &table);
        let rows = sample_table(
            std::slice::from_ref(input),
            &layout,
            &SampleOptions {
                delimiter: u8::try_from(args.delimiter).unwrap_or(b','),
                header: args.header,
                encoding: None,
                budget: args.budget,
                max_bytes: args.bytes.map(|b| b.unwrap_or(SMALL_SAMPLE_BYTES)),
            },
        )?;
        if let Some(rows) = rows {
            log_info(&format!("sampled {rows} rows"));
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn run_schema(args: &SchemaArgs) -> Result<ExitCode, AnyError> {
    let files = discover_inputs(&args.inputs, "csv");
    if files.is_empty() {
        return Err("no sample files found".into());
    }
    let results: Vec<Result<(), AnyError>> = files
        .par_iter()
        .map(|sample| -> Result<(), AnyError> {
            let table = table_name_of(sample)?;
            let _guard = set_log_prefix(&table);
            let dir = sample.parent().unwrap_or_else(|| Path::new("."));
            let json = dir.join("schema.json");
            if json.is_file() && !args.force {
                log_info("schema.json already present, skipping");
                return Ok(());
            }
            let reader = BufReader::new(File::open(sample)?);
            let schema = infer_schema(
                reader,
                &table,
                sample,
                &InferOptions {
                    has_header: args.header,
                    ..InferOptions::default()
                },
            )?;
            // Sidecars land next to the sample, wherever it lives.
            write_sidecars_at(&json, &dir.join("schema.yaml"), &schema)?;
            Ok(())
        })
        .collect();
    let failures = results
        .iter()
        .filter(|r| {
            if let Err(e) = r {
                log_error(&e.to_string());
                true
            } else {
                false
            }
        })
        .count();
    if failures > 0 {
        log_info(&format!("completed with {failures} failures"));
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn run_verify(args: &VerifyArgs) -> Result<ExitCode, AnyError> {
    let manifest = Manifest::read(&corpus_prep::corpus::manifest_path(&args.root))?;
    let missing = verify(&args.root, &manifest);
    if missing.is_empty() {
        log_info("all manifest tables present");
        return Ok(ExitCode::SUCCESS);
    }
    for table in &missing {
        println!("{table}");
    }
    log_error(&format!("{} tables missing", missing.len()));
    Ok(ExitCode::FAILURE)
}

fn run_prune(args: &PruneArgs) -> Result<ExitCode, AnyError> {
    let removed = prune::prune(
        &args.root,
        args.budget,
        args.max_bytes,
        &args.exclude,
        args.header,
    )?;
    log_info(&format!("removed {} tables", removed.len()));
    Ok(ExitCode::SUCCESS)
}

fn run_report(args: &ReportArgs) -> Result<ExitCode, AnyError> {
    let out_path = args
        .out
        .clone()
        .unwrap_or_else(|| report_path(&args.root));
    let out = BufWriter::new(File::create(&out_path)?);
    report::report(&args.root, out)?;
    log_info(&format!("wrote {}", out_path.display()));
    Ok(ExitCode::SUCCESS)
}

fn run_convert(command: &ConvertCommand) -> Result<ExitCode, AnyError> {
    match command {
        ConvertCommand::Parquet(args) => {
            let layout = TableLayout::new(&args.root, &args.table);
            let _guard = set_log_prefix(&args.table);
            let rows = convert::parquet_to_sample(&args.input, &layout, args.budget)?;
            log_info(&format!("converted {rows} rows"));
        }
        ConvertCommand::Floats(args) => {
            let files = discover_inputs(&args.inputs, "f32");
            if files.is_empty() {
                return Err("no column files found".into());
            }
            let layout = TableLayout::new(&args.root, &args.table);
            let _guard = set_log_prefix(&args.table);
            let rows = convert::floats_to_sample(&files, &layout, args.budget)?;
            log_info(&format!("converted {rows} rows"));
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn table_name_of(path: &Path) -> Result<String, AnyError> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(ToOwned::to_owned)
        .ok_or_else(|| format!("cannot derive a table name from {}", path.display()).into())
}

fn discover_inputs(inputs: &[PathBuf], extension: &str) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            for entry in WalkDir::new(input)
                .follow_links(false)
                .into_iter()
                .filter_map(Result::ok)
            {
                let path = entry.path();
                if path.is_file() && has_extension(path, extension) {
                    files.push(path.to_path_buf());
                }
            }
        } else if input.is_file() {
            files.push(input.clone());
        } else {
            // Non-existent paths are ignored; shell globbing typically expands patterns.
        }
    }
    files.sort();
    files.dedup();
    files
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}
