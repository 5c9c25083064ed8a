//! Benchmark-corpus preparation: fetch public datasets, decompress them,
//! trim to a fixed row budget without corrupting quoted newlines, reformat
//! delimiters, infer a column schema, and write a sample CSV plus JSON/YAML
//! schema sidecars.

pub mod convert;
pub mod corpus;
pub mod decompress;
pub mod encoding;
pub mod error;
pub mod fetch;
pub mod logger;
pub mod manifest;
pub mod pipeline;
pub mod prune;
pub mod reformat;
pub mod report;
pub mod sample;
pub mod schema;
pub mod trim;

pub use crate::error::{Error, Result, Stage};
pub use crate::pipeline::{ROW_BUDGET, RunOptions, SAMPLE_MAX_BYTES, SMALL_SAMPLE_BYTES};
