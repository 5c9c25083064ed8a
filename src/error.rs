use std::borrow::Cow;
use std::fmt;
use std::io;
use std::path::PathBuf;

use parquet::errors::ParquetError;

/// Result type used across the corpus preparation library.
pub type Result<T> = std::result::Result<T, Error>;

/// High-level error type surfaced by the corpus preparation stages.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O failure while reading or writing a corpus file.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// A download or listing request failed.
    #[error("http request for {url} failed: {details}")]
    Http {
        url: String,
        details: Cow<'static, str>,
    },

    /// A compressed input could not be decoded.
    #[error("decompression of {path} failed: {details}")]
    Decompress {
        path: PathBuf,
        details: Cow<'static, str>,
    },

    /// A delimited file could not be read or written.
    #[error("csv error in {path}: {details}")]
    Csv {
        path: PathBuf,
        details: Cow<'static, str>,
    },

    /// A corpus spec file could not be interpreted.
    #[error("invalid corpus spec: {details}")]
    InvalidSpec { details: Cow<'static, str> },

    /// The delimiter manifest could not be interpreted.
    #[error("invalid manifest: {details}")]
    InvalidManifest { details: Cow<'static, str> },

    /// Failure encountered while interacting with the Parquet reader.
    #[error("parquet error: {details}")]
    Parquet { details: Cow<'static, str> },

    /// Sidecar serialization failure.
    #[error("sidecar serialization failed: {details}")]
    Serialize { details: Cow<'static, str> },

    /// Inputs this toolkit does not handle.
    #[error("unsupported input: {feature}")]
    Unsupported { feature: Cow<'static, str> },

    /// Summary error for a run that finished with per-table failures.
    #[error("{count} tables failed")]
    Failures { count: usize },
}

impl Error {
    /// Helper constructor for csv-layer failures with path context.
    pub fn csv(path: impl Into<PathBuf>, err: &csv::Error) -> Self {
        Self::Csv {
            path: path.into(),
            details: Cow::Owned(err.to_string()),
        }
    }
}

/// Pipeline stage used for diagnostic reporting in failure summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Decompress,
    Sample,
    Schema,
    Convert,
    Verify,
    Prune,
    Report,
}

impl From<ParquetError> for Error {
    fn from(err: ParquetError) -> Self {
        Self::Parquet {
            details: Cow::Owned(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Http {
            url: err.url().map(ToString::to_string).unwrap_or_default(),
            details: Cow::Owned(err.without_url().to_string()),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch => write!(f, "fetch"),
            Self::Decompress => write!(f, "decompress"),
            Self::Sample => write!(f, "sample"),
            Self::Schema => write!(f, "schema"),
            Self::Convert => write!(f, "convert"),
            Self::Verify => write!(f, "verify"),
            Self::Prune => write!(f, "prune"),
            Self::Report => write!(f, "report"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, Stage};

    #[test]
    fn run_summary_reports_the_failure_count() {
        let err = Error::Failures { count: 3 };
        assert_eq!(err.to_string(), "3 tables failed");
    }

    #[test]
    fn stages_render_lowercase() {
        assert_eq!(Stage::Fetch.to_string(), "fetch");
        assert_eq!(Stage::Decompress.to_string(), "decompress");
        assert_eq!(Stage::Report.to_string(), "report");
    }
}
