//! Column schema model, inference, and sidecar writers.

mod infer;
mod sidecar;

pub use infer::{Cell, InferOptions, classify, infer_schema};
pub use sidecar::{json_sidecar, write_sidecars, write_sidecars_at, yaml_sidecar};

/// Column types the corpus tooling understands.
///
/// `Float` is only produced by the converters; inference never emits it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Boolean,
    BigInt,
    Double,
    Float,
    Date,
    Time,
    Timestamp,
    Varchar,
}

impl ColumnType {
    /// SQL spelling used by the JSON sidecar.
    #[must_use]
    pub const fn sql(self) -> &'static str {
        match self {
            Self::Boolean => "BOOLEAN",
            Self::BigInt => "BIGINT",
            Self::Double => "DOUBLE",
            Self::Float => "FLOAT",
            Self::Date => "DATE",
            Self::Time => "TIME",
            Self::Timestamp => "TIMESTAMP",
            Self::Varchar => "VARCHAR",
        }
    }

    /// YAML spelling used by the YAML sidecar; temporal and text columns
    /// all collapse to `string`.
    #[must_use]
    pub const fn yaml(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::BigInt => "integer",
            Self::Double => "double",
            Self::Float => "float",
            Self::Date | Self::Time | Self::Timestamp | Self::Varchar => "string",
        }
    }
}

/// One column of an inferred or extracted schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
    pub index: usize,
}

/// Schema for one table's sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub table: String,
    pub columns: Vec<ColumnDef>,
}
