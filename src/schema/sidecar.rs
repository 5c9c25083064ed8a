//! Schema sidecar writers.
//!
//! Every sample gets two sidecars: `schema.json` with SQL type spellings and
//! nullability, and `schema.yaml` with name + YAML spelling only.

use std::fs::File;
use std::io::{BufWriter, Write};

use serde::Serialize;

use crate::corpus::TableLayout;
use crate::error::Result;

use super::{ColumnDef, TableSchema};

#[derive(Serialize)]
struct JsonSidecar<'a> {
    table: &'a str,
    columns: Vec<JsonColumn<'a>>,
}

#[derive(Serialize)]
struct JsonColumn<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    column_type: &'static str,
    nullability: &'static str,
    index: usize,
}

#[derive(Serialize)]
struct YamlSidecar<'a> {
    columns: Vec<YamlColumn<'a>>,
}

#[derive(Serialize)]
struct YamlColumn<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    column_type: &'static str,
}

impl<'a> From<&'a ColumnDef> for JsonColumn<'a> {
    fn from(column: &'a ColumnDef) -> Self {
        Self {
            name: &column.name,
            column_type: column.column_type.sql(),
            nullability: if column.nullable { "NULL" } else { "NOT NULL" },
            index: column.index,
        }
    }
}

/// Renders the JSON sidecar as a pretty-printed string.
///
/// # Errors
///
/// Returns an error when serialization fails.
pub fn json_sidecar(schema: &TableSchema) -> Result<String> {
    let payload = JsonSidecar {
        table: &schema.table,
        columns: schema.columns.iter().map(JsonColumn::from).collect(),
    };
    serde_json::to_string_pretty(&payload).map_err(|e| crate::error::Error::Serialize {
        details: std::borrow::Cow::Owned(e.to_string()),
    })
}

/// Renders the YAML sidecar as a string.
///
/// # Errors
///
/// Returns an error when serialization fails.
pub fn yaml_sidecar(schema: &TableSchema) -> Result<String> {
    let payload = YamlSidecar {
        columns: schema
            .columns
            .iter()
            .map(|c| YamlColumn {
                name: &c.name,
                column_type: c.column_type.yaml(),
            })
            .collect(),
    };
    serde_yaml::to_string(&payload).map_err(|e| crate::error::Error::Serialize {
        details: std::borrow::Cow::Owned(e.to_string()),
    })
}

/// Writes both sidecars next to the table's sample.
///
/// # Errors
///
/// Returns an error when serialization or writing fails.
pub fn write_sidecars(layout: &TableLayout, schema: &TableSchema) -> Result<()> {
    write_sidecars_at(
        &layout.schema_json_path(),
        &layout.schema_yaml_path(),
        schema,
    )
}

/// Writes both sidecars to explicit paths.
///
/// # Errors
///
/// Returns an error when serialization or writing fails.
pub fn write_sidecars_at(
    json_path: &std::path::Path,
    yaml_path: &std::path::Path,
    schema: &TableSchema,
) -> Result<()> {
    let mut json = BufWriter::new(File::create(json_path)?);
    json.write_all(json_sidecar(schema)?.as_bytes())?;
    json.write_all(b"\n")?;
    json.flush()?;

    let mut yaml = BufWriter::new(File::create(yaml_path)?);
    yaml.write_all(yaml_sidecar(schema)?.as_bytes())?;
    yaml.flush()?;
    Ok(())
}
