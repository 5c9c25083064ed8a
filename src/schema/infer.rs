//! Cell classification and column-type inference.
//!
//! Replaces an embedded analytical engine's `read_csv_auto` sniffing with a
//! small ladder: each sampled cell is classified, and a column's type is the
//! least upper bound over its cells.

use std::io::Read;
use std::path::Path;
use std::sync::OnceLock;

use csv::{ReaderBuilder, StringRecord};
use time::format_description::FormatItem;
use time::{Date, Time, format_description};

use crate::error::{Error, Result};
use crate::reformat::NULL_TOKEN;

use super::{ColumnDef, ColumnType, TableSchema};

/// What one cell looks like on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    Null,
    Typed(ColumnType),
}

fn date_format() -> &'static [FormatItem<'static>] {
    static FORMAT: OnceLock<Vec<FormatItem<'static>>> = OnceLock::new();
    FORMAT.get_or_init(|| {
        format_description::parse("[year]-[month]-[day]").expect("static date format")
    })
}

fn time_format() -> &'static [FormatItem<'static>] {
    static FORMAT: OnceLock<Vec<FormatItem<'static>>> = OnceLock::new();
    FORMAT.get_or_init(|| {
        format_description::parse("[hour]:[minute]:[second]").expect("static time format")
    })
}

fn is_date(text: &str) -> bool {
    Date::parse(text, date_format()).is_ok()
}

/// `HH:MM:SS` with an optional fractional-second suffix.
fn is_time(text: &str) -> bool {
    let (main, fraction) = match text.split_once('.') {
        Some((main, fraction)) => (main, Some(fraction)),
        None => (text, None),
    };
    if let Some(fraction) = fraction
        && (fraction.is_empty() || !fraction.bytes().all(|b| b.is_ascii_digit()))
    {
        return false;
    }
    Time::parse(main, time_format()).is_ok()
}

/// `date[ T]time`.
fn is_timestamp(text: &str) -> bool {
    let Some((date, time)) = text.split_once([' ', 'T']) else {
        return false;
    };
    is_date(date) && is_time(time)
}

/// Classifies a single cell. `nan`/`inf` spellings stay text even though
/// they parse as floats; benchmark CSVs use them as sentinel strings.
#[must_use]
pub fn classify(cell: &str) -> Cell {
    if cell.is_empty() || cell == NULL_TOKEN {
        return Cell::Null;
    }
    if cell.eq_ignore_ascii_case("true") || cell.eq_ignore_ascii_case("false") {
        return Cell::Typed(ColumnType::Boolean);
    }
    if cell.parse::<i64>().is_ok() {
        return Cell::Typed(ColumnType::BigInt);
    }
    if let Ok(value) = cell.parse::<f64>() {
        if value.is_finite() {
            return Cell::Typed(ColumnType::Double);
        }
        return Cell::Typed(ColumnType::Varchar);
    }
    if is_date(cell) {
        return Cell::Typed(ColumnType::Date);
    }
    if is_time(cell) {
        return Cell::Typed(ColumnType::Time);
    }
    if is_timestamp(cell) {
        return Cell::Typed(ColumnType::Timestamp);
    }
    Cell::Typed(ColumnType::Varchar)
}

/// Least upper bound of two cell types.
const fn merge(a: ColumnType, b: ColumnType) -> ColumnType {
    use ColumnType::{BigInt, Date, Double, Timestamp, Varchar};
    match (a, b) {
        _ if a as u8 == b as u8 => a,
        (BigInt, Double) | (Double, BigInt) => Double,
        (Date, Timestamp) | (Timestamp, Date) => Timestamp,
        _ => Varchar,
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct ColumnState {
    column_type: Option<ColumnType>,
    saw_null: bool,
}

impl ColumnState {
    fn observe(&mut self, cell: Cell) {
        match cell {
            Cell::Null => self.saw_null = true,
            Cell::Typed(t) => {
                self.column_type = Some(self.column_type.map_or(t, |current| merge(current, t)));
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct InferOptions {
    pub delimiter: u8,
    pub has_header: bool,
    /// Rows sampled for inference; at most the corpus row budget.
    pub sample_rows: u64,
}

impl Default for InferOptions {
    fn default() -> Self {
        Self {
            delimiter: crate::reformat::SAMPLE_DELIMITER,
            has_header: false,
            sample_rows: crate::pipeline::ROW_BUDGET,
        }
    }
}

/// Infers a table schema from a delimited reader.
///
/// Column names come from the header when present, else `column0`,
/// `column1`, ... in file order. A cell missing from a short row counts as
/// null for that column; an all-null column is `VARCHAR`.
///
/// # Errors
///
/// Returns an error when a record cannot be read at all.
pub fn infer_schema<R: Read>(
    input: R,
    table: &str,
    source: &Path,
    options: &InferOptions,
) -> Result<TableSchema> {
    let mut reader = ReaderBuilder::new()
        .delimiter(options.delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(input);

    let mut names: Option<Vec<String>> = None;
    let mut states: Vec<ColumnState> = Vec::new();
    let mut record = StringRecord::new();
    let mut sampled = 0u64;

    if options.has_header {
        if reader
            .read_record(&mut record)
            .map_err(|e| Error::csv(source, &e))?
        {
            names = Some(record.iter().map(ToOwned::to_owned).collect());
            states.resize_with(record.len(), ColumnState::default);
        }
    }

    while sampled < options.sample_rows
        && reader
            .read_record(&mut record)
            .map_err(|e| Error::csv(source, &e))?
    {
        if record.len() > states.len() {
            // Columns absent from every earlier row were null there.
            let saw_rows = sampled > 0;
            states.resize_with(record.len(), || ColumnState {
                column_type: None,
                saw_null: saw_rows,
            });
        }
        for (index, state) in states.iter_mut().enumerate() {
            match record.get(index) {
                Some(cell) => state.observe(classify(cell)),
                None => state.saw_null = true,
            }
        }
        sampled += 1;
    }

    let columns = states
        .iter()
        .enumerate()
        .map(|(index, state)| ColumnDef {
            name: names
                .as_ref()
                .and_then(|n| n.get(index).cloned())
                .unwrap_or_else(|| format!("column{index}")),
            column_type: state.column_type.unwrap_or(ColumnType::Varchar),
            nullable: state.saw_null,
            index,
        })
        .collect();

    Ok(TableSchema {
        table: table.to_owned(),
        columns,
    })
}

#[cfg(test)]
mod tests {
    use super::{Cell, InferOptions, classify, infer_schema, merge};
    use crate::schema::ColumnType;
    use std::path::Path;

    fn infer(input: &str, has_header: bool) -> crate::schema::TableSchema {
        infer_schema(
            input.as_bytes(),
            "t",
            Path::new("t.csv"),
            &InferOptions {
                has_header,
                ..InferOptions::default()
            },
        )
        .expect("inference should not fail on in-memory input")
    }

    #[test]
    fn classification_ladder() {
        assert_eq!(classify(""), Cell::Null);
        assert_eq!(classify("NULL"), Cell::Null);
        assert_eq!(classify("TRUE"), Cell::Typed(ColumnType::Boolean));
        assert_eq!(classify("false"), Cell::Typed(ColumnType::Boolean));
        assert_eq!(classify("-42"), Cell::Typed(ColumnType::BigInt));
        assert_eq!(classify("3.25"), Cell::Typed(ColumnType::Double));
        assert_eq!(classify("1e9"), Cell::Typed(ColumnType::Double));
        assert_eq!(classify("2021-07-04"), Cell::Typed(ColumnType::Date));
        assert_eq!(classify("23:59:59"), Cell::Typed(ColumnType::Time));
        assert_eq!(classify("12:00:00.125"), Cell::Typed(ColumnType::Time));
        assert_eq!(
            classify("2021-07-04 12:00:00"),
            Cell::Typed(ColumnType::Timestamp)
        );
        assert_eq!(
            classify("2021-07-04T12:00:00.5"),
            Cell::Typed(ColumnType::Timestamp)
        );
        assert_eq!(classify("hello"), Cell::Typed(ColumnType::Varchar));
        assert_eq!(classify("2021-13-01"), Cell::Typed(ColumnType::Varchar));
        assert_eq!(classify("25:00:00"), Cell::Typed(ColumnType::Varchar));
    }

    #[test]
    fn nan_and_inf_spellings_stay_text() {
        for cell in ["nan", "NaN", "inf", "-inf", "Infinity"] {
            assert_eq!(classify(cell), Cell::Typed(ColumnType::Varchar), "{cell}");
        }
    }

    #[test]
    fn merge_lattice() {
        use ColumnType::{BigInt, Boolean, Date, Double, Timestamp, Varchar};
        assert_eq!(merge(BigInt, BigInt), BigInt);
        assert_eq!(merge(BigInt, Double), Double);
        assert_eq!(merge(Double, BigInt), Double);
        assert_eq!(merge(Date, Timestamp), Timestamp);
        assert_eq!(merge(Boolean, BigInt), Varchar);
        assert_eq!(merge(Date, Double), Varchar);
    }

    #[test]
    fn header_names_and_nullability() {
        let schema = infer("id|price|when\n1|9.5|2020-01-01\n2|NULL|2020-01-02 08:00:00\n", true);
        let summary: Vec<_> = schema
            .columns
            .iter()
            .map(|c| (c.name.as_str(), c.column_type, c.nullable))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("id", ColumnType::BigInt, false),
                ("price", ColumnType::Double, true),
                ("when", ColumnType::Timestamp, false),
            ]
        );
    }

    #[test]
    fn headerless_columns_are_numbered() {
        let schema = infer("1|x\n2|y\n", false);
        assert_eq!(schema.columns[0].name, "column0");
        assert_eq!(schema.columns[1].name, "column1");
    }

    #[test]
    fn all_null_column_is_varchar() {
        let schema = infer("1|NULL\n2|\n", false);
        assert_eq!(schema.columns[1].column_type, ColumnType::Varchar);
        assert!(schema.columns[1].nullable);
    }

    #[test]
    fn short_rows_mark_missing_columns_nullable() {
        let schema = infer("1|2|3\n4|5\n", false);
        assert_eq!(schema.columns.len(), 3);
        assert!(!schema.columns[0].nullable);
        assert!(schema.columns[2].nullable);
        assert_eq!(schema.columns[2].column_type, ColumnType::BigInt);
    }
}
