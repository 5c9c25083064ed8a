//! Parquet to pipe-delimited sample plus sidecars.

use std::borrow::Cow;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use csv::{ByteRecord, WriterBuilder};
use itoa::Buffer as ItoaBuffer;
use parquet::basic::{ConvertedType, LogicalType, Repetition, Type as PhysicalType};
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::record::Field;
use parquet::schema::types::ColumnDescriptor;
use ryu::Buffer as RyuBuffer;
use time::{Date, OffsetDateTime};

use crate::corpus::TableLayout;
use crate::error::{Error, Result};
use crate::logger::log_warn;
use crate::reformat::{NULL_TOKEN, SAMPLE_DELIMITER};
use crate::schema::{ColumnDef, ColumnType, TableSchema, write_sidecars};

use super::format::{write_date, write_datetime, write_time_millis};

const UNIX_EPOCH_JULIAN_DAY: i32 = 2_440_588;

/// Reads the footer schema and the first `budget` rows of a Parquet file,
/// writes the pipe-delimited sample (header row included) and both
/// sidecars. Returns the number of data rows written.
///
/// # Errors
///
/// Returns an error when the file cannot be read or a column's type has no
/// CSV rendering.
pub fn parquet_to_sample(input: &Path, layout: &TableLayout, budget: u64) -> Result<u64> {
    let reader = SerializedFileReader::new(File::open(input)?)?;
    let schema = schema_from_footer(&reader, layout.table())?;

    fs::create_dir_all(layout.table_dir())?;
    let out = BufWriter::new(File::create(layout.sample_path())?);
    let mut writer = WriterBuilder::new()
        .delimiter(SAMPLE_DELIMITER)
        .from_writer(out);
    let write_err = |e: &csv::Error| Error::csv(layout.sample_path(), e);

    let mut header = ByteRecord::new();
    for column in &schema.columns {
        header.push_field(column.name.as_bytes());
    }
    writer.write_byte_record(&header).map_err(|e| write_err(&e))?;

    let mut record = ByteRecord::new();
    let mut scratch: Vec<u8> = Vec::new();
    let mut ryu = RyuBuffer::new();
    let mut itoa = ItoaBuffer::new();
    let mut rows = 0u64;

    for row in reader.get_row_iter(None)? {
        if rows == budget {
            break;
        }
        let row = row?;
        record.clear();
        for (name, field) in row.get_column_iter() {
            scratch.clear();
            encode_field(field, name, &mut scratch, &mut ryu, &mut itoa)?;
            record.push_field(&scratch);
        }
        writer.write_byte_record(&record).map_err(|e| write_err(&e))?;
        rows += 1;
    }
    writer.flush()?;

    if rows < budget {
        log_warn(&format!(
            "{} held {rows} rows, under the {budget} row budget",
            input.display()
        ));
    }

    write_sidecars(layout, &schema)?;
    Ok(rows)
}

/// Maps the footer schema to column definitions. Nested or otherwise
/// unmapped fields are an error naming the column.
fn schema_from_footer<R: FileReader>(reader: &R, table: &str) -> Result<TableSchema> {
    let descr = reader.metadata().file_metadata().schema_descr();
    let mut columns = Vec::with_capacity(descr.num_columns());
    for (index, column) in descr.columns().iter().enumerate() {
        if column.path().parts().len() != 1 {
            return Err(Error::Unsupported {
                feature: Cow::Owned(format!(
                    "nested parquet column '{}'",
                    column.path().string()
                )),
            });
        }
        let column_type = column_type_for(column)?;
        let nullable = column.self_type().get_basic_info().repetition() == Repetition::OPTIONAL;
        columns.push(ColumnDef {
            name: column.name().to_owned(),
            column_type,
            nullable,
            index,
        });
    }
    Ok(TableSchema {
        table: table.to_owned(),
        columns,
    })
}

fn column_type_for(column: &ColumnDescriptor) -> Result<ColumnType> {
    let unsupported = || Error::Unsupported {
        feature: Cow::Owned(format!(
            "parquet column '{}' with physical type {}",
            column.path().string(),
            column.physical_type()
        )),
    };

    let logical = column.logical_type();
    let converted = column.converted_type();
    let mapped = match column.physical_type() {
        PhysicalType::BOOLEAN => ColumnType::Boolean,
        PhysicalType::INT32 | PhysicalType::INT64 => match logical {
            Some(LogicalType::Date) => ColumnType::Date,
            Some(LogicalType::Time { .. }) => ColumnType::Time,
            Some(LogicalType::Timestamp { .. }) => ColumnType::Timestamp,
            Some(LogicalType::Decimal { .. }) => return Err(unsupported()),
            _ => match converted {
                ConvertedType::DATE => ColumnType::Date,
                ConvertedType::TIME_MILLIS | ConvertedType::TIME_MICROS => ColumnType::Time,
                ConvertedType::TIMESTAMP_MILLIS | ConvertedType::TIMESTAMP_MICROS => {
                    ColumnType::Timestamp
                }
                ConvertedType::DECIMAL => return Err(unsupported()),
                _ => ColumnType::BigInt,
            },
        },
        PhysicalType::INT96 => ColumnType::Timestamp,
        PhysicalType::FLOAT => ColumnType::Float,
        PhysicalType::DOUBLE => ColumnType::Double,
        PhysicalType::BYTE_ARRAY | PhysicalType::FIXED_LEN_BYTE_ARRAY => {
            let is_text = matches!(logical, Some(LogicalType::String | LogicalType::Enum))
                || matches!(converted, ConvertedType::UTF8 | ConvertedType::ENUM);
            if is_text {
                ColumnType::Varchar
            } else {
                return Err(unsupported());
            }
        }
    };
    Ok(mapped)
}

fn encode_field(
    field: &Field,
    name: &str,
    out: &mut Vec<u8>,
    ryu: &mut RyuBuffer,
    itoa: &mut ItoaBuffer,
) -> Result<()> {
    match field {
        Field::Null => out.extend_from_slice(NULL_TOKEN.as_bytes()),
        Field::Bool(v) => out.extend_from_slice(if *v { b"true" } else { b"false" }),
        Field::Byte(v) => out.extend_from_slice(itoa.format(*v).as_bytes()),
        Field::Short(v) => out.extend_from_slice(itoa.format(*v).as_bytes()),
        Field::Int(v) => out.extend_from_slice(itoa.format(*v).as_bytes()),
        Field::Long(v) => out.extend_from_slice(itoa.format(*v).as_bytes()),
        Field::UByte(v) => out.extend_from_slice(itoa.format(*v).as_bytes()),
        Field::UShort(v) => out.extend_from_slice(itoa.format(*v).as_bytes()),
        Field::UInt(v) => out.extend_from_slice(itoa.format(*v).as_bytes()),
        Field::ULong(v) => out.extend_from_slice(itoa.format(*v).as_bytes()),
        Field::Float(v) => out.extend_from_slice(ryu.format(f64::from(*v)).as_bytes()),
        Field::Double(v) => out.extend_from_slice(ryu.format(*v).as_bytes()),
        Field::Str(s) => out.extend_from_slice(s.as_bytes()),
        Field::Bytes(b) => out.extend_from_slice(b.data()),
        Field::Date(days) => {
            let date = Date::from_julian_day(UNIX_EPOCH_JULIAN_DAY + days).map_err(|e| {
                Error::Unsupported {
                    feature: Cow::Owned(format!("date value in column '{name}': {e}")),
                }
            })?;
            write_date(date, out);
        }
        Field::TimestampMillis(ms) => {
            let dt = OffsetDateTime::from_unix_timestamp_nanos(i128::from(*ms) * 1_000_000)
                .map_err(|e| Error::Unsupported {
                    feature: Cow::Owned(format!("timestamp value in column '{name}': {e}")),
                })?;
            write_datetime(&dt, out);
        }
        Field::TimestampMicros(us) => {
            let dt = OffsetDateTime::from_unix_timestamp_nanos(i128::from(*us) * 1_000)
                .map_err(|e| Error::Unsupported {
                    feature: Cow::Owned(format!("timestamp value in column '{name}': {e}")),
                })?;
            write_datetime(&dt, out);
        }
        Field::TimeMillis(ms) => write_time_millis(i64::from(*ms), out),
        Field::TimeMicros(us) => write_time_millis(us / 1_000, out),
        other => {
            return Err(Error::Unsupported {
                feature: Cow::Owned(format!("parquet field {other:?} in column '{name}'")),
            });
        }
    }
    Ok(())
}
