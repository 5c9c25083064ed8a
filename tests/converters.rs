use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;

use byteorder::{LittleEndian, WriteBytesExt};
use parquet::data_type::{ByteArray, ByteArrayType, DoubleType, Int32Type, Int64Type};
use parquet::file::properties::WriterProperties;
use parquet::file::writer::SerializedFileWriter;
use parquet::schema::parser::parse_message_type;

use corpus_prep::convert::{floats_to_sample, parquet_to_sample};
use corpus_prep::corpus::TableLayout;

fn write_orders_parquet(path: &Path) {
    let schema = Arc::new(
        parse_message_type(
            "message orders {
                required int64 id;
                optional binary name (UTF8);
                required double amount;
                required int32 day (DATE);
            }",
        )
        .expect("message type"),
    );
    let file = File::create(path).expect("create parquet");
    let mut writer =
        SerializedFileWriter::new(file, schema, Arc::new(WriterProperties::builder().build()))
            .expect("writer");
    let mut group = writer.next_row_group().expect("row group");

    let mut column = group.next_column().expect("column").expect("id column");
    column
        .typed::<Int64Type>()
        .write_batch(&[1, 2, 3], None, None)
        .expect("write ids");
    column.close().expect("close ids");

    let mut column = group.next_column().expect("column").expect("name column");
    column
        .typed::<ByteArrayType>()
        .write_batch(
            &[ByteArray::from("alpha"), ByteArray::from("gamma")],
            Some(&[1, 0, 1]),
            None,
        )
        .expect("write names");
    column.close().expect("close names");

    let mut column = group.next_column().expect("column").expect("amount column");
    column
        .typed::<DoubleType>()
        .write_batch(&[1.5, 2.5, 3.5], None, None)
        .expect("write amounts");
    column.close().expect("close amounts");

    let mut column = group.next_column().expect("column").expect("day column");
    column
        .typed::<Int32Type>()
        .write_batch(&[18628, 18629, 18630], None, None)
        .expect("write days");
    column.close().expect("close days");

    group.close().expect("close group");
    writer.close().expect("close writer");
}

#[test]
fn parquet_sample_and_sidecars() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("orders.parquet");
    write_orders_parquet(&input);
    let layout = TableLayout::new(dir.path(), "orders");

    let rows = parquet_to_sample(&input, &layout, 2).expect("convert");
    assert_eq!(rows, 2);
    assert_eq!(
        fs::read_to_string(layout.sample_path()).expect("read sample"),
        "id|name|amount|day\n1|alpha|1.5|2021-01-01\n2|NULL|2.5|2021-01-02\n"
    );

    let json = fs::read_to_string(layout.schema_json_path()).expect("read schema.json");
    insta::assert_snapshot!(json, @r#"
    {
      "table": "orders",
      "columns": [
        {
          "name": "id",
          "type": "BIGINT",
          "nullability": "NOT NULL",
          "index": 0
        },
        {
          "name": "name",
          "type": "VARCHAR",
          "nullability": "NULL",
          "index": 1
        },
        {
          "name": "amount",
          "type": "DOUBLE",
          "nullability": "NOT NULL",
          "index": 2
        },
        {
          "name": "day",
          "type": "DATE",
          "nullability": "NOT NULL",
          "index": 3
        }
      ]
    }
    "#);
}

#[test]
fn nested_parquet_is_rejected_by_name() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("nested.parquet");
    let schema = Arc::new(
        parse_message_type(
            "message nested {
                required group point {
                    required int64 x;
                }
            }",
        )
        .expect("message type"),
    );
    let file = File::create(&input).expect("create parquet");
    let mut writer =
        SerializedFileWriter::new(file, schema, Arc::new(WriterProperties::builder().build()))
            .expect("writer");
    let mut group = writer.next_row_group().expect("row group");
    let mut column = group.next_column().expect("column").expect("x column");
    column
        .typed::<Int64Type>()
        .write_batch(&[], None, None)
        .expect("write");
    column.close().expect("close");
    group.close().expect("close group");
    writer.close().expect("close writer");

    let layout = TableLayout::new(dir.path(), "nested");
    let err = parquet_to_sample(&input, &layout, 10).expect_err("nested must fail");
    assert!(err.to_string().contains("point.x"), "{err}");
}

fn write_f32_column(path: &Path, values: &[f32]) {
    let mut out = Vec::with_capacity(values.len() * 4);
    for value in values {
        out.write_f32::<LittleEndian>(*value).expect("encode f32");
    }
    fs::write(path, out).expect("write column");
}

#[test]
fn float_columns_become_a_sample() {
    let dir = tempfile::tempdir().expect("tempdir");
    let a = dir.path().join("col_a.f32");
    let b = dir.path().join("col_b.f32");
    let short = dir.path().join("col_c.f32");
    write_f32_column(&a, &[1.0, 2.0, 3.0]);
    write_f32_column(&b, &[0.5, 1.5, 2.5]);
    write_f32_column(&short, &[9.0]);

    let layout = TableLayout::new(dir.path(), "vectors");
    let rows = floats_to_sample(&[a, b, short], &layout, 2).expect("convert");
    assert_eq!(rows, 2);
    assert_eq!(
        fs::read_to_string(layout.sample_path()).expect("read sample"),
        "1.0|0.5\n2.0|1.5\n"
    );

    let yaml = fs::read_to_string(layout.schema_yaml_path()).expect("read schema.yaml");
    insta::assert_snapshot!(yaml, @r"
    columns:
    - name: column0
      type: float
    - name: column1
      type: float
    ");

    let json = fs::read_to_string(layout.schema_json_path()).expect("read schema.json");
    assert!(json.contains("\"FLOAT\""));
    assert!(json.contains("\"NOT NULL\""));
}

#[test]
fn all_short_float_columns_yield_an_empty_sample() {
    let dir = tempfile::tempdir().expect("tempdir");
    let only = dir.path().join("col.f32");
    write_f32_column(&only, &[1.0]);

    let layout = TableLayout::new(dir.path(), "empty");
    let rows = floats_to_sample(&[only], &layout, 100).expect("convert");
    assert_eq!(rows, 0);
    assert_eq!(
        fs::read_to_string(layout.sample_path()).expect("read sample"),
        ""
    );
}
