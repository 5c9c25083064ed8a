//! Golden-file harness: every `tests/fixtures/*.csv` is inferred and its
//! JSON sidecar compared against the `.schema.json` next to it.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use corpus_prep::schema::{InferOptions, infer_schema, json_sidecar};

fn infer_case(path: &Path) -> datatest_stable::Result<()> {
    let table = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or("fixture has no stem")?;
    // Fixtures named *headerless* carry no header row.
    let has_header = !table.contains("headerless");

    let reader = BufReader::new(File::open(path)?);
    let schema = infer_schema(
        reader,
        table,
        path,
        &InferOptions {
            has_header,
            ..InferOptions::default()
        },
    )?;
    let rendered = json_sidecar(&schema)? + "\n";

    let golden_path = path.with_extension("schema.json");
    let golden = std::fs::read_to_string(&golden_path)?;
    if rendered != golden {
        return Err(format!(
            "{} does not match {}:\n--- inferred ---\n{rendered}\n--- golden ---\n{golden}",
            path.display(),
            golden_path.display()
        )
        .into());
    }
    Ok(())
}

datatest_stable::harness! {
    { test = infer_case, root = "tests/fixtures", pattern = r"^.*\.csv$" },
}
