//! Quote-aware logical-row trimming.
//!
//! A logical row may span several physical lines when a quoted field contains
//! embedded newlines. A physical line with an odd number of `"` characters
//! toggles an in-quote flag, and a physical line terminates a logical row only
//! when the flag is clear afterwards. Escaped quotes (`""`) contribute an even
//! count and leave the flag unchanged.

use std::io::{BufRead, Write};

use crate::error::Result;

/// Reads one logical row, terminator included, into `row`.
///
/// Returns `false` at end of input. A trailing line without a newline still
/// counts when non-empty, and an unterminated quote ends the row at EOF.
fn read_logical_row<R: BufRead>(reader: &mut R, row: &mut Vec<u8>) -> Result<bool> {
    row.clear();
    let mut in_quote = false;
    loop {
        let start = row.len();
        let read = reader.read_until(b'\n', row)?;
        if read == 0 {
            return Ok(!row.is_empty());
        }
        let quotes = row[start..].iter().filter(|&&b| b == b'"').count();
        if quotes % 2 == 1 {
            in_quote = !in_quote;
        }
        if !in_quote {
            return Ok(true);
        }
    }
}

/// Copies the header (when `keep_header`) plus at most `budget` logical data
/// rows from `reader` to `writer`, byte for byte. Stops reading as soon as
/// the budget is met and returns the number of data rows written.
///
/// # Errors
///
/// Returns an error when reading or writing fails.
pub fn head_rows<R: BufRead, W: Write>(
    reader: &mut R,
    writer: &mut W,
    budget: u64,
    keep_header: bool,
) -> Result<u64> {
    let mut row = Vec::new();
    if keep_header {
        if !read_logical_row(reader, &mut row)? {
            return Ok(0);
        }
        writer.write_all(&row)?;
    }
    let mut rows = 0u64;
    while rows < budget {
        if !read_logical_row(reader, &mut row)? {
            break;
        }
        writer.write_all(&row)?;
        rows += 1;
    }
    Ok(rows)
}

/// Same state machine as [`head_rows`], but stops before the first logical
/// row that would push the output past `max_bytes`. The header (when kept)
/// counts against the limit. Returns data rows and bytes written.
///
/// # Errors
///
/// Returns an error when reading or writing fails.
pub fn head_bytes<R: BufRead, W: Write>(
    reader: &mut R,
    writer: &mut W,
    max_bytes: u64,
    keep_header: bool,
) -> Result<(u64, u64)> {
    let mut row = Vec::new();
    let mut bytes = 0u64;
    if keep_header {
        if !read_logical_row(reader, &mut row)? {
            return Ok((0, 0));
        }
        writer.write_all(&row)?;
        bytes += row.len() as u64;
    }
    let mut rows = 0u64;
    loop {
        if !read_logical_row(reader, &mut row)? {
            break;
        }
        if bytes + row.len() as u64 > max_bytes {
            break;
        }
        writer.write_all(&row)?;
        bytes += row.len() as u64;
        rows += 1;
    }
    Ok((rows, bytes))
}

/// Counts logical data rows, skipping the first row when `has_header`.
///
/// # Errors
///
/// Returns an error when reading fails.
pub fn count_rows<R: BufRead>(reader: &mut R, has_header: bool) -> Result<u64> {
    let mut row = Vec::new();
    if has_header && !read_logical_row(reader, &mut row)? {
        return Ok(0);
    }
    let mut rows = 0u64;
    while read_logical_row(reader, &mut row)? {
        rows += 1;
    }
    Ok(rows)
}
