//! Reading and writing tables as comma-separated text with a header row.
//!
//! Quoted fields (RFC 4180 style, `""` for a literal quote) are supported,
//! including embedded commas and newlines. Empty fields and the usual
//! missing markers (`NA`, `NaN`, `NULL`, ...) read back as [`Cell::Missing`].

use super::table::{Cell, Table};
use crate::errors::PipelineError;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Reads a CSV file with a header row.
pub fn read_csv(path: &Path) -> Result<Table, PipelineError> {
    let contents = std::fs::read_to_string(path)?;
    parse_csv(&contents)
}

/// Parses CSV text with a header row.
pub fn parse_csv(contents: &str) -> Result<Table, PipelineError> {
    let mut records = split_records(contents)?.into_iter();
    let header = records
        .next()
        .ok_or_else(|| PipelineError::malformed("CSV input has no header row"))?;

    let mut table = Table::new(header);
    for record in records {
        table.push_row(record.iter().map(|field| Cell::parse(field)).collect())?;
    }
    Ok(table)
}

/// Writes a table as CSV, overwriting any existing file.
pub fn write_csv(table: &Table, path: &Path) -> Result<(), PipelineError> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_table(table, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Size in bytes of the table once written by [`write_csv`].
pub fn encoded_len(table: &Table) -> Result<u64, PipelineError> {
    let mut counter = ByteCounter::default();
    write_table(table, &mut counter)?;
    Ok(counter.0)
}

#[derive(Default)]
struct ByteCounter(u64);

impl Write for ByteCounter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0 += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn write_table<W: Write>(table: &Table, writer: &mut W) -> std::io::Result<()> {
    write_record(writer, table.columns().iter().map(String::as_str))?;
    for row in table.rows() {
        let fields: Vec<String> = row.iter().map(ToString::to_string).collect();
        write_record(writer, fields.iter().map(String::as_str))?;
    }
    Ok(())
}

fn write_record<'a, W: Write>(
    writer: &mut W,
    fields: impl ExactSizeIterator<Item = &'a str>,
) -> std::io::Result<()> {
    // A lone empty field is quoted so the line is not read back as blank.
    let lone = fields.len() == 1;
    let mut first = true;
    for field in fields {
        if !first {
            writer.write_all(b",")?;
        }
        first = false;
        if lone && field.is_empty() {
            writer.write_all(b"\"\"")?;
        } else if field.contains([',', '"', '\n', '\r']) {
            write!(writer, "\"{}\"", field.replace('"', "\"\""))?;
        } else {
            writer.write_all(field.as_bytes())?;
        }
    }
    writer.write_all(b"\n")
}

fn split_records(contents: &str) -> Result<Vec<Vec<String>>, PipelineError> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut quoted = false;
    let mut chars = contents.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' => {
                in_quotes = true;
                quoted = true;
            }
            ',' => record.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => {
                // blank lines carry no record
                if record.is_empty() && field.is_empty() && !quoted {
                    continue;
                }
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
                quoted = false;
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(PipelineError::malformed("CSV input ends inside a quoted field"));
    }
    if !field.is_empty() || !record.is_empty() || quoted {
        record.push(field);
        records.push(record);
    }
    Ok(records)
}
