//! Snapshot files: full alert dumps written for later reconciliation runs.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::{Map, Value};

use crate::error::Error;
use crate::types::AlertRecord;

/// Write records as a structured JSON document, preserving field names and
/// nesting exactly as received.
pub fn write_json<W: Write>(records: &[AlertRecord], writer: W) -> Result<(), Error> {
    let mut writer = BufWriter::new(writer);
    serde_json::to_writer_pretty(&mut writer, records)?;
    writer.flush()?;
    Ok(())
}

/// Write records as a JSON document at `path`.
pub fn write_json_file(records: &[AlertRecord], path: &Path) -> Result<(), Error> {
    write_json(records, File::create(path)?)
}

/// Read back a JSON dump produced by [`write_json`].
pub fn read_json(path: &Path) -> Result<Vec<AlertRecord>, Error> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

/// Flatten records into one wide CSV row each.
///
/// Nested objects become dotted column names (`state.alert_id`); the header
/// is the union of columns observed across all records, in first-seen
/// order. Cells for columns a record lacks are left empty; arrays and other
/// non-scalar leaves are serialized as compact JSON.
pub fn write_tabular<W: Write>(records: &[AlertRecord], writer: W) -> Result<(), Error> {
    let mut columns: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut rows: Vec<Vec<(String, String)>> = Vec::with_capacity(records.len());

    for record in records {
        let mut row = Vec::new();
        flatten_into("", record.fields(), &mut row, &mut columns, &mut seen);
        rows.push(row);
    }

    // Nothing to lay out without at least one leaf column.
    if columns.is_empty() {
        return Ok(());
    }

    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(&columns)?;
    for row in &rows {
        let cells: Vec<&str> = columns
            .iter()
            .map(|column| {
                row.iter()
                    .find(|(name, _)| name == column)
                    .map_or("", |(_, value)| value.as_str())
            })
            .collect();
        csv_writer.write_record(cells)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Write records as a flattened CSV at `path`.
pub fn write_tabular_file(records: &[AlertRecord], path: &Path) -> Result<(), Error> {
    write_tabular(records, File::create(path)?)
}

/// `prefix_YYYYmmdd_HHMMSS.extension`, so successive dumps never overwrite
/// each other.
#[must_use]
pub fn timestamped_path(prefix: &str, extension: &str) -> PathBuf {
    let stamp = Utc::now().format("%Y%m%d_%H%M%S");
    PathBuf::from(format!("{prefix}_{stamp}.{extension}"))
}

fn flatten_into(
    prefix: &str,
    fields: &Map<String, Value>,
    row: &mut Vec<(String, String)>,
    columns: &mut Vec<String>,
    seen: &mut HashSet<String>,
) {
    for (key, value) in fields {
        let column = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };

        match value {
            Value::Object(nested) => flatten_into(&column, nested, row, columns, seen),
            leaf => {
                if seen.insert(column.clone()) {
                    columns.push(column.clone());
                }
                row.push((column, cell_text(leaf)));
            }
        }
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
