//! Line-delimited JSON records: documents in, queries in, predictions out.

use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::Path,
};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Read one JSON value per non-blank line.
pub fn load_jsonl(path: &Path) -> Result<Vec<Value>> {
    let file = File::open(path).map_err(|e| {
        Error::Config(format!("cannot open {}: {e}", path.display()))
    })?;
    read_jsonl(BufReader::new(file))
}

pub fn read_jsonl(reader: impl BufRead) -> Result<Vec<Value>> {
    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let value = serde_json::from_str(&line).map_err(|source| {
            Error::Record {
                line: idx + 1,
                source,
            }
        })?;
        records.push(value);
    }
    Ok(records)
}

/// Write one compact JSON value per line.
pub fn save_jsonl<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_jsonl(&mut writer, records)?;
    writer.flush()?;
    Ok(())
}

pub fn write_jsonl<T: Serialize>(
    mut writer: impl Write,
    records: &[T],
) -> Result<()> {
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }
    Ok(())
}

/// The question text of a query record (`query.content`).
pub fn query_text(record: &Value) -> Option<&str> {
    record.get("query")?.get("content")?.as_str()
}

/// Store an answer and its references under `prediction`.
///
/// Other fields, including other `prediction` fields, are kept. A missing
/// or non-object `prediction` is replaced by a fresh object.
pub fn set_prediction(record: &mut Value, answer: &str, references: Vec<String>) {
    let Some(object) = record.as_object_mut() else {
        return;
    };

    let prediction = object
        .entry("prediction")
        .or_insert_with(|| Value::Object(Map::new()));
    if !prediction.is_object() {
        *prediction = Value::Object(Map::new());
    }

    if let Some(prediction) = prediction.as_object_mut() {
        prediction.insert("content".into(), Value::from(answer));
        prediction.insert("references".into(), Value::from(references));
    }
}
