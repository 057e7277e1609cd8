//! Human-readable exports
//!
//! - `.karl`: one `key=value;` assignment per line, readable by the KaRL
//!   interpreter
//! - JSON: one object mapping keys to values
//!
//! Binary values cannot be inlined. Each is written to a sibling file named
//! after its key (`<key>.jpg` for JPEG images, `<key>.dat` otherwise) and
//! referenced as `#read_file('<path>')`. Prefix filters apply; records that
//! were never assigned are skipped.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use madara_core::KnowledgeValue;
use madara_storage::ThreadSafeContext;
use serde_json::{Map, Number, Value};
use tracing::debug;

use crate::error::{CheckpointError, Result};
use crate::settings::CheckpointSettings;

/// Write the context as a `.karl` script to `settings.filename`
///
/// Returns the bytes written to the script, not counting sibling files.
pub fn save_as_karl(context: &ThreadSafeContext, settings: &CheckpointSettings) -> Result<u64> {
    let _guard = context.lock();
    let dir = output_dir(&settings.filename);
    let mut script = String::new();

    for (key, record) in context.records_matching(&settings.prefixes) {
        let rendered = match &record.value {
            KnowledgeValue::Integer(i) => i.to_string(),
            KnowledgeValue::Double(d) => format_double(*d),
            KnowledgeValue::String(s) | KnowledgeValue::Xml(s) | KnowledgeValue::TextFile(s) => {
                quote(s)
            }
            KnowledgeValue::IntegerArray(_) => format!("[{}]", record.value.to_string_with(", ")),
            KnowledgeValue::DoubleArray(v) => format!(
                "[{}]",
                v.iter().map(|d| format_double(*d)).collect::<Vec<_>>().join(", ")
            ),
            KnowledgeValue::ImageJpeg(_) | KnowledgeValue::UnknownFile(_) => {
                read_file_reference(&externalize(&dir, &key, &record.value)?)
            }
            KnowledgeValue::Empty => continue,
        };
        // Infallible for String
        let _ = writeln!(script, "{}={};", key, rendered);
    }

    std::fs::write(&settings.filename, &script)
        .map_err(|e| CheckpointError::file(&settings.filename, e.to_string()))?;
    debug!(
        target: "madara::export",
        path = %settings.filename.display(),
        bytes = script.len(),
        "Exported KaRL script"
    );
    Ok(script.len() as u64)
}

/// Write the context as a JSON object to `settings.filename`
///
/// Returns the bytes written to the JSON file, not counting sibling files.
pub fn save_as_json(context: &ThreadSafeContext, settings: &CheckpointSettings) -> Result<u64> {
    let _guard = context.lock();
    let dir = output_dir(&settings.filename);
    let mut object = Map::new();

    for (key, record) in context.records_matching(&settings.prefixes) {
        let value = match &record.value {
            KnowledgeValue::Empty => continue,
            KnowledgeValue::Integer(i) => Value::from(*i),
            KnowledgeValue::Double(d) => double_to_json(*d),
            KnowledgeValue::String(s) | KnowledgeValue::Xml(s) | KnowledgeValue::TextFile(s) => {
                Value::String(s.clone())
            }
            KnowledgeValue::IntegerArray(v) => {
                Value::Array(v.iter().map(|i| Value::from(*i)).collect())
            }
            KnowledgeValue::DoubleArray(v) => {
                Value::Array(v.iter().map(|d| double_to_json(*d)).collect())
            }
            KnowledgeValue::ImageJpeg(_) | KnowledgeValue::UnknownFile(_) => {
                Value::String(read_file_reference(&externalize(&dir, &key, &record.value)?))
            }
        };
        object.insert(key, value);
    }

    let json = serde_json::to_string_pretty(&Value::Object(object))?;
    std::fs::write(&settings.filename, &json)
        .map_err(|e| CheckpointError::file(&settings.filename, e.to_string()))?;
    debug!(
        target: "madara::export",
        path = %settings.filename.display(),
        bytes = json.len(),
        "Exported JSON"
    );
    Ok(json.len() as u64)
}

fn output_dir(filename: &Path) -> PathBuf {
    match filename.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Write a binary value to `<dir>/<key>.<ext>` and return the path
fn externalize(dir: &Path, key: &str, value: &KnowledgeValue) -> Result<PathBuf> {
    let extension = match value {
        KnowledgeValue::ImageJpeg(_) => "jpg",
        _ => "dat",
    };
    let stem: String = key
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    let path = dir.join(format!("{}.{}", stem, extension));
    let bytes = value.as_bytes().unwrap_or_default();
    std::fs::write(&path, bytes).map_err(|e| CheckpointError::file(&path, e.to_string()))?;
    Ok(path)
}

fn read_file_reference(path: &Path) -> String {
    format!("#read_file('{}')", path.display())
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{{{:04x}}}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

// Keep a decimal point so the value reads back as a double
fn format_double(d: f64) -> String {
    if d.is_finite() && d.fract() == 0.0 {
        format!("{:.1}", d)
    } else {
        d.to_string()
    }
}

fn double_to_json(d: f64) -> Value {
    Number::from_f64(d).map(Value::Number).unwrap_or(Value::Null)
}
