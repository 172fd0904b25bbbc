//! Builtin fingerprinters.
//!
//! | tag | fingerprinter |
//! |---|---|
//! | `text` | [`TextStats`] |
//! | `json` | [`JsonSummary`] |
//! | `table`, `csv`, `tsv` | [`TableShape`] |
//! | `digest` | [`Sha256Digest`] |

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use super::{FingerprintError, FingerprintRegistry, Fingerprinter};

pub fn register_builtins(registry: &mut FingerprintRegistry) {
    registry.register("text", Arc::new(TextStats));
    registry.register("json", Arc::new(JsonSummary));
    let table: Arc<dyn Fingerprinter> = Arc::new(TableShape);
    for tag in ["table", "csv", "tsv"] {
        registry.register(tag, table.clone());
    }
    registry.register("digest", Arc::new(Sha256Digest));
}

/// Line, word and byte counts of a text file.
pub struct TextStats;

impl Fingerprinter for TextStats {
    fn name(&self) -> &str {
        "fp_text_stats"
    }

    fn fingerprint(
        &self,
        path: &Path,
        slot: &mut Map<String, Value>,
        _tags: &BTreeSet<String>,
    ) -> Result<(), FingerprintError> {
        let bytes = std::fs::read(path)?;
        slot.insert("bytes".into(), json!(bytes.len()));
        let text = String::from_utf8(bytes)
            .map_err(|e| FingerprintError::Parse(format!("not UTF-8 text: {}", e)))?;
        slot.insert("lines".into(), json!(text.lines().count()));
        slot.insert("words".into(), json!(text.split_whitespace().count()));
        slot.insert("trailing_newline".into(), json!(text.ends_with('\n')));
        Ok(())
    }
}

/// Top-level shape of a JSON document.
pub struct JsonSummary;

impl Fingerprinter for JsonSummary {
    fn name(&self) -> &str {
        "fp_json_summary"
    }

    fn fingerprint(
        &self,
        path: &Path,
        slot: &mut Map<String, Value>,
        _tags: &BTreeSet<String>,
    ) -> Result<(), FingerprintError> {
        let text = std::fs::read_to_string(path)?;
        let doc: Value =
            serde_json::from_str(&text).map_err(|e| FingerprintError::Parse(e.to_string()))?;
        let kind = match &doc {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        };
        slot.insert("type".into(), json!(kind));
        match &doc {
            Value::Object(map) => {
                // serde_json::Map iterates in sorted key order
                let keys: Vec<&String> = map.keys().collect();
                slot.insert("keys".into(), json!(keys));
            }
            Value::Array(items) => {
                slot.insert("length".into(), json!(items.len()));
            }
            _ => {}
        }
        Ok(())
    }
}

/// Row and column counts of delimited text.
///
/// Tab-delimited when the output is tagged `tsv`, comma-delimited
/// otherwise. Quoted delimiters are not interpreted.
pub struct TableShape;

impl Fingerprinter for TableShape {
    fn name(&self) -> &str {
        "fp_table_shape"
    }

    fn fingerprint(
        &self,
        path: &Path,
        slot: &mut Map<String, Value>,
        tags: &BTreeSet<String>,
    ) -> Result<(), FingerprintError> {
        let delimiter = if tags.contains("tsv") { '\t' } else { ',' };
        let text = std::fs::read_to_string(path)?;
        let widths: Vec<usize> = text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| line.split(delimiter).count())
            .collect();
        let columns = widths.first().copied().unwrap_or(0);
        slot.insert("delimiter".into(), json!(delimiter.to_string()));
        slot.insert("rows".into(), json!(widths.len()));
        slot.insert("columns".into(), json!(columns));
        slot.insert(
            "rectangular".into(),
            json!(widths.iter().all(|w| *w == columns)),
        );
        Ok(())
    }
}

/// SHA-256 digest of the content.
pub struct Sha256Digest;

impl Fingerprinter for Sha256Digest {
    fn name(&self) -> &str {
        "fp_sha256"
    }

    fn fingerprint(
        &self,
        path: &Path,
        slot: &mut Map<String, Value>,
        _tags: &BTreeSet<String>,
    ) -> Result<(), FingerprintError> {
        let bytes = std::fs::read(path)?;
        slot.insert(
            "sha256".into(),
            json!(format!("{:x}", Sha256::digest(&bytes))),
        );
        Ok(())
    }
}
