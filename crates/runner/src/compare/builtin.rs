//! Builtin comparison operators.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{json, Value};

use super::{Operator, OperatorError, OperatorKind, OperatorRegistry};

pub fn register_builtins(registry: &mut OperatorRegistry) {
    registry.register(OperatorKind::NamedFunction, Arc::new(FilesIdentical));
    registry.register(OperatorKind::NamedFunction, Arc::new(LineCountEqual));
    registry.register(OperatorKind::NamedClass, Arc::new(JsonEquivalent));
}

fn require_two(args: &[PathBuf]) -> Result<(), OperatorError> {
    if args.len() < 2 {
        return Err(OperatorError::InvalidInput(format!(
            "expected at least 2 inputs, got {}",
            args.len()
        )));
    }
    Ok(())
}

/// All inputs are byte-identical.
pub struct FilesIdentical;

impl Operator for FilesIdentical {
    fn name(&self) -> &str {
        "files_identical"
    }

    fn run(&self, args: &[PathBuf]) -> Result<Value, OperatorError> {
        require_two(args)?;
        let reference = std::fs::read(&args[0])?;
        for other in &args[1..] {
            if std::fs::read(other)? != reference {
                return Err(OperatorError::Failed(format!(
                    "'{}' differs from '{}'",
                    other.display(),
                    args[0].display()
                )));
            }
        }
        Ok(json!({"inputs": args.len(), "bytes": reference.len()}))
    }
}

/// All inputs have the same number of lines.
pub struct LineCountEqual;

impl Operator for LineCountEqual {
    fn name(&self) -> &str {
        "line_count_equal"
    }

    fn run(&self, args: &[PathBuf]) -> Result<Value, OperatorError> {
        require_two(args)?;
        let counts = args
            .iter()
            .map(|path| Ok(std::fs::read_to_string(path)?.lines().count()))
            .collect::<Result<Vec<usize>, OperatorError>>()?;
        if counts.iter().any(|c| *c != counts[0]) {
            return Err(OperatorError::Failed(format!(
                "line counts differ: {:?}",
                counts
            )));
        }
        Ok(json!({"lines": counts[0]}))
    }
}

/// All inputs parse to equal JSON values, regardless of formatting and
/// key order.
pub struct JsonEquivalent;

impl Operator for JsonEquivalent {
    fn name(&self) -> &str {
        "JsonEquivalent"
    }

    fn run(&self, args: &[PathBuf]) -> Result<Value, OperatorError> {
        require_two(args)?;
        let docs = args
            .iter()
            .map(|path| {
                let text = std::fs::read_to_string(path)?;
                serde_json::from_str::<Value>(&text).map_err(|e| {
                    OperatorError::InvalidInput(format!("'{}': {}", path.display(), e))
                })
            })
            .collect::<Result<Vec<Value>, OperatorError>>()?;
        for (path, doc) in args.iter().zip(&docs).skip(1) {
            if *doc != docs[0] {
                return Err(OperatorError::Failed(format!(
                    "'{}' is not equivalent to '{}'",
                    path.display(),
                    args[0].display()
                )));
            }
        }
        Ok(json!({"inputs": args.len()}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn files_identical_passes_and_fails() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a", "same");
        let b = write(dir.path(), "b", "same");
        let c = write(dir.path(), "c", "other");
        assert_eq!(
            FilesIdentical.run(&[a.clone(), b]).unwrap(),
            json!({"inputs": 2, "bytes": 4})
        );
        assert!(matches!(
            FilesIdentical.run(&[a, c]),
            Err(OperatorError::Failed(_))
        ));
    }

    #[test]
    fn single_input_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a", "x");
        assert!(matches!(
            FilesIdentical.run(&[a]),
            Err(OperatorError::InvalidInput(_))
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a", "x");
        let missing = dir.path().join("missing");
        assert!(matches!(
            FilesIdentical.run(&[a, missing]),
            Err(OperatorError::Io(_))
        ));
    }

    #[test]
    fn line_count_equal_ignores_content() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a", "1\n2\n");
        let b = write(dir.path(), "b", "x\ny\n");
        let c = write(dir.path(), "c", "x\n");
        assert_eq!(
            LineCountEqual.run(&[a.clone(), b]).unwrap(),
            json!({"lines": 2})
        );
        assert!(LineCountEqual.run(&[a, c]).is_err());
    }

    #[test]
    fn json_equivalent_ignores_formatting() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a.json", r#"{"x": 1, "y": [1, 2]}"#);
        let b = write(dir.path(), "b.json", "{\n  \"y\": [1, 2],\n  \"x\": 1\n}\n");
        let c = write(dir.path(), "c.json", r#"{"x": 2, "y": [1, 2]}"#);
        assert!(JsonEquivalent.run(&[a.clone(), b]).is_ok());
        assert!(matches!(
            JsonEquivalent.run(&[a, c]),
            Err(OperatorError::Failed(_))
        ));
    }
}
