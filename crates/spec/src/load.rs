//! Loading test specifications from JSON documents.

use std::path::{Path, PathBuf};

use crate::types::TestSpec;

/// Errors while loading a test specification.
#[derive(Debug, thiserror::Error)]
pub enum SpecError {
    #[error("could not read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid test spec: {0}")]
    Parse(#[from] serde_json::Error),

    /// The spec has an empty id.
    #[error("test spec has no id")]
    MissingId,

    /// The id cannot be used as a testbed directory name.
    #[error("test spec id '{0}' is not a valid directory name")]
    InvalidId(String),
}

impl TestSpec {
    /// Parse a spec from JSON text.
    pub fn from_json(text: &str) -> Result<Self, SpecError> {
        let spec: TestSpec = serde_json::from_str(text)?;
        spec.check_id()?;
        Ok(spec)
    }

    /// Convert an already-parsed JSON document.
    pub fn from_value(doc: serde_json::Value) -> Result<Self, SpecError> {
        let spec: TestSpec = serde_json::from_value(doc)?;
        spec.check_id()?;
        Ok(spec)
    }

    fn check_id(&self) -> Result<(), SpecError> {
        if self.id.is_empty() {
            return Err(SpecError::MissingId);
        }
        if self.id == "." || self.id == ".." || self.id.contains(['/', '\\']) {
            return Err(SpecError::InvalidId(self.id.clone()));
        }
        Ok(())
    }
}

/// Read and parse the spec at `path`.
pub fn load_spec(path: &Path) -> Result<TestSpec, SpecError> {
    let text = std::fs::read_to_string(path).map_err(|source| SpecError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    TestSpec::from_json(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{InputRef, OutputKind};
    use serde_json::json;

    fn full_doc() -> serde_json::Value {
        json!({
            "id": "resample",
            "test": {"type": "shell", "file": "resample.sh"},
            "outputs": {
                "out_a": {"type": "file", "value": "out/a.txt", "tags": ["text"]},
                "execution::exit_code": {"type": "string", "value": "0"}
            },
            "comparisons": {
                "same": {
                    "operator": {"type": "builtin-func", "name": "files_identical"},
                    "inputs": [
                        {"origin": "testoutput", "value": "out_a"},
                        {"origin": "testoutput", "value": "out_a"}
                    ]
                }
            },
            "environment": ["HOME"],
            "executables": {"$HOME/bin/tool": {"optional": true}, "/bin/sh": {}}
        })
    }

    #[test]
    fn parses_full_document() {
        let spec = TestSpec::from_value(full_doc()).unwrap();
        assert_eq!(spec.id, "resample");
        assert_eq!(spec.test.kind, "shell");
        assert_eq!(spec.test.file.as_deref(), Some("resample.sh"));
        assert_eq!(spec.outputs["out_a"].kind, OutputKind::File);
        assert!(spec.outputs["out_a"].tags.contains("text"));
        assert_eq!(spec.outputs["execution::exit_code"].kind, OutputKind::String);
        assert!(matches!(
            spec.comparisons["same"].inputs[0],
            InputRef::Positional(_)
        ));
        assert!(spec.environment.contains("HOME"));
        assert!(spec.executables["$HOME/bin/tool"].optional);
        assert!(!spec.executables["/bin/sh"].optional);
    }

    #[test]
    fn missing_test_section_is_a_parse_error() {
        let err = TestSpec::from_value(json!({"id": "x"})).unwrap_err();
        assert!(matches!(err, SpecError::Parse(_)), "got {:?}", err);
    }

    #[test]
    fn empty_id_is_rejected() {
        let err = TestSpec::from_value(json!({"id": "", "test": {"type": "shell"}})).unwrap_err();
        assert!(matches!(err, SpecError::MissingId));
    }

    #[test]
    fn path_like_id_is_rejected() {
        let err =
            TestSpec::from_value(json!({"id": "../escape", "test": {"type": "shell"}})).unwrap_err();
        assert!(matches!(err, SpecError::InvalidId(id) if id == "../escape"));
    }

    #[test]
    fn load_spec_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_spec(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, SpecError::Io { .. }));
        assert!(err.to_string().contains("nope.json"));
    }

    #[test]
    fn load_spec_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spec.json");
        std::fs::write(&path, full_doc().to_string()).unwrap();
        let spec = load_spec(&path).unwrap();
        assert_eq!(spec.outputs.len(), 2);
    }
}
