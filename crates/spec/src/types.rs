//! Typed structs representing a test specification document.
//!
//! Field names follow the JSON wire format. Sections the model does not
//! know about are kept verbatim in [`TestSpec::sections`] so that
//! `section::field` string outputs can address them.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Origin value marking an input reference as pointing at a declared output.
pub const ORIGIN_TEST_OUTPUT: &str = "testoutput";

/// Separator between section and field in a string output id.
pub const FIELD_SEPARATOR: &str = "::";

/// One test case.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestSpec {
    /// Unique identifier, also used as the testbed directory name.
    pub id: String,
    pub test: TestDescriptor,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, OutputSpec>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub comparisons: BTreeMap<String, ComparisonSpec>,
    /// Names of environment variables that must be set.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub environment: BTreeSet<String>,
    /// Executable paths (may reference environment variables).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub executables: BTreeMap<String, ExecutableSpec>,
    /// Any other top-level sections of the document.
    #[serde(flatten)]
    pub sections: BTreeMap<String, Value>,
}

/// The workload to execute.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TestDescriptor {
    /// Backend selector (e.g. `"shell"`).
    #[serde(rename = "type")]
    pub kind: String,
    /// Workload file, relative to the testbed root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

/// Declared output type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OutputKind {
    File,
    String,
    /// Accepted on load, rejected at verification.
    Other(String),
}

impl OutputKind {
    pub fn as_str(&self) -> &str {
        match self {
            OutputKind::File => "file",
            OutputKind::String => "string",
            OutputKind::Other(s) => s,
        }
    }
}

impl From<String> for OutputKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "file" => OutputKind::File,
            "string" => OutputKind::String,
            _ => OutputKind::Other(s),
        }
    }
}

impl From<OutputKind> for String {
    fn from(kind: OutputKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A declared output of the workload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputSpec {
    #[serde(rename = "type")]
    pub kind: OutputKind,
    /// File path relative to the testbed root, or the expected literal.
    pub value: String,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1sum: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fingerprints: BTreeMap<String, Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identical_with: Option<String>,
}

impl OutputSpec {
    /// A file output with no tags.
    pub fn file(path: impl Into<String>) -> Self {
        OutputSpec {
            kind: OutputKind::File,
            value: path.into(),
            tags: BTreeSet::new(),
            sha1sum: None,
            fingerprints: BTreeMap::new(),
            identical_with: None,
        }
    }

    /// A string output expecting `expected`.
    pub fn string(expected: impl Into<String>) -> Self {
        OutputSpec {
            kind: OutputKind::String,
            ..OutputSpec::file(expected)
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }
}

/// The `{type, name}` pair identifying a comparison operator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OperatorSpec {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
}

/// A positional input reference.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    pub value: String,
}

impl Reference {
    /// Reference to the declared output `output_id`.
    pub fn test_output(output_id: impl Into<String>) -> Self {
        Reference {
            origin: Some(ORIGIN_TEST_OUTPUT.to_string()),
            value: output_id.into(),
        }
    }
}

/// One entry of a comparison's `inputs`.
///
/// The document format cannot tell keyword inputs apart reliably; a bare
/// string is treated as keyword-style and rejected during evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum InputRef {
    Positional(Reference),
    Keyword(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComparisonSpec {
    pub operator: OperatorSpec,
    #[serde(default)]
    pub inputs: Vec<InputRef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecutableSpec {
    #[serde(default)]
    pub optional: bool,
}

impl TestSpec {
    /// A spec with the given id and workload and nothing else declared.
    pub fn new(id: impl Into<String>, test: TestDescriptor) -> Self {
        TestSpec {
            id: id.into(),
            test,
            outputs: BTreeMap::new(),
            comparisons: BTreeMap::new(),
            environment: BTreeSet::new(),
            executables: BTreeMap::new(),
            sections: BTreeMap::new(),
        }
    }

    /// Declared outputs of the given kind, in ascending id order.
    pub fn outputs_of<'a>(
        &'a self,
        kind: &'a OutputKind,
    ) -> impl Iterator<Item = (&'a String, &'a OutputSpec)> + 'a {
        self.outputs.iter().filter(move |(_, o)| &o.kind == kind)
    }

    /// Look up `spec[section][field]`.
    ///
    /// Typed sections (`test`, `outputs`, ...) are addressed through their
    /// serialized form, so `test::type` works as well as custom sections.
    pub fn field(&self, section: &str, field: &str) -> Option<Value> {
        if let Some(value) = self.sections.get(section) {
            return value.get(field).cloned();
        }
        let doc = serde_json::to_value(self).ok()?;
        doc.get(section)?.get(field).cloned()
    }
}

/// Split a string output id into `(section, field)`.
pub fn split_field_id(output_id: &str) -> Option<(&str, &str)> {
    output_id.split_once(FIELD_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn output_kind_roundtrips_known_and_unknown() {
        let known: OutputKind = serde_json::from_value(json!("file")).unwrap();
        assert_eq!(known, OutputKind::File);
        let other: OutputKind = serde_json::from_value(json!("volume")).unwrap();
        assert_eq!(other, OutputKind::Other("volume".to_string()));
        assert_eq!(serde_json::to_value(&other).unwrap(), json!("volume"));
    }

    #[test]
    fn input_refs_distinguish_objects_from_strings() {
        let inputs: Vec<InputRef> = serde_json::from_value(json!([
            {"origin": "testoutput", "value": "a"},
            "threshold"
        ]))
        .unwrap();
        assert_eq!(inputs[0], InputRef::Positional(Reference::test_output("a")));
        assert_eq!(inputs[1], InputRef::Keyword("threshold".to_string()));
    }

    #[test]
    fn unknown_sections_are_preserved() {
        let spec: TestSpec = serde_json::from_value(json!({
            "id": "t1",
            "test": {"type": "shell"},
            "system": {"arch": "x86_64"}
        }))
        .unwrap();
        assert_eq!(spec.field("system", "arch"), Some(json!("x86_64")));
        assert_eq!(spec.field("system", "os"), None);
    }

    #[test]
    fn typed_sections_are_addressable() {
        let spec = TestSpec::new(
            "t2",
            TestDescriptor {
                kind: "shell".to_string(),
                file: Some("go.sh".to_string()),
            },
        );
        assert_eq!(spec.field("test", "type"), Some(json!("shell")));
        assert_eq!(spec.field("test", "file"), Some(json!("go.sh")));
    }

    #[test]
    fn outputs_of_filters_and_sorts() {
        let mut spec = TestSpec::new(
            "t3",
            TestDescriptor {
                kind: "shell".to_string(),
                file: None,
            },
        );
        spec.outputs.insert("z".into(), OutputSpec::file("z.txt"));
        spec.outputs.insert("a".into(), OutputSpec::file("a.txt"));
        spec.outputs.insert("m::n".into(), OutputSpec::string("x"));
        let ids: Vec<&String> = spec.outputs_of(&OutputKind::File).map(|(id, _)| id).collect();
        assert_eq!(ids, ["a", "z"]);
    }

    #[test]
    fn split_field_id_requires_separator() {
        assert_eq!(split_field_id("execution::exit_code"), Some(("execution", "exit_code")));
        assert_eq!(split_field_id("plain"), None);
    }
}
