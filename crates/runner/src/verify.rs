//! Output verification: are the declared outputs present and correct?

use std::path::Path;

use serde_json::Value;
use specbed_spec::{split_field_id, OutputKind, TestSpec};
use tracing::debug;

use crate::result::Sections;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    /// A declared output type the verifier has no check for.
    #[error("unsupported output type '{0}'")]
    UnsupportedOutputType(String),

    /// Every output that did not match, in id order.
    #[error("mismatch in expected output(s): {}", .0.join(", "))]
    OutputMismatch(Vec<String>),
}

/// Checks every declared output before reporting.
///
/// `file` outputs must exist below the testbed root. `string` outputs are
/// ids of the form `section::field` whose value must equal the declared
/// literal; the field is looked up in the sections recorded for this run
/// first, then in the spec itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct OutputVerifier;

impl OutputVerifier {
    pub fn verify(
        &self,
        spec: &TestSpec,
        testbed: &Path,
        recorded: &Sections,
    ) -> Result<(), VerifyError> {
        let mut unmatched = Vec::new();
        for (id, output) in &spec.outputs {
            let matched = match &output.kind {
                OutputKind::File => testbed.join(&output.value).is_file(),
                OutputKind::String => string_matches(spec, recorded, id, &output.value),
                OutputKind::Other(kind) => {
                    return Err(VerifyError::UnsupportedOutputType(kind.clone()))
                }
            };
            debug!(output = %id, matched, "verified output");
            if !matched {
                unmatched.push(id.clone());
            }
        }
        if unmatched.is_empty() {
            Ok(())
        } else {
            Err(VerifyError::OutputMismatch(unmatched))
        }
    }
}

fn string_matches(spec: &TestSpec, recorded: &Sections, id: &str, expected: &str) -> bool {
    let Some((section, field)) = split_field_id(id) else {
        return false;
    };
    let actual = recorded
        .get(section)
        .and_then(|fields| fields.get(field))
        .cloned()
        .or_else(|| spec.field(section, field));
    match actual {
        Some(Value::String(s)) => s == expected,
        Some(other) => other.to_string() == expected,
        None => false,
    }
}
