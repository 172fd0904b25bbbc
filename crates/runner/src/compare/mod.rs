//! Comparison evaluation over declared outputs.
//!
//! Each comparison names an operator by `{type, name}` and lists
//! positional input references to declared outputs. References are
//! resolved to file paths inside the testbed before the operator runs.
//!
//! An operator signals a failed comparison by returning `Err`. A normal
//! return is a pass whatever the returned details contain.

pub mod builtin;
pub mod registry;

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde_json::Value;
use specbed_spec::{ComparisonSpec, InputRef, OutputKind, TestSpec, ORIGIN_TEST_OUTPUT};
use tracing::debug;

use crate::policy::FailurePolicy;
use crate::result::ComparisonRecord;

pub use registry::OperatorRegistry;

// ──────────────────────────────────────────────
// Operator plugin contract
// ──────────────────────────────────────────────

/// The closed set of operator source kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OperatorKind {
    /// `builtin-func`: a stateless comparison function.
    NamedFunction,
    /// `builtin-class`: a comparison object constructed for the registry.
    NamedClass,
}

impl OperatorKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "builtin-func" => Some(OperatorKind::NamedFunction),
            "builtin-class" => Some(OperatorKind::NamedClass),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OperatorKind::NamedFunction => "builtin-func",
            OperatorKind::NamedClass => "builtin-class",
        }
    }
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OperatorError {
    /// The inputs were compared and found to differ.
    #[error("{0}")]
    Failed(String),
    /// The operator cannot work with the inputs it was given.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

/// One comparison between resolved outputs.
pub trait Operator: Send + Sync {
    fn name(&self) -> &str;

    /// Compare the files at `args` (absolute paths, in declared order).
    fn run(&self, args: &[PathBuf]) -> Result<Value, OperatorError>;
}

// ──────────────────────────────────────────────
// Evaluation errors
// ──────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("unsupported operator type '{0}'")]
    UnsupportedOperatorKind(String),

    #[error("no {kind} operator named '{name}'")]
    UnknownOperator { kind: OperatorKind, name: String },

    #[error("comparison '{comparison}': keyword input '{input}' is not supported")]
    UnsupportedKeywordInput { comparison: String, input: String },

    #[error("comparison '{comparison}': inputs must reference test outputs (got origin '{origin}')")]
    UnsupportedInputOrigin { comparison: String, origin: String },

    #[error("reference to non-file test output '{output_id}' ({kind}) is not supported")]
    UnsupportedReference { output_id: String, kind: String },

    #[error("comparison references unknown output '{0}'")]
    UnknownOutputReference(String),

    #[error("comparison '{comparison}' ({operator}) failed: {source}")]
    Operator {
        comparison: String,
        operator: String,
        #[source]
        source: OperatorError,
    },
}

// ──────────────────────────────────────────────
// ComparisonEvaluator
// ──────────────────────────────────────────────

pub struct ComparisonEvaluator<'a> {
    registry: &'a OperatorRegistry,
    policy: FailurePolicy,
}

impl<'a> ComparisonEvaluator<'a> {
    pub fn new(registry: &'a OperatorRegistry, policy: FailurePolicy) -> Self {
        ComparisonEvaluator { registry, policy }
    }

    /// Evaluate every comparison of `spec`, recording each outcome.
    ///
    /// Under [`FailurePolicy::FailFast`] the first error is returned
    /// unrecorded; under [`FailurePolicy::Isolated`] it is recorded as a
    /// failed comparison and evaluation continues.
    pub fn evaluate(
        &self,
        spec: &TestSpec,
        testbed: &Path,
        records: &mut BTreeMap<String, ComparisonRecord>,
    ) -> Result<(), EvalError> {
        for (id, comparison) in &spec.comparisons {
            debug!(comparison = %id, "running comparison");
            match self.evaluate_one(id, comparison, spec, testbed) {
                Ok(details) => {
                    records.insert(id.clone(), ComparisonRecord::passed(details));
                }
                Err(e) => match self.policy {
                    FailurePolicy::FailFast => return Err(e),
                    FailurePolicy::Isolated => {
                        debug!(comparison = %id, error = %e, "comparison failed");
                        records.insert(id.clone(), ComparisonRecord::failed(e.to_string()));
                    }
                },
            }
        }
        Ok(())
    }

    fn evaluate_one(
        &self,
        id: &str,
        comparison: &ComparisonSpec,
        spec: &TestSpec,
        testbed: &Path,
    ) -> Result<Value, EvalError> {
        let operator = self.registry.resolve(&comparison.operator)?;
        let args = comparison
            .inputs
            .iter()
            .map(|input| resolve_input(id, input, spec, testbed))
            .collect::<Result<Vec<_>, _>>()?;
        operator.run(&args).map_err(|source| EvalError::Operator {
            comparison: id.to_string(),
            operator: comparison.operator.name.clone(),
            source,
        })
    }
}

/// Resolve one input reference to the path of a declared file output.
pub fn resolve_input(
    comparison: &str,
    input: &InputRef,
    spec: &TestSpec,
    testbed: &Path,
) -> Result<PathBuf, EvalError> {
    let reference = match input {
        InputRef::Positional(reference) => reference,
        InputRef::Keyword(name) => {
            return Err(EvalError::UnsupportedKeywordInput {
                comparison: comparison.to_string(),
                input: name.clone(),
            })
        }
    };
    if reference.origin.as_deref() != Some(ORIGIN_TEST_OUTPUT) {
        return Err(EvalError::UnsupportedInputOrigin {
            comparison: comparison.to_string(),
            origin: reference.origin.clone().unwrap_or_default(),
        });
    }
    let output = spec
        .outputs
        .get(&reference.value)
        .ok_or_else(|| EvalError::UnknownOutputReference(reference.value.clone()))?;
    match &output.kind {
        OutputKind::File => Ok(testbed.join(&output.value)),
        other => Err(EvalError::UnsupportedReference {
            output_id: reference.value.clone(),
            kind: other.to_string(),
        }),
    }
}
