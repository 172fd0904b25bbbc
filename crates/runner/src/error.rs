use std::path::PathBuf;

use crate::compare::EvalError;
use crate::fingerprint::EngineError;
use crate::provision::ProvisionError;
use crate::requirements::RequirementError;
use crate::verify::VerifyError;

/// Fatal conditions that abort a run.
///
/// Conditions that only make a run fail (an incomplete workload, mismatched
/// outputs, absorbed fingerprint errors) are recorded in the
/// [`ExecutionResult`](crate::ExecutionResult) instead.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// A declared environment variable or executable is missing.
    #[error(transparent)]
    Requirement(#[from] RequirementError),

    /// No backend is registered for the spec's `test.type`.
    #[error("no execution backend for test type '{0}'")]
    UnknownBackend(String),

    /// The testbed could not be prepared.
    #[error(transparent)]
    Provision(#[from] ProvisionError),

    /// The workload could not be constructed or launched.
    #[error("exception while setting up workload ({}): {message}", file.display())]
    WorkflowSetup { file: PathBuf, message: String },

    /// Output verification hit a configuration error.
    #[error(transparent)]
    Verify(#[from] VerifyError),

    /// Fingerprinting failed under the fail-fast policy, or an output could
    /// not be hashed.
    #[error(transparent)]
    Fingerprint(#[from] EngineError),

    /// A comparison failed under the fail-fast policy.
    #[error(transparent)]
    Eval(#[from] EvalError),
}
