//! specbed-runner: executes test specs against testbeds and verifies what
//! they produce.
//!
//! A run checks the spec's requirements, prepares a testbed, runs the
//! workload through an [`ExecutionBackend`], verifies the declared
//! outputs, fingerprints file outputs (detecting duplicates by content
//! hash) and evaluates comparison operators over them. The input
//! [`TestSpec`](specbed_spec::TestSpec) is never mutated; everything a
//! run learns lands in an [`ExecutionResult`].

pub mod backend;
pub mod compare;
mod config;
pub mod env;
mod error;
pub mod fingerprint;
pub mod policy;
pub mod provision;
pub mod requirements;
mod result;
mod runner;
pub mod verify;

pub use backend::{BackendError, BackendRegistry, ExecutionBackend, ExecutionOutcome, TESTBED_PATH_ENV};
pub use compare::{ComparisonEvaluator, EvalError, Operator, OperatorError, OperatorKind, OperatorRegistry};
pub use config::{default_cache_dir, RunnerConfig};
pub use error::RunError;
pub use fingerprint::{
    EngineError, FingerprintEngine, FingerprintError, FingerprintRegistry, Fingerprinter,
};
pub use policy::FailurePolicy;
pub use provision::{LocalProvisioner, ProvisionError, Provisioner};
pub use requirements::{RequirementError, RequirementsChecker};
pub use result::{
    ComparisonRecord, ExecutionResult, OutputRecord, Sections, Stage, StageTiming, Verification,
};
pub use runner::Runner;
pub use verify::{OutputVerifier, VerifyError};
