//! The orchestrator: runs one spec through every stage, in order.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use specbed_spec::TestSpec;
use tracing::{debug, info, warn};

use crate::backend::{BackendError, BackendRegistry};
use crate::compare::{ComparisonEvaluator, OperatorRegistry};
use crate::config::RunnerConfig;
use crate::error::RunError;
use crate::fingerprint::{FingerprintEngine, FingerprintRegistry};
use crate::provision::{LocalProvisioner, ProvisionError, Provisioner};
use crate::requirements::RequirementsChecker;
use crate::result::{ExecutionResult, Stage, Verification};
use crate::verify::{OutputVerifier, VerifyError};

/// Runs test specs against their testbeds.
///
/// Stages run strictly in order: requirements, provisioning, execution,
/// output verification, fingerprinting, comparison evaluation. A runner
/// holds no per-run state, so one instance can drive many specs at once
/// as long as their ids differ.
pub struct Runner {
    config: RunnerConfig,
    requirements: RequirementsChecker,
    provisioner: Arc<dyn Provisioner>,
    backends: BackendRegistry,
    fingerprints: FingerprintRegistry,
    operators: OperatorRegistry,
}

impl Runner {
    /// A runner with the builtin backends, fingerprinters and operators.
    pub fn new(config: RunnerConfig) -> Self {
        Runner {
            config,
            requirements: RequirementsChecker::new(),
            provisioner: Arc::new(LocalProvisioner),
            backends: BackendRegistry::with_builtins(),
            fingerprints: FingerprintRegistry::with_builtins(),
            operators: OperatorRegistry::with_builtins(),
        }
    }

    pub fn with_requirements(mut self, requirements: RequirementsChecker) -> Self {
        self.requirements = requirements;
        self
    }

    pub fn with_provisioner(mut self, provisioner: Arc<dyn Provisioner>) -> Self {
        self.provisioner = provisioner;
        self
    }

    pub fn with_backends(mut self, backends: BackendRegistry) -> Self {
        self.backends = backends;
        self
    }

    pub fn with_fingerprints(mut self, fingerprints: FingerprintRegistry) -> Self {
        self.fingerprints = fingerprints;
        self
    }

    pub fn with_operators(mut self, operators: OperatorRegistry) -> Self {
        self.operators = operators;
        self
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn backends(&self) -> &BackendRegistry {
        &self.backends
    }

    pub fn fingerprints(&self) -> &FingerprintRegistry {
        &self.fingerprints
    }

    pub fn operators(&self) -> &OperatorRegistry {
        &self.operators
    }

    pub fn testbed_dir(&self, spec: &TestSpec) -> PathBuf {
        self.config.testbed_dir.join(&spec.id)
    }

    pub async fn run(&self, spec: &TestSpec) -> Result<ExecutionResult, RunError> {
        self.run_from(spec, None).await
    }

    /// Run `spec`, searching `origin` (usually the directory the spec was
    /// loaded from) for workload inputs before the configured library
    /// paths.
    pub async fn run_from(
        &self,
        spec: &TestSpec,
        origin: Option<&Path>,
    ) -> Result<ExecutionResult, RunError> {
        let started = Instant::now();
        self.requirements.check(spec)?;
        let backend = self
            .backends
            .get(&spec.test.kind)
            .ok_or_else(|| RunError::UnknownBackend(spec.test.kind.clone()))?;
        let requirements_elapsed = started.elapsed();

        let started = Instant::now();
        let workload = backend.workload_file(spec);
        let testbed = self.provision(spec, workload.as_deref(), origin)?;
        let mut result = ExecutionResult::new(spec.id.clone(), testbed.clone());
        result.record_stage(Stage::Requirements, requirements_elapsed);
        result.record_stage(Stage::Provision, started.elapsed());

        let started = Instant::now();
        match backend.run(spec, &testbed).await {
            Ok(outcome) => {
                result.completed = outcome.completed;
                result.merge_sections(outcome.sections);
            }
            Err(BackendError::Setup { file, message }) => {
                return Err(RunError::WorkflowSetup { file, message });
            }
            Err(e @ BackendError::Runtime(_)) => {
                warn!(spec = %spec.id, error = %e, "workload failed");
                result.completed = false;
            }
        }
        result.record_stage(Stage::Execution, started.elapsed());
        if !result.completed {
            return Ok(self.conclude(result));
        }

        let started = Instant::now();
        match OutputVerifier.verify(spec, &testbed, &result.sections) {
            Ok(()) => result.verification = Verification::Matched,
            Err(VerifyError::OutputMismatch(outputs)) => {
                result.verification = Verification::Mismatch { outputs };
            }
            Err(e) => return Err(e.into()),
        }
        result.record_stage(Stage::Verification, started.elapsed());
        if result.verification != Verification::Matched {
            return Ok(self.conclude(result));
        }

        let started = Instant::now();
        FingerprintEngine::new(&self.fingerprints, self.config.fingerprint_policy).fingerprint(
            spec,
            &testbed,
            &mut result.outputs,
        )?;
        result.record_stage(Stage::Fingerprinting, started.elapsed());

        let started = Instant::now();
        ComparisonEvaluator::new(&self.operators, self.config.comparison_policy).evaluate(
            spec,
            &testbed,
            &mut result.comparisons,
        )?;
        result.record_stage(Stage::Evaluation, started.elapsed());

        Ok(self.conclude(result))
    }

    fn provision(
        &self,
        spec: &TestSpec,
        workload: Option<&str>,
        origin: Option<&Path>,
    ) -> Result<PathBuf, ProvisionError> {
        let dest = self.testbed_dir(spec);
        let search_paths: Vec<PathBuf> = origin
            .map(Path::to_path_buf)
            .into_iter()
            .chain(self.config.library_paths.iter().cloned())
            .collect();
        self.provisioner.prepare(
            spec,
            &dest,
            workload,
            &search_paths,
            self.config.cache_dir.as_deref(),
        )?;
        dest.canonicalize().map_err(|source| ProvisionError::Io {
            path: dest.clone(),
            source,
        })
    }

    fn conclude(&self, mut result: ExecutionResult) -> ExecutionResult {
        result.finish();
        if result.passed() {
            info!(spec = %result.spec_id, "passed");
        } else {
            info!(spec = %result.spec_id, reasons = ?result.failure_reasons(), "failed");
        }
        debug!(spec = %result.spec_id, stages = result.stages.len(), "run concluded");
        result
    }
}
