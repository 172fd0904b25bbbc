//! Execution backends: the pluggable part that actually runs a workload.
//!
//! A backend is selected by the spec's `test.type`. It runs the workload
//! with its working directory set to the testbed root and exposes that
//! root to every process it launches through [`TESTBED_PATH_ENV`].

pub mod process;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use specbed_spec::TestSpec;

use crate::result::Sections;

/// Environment variable holding the testbed root for workload processes.
pub const TESTBED_PATH_ENV: &str = "SPECBED_TESTBED_PATH";

/// What a backend reports about a finished workload.
#[derive(Debug, Clone, Default)]
pub struct ExecutionOutcome {
    /// Whether the workload ran to completion.
    pub completed: bool,
    /// Fields to record for `section::field` string outputs.
    pub sections: Sections,
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The workload could not be constructed or launched.
    #[error("exception while setting up workload ({}): {message}", file.display())]
    Setup { file: PathBuf, message: String },

    /// The workload started but the backend lost track of it.
    #[error("workload runtime failure: {0}")]
    Runtime(String),
}

#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// The `test.type` this backend handles.
    fn type_name(&self) -> &str;

    /// Workload file, relative to the testbed root, that the provisioner
    /// must supply for `spec`.
    fn workload_file(&self, spec: &TestSpec) -> Option<String> {
        spec.test.file.clone()
    }

    /// Run the workload of `spec` inside `testbed`.
    ///
    /// May block for as long as the workload runs; no timeout is applied
    /// here.
    async fn run(&self, spec: &TestSpec, testbed: &Path) -> Result<ExecutionOutcome, BackendError>;
}

/// Maps `test.type` values to backends.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    backends: BTreeMap<String, Arc<dyn ExecutionBackend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the `shell` and `command` backends.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(process::ProcessBackend::shell()));
        registry.register(Arc::new(process::ProcessBackend::command()));
        registry
    }

    pub fn register(&mut self, backend: Arc<dyn ExecutionBackend>) {
        self.backends
            .insert(backend.type_name().to_string(), backend);
    }

    pub fn get(&self, type_name: &str) -> Option<Arc<dyn ExecutionBackend>> {
        self.backends.get(type_name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.backends.keys().map(String::as_str)
    }
}
