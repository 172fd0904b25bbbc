//! Environment and executable preconditions, checked before a testbed is
//! touched.

use std::path::Path;

use specbed_spec::TestSpec;
use tracing::debug;

use crate::env::{expand_with, process_env};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequirementError {
    #[error("required environment variable '{0}' not set")]
    MissingEnvironment(String),

    /// Carries the path as declared, before variable expansion.
    #[error("required executable '{0}' not found")]
    MissingExecutable(String),
}

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Checks a spec's `environment` and `executables` declarations.
///
/// Fails on the first missing item: environment variables first, then
/// non-optional executables in path order.
pub struct RequirementsChecker {
    lookup: EnvLookup,
}

impl RequirementsChecker {
    /// A checker reading the process environment.
    pub fn new() -> Self {
        RequirementsChecker {
            lookup: Box::new(process_env),
        }
    }

    /// A checker reading variables from `lookup` instead of the process.
    pub fn with_env<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        RequirementsChecker {
            lookup: Box::new(lookup),
        }
    }

    pub fn check(&self, spec: &TestSpec) -> Result<(), RequirementError> {
        for name in &spec.environment {
            if (self.lookup)(name).is_none() {
                return Err(RequirementError::MissingEnvironment(name.clone()));
            }
        }
        for (exe, decl) in &spec.executables {
            if decl.optional {
                continue;
            }
            let resolved = expand_with(exe, |name| (self.lookup)(name));
            debug!(executable = %exe, resolved = %resolved, "checking executable");
            if !Path::new(&resolved).is_file() {
                return Err(RequirementError::MissingExecutable(exe.clone()));
            }
        }
        Ok(())
    }
}

impl Default for RequirementsChecker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use specbed_spec::{ExecutableSpec, TestDescriptor};
    use std::collections::HashMap;

    fn spec() -> TestSpec {
        TestSpec::new(
            "req",
            TestDescriptor {
                kind: "shell".to_string(),
                file: None,
            },
        )
    }

    fn checker(vars: &[(&str, &str)]) -> RequirementsChecker {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RequirementsChecker::with_env(move |name| vars.get(name).cloned())
    }

    #[test]
    fn empty_spec_passes() {
        assert_eq!(checker(&[]).check(&spec()), Ok(()));
    }

    #[test]
    fn missing_environment_variable_fails() {
        let mut spec = spec();
        spec.environment.insert("PRESENT".into());
        spec.environment.insert("ABSENT".into());
        let err = checker(&[("PRESENT", "1")]).check(&spec).unwrap_err();
        assert_eq!(err, RequirementError::MissingEnvironment("ABSENT".into()));
    }

    #[test]
    fn missing_required_executable_fails_with_declared_path() {
        let mut spec = spec();
        spec.executables
            .insert("/usr/bin/tool-that-does-not-exist".into(), ExecutableSpec::default());
        let err = checker(&[]).check(&spec).unwrap_err();
        assert_eq!(
            err,
            RequirementError::MissingExecutable("/usr/bin/tool-that-does-not-exist".into())
        );
    }

    #[test]
    fn optional_executable_is_skipped() {
        let mut spec = spec();
        spec.executables.insert(
            "/usr/bin/tool-that-does-not-exist".into(),
            ExecutableSpec { optional: true },
        );
        assert_eq!(checker(&[]).check(&spec), Ok(()));
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_environment_value_counts_as_present() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let name = "SPECBED_REQUIREMENTS_NON_UTF8_VALUE";
        std::env::set_var(name, OsStr::from_bytes(b"\xff\xfe"));
        let mut spec = spec();
        spec.environment.insert(name.into());
        let outcome = RequirementsChecker::new().check(&spec);
        std::env::remove_var(name);
        assert_eq!(outcome, Ok(()));
    }

    #[test]
    fn executable_paths_expand_variables() {
        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("tool");
        std::fs::write(&tool, "#!/bin/sh\n").unwrap();
        let mut spec = spec();
        spec.executables
            .insert("${TOOL_HOME}/tool".into(), ExecutableSpec::default());

        let root = dir.path().to_string_lossy().into_owned();
        assert_eq!(checker(&[("TOOL_HOME", &root)]).check(&spec), Ok(()));
        assert_eq!(
            checker(&[]).check(&spec),
            Err(RequirementError::MissingExecutable("${TOOL_HOME}/tool".into()))
        );
    }
}
