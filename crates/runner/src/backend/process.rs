//! Backends that run the workload as a child process.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use serde_json::{json, Map};
use specbed_spec::TestSpec;
use tokio::fs::File;
use tokio::process::Command;
use tracing::debug;

use super::{BackendError, ExecutionBackend, ExecutionOutcome, TESTBED_PATH_ENV};
use crate::result::Sections;

/// Directory below the testbed root receiving the workload's stdout/stderr.
pub const EXEC_LOG_DIR: &str = "_exec";

/// Section the process backends record their fields under.
pub const EXECUTION_SECTION: &str = "execution";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Launcher {
    /// `sh <file>`
    Shell,
    /// `<file>` executed directly
    Direct,
}

/// Runs `test.file` inside the testbed and reports whether it exited
/// successfully.
///
/// Records `execution::exit_code` (null when killed by a signal) and
/// `execution::success`.
#[derive(Debug, Clone)]
pub struct ProcessBackend {
    type_name: &'static str,
    default_file: &'static str,
    launcher: Launcher,
}

impl ProcessBackend {
    /// `type: "shell"`; runs `test.file` (default `test.sh`) with `sh`.
    pub fn shell() -> Self {
        ProcessBackend {
            type_name: "shell",
            default_file: "test.sh",
            launcher: Launcher::Shell,
        }
    }

    /// `type: "command"`; executes `test.file` (default `run`) directly.
    pub fn command() -> Self {
        ProcessBackend {
            type_name: "command",
            default_file: "run",
            launcher: Launcher::Direct,
        }
    }
}

#[async_trait]
impl ExecutionBackend for ProcessBackend {
    fn type_name(&self) -> &str {
        self.type_name
    }

    fn workload_file(&self, spec: &TestSpec) -> Option<String> {
        Some(
            spec.test
                .file
                .clone()
                .unwrap_or_else(|| self.default_file.to_string()),
        )
    }

    async fn run(&self, spec: &TestSpec, testbed: &Path) -> Result<ExecutionOutcome, BackendError> {
        let file = testbed.join(spec.test.file.as_deref().unwrap_or(self.default_file));
        let setup_error = |message: String| BackendError::Setup {
            file: file.clone(),
            message,
        };
        let is_file = tokio::fs::metadata(&file)
            .await
            .is_ok_and(|meta| meta.is_file());
        if !is_file {
            return Err(setup_error("workload file not found".to_string()));
        }

        let log_dir = testbed.join(EXEC_LOG_DIR);
        tokio::fs::create_dir_all(&log_dir)
            .await
            .map_err(|e| setup_error(format!("could not create {}: {}", log_dir.display(), e)))?;
        let stdout = File::create(log_dir.join("stdout.log"))
            .await
            .map_err(|e| setup_error(format!("could not capture stdout: {}", e)))?
            .into_std()
            .await;
        let stderr = File::create(log_dir.join("stderr.log"))
            .await
            .map_err(|e| setup_error(format!("could not capture stderr: {}", e)))?
            .into_std()
            .await;

        let mut cmd = match self.launcher {
            Launcher::Shell => {
                let mut cmd = Command::new("sh");
                cmd.arg(&file);
                cmd
            }
            Launcher::Direct => Command::new(&file),
        };
        cmd.current_dir(testbed)
            .env(TESTBED_PATH_ENV, testbed)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr));

        debug!(backend = self.type_name, file = %file.display(), "launching workload");
        let mut child = cmd
            .spawn()
            .map_err(|e| setup_error(e.to_string()))?;
        let status = child
            .wait()
            .await
            .map_err(|e| BackendError::Runtime(e.to_string()))?;
        debug!(backend = self.type_name, status = %status, "workload finished");

        let mut fields = Map::new();
        fields.insert("exit_code".into(), json!(status.code()));
        fields.insert("success".into(), json!(status.success()));
        let mut sections = Sections::new();
        sections.insert(EXECUTION_SECTION.to_string(), fields);

        Ok(ExecutionOutcome {
            completed: status.success(),
            sections,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use specbed_spec::TestDescriptor;

    fn spec(kind: &str, file: Option<&str>) -> TestSpec {
        TestSpec::new(
            "proc",
            TestDescriptor {
                kind: kind.to_string(),
                file: file.map(str::to_string),
            },
        )
    }

    #[tokio::test]
    async fn shell_runs_in_testbed_with_env() {
        let dir = tempfile::tempdir().unwrap();
        let bed = dir.path().canonicalize().unwrap();
        std::fs::write(
            bed.join("test.sh"),
            format!("echo \"${}\" > where.txt\npwd >> where.txt\n", TESTBED_PATH_ENV),
        )
        .unwrap();

        let outcome = ProcessBackend::shell()
            .run(&spec("shell", None), &bed)
            .await
            .unwrap();
        assert!(outcome.completed);
        assert_eq!(outcome.sections[EXECUTION_SECTION]["exit_code"], json!(0));

        let written = std::fs::read_to_string(bed.join("where.txt")).unwrap();
        let expected = bed.display().to_string();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines, [expected.as_str(), expected.as_str()]);
    }

    #[tokio::test]
    async fn failing_workload_is_not_completed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("fail.sh"), "echo oops >&2\nexit 3\n").unwrap();
        let outcome = ProcessBackend::shell()
            .run(&spec("shell", Some("fail.sh")), dir.path())
            .await
            .unwrap();
        assert!(!outcome.completed);
        assert_eq!(outcome.sections[EXECUTION_SECTION]["exit_code"], json!(3));
        assert_eq!(outcome.sections[EXECUTION_SECTION]["success"], json!(false));
        let stderr =
            std::fs::read_to_string(dir.path().join(EXEC_LOG_DIR).join("stderr.log")).unwrap();
        assert_eq!(stderr, "oops\n");
    }

    #[tokio::test]
    async fn missing_workload_file_is_a_setup_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ProcessBackend::shell()
            .run(&spec("shell", Some("absent.sh")), dir.path())
            .await
            .unwrap_err();
        match err {
            BackendError::Setup { file, message } => {
                assert_eq!(file, dir.path().join("absent.sh"));
                assert!(message.contains("not found"));
            }
            other => panic!("expected Setup, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_executable_command_fails_to_launch() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("run"), "#!/bin/sh\nexit 0\n").unwrap();
        let err = ProcessBackend::command()
            .run(&spec("command", None), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Setup { .. }));
    }
}
