use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use specbed_runner::{ExecutionResult, Runner};
use specbed_spec::{discover_specs, load_spec, TestSpec};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::config::{load_config, Overrides};
use crate::tap::Tap;
use crate::{report_error, OutputFormat};

/// File written into each testbed by `run --ledger`.
const LEDGER_FILE: &str = "ledger.json";

pub(crate) struct RunArgs {
    pub paths: Vec<PathBuf>,
    pub config: Option<PathBuf>,
    pub overrides: Overrides,
    pub ledger: bool,
}

/// Outcome of one discovered spec file.
struct SpecOutcome {
    label: String,
    path: PathBuf,
    reasons: Vec<String>,
    result: Option<ExecutionResult>,
}

impl SpecOutcome {
    fn failed(label: impl Into<String>, path: &Path, reason: impl Into<String>) -> Self {
        SpecOutcome {
            label: label.into(),
            path: path.to_path_buf(),
            reasons: vec![reason.into()],
            result: None,
        }
    }

    fn passed(&self) -> bool {
        self.reasons.is_empty()
    }
}

pub(crate) async fn cmd_run(args: RunArgs, output: OutputFormat, quiet: bool) {
    let cwd = match std::env::current_dir() {
        Ok(dir) => dir,
        Err(e) => {
            report_error(&format!("cannot determine current directory: {}", e), output, quiet);
            process::exit(1);
        }
    };
    let settings = match load_config(args.config.as_deref(), &cwd) {
        Ok(config) => config.into_settings(args.overrides, &cwd),
        Err(e) => {
            report_error(&e, output, quiet);
            process::exit(1);
        }
    };

    let files = match discover_specs(args.paths.as_slice()) {
        Ok(files) => files,
        Err(e) => {
            report_error(&format!("error discovering test specs: {}", e), output, quiet);
            process::exit(1);
        }
    };
    if files.is_empty() {
        report_error("no test specs found", output, quiet);
        process::exit(1);
    }
    debug!(specs = files.len(), jobs = settings.jobs, "discovered test specs");

    let runner = Arc::new(Runner::new(settings.runner));
    let semaphore = Arc::new(Semaphore::new(settings.jobs));
    let mut seen: HashMap<String, PathBuf> = HashMap::new();
    let mut pending = Vec::with_capacity(files.len());

    for path in files {
        let spec = match load_spec(&path) {
            Ok(spec) => spec,
            Err(e) => {
                pending.push(Pending::Done(SpecOutcome::failed(
                    path.display().to_string(),
                    &path,
                    e.to_string(),
                )));
                continue;
            }
        };
        // Specs sharing an id would share a testbed.
        if let Some(first) = seen.get(&spec.id) {
            let reason = format!(
                "duplicate test spec id '{}' (first declared in '{}')",
                spec.id,
                first.display()
            );
            pending.push(Pending::Done(SpecOutcome::failed(spec.id, &path, reason)));
            continue;
        }
        seen.insert(spec.id.clone(), path.clone());

        let runner = Arc::clone(&runner);
        let semaphore = Arc::clone(&semaphore);
        let write_ledger = args.ledger;
        let label = spec.id.clone();
        let spec_path = path.clone();
        let handle = tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await;
            run_one(&runner, spec, spec_path, write_ledger).await
        });
        pending.push(Pending::Running {
            label,
            path,
            handle,
        });
    }

    let mut outcomes = Vec::with_capacity(pending.len());
    for entry in pending {
        let outcome = match entry {
            Pending::Done(outcome) => outcome,
            Pending::Running {
                label,
                path,
                handle,
            } => match handle.await {
                Ok(outcome) => outcome,
                Err(e) => SpecOutcome::failed(label, &path, format!("run aborted: {}", e)),
            },
        };
        outcomes.push(outcome);
    }

    let failed = outcomes.iter().filter(|o| !o.passed()).count();
    report(&outcomes, output);
    if failed > 0 {
        process::exit(1);
    }
}

enum Pending {
    Done(SpecOutcome),
    Running {
        label: String,
        path: PathBuf,
        handle: tokio::task::JoinHandle<SpecOutcome>,
    },
}

async fn run_one(runner: &Runner, spec: TestSpec, path: PathBuf, write_ledger: bool) -> SpecOutcome {
    let result = match runner.run_from(&spec, path.parent()).await {
        Ok(result) => result,
        Err(e) => return SpecOutcome::failed(spec.id, &path, e.to_string()),
    };

    let mut reasons = result.failure_reasons();
    if !result.passed() && reasons.is_empty() {
        reasons.push("run did not pass".to_string());
    }
    if write_ledger {
        if let Err(e) = write_ledger_file(&spec, &result).await {
            warn!(spec = %spec.id, error = %e, "could not write ledger");
            reasons.push(e);
        }
    }
    SpecOutcome {
        label: spec.id,
        path,
        reasons,
        result: Some(result),
    }
}

async fn write_ledger_file(spec: &TestSpec, result: &ExecutionResult) -> Result<(), String> {
    let path = result.testbed.join(LEDGER_FILE);
    let doc = result
        .ledger(spec)
        .map_err(|e| format!("could not serialize ledger: {}", e))?;
    let text = serde_json::to_string_pretty(&doc)
        .map_err(|e| format!("could not serialize ledger: {}", e))?;
    tokio::fs::write(&path, text)
        .await
        .map_err(|e| format!("could not write '{}': {}", path.display(), e))
}

fn report(outcomes: &[SpecOutcome], output: OutputFormat) {
    match output {
        OutputFormat::Text => {
            let mut tap = Tap::new();
            for outcome in outcomes {
                if outcome.passed() {
                    tap.ok(&outcome.label);
                } else {
                    tap.not_ok(&outcome.label, outcome.reasons.join("\n"));
                }
            }
            tap.finish();
        }
        OutputFormat::Json => {
            let failed = outcomes.iter().filter(|o| !o.passed()).count();
            let results: Vec<serde_json::Value> = outcomes
                .iter()
                .map(|o| {
                    serde_json::json!({
                        "id": o.label,
                        "path": o.path,
                        "passed": o.passed(),
                        "reasons": o.reasons,
                        "result": o.result,
                    })
                })
                .collect();
            let json = serde_json::json!({
                "tests": outcomes.len(),
                "passed": outcomes.len() - failed,
                "failed": failed,
                "results": results,
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&json).unwrap_or_default()
            );
        }
    }
}
