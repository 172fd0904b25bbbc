//! The mutable record a run accumulates, kept apart from the input spec.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};
use specbed_spec::TestSpec;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Section name → field name → value, as recorded during a run.
pub type Sections = BTreeMap<String, Map<String, Value>>;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Requirements,
    Provision,
    Execution,
    Verification,
    Fingerprinting,
    Evaluation,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Requirements => "requirements",
            Stage::Provision => "provision",
            Stage::Execution => "execution",
            Stage::Verification => "verification",
            Stage::Fingerprinting => "fingerprinting",
            Stage::Evaluation => "evaluation",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StageTiming {
    pub stage: Stage,
    pub elapsed_ms: u64,
}

/// Outcome of output verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Verification {
    NotRun,
    Matched,
    Mismatch { outputs: Vec<String> },
}

/// Per-output results of fingerprinting.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OutputRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha1sum: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identical_with: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub fingerprints: BTreeMap<String, Map<String, Value>>,
}

/// Per-comparison result.
///
/// A comparison passes when its operator returns normally; the returned
/// details are kept whatever they are.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRecord {
    pub passed: bool,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub details: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ComparisonRecord {
    pub fn passed(details: Value) -> Self {
        ComparisonRecord {
            passed: true,
            details,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        ComparisonRecord {
            passed: false,
            details: Value::Null,
            error: Some(error.into()),
        }
    }
}

/// Everything a run learned about one spec.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub spec_id: String,
    pub testbed: PathBuf,
    pub started_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
    /// Whether the workload ran to completion.
    pub completed: bool,
    pub verification: Verification,
    /// Fields recorded by the execution backend.
    pub sections: Sections,
    pub outputs: BTreeMap<String, OutputRecord>,
    pub comparisons: BTreeMap<String, ComparisonRecord>,
    pub stages: Vec<StageTiming>,
}

impl ExecutionResult {
    pub fn new(spec_id: impl Into<String>, testbed: impl Into<PathBuf>) -> Self {
        ExecutionResult {
            spec_id: spec_id.into(),
            testbed: testbed.into(),
            started_at: now_rfc3339(),
            finished_at: None,
            completed: false,
            verification: Verification::NotRun,
            sections: Sections::new(),
            outputs: BTreeMap::new(),
            comparisons: BTreeMap::new(),
            stages: Vec::new(),
        }
    }

    /// True iff the workload completed, every output matched and every
    /// comparison passed.
    pub fn passed(&self) -> bool {
        self.completed
            && self.verification == Verification::Matched
            && self.comparisons.values().all(|c| c.passed)
    }

    /// Human-readable reasons why the run did not pass.
    pub fn failure_reasons(&self) -> Vec<String> {
        let mut reasons = Vec::new();
        if !self.completed {
            reasons.push("workload did not run to completion".to_string());
        }
        if let Verification::Mismatch { outputs } = &self.verification {
            reasons.push(format!(
                "mismatch in expected output(s): {}",
                outputs.join(", ")
            ));
        }
        for (id, cmp) in &self.comparisons {
            if !cmp.passed {
                reasons.push(format!(
                    "comparison '{}' failed: {}",
                    id,
                    cmp.error.as_deref().unwrap_or("no details")
                ));
            }
        }
        reasons
    }

    /// Merge backend-recorded fields; later values win per field.
    pub fn merge_sections(&mut self, sections: Sections) {
        for (name, fields) in sections {
            self.sections.entry(name).or_default().extend(fields);
        }
    }

    pub fn record_stage(&mut self, stage: Stage, elapsed: Duration) {
        self.stages.push(StageTiming {
            stage,
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        });
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(now_rfc3339());
    }

    /// The spec document with this run's findings merged back in.
    ///
    /// Outputs gain `sha1sum`, `fingerprints` and `identical_with`;
    /// recorded sections are merged into same-named top-level sections;
    /// the run summary lands under `run`.
    pub fn ledger(&self, spec: &TestSpec) -> Result<Value, serde_json::Error> {
        let mut merged = spec.clone();
        for (id, record) in &self.outputs {
            if let Some(output) = merged.outputs.get_mut(id) {
                output.sha1sum = record.sha1sum.clone();
                output.identical_with = record.identical_with.clone();
                output.fingerprints = record.fingerprints.clone();
            }
        }
        let mut doc = serde_json::to_value(&merged)?;
        if let Value::Object(top) = &mut doc {
            for (name, fields) in &self.sections {
                let entry = top
                    .entry(name.clone())
                    .or_insert_with(|| Value::Object(Map::new()));
                if let Value::Object(existing) = entry {
                    existing.extend(fields.clone());
                }
            }
            top.insert(
                "run".to_string(),
                serde_json::json!({
                    "testbed": self.testbed,
                    "started_at": self.started_at,
                    "finished_at": self.finished_at,
                    "completed": self.completed,
                    "passed": self.passed(),
                    "verification": self.verification,
                    "comparisons": self.comparisons,
                    "stages": self.stages,
                }),
            );
        }
        Ok(doc)
    }
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}
