//! Failure-isolation policies for plugin-driven stages.

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How a stage reacts when one plugin invocation fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Record the failure as data and carry on with the remaining work.
    Isolated,
    /// Abort the stage, and the run, on the first failure.
    FailFast,
}

impl FailurePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            FailurePolicy::Isolated => "isolated",
            FailurePolicy::FailFast => "fail-fast",
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "isolated" => Ok(FailurePolicy::Isolated),
            "fail-fast" => Ok(FailurePolicy::FailFast),
            other => Err(format!(
                "unknown failure policy '{}' (expected 'isolated' or 'fail-fast')",
                other
            )),
        }
    }
}

/// Call into plugin code, turning a panic into an error message.
pub(crate) fn catch_plugin_panic<T>(f: impl FnOnce() -> T) -> Result<T, String> {
    catch_unwind(AssertUnwindSafe(f)).map_err(|payload| panic_message(payload.as_ref()))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
