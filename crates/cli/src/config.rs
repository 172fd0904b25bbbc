//! `specbed.toml` configuration.
//!
//! # Example
//!
//! ```toml
//! [runner]
//! testbed_dir = "testbeds"
//! cache_dir = "/var/cache/specbed"   # default: $XDG_CACHE_HOME/specbed/files
//! library_paths = ["lib", "shared/scripts"]
//! jobs = 4
//!
//! [policy]
//! fingerprints = "isolated"
//! comparisons = "fail-fast"
//! ```
//!
//! Relative paths are resolved against the directory holding the file.
//! Command-line flags override every value.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use specbed_runner::{FailurePolicy, RunnerConfig};

/// Config file looked up in the current directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "specbed.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub runner: RunnerSection,
    #[serde(default)]
    pub policy: PolicySection,
}

/// `[runner]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunnerSection {
    pub testbed_dir: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    #[serde(default)]
    pub library_paths: Vec<PathBuf>,
    pub jobs: Option<usize>,
}

/// `[policy]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicySection {
    pub fingerprints: Option<FailurePolicy>,
    pub comparisons: Option<FailurePolicy>,
}

/// Values given on the command line; `None` defers to the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub testbed_dir: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    pub library_paths: Vec<PathBuf>,
    pub jobs: Option<usize>,
    pub fingerprint_policy: Option<FailurePolicy>,
    pub comparison_policy: Option<FailurePolicy>,
}

/// Effective settings for a `run`.
#[derive(Debug, Clone)]
pub struct Settings {
    pub runner: RunnerConfig,
    pub jobs: usize,
}

/// Read and parse a config file.
pub fn read_config(path: &Path) -> Result<FileConfig, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("could not read '{}': {}", path.display(), e))?;
    let mut config: FileConfig = toml::from_str(&content)
        .map_err(|e| format!("could not parse '{}': {}", path.display(), e))?;
    if let Some(base) = path.parent() {
        config.resolve_relative(base);
    }
    Ok(config)
}

/// Load the explicit config file, or `specbed.toml` from `cwd` if present.
pub fn load_config(explicit: Option<&Path>, cwd: &Path) -> Result<FileConfig, String> {
    match explicit {
        Some(path) => read_config(path),
        None => {
            let implicit = cwd.join(DEFAULT_CONFIG_FILE);
            if implicit.is_file() {
                read_config(&implicit)
            } else {
                Ok(FileConfig::default())
            }
        }
    }
}

impl FileConfig {
    fn resolve_relative(&mut self, base: &Path) {
        let runner = &mut self.runner;
        if let Some(dir) = runner.testbed_dir.take() {
            runner.testbed_dir = Some(base.join(dir));
        }
        if let Some(dir) = runner.cache_dir.take() {
            runner.cache_dir = Some(base.join(dir));
        }
        for dir in &mut runner.library_paths {
            *dir = base.join(&*dir);
        }
    }

    /// Merge with command-line overrides. Relative override paths are
    /// resolved against `cwd`.
    pub fn into_settings(self, overrides: Overrides, cwd: &Path) -> Settings {
        let defaults = RunnerConfig::default();
        let testbed_dir = overrides
            .testbed_dir
            .or(self.runner.testbed_dir)
            .unwrap_or(defaults.testbed_dir);
        let mut library_paths = overrides.library_paths;
        library_paths.extend(self.runner.library_paths);
        let runner = RunnerConfig {
            testbed_dir: cwd.join(testbed_dir),
            cache_dir: overrides
                .cache_dir
                .or(self.runner.cache_dir)
                .or(defaults.cache_dir)
                .map(|dir| cwd.join(dir)),
            library_paths: library_paths.into_iter().map(|dir| cwd.join(dir)).collect(),
            fingerprint_policy: overrides
                .fingerprint_policy
                .or(self.policy.fingerprints)
                .unwrap_or(defaults.fingerprint_policy),
            comparison_policy: overrides
                .comparison_policy
                .or(self.policy.comparisons)
                .unwrap_or(defaults.comparison_policy),
        };
        Settings {
            runner,
            jobs: overrides.jobs.or(self.runner.jobs).unwrap_or(1).max(1),
        }
    }
}
