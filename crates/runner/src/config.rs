use std::path::PathBuf;

use crate::env::process_env;
use crate::policy::FailurePolicy;

/// Settings for a [`Runner`](crate::Runner).
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Parent directory of all testbeds; each spec gets `<testbed_dir>/<id>`.
    pub testbed_dir: PathBuf,
    /// File cache shared across runs; the last place workload inputs are
    /// looked up.
    pub cache_dir: Option<PathBuf>,
    /// Directories searched for workload inputs, after the spec's own
    /// directory.
    pub library_paths: Vec<PathBuf>,
    pub fingerprint_policy: FailurePolicy,
    pub comparison_policy: FailurePolicy,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        RunnerConfig {
            testbed_dir: PathBuf::from("testbeds"),
            cache_dir: default_cache_dir(),
            library_paths: Vec::new(),
            fingerprint_policy: FailurePolicy::Isolated,
            comparison_policy: FailurePolicy::FailFast,
        }
    }
}

/// `$XDG_CACHE_HOME/specbed/files`, else `$HOME/.cache/specbed/files`.
pub fn default_cache_dir() -> Option<PathBuf> {
    cache_dir_from(process_env)
}

fn cache_dir_from<F>(lookup: F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    let base = match lookup("XDG_CACHE_HOME").filter(|dir| !dir.is_empty()) {
        Some(dir) => PathBuf::from(dir),
        None => PathBuf::from(lookup("HOME").filter(|dir| !dir.is_empty())?).join(".cache"),
    };
    Some(base.join("specbed").join("files"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |name| {
            pairs
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn xdg_cache_home_wins() {
        let dir = cache_dir_from(vars(&[("XDG_CACHE_HOME", "/xdg"), ("HOME", "/home/u")]));
        assert_eq!(dir, Some(PathBuf::from("/xdg/specbed/files")));
    }

    #[test]
    fn falls_back_to_home_cache() {
        let dir = cache_dir_from(vars(&[("XDG_CACHE_HOME", ""), ("HOME", "/home/u")]));
        assert_eq!(dir, Some(PathBuf::from("/home/u/.cache/specbed/files")));
    }

    #[test]
    fn no_cache_without_home() {
        assert_eq!(cache_dir_from(vars(&[])), None);
    }
}
