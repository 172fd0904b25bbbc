//! Testbed provisioning.
//!
//! The runner only depends on the [`Provisioner`] boundary. The local
//! provisioner gives every run a fresh directory holding the workload
//! file, copied from the first search path that has it. The file cache
//! directory is the last place looked in.

use std::path::{Path, PathBuf};

use specbed_spec::TestSpec;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("could not prepare testbed at '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Recreating the testbed would delete a directory workload inputs
    /// are read from.
    #[error(
        "refusing to prepare testbed at '{}': it contains search path '{}'",
        dest.display(),
        search_path.display()
    )]
    OverlapsSearchPath { dest: PathBuf, search_path: PathBuf },
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ProvisionError + '_ {
    move |source| ProvisionError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Populates a testbed directory before execution.
pub trait Provisioner: Send + Sync {
    /// Prepare `dest` for `spec`.
    ///
    /// `workload` is the file the backend will run, relative to `dest`.
    /// `search_paths` are consulted in order for it.
    /// `cache_dir` is the file cache shared across runs, consulted after
    /// `search_paths`.
    fn prepare(
        &self,
        spec: &TestSpec,
        dest: &Path,
        workload: Option<&str>,
        search_paths: &[PathBuf],
        cache_dir: Option<&Path>,
    ) -> Result<(), ProvisionError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LocalProvisioner;

impl Provisioner for LocalProvisioner {
    fn prepare(
        &self,
        spec: &TestSpec,
        dest: &Path,
        workload: Option<&str>,
        search_paths: &[PathBuf],
        cache_dir: Option<&Path>,
    ) -> Result<(), ProvisionError> {
        debug!(spec = %spec.id, testbed = %dest.display(), "preparing testbed");
        if dest.exists() {
            let sources = search_paths.iter().map(PathBuf::as_path).chain(cache_dir);
            check_overlap(dest, sources)?;
            std::fs::remove_dir_all(dest).map_err(io_error(dest))?;
        }
        std::fs::create_dir_all(dest).map_err(io_error(dest))?;
        if let Some(cache) = cache_dir {
            std::fs::create_dir_all(cache).map_err(io_error(cache))?;
        }

        let Some(file) = workload else {
            return Ok(());
        };
        let Some(source) = search_paths
            .iter()
            .map(PathBuf::as_path)
            .chain(cache_dir)
            .map(|dir| dir.join(file))
            .find(|candidate| candidate.is_file())
        else {
            debug!(file, "workload file not found in search paths");
            return Ok(());
        };
        let target = dest.join(file);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
        debug!(from = %source.display(), to = %target.display(), "copying workload file");
        std::fs::copy(&source, &target).map_err(io_error(&target))?;
        Ok(())
    }
}

/// Fails if `dest` is, or is an ancestor of, any existing source directory.
fn check_overlap<'a, I>(dest: &Path, sources: I) -> Result<(), ProvisionError>
where
    I: IntoIterator<Item = &'a Path>,
{
    let dest = dest.canonicalize().map_err(io_error(dest))?;
    for search_path in sources {
        let Ok(resolved) = search_path.canonicalize() else {
            continue;
        };
        if resolved.starts_with(&dest) {
            return Err(ProvisionError::OverlapsSearchPath {
                dest,
                search_path: search_path.to_path_buf(),
            });
        }
    }
    Ok(())
}
