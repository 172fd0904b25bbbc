//! Spec file discovery.
//!
//! A plain file argument is taken as-is. A directory contributes its
//! `*.json` files and the `spec.json` of each immediate subdirectory.
//! The result is sorted and free of duplicates.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::load::SpecError;

/// File name looked up inside per-test subdirectories.
pub const SPEC_FILE_NAME: &str = "spec.json";

pub fn discover_specs<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<PathBuf>, SpecError> {
    let mut found = BTreeSet::new();
    for path in paths {
        let path = path.as_ref();
        if path.is_dir() {
            scan_dir(path, &mut found)?;
        } else {
            found.insert(path.to_path_buf());
        }
    }
    Ok(found.into_iter().collect())
}

fn scan_dir(dir: &Path, found: &mut BTreeSet<PathBuf>) -> Result<(), SpecError> {
    let entries = std::fs::read_dir(dir).map_err(|source| SpecError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| SpecError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_dir() {
            let nested = path.join(SPEC_FILE_NAME);
            if nested.is_file() {
                found.insert(nested);
            }
        } else if path.extension().is_some_and(|ext| ext == "json") {
            found.insert(path);
        }
    }
    Ok(())
}
