//! Content hashing and fingerprinting of file outputs.
//!
//! Two levels:
//! - the content hash (SHA-1) of every file output, used to detect
//!   byte-identical duplicates within one spec
//! - named [`Fingerprinter`] plugins, selected by the output's tags, that
//!   describe the content of each distinct file
//!
//! [`FingerprintEngine`] walks file outputs in ascending id order, so the
//! first id in that order is always the canonical one a duplicate's
//! `identical_with` points at.

pub mod builtin;
pub mod registry;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use sha1::{Digest, Sha1};
use specbed_spec::{OutputKind, TestSpec};
use tracing::{debug, warn};

use crate::policy::{catch_plugin_panic, FailurePolicy};
use crate::result::OutputRecord;

pub use registry::FingerprintRegistry;

/// Conventional fingerprinter name prefix, stripped to form the result key.
pub const FINGERPRINTER_PREFIX: &str = "fp_";

/// Key of the error marker stored in a failed fingerprinter's result slot.
pub const EXCEPTION_KEY: &str = "__exception__";

// ──────────────────────────────────────────────
// Fingerprinter plugin contract
// ──────────────────────────────────────────────

/// Errors a fingerprinter may report. Never fatal under the isolated policy.
#[derive(Debug, thiserror::Error)]
pub enum FingerprintError {
    #[error("{0}")]
    Io(#[from] io::Error),
    #[error("{0}")]
    Parse(String),
    #[error("{0}")]
    Unsupported(String),
}

impl FingerprintError {
    /// Short error kind used in the error marker.
    pub fn kind(&self) -> &'static str {
        match self {
            FingerprintError::Io(_) => "IoError",
            FingerprintError::Parse(_) => "ParseError",
            FingerprintError::Unsupported(_) => "Unsupported",
        }
    }
}

/// Computes a descriptive record about one file.
///
/// `slot` starts empty and is filled in place. Implementations must not
/// catch their own failures; the engine decides what a failure means.
pub trait Fingerprinter: Send + Sync {
    /// Plugin name, conventionally prefixed with [`FINGERPRINTER_PREFIX`].
    fn name(&self) -> &str;

    fn fingerprint(
        &self,
        path: &Path,
        slot: &mut Map<String, Value>,
        tags: &BTreeSet<String>,
    ) -> Result<(), FingerprintError>;
}

/// The key a fingerprinter's results are stored under.
pub fn result_key(name: &str) -> &str {
    name.strip_prefix(FINGERPRINTER_PREFIX).unwrap_or(name)
}

/// Lower-case hex SHA-1 of the file at `path`.
pub fn sha1sum(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha1::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

// ──────────────────────────────────────────────
// FingerprintEngine
// ──────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A file output could not be read for hashing. Fatal under either
    /// policy; only fingerprinter failures are absorbed.
    #[error("could not hash output '{output_id}' ({}): {source}", path.display())]
    Hash {
        output_id: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A fingerprinter failed under the fail-fast policy.
    #[error("fingerprinter '{fingerprinter}' failed on output '{output_id}': {message}")]
    Plugin {
        output_id: String,
        fingerprinter: String,
        message: String,
    },
}

pub struct FingerprintEngine<'a> {
    registry: &'a FingerprintRegistry,
    policy: FailurePolicy,
}

impl<'a> FingerprintEngine<'a> {
    pub fn new(registry: &'a FingerprintRegistry, policy: FailurePolicy) -> Self {
        FingerprintEngine { registry, policy }
    }

    /// Hash and fingerprint every file output of `spec` below `testbed`.
    ///
    /// The duplicate cache lives for exactly this call.
    pub fn fingerprint(
        &self,
        spec: &TestSpec,
        testbed: &Path,
        records: &mut BTreeMap<String, OutputRecord>,
    ) -> Result<(), EngineError> {
        let mut seen: HashMap<String, String> = HashMap::new();
        for (id, output) in spec.outputs_of(&OutputKind::File) {
            let path = testbed.join(&output.value);
            let digest = sha1sum(&path).map_err(|source| EngineError::Hash {
                output_id: id.clone(),
                path: path.clone(),
                source,
            })?;
            let record = records.entry(id.clone()).or_default();
            record.sha1sum = Some(digest.clone());

            if let Some(first) = seen.get(&digest) {
                debug!(output = %id, original = %first, "duplicate output");
                record.identical_with = Some(first.clone());
                continue;
            }
            seen.insert(digest, id.clone());

            debug!(output = %id, file = %path.display(), "generating fingerprints");
            for fingerprinter in self.registry.for_tags(&output.tags) {
                let key = result_key(fingerprinter.name()).to_string();
                let slot = self.run_one(id, fingerprinter.as_ref(), &path, &output.tags)?;
                record.fingerprints.insert(key, slot);
            }
        }
        Ok(())
    }

    fn run_one(
        &self,
        output_id: &str,
        fingerprinter: &dyn Fingerprinter,
        path: &Path,
        tags: &BTreeSet<String>,
    ) -> Result<Map<String, Value>, EngineError> {
        let name = fingerprinter.name();
        debug!(fingerprinter = name, output = output_id, "running fingerprinter");
        let mut slot = Map::new();
        let marker = match catch_plugin_panic(|| fingerprinter.fingerprint(path, &mut slot, tags)) {
            Ok(Ok(())) => return Ok(slot),
            Ok(Err(e)) => format!("{}: {}", e.kind(), e),
            Err(panic) => format!("Panic: {}", panic),
        };
        match self.policy {
            FailurePolicy::Isolated => {
                warn!(
                    fingerprinter = name,
                    output = output_id,
                    error = %marker,
                    "ignoring fingerprinter failure"
                );
                let mut failed = Map::new();
                failed.insert(EXCEPTION_KEY.to_string(), Value::String(marker));
                Ok(failed)
            }
            FailurePolicy::FailFast => Err(EngineError::Plugin {
                output_id: output_id.to_string(),
                fingerprinter: name.to_string(),
                message: marker,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use specbed_spec::{OutputSpec, TestDescriptor};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const HELLO_SHA1: &str = "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d";

    struct Counting {
        name: &'static str,
        calls: Arc<AtomicUsize>,
    }

    impl Fingerprinter for Counting {
        fn name(&self) -> &str {
            self.name
        }

        fn fingerprint(
            &self,
            path: &Path,
            slot: &mut Map<String, Value>,
            _tags: &BTreeSet<String>,
        ) -> Result<(), FingerprintError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            slot.insert("size".into(), json!(std::fs::metadata(path)?.len()));
            Ok(())
        }
    }

    struct Failing;

    impl Fingerprinter for Failing {
        fn name(&self) -> &str {
            "fp_failing"
        }

        fn fingerprint(
            &self,
            _path: &Path,
            slot: &mut Map<String, Value>,
            _tags: &BTreeSet<String>,
        ) -> Result<(), FingerprintError> {
            slot.insert("partial".into(), json!(true));
            Err(FingerprintError::Parse("bad header".into()))
        }
    }

    struct Panicking;

    impl Fingerprinter for Panicking {
        fn name(&self) -> &str {
            "fp_panicking"
        }

        fn fingerprint(
            &self,
            _path: &Path,
            _slot: &mut Map<String, Value>,
            _tags: &BTreeSet<String>,
        ) -> Result<(), FingerprintError> {
            panic!("fingerprinter bug")
        }
    }

    fn spec_with(files: &[(&str, &str, &[&str])]) -> TestSpec {
        let mut spec = TestSpec::new(
            "fp",
            TestDescriptor {
                kind: "shell".to_string(),
                file: None,
            },
        );
        for (id, path, tags) in files {
            spec.outputs.insert(
                id.to_string(),
                OutputSpec::file(*path).with_tags(tags.iter().copied()),
            );
        }
        spec
    }

    #[test]
    fn sha1sum_of_hello() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("h");
        std::fs::write(&path, "hello").unwrap();
        assert_eq!(sha1sum(&path).unwrap(), HELLO_SHA1);
        assert_eq!(sha1sum(&path).unwrap(), HELLO_SHA1);
    }

    #[test]
    fn result_key_strips_prefix() {
        assert_eq!(result_key("fp_text_stats"), "text_stats");
        assert_eq!(result_key("custom"), "custom");
    }

    #[test]
    fn duplicates_point_at_first_id_and_skip_fingerprinting() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello").unwrap();
        std::fs::write(dir.path().join("b.txt"), "hello").unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = FingerprintRegistry::new();
        registry.register(
            "text",
            Arc::new(Counting {
                name: "fp_size",
                calls: calls.clone(),
            }),
        );
        let spec = spec_with(&[("b", "b.txt", &["text"]), ("a", "a.txt", &["text"])]);

        let mut records = BTreeMap::new();
        FingerprintEngine::new(&registry, FailurePolicy::Isolated)
            .fingerprint(&spec, dir.path(), &mut records)
            .unwrap();

        assert_eq!(records["a"].sha1sum.as_deref(), Some(HELLO_SHA1));
        assert_eq!(records["b"].sha1sum.as_deref(), Some(HELLO_SHA1));
        assert_eq!(records["a"].identical_with, None);
        assert_eq!(records["b"].identical_with.as_deref(), Some("a"));
        assert!(records["b"].fingerprints.is_empty());
        assert_eq!(records["a"].fingerprints["size"]["size"], json!(5));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn fingerprinter_reachable_by_two_tags_runs_once() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "abc").unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let shared: Arc<dyn Fingerprinter> = Arc::new(Counting {
            name: "fp_size",
            calls: calls.clone(),
        });
        let mut registry = FingerprintRegistry::new();
        registry.register("text", shared.clone());
        registry.register("volume", shared);
        let spec = spec_with(&[("a", "a.txt", &["text", "volume"])]);

        let mut records = BTreeMap::new();
        FingerprintEngine::new(&registry, FailurePolicy::Isolated)
            .fingerprint(&spec, dir.path(), &mut records)
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failing_fingerprinter_is_isolated() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "one").unwrap();
        std::fs::write(dir.path().join("b.txt"), "two").unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = FingerprintRegistry::new();
        registry.register("text", Arc::new(Failing));
        registry.register("text", Arc::new(Panicking));
        registry.register(
            "text",
            Arc::new(Counting {
                name: "fp_size",
                calls: calls.clone(),
            }),
        );
        let spec = spec_with(&[("a", "a.txt", &["text"]), ("b", "b.txt", &["text"])]);

        let mut records = BTreeMap::new();
        FingerprintEngine::new(&registry, FailurePolicy::Isolated)
            .fingerprint(&spec, dir.path(), &mut records)
            .unwrap();

        for id in ["a", "b"] {
            let fps = &records[id].fingerprints;
            assert_eq!(
                fps["failing"],
                json!({"__exception__": "ParseError: bad header"})
                    .as_object()
                    .unwrap()
                    .clone()
            );
            assert_eq!(
                fps["panicking"][EXCEPTION_KEY],
                json!("Panic: fingerprinter bug")
            );
            assert_eq!(fps["panicking"].len(), 1);
            assert!(fps["size"].contains_key("size"));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn failing_fingerprinter_aborts_under_fail_fast() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "one").unwrap();
        let mut registry = FingerprintRegistry::new();
        registry.register("text", Arc::new(Failing));
        let spec = spec_with(&[("a", "a.txt", &["text"])]);

        let mut records = BTreeMap::new();
        let err = FingerprintEngine::new(&registry, FailurePolicy::FailFast)
            .fingerprint(&spec, dir.path(), &mut records)
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Plugin { ref output_id, ref fingerprinter, .. }
                if output_id == "a" && fingerprinter == "fp_failing"
        ));
    }

    #[test]
    fn missing_file_is_a_hash_error() {
        let dir = tempfile::tempdir().unwrap();
        let registry = FingerprintRegistry::new();
        let spec = spec_with(&[("a", "absent.txt", &[])]);
        let mut records = BTreeMap::new();
        let err = FingerprintEngine::new(&registry, FailurePolicy::Isolated)
            .fingerprint(&spec, dir.path(), &mut records)
            .unwrap_err();
        assert!(matches!(err, EngineError::Hash { .. }));
    }

    #[test]
    fn cache_does_not_outlive_a_call() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "same").unwrap();
        let registry = FingerprintRegistry::new();
        let engine = FingerprintEngine::new(&registry, FailurePolicy::Isolated);

        let first = spec_with(&[("a", "a.txt", &[])]);
        let second = spec_with(&[("z", "a.txt", &[])]);
        let mut records = BTreeMap::new();
        engine.fingerprint(&first, dir.path(), &mut records).unwrap();
        let mut records2 = BTreeMap::new();
        engine.fingerprint(&second, dir.path(), &mut records2).unwrap();
        assert_eq!(records2["z"].identical_with, None);
    }
}
