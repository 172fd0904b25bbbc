use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use super::builtin;
use super::Fingerprinter;

/// Maps output tags to the fingerprinters that apply to them.
///
/// Built once at startup and shared read-only afterwards.
#[derive(Clone, Default)]
pub struct FingerprintRegistry {
    by_tag: BTreeMap<String, Vec<Arc<dyn Fingerprinter>>>,
}

impl FingerprintRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the builtin fingerprinters.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        builtin::register_builtins(&mut registry);
        registry
    }

    /// Register `fingerprinter` for `tag`, replacing any same-named entry.
    pub fn register(&mut self, tag: impl Into<String>, fingerprinter: Arc<dyn Fingerprinter>) {
        let entries = self.by_tag.entry(tag.into()).or_default();
        entries.retain(|f| f.name() != fingerprinter.name());
        entries.push(fingerprinter);
    }

    pub fn for_tag(&self, tag: &str) -> &[Arc<dyn Fingerprinter>] {
        self.by_tag.get(tag).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The union over `tags`, one entry per fingerprinter name, sorted by
    /// name.
    pub fn for_tags(&self, tags: &BTreeSet<String>) -> Vec<Arc<dyn Fingerprinter>> {
        let mut unique: BTreeMap<&str, &Arc<dyn Fingerprinter>> = BTreeMap::new();
        for tag in tags {
            for fingerprinter in self.for_tag(tag) {
                unique.entry(fingerprinter.name()).or_insert(fingerprinter);
            }
        }
        unique.into_values().cloned().collect()
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.by_tag.keys().map(String::as_str)
    }
}
