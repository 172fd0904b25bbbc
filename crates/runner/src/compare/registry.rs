use std::collections::BTreeMap;
use std::sync::Arc;

use specbed_spec::OperatorSpec;

use super::builtin;
use super::{EvalError, Operator, OperatorKind};

/// Maps `(kind, name)` to a comparison operator.
#[derive(Clone, Default)]
pub struct OperatorRegistry {
    operators: BTreeMap<(OperatorKind, String), Arc<dyn Operator>>,
}

impl OperatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the builtin operators.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        builtin::register_builtins(&mut registry);
        registry
    }

    /// Register `operator` under its own name.
    pub fn register(&mut self, kind: OperatorKind, operator: Arc<dyn Operator>) {
        self.operators
            .insert((kind, operator.name().to_string()), operator);
    }

    pub fn get(&self, kind: OperatorKind, name: &str) -> Option<Arc<dyn Operator>> {
        self.operators.get(&(kind, name.to_string())).cloned()
    }

    /// Resolve a declared `{type, name}` pair.
    pub fn resolve(&self, spec: &OperatorSpec) -> Result<Arc<dyn Operator>, EvalError> {
        let kind = OperatorKind::parse(&spec.kind)
            .ok_or_else(|| EvalError::UnsupportedOperatorKind(spec.kind.clone()))?;
        self.get(kind, &spec.name)
            .ok_or_else(|| EvalError::UnknownOperator {
                kind,
                name: spec.name.clone(),
            })
    }

    /// Registered `(kind, name)` pairs in sorted order.
    pub fn entries(&self) -> impl Iterator<Item = (OperatorKind, &str)> {
        self.operators
            .keys()
            .map(|(kind, name)| (*kind, name.as_str()))
    }
}
