//! Name-keyed evaluator registry.
//!
//! The registry is an explicit value handed to the runner, so tests and
//! binaries build their own sets. Registration order is preserved and is the
//! default execution order.

use std::fmt;
use std::sync::Arc;

use crate::config::ContextConfig;
use crate::domain::{EvalError, Result};
use crate::evaluators::{PrimingEvaluator, StructureEvaluator, TokenEvaluator};

use super::Evaluator;

/// Evaluators run by `--quick`.
pub const QUICK_EVALUATORS: &[&str] = &["tokens", "structure"];

/// Ordered set of evaluators with unique names.
#[derive(Clone, Default)]
pub struct EvaluatorRegistry {
    entries: Vec<Arc<dyn Evaluator>>,
}

impl EvaluatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the filesystem evaluators: `tokens`, `structure`,
    /// `priming`, in that order.
    pub fn with_builtins(context: &ContextConfig) -> Self {
        let mut registry = Self::new();
        let builtins: [Arc<dyn Evaluator>; 3] = [
            Arc::new(TokenEvaluator::new(context.clone())),
            Arc::new(StructureEvaluator::new(context.clone())),
            Arc::new(PrimingEvaluator::new(context.clone())),
        ];
        for evaluator in builtins {
            // Builtin names are distinct.
            let _ = registry.register(evaluator);
        }
        registry
    }

    /// Add an evaluator. Names must be unique.
    pub fn register(&mut self, evaluator: Arc<dyn Evaluator>) -> Result<()> {
        if self.contains(evaluator.name()) {
            return Err(EvalError::DuplicateEvaluator(evaluator.name().to_string()));
        }
        self.entries.push(evaluator);
        Ok(())
    }

    /// Builder form of [`EvaluatorRegistry::register`].
    pub fn with(mut self, evaluator: Arc<dyn Evaluator>) -> Result<Self> {
        self.register(evaluator)?;
        Ok(self)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name() == name)
    }

    pub fn get_evaluator(&self, name: &str) -> Option<Arc<dyn Evaluator>> {
        self.entries.iter().find(|e| e.name() == name).cloned()
    }

    /// `(name, description)` pairs in registration order.
    pub fn list_evaluators(&self) -> Vec<(&str, &str)> {
        self.entries
            .iter()
            .map(|e| (e.name(), e.description()))
            .collect()
    }

    pub fn get_all_evaluators(&self) -> Vec<Arc<dyn Evaluator>> {
        self.entries.clone()
    }

    /// Resolve names to evaluators, in the order given.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<Arc<dyn Evaluator>>> {
        names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                self.get_evaluator(name)
                    .ok_or_else(|| EvalError::UnknownEvaluator(name.to_string()))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for EvaluatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| e.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_register_in_order() {
        let registry = EvaluatorRegistry::with_builtins(&ContextConfig::default());
        let names: Vec<&str> = registry.list_evaluators().iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["tokens", "structure", "priming"]);
    }

    #[test]
    fn duplicate_registration_fails() {
        let context = ContextConfig::default();
        let mut registry = EvaluatorRegistry::with_builtins(&context);
        let err = registry
            .register(Arc::new(TokenEvaluator::new(context)))
            .unwrap_err();
        assert!(matches!(err, EvalError::DuplicateEvaluator(name) if name == "tokens"));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn select_preserves_requested_order() {
        let registry = EvaluatorRegistry::with_builtins(&ContextConfig::default());
        let selected = registry.select(&["priming", "tokens"]).unwrap();
        let names: Vec<&str> = selected.iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["priming", "tokens"]);
    }

    #[test]
    fn select_unknown_is_an_error() {
        let registry = EvaluatorRegistry::with_builtins(&ContextConfig::default());
        let err = registry.select(&["tokens", "nope"]).err().unwrap();
        assert!(matches!(err, EvalError::UnknownEvaluator(name) if name == "nope"));
    }

    #[test]
    fn quick_subset_is_registered_by_default() {
        let registry = EvaluatorRegistry::with_builtins(&ContextConfig::default());
        for name in QUICK_EVALUATORS {
            assert!(registry.contains(name));
        }
    }
}
