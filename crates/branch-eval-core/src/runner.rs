//! Two-branch orchestration.
//!
//! Resolve both branches, snapshot them, then run each selected evaluator
//! against the pair in order. An evaluator that errors or panics costs only
//! its own results; fatal errors (budget, configuration) abort the run.

use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use serde_json::{json, Map};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::{BranchSnapshot, EvalError, EvalReport, EvaluationResult, Result};
use crate::evaluator::{Evaluator, EvaluatorRegistry};
use crate::git::{GitCli, GitMetadataProvider};

/// A branch to evaluate: display name plus checkout directory.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchTarget {
    pub name: String,
    pub path: PathBuf,
}

impl BranchTarget {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    /// Named after the directory's last component, resolving `.`-style
    /// paths when they exist.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = std::fs::canonicalize(&path)
            .unwrap_or_else(|_| path.clone())
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Self { name, path }
    }
}

/// Canonical absolute path of an existing branch directory.
pub fn resolve_branch_path(path: &Path) -> Result<PathBuf> {
    match std::fs::canonicalize(path) {
        Ok(resolved) if resolved.is_dir() => Ok(resolved),
        _ => Err(EvalError::BranchNotFound(path.to_path_buf())),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "evaluator panicked".to_string())
}

/// Runs registered evaluators against a branch pair.
pub struct EvalRunner {
    registry: EvaluatorRegistry,
    git: Arc<dyn GitMetadataProvider>,
}

impl EvalRunner {
    pub fn new(registry: EvaluatorRegistry) -> Self {
        Self {
            registry,
            git: Arc::new(GitCli::default()),
        }
    }

    pub fn with_git(mut self, git: Arc<dyn GitMetadataProvider>) -> Self {
        self.git = git;
        self
    }

    pub fn registry(&self) -> &EvaluatorRegistry {
        &self.registry
    }

    /// Snapshot a target whose path is already resolved.
    async fn snapshot(&self, target: &BranchTarget, path: PathBuf) -> BranchSnapshot {
        let (hash, message) = self.git.commit_info(&path).await;
        BranchSnapshot::new(target.name.clone(), path, hash, message)
    }

    /// Evaluate `branch_a` (baseline) against `branch_b` (candidate).
    ///
    /// `evaluators` selects by name in the given order; `None` runs every
    /// registered evaluator in registration order.
    pub async fn run(
        &self,
        branch_a: &BranchTarget,
        branch_b: &BranchTarget,
        evaluators: Option<&[String]>,
    ) -> Result<EvalReport> {
        let started = Instant::now();

        let path_a = resolve_branch_path(&branch_a.path)?;
        let path_b = resolve_branch_path(&branch_b.path)?;
        let selected = match evaluators {
            Some(names) => self.registry.select(names)?,
            None => self.registry.get_all_evaluators(),
        };

        let snapshot_a = self.snapshot(branch_a, path_a).await;
        let snapshot_b = self.snapshot(branch_b, path_b).await;

        let run_id = Uuid::new_v4();
        info!(
            %run_id,
            branch_a = %snapshot_a.name(),
            branch_b = %snapshot_b.name(),
            evaluators = selected.len(),
            "starting evaluation"
        );

        let mut results = Vec::new();
        for evaluator in &selected {
            results.extend(self.run_one(evaluator.as_ref(), &snapshot_a, &snapshot_b).await?);
        }

        let mut metadata = Map::new();
        metadata.insert("run_id".into(), json!(run_id.to_string()));
        metadata.insert(
            "evaluators".into(),
            json!(selected.iter().map(|e| e.name()).collect::<Vec<_>>()),
        );
        metadata.insert("version".into(), json!(crate::VERSION));

        let mut report = EvalReport::new(snapshot_a.info().clone(), snapshot_b.info().clone());
        report.results = results;
        report.metadata = metadata;
        report.duration = started.elapsed();
        let summary = report.summary();
        info!(
            %run_id,
            total = summary.total,
            improvements = summary.improvements,
            regressions = summary.regressions,
            duration_ms = report.duration.as_millis() as u64,
            "evaluation complete"
        );
        Ok(report)
    }

    async fn run_one(
        &self,
        evaluator: &dyn Evaluator,
        snapshot_a: &BranchSnapshot,
        snapshot_b: &BranchSnapshot,
    ) -> Result<Vec<EvaluationResult>> {
        let name = evaluator.name();
        let started = Instant::now();
        let outcome = AssertUnwindSafe(evaluator.run(snapshot_a, snapshot_b))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(results)) => {
                info!(
                    evaluator = name,
                    metrics = results.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "evaluator finished"
                );
                Ok(results)
            }
            Ok(Err(err)) if err.is_fatal() => {
                error!(evaluator = name, error = %err, "aborting run");
                Err(err)
            }
            Ok(Err(err)) => {
                warn!(evaluator = name, error = %err, "evaluator failed");
                Ok(vec![EvaluationResult::error(name, "error", err.to_string())])
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(evaluator = name, %message, "evaluator panicked");
                Ok(vec![EvaluationResult::error(name, "error", message)])
            }
        }
    }
}

impl std::fmt::Debug for EvalRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvalRunner")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
