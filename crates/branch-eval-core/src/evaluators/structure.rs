//! Manifest audit of agent and command definitions.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::config::ContextConfig;
use crate::domain::{BranchSnapshot, EvalStatus, EvaluationResult, Result};
use crate::evaluator::Evaluator;

use super::{follow_imports, has_identity, parse_frontmatter};

const NAME: &str = "structure";

/// Percentage with an empty population counted as complete.
fn percent(ok: usize, total: usize) -> f64 {
    if total == 0 {
        100.0
    } else {
        ok as f64 / total as f64 * 100.0
    }
}

fn status_for(pct: f64) -> EvalStatus {
    if pct < 100.0 {
        EvalStatus::Failed
    } else {
        EvalStatus::Passed
    }
}

#[derive(Debug, Clone)]
pub struct StructureEvaluator {
    context: ContextConfig,
}

impl StructureEvaluator {
    pub fn new(context: ContextConfig) -> Self {
        Self { context }
    }

    /// Definition files lacking a `name`/`description` frontmatter.
    fn missing_identity(snapshot: &BranchSnapshot, files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .filter(|f| {
                !snapshot
                    .read_file(f)
                    .and_then(|c| parse_frontmatter(&c))
                    .is_some_and(|fm| has_identity(&fm))
            })
            .map(|f| f.display().to_string())
            .collect()
    }
}

#[async_trait]
impl Evaluator for StructureEvaluator {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Agent/command manifest completeness and import integrity"
    }

    async fn evaluate_branch(&self, snapshot: &BranchSnapshot) -> Result<Vec<EvaluationResult>> {
        let root = Path::new(&self.context.root_file);
        let agents = snapshot.list_files(&self.context.agents_dir, Some("md"));
        let commands = snapshot.list_files(&self.context.commands_dir, Some("md"));

        let definitions: Vec<PathBuf> = agents.iter().chain(&commands).cloned().collect();
        let missing = Self::missing_identity(snapshot, &definitions);
        let coverage = percent(definitions.len() - missing.len(), definitions.len());

        let imports = follow_imports(snapshot, root);
        let integrity = percent(
            imports.references - imports.unresolved.len(),
            imports.references,
        );
        let unresolved: Vec<String> = imports
            .unresolved
            .iter()
            .map(|(from, target)| format!("{}: @{target}", from.display()))
            .collect();

        debug!(
            branch = %snapshot.name(),
            coverage,
            integrity,
            missing = missing.len(),
            unresolved = unresolved.len(),
            "structure audit"
        );

        Ok(vec![
            EvaluationResult::metric(NAME, "root_present", snapshot.read_file(root).is_some()),
            EvaluationResult::metric(NAME, "agent_count", agents.len()),
            EvaluationResult::metric(NAME, "command_count", commands.len()),
            EvaluationResult::metric(NAME, "frontmatter_coverage", coverage)
                .with_status(status_for(coverage))
                .with_score(coverage)
                .with_expected(100.0)
                .with_detail("missing", json!(missing)),
            EvaluationResult::metric(NAME, "reference_integrity", integrity)
                .with_status(status_for(integrity))
                .with_score(integrity)
                .with_expected(100.0)
                .with_detail("unresolved", json!(unresolved)),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::branch;
    use super::*;
    use crate::domain::MetricValue;

    fn find<'a>(results: &'a [EvaluationResult], name: &str) -> &'a EvaluationResult {
        results.iter().find(|r| r.name == name).unwrap()
    }

    #[tokio::test]
    async fn complete_manifest_passes() {
        let (_dir, snap) = branch(&[
            ("CLAUDE.md", "@docs/rules.md"),
            ("docs/rules.md", "rules"),
            (".claude/agents/coach.md", "---\nname: coach\ndescription: helps\n---\n"),
            (".claude/commands/ship.md", "---\nname: ship\ndescription: ships\n---\n"),
        ]);
        let results = StructureEvaluator::new(ContextConfig::default())
            .evaluate_branch(&snap)
            .await
            .unwrap();

        assert_eq!(find(&results, "structure:root_present").value, MetricValue::Bool(true));
        assert_eq!(find(&results, "structure:agent_count").value, MetricValue::Int(1));
        let coverage = find(&results, "structure:frontmatter_coverage");
        assert_eq!(coverage.value, MetricValue::Float(100.0));
        assert!(coverage.passed());
        assert!(find(&results, "structure:reference_integrity").passed());
    }

    #[tokio::test]
    async fn gaps_fail_with_details() {
        let (_dir, snap) = branch(&[
            ("CLAUDE.md", "@docs/rules.md @docs/gone.md"),
            ("docs/rules.md", "rules"),
            (".claude/agents/coach.md", "---\nname: coach\ndescription: helps\n---\n"),
            (".claude/agents/bare.md", "no frontmatter"),
        ]);
        let results = StructureEvaluator::new(ContextConfig::default())
            .evaluate_branch(&snap)
            .await
            .unwrap();

        let coverage = find(&results, "structure:frontmatter_coverage");
        assert_eq!(coverage.value, MetricValue::Float(50.0));
        assert_eq!(coverage.status, EvalStatus::Failed);
        assert_eq!(coverage.details["missing"], json!([".claude/agents/bare.md"]));

        let integrity = find(&results, "structure:reference_integrity");
        assert_eq!(integrity.value, MetricValue::Float(50.0));
        assert_eq!(integrity.status, EvalStatus::Failed);
        assert_eq!(integrity.details["unresolved"], json!(["CLAUDE.md: @docs/gone.md"]));
    }

    #[tokio::test]
    async fn empty_branch_is_vacuously_complete() {
        let (_dir, snap) = branch(&[]);
        let results = StructureEvaluator::new(ContextConfig::default())
            .evaluate_branch(&snap)
            .await
            .unwrap();
        assert_eq!(find(&results, "structure:root_present").value, MetricValue::Bool(false));
        assert!(find(&results, "structure:frontmatter_coverage").passed());
        assert!(find(&results, "structure:reference_integrity").passed());
    }
}
