//! Context-size counters.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::config::ContextConfig;
use crate::domain::{BranchSnapshot, EvaluationResult, Result};
use crate::evaluator::Evaluator;

use super::{estimate_tokens, follow_imports};

const NAME: &str = "tokens";

/// Estimates how many tokens a branch's configuration costs.
///
/// `always_loaded` is the root file plus everything it imports; the other
/// buckets are loaded on demand. `total` counts each distinct file once.
#[derive(Debug, Clone)]
pub struct TokenEvaluator {
    context: ContextConfig,
}

impl TokenEvaluator {
    pub fn new(context: ContextConfig) -> Self {
        Self { context }
    }

    fn bucket_tokens(snapshot: &BranchSnapshot, files: &[PathBuf]) -> usize {
        files
            .iter()
            .filter_map(|f| snapshot.read_file(f))
            .map(|c| estimate_tokens(&c))
            .sum()
    }
}

#[async_trait]
impl Evaluator for TokenEvaluator {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Estimated token footprint of always-loaded and on-demand context"
    }

    fn lower_is_better(&self) -> bool {
        true
    }

    async fn evaluate_branch(&self, snapshot: &BranchSnapshot) -> Result<Vec<EvaluationResult>> {
        let imports = follow_imports(snapshot, Path::new(&self.context.root_file));
        let agents = snapshot.list_files(&self.context.agents_dir, Some("md"));
        let commands = snapshot.list_files(&self.context.commands_dir, Some("md"));
        let skills = snapshot.list_files(&self.context.skills_dir, Some("md"));

        let always_loaded = Self::bucket_tokens(snapshot, &imports.loaded);
        let agent_tokens = Self::bucket_tokens(snapshot, &agents);
        let command_tokens = Self::bucket_tokens(snapshot, &commands);
        let skill_tokens = Self::bucket_tokens(snapshot, &skills);

        let all: BTreeSet<&PathBuf> = imports
            .loaded
            .iter()
            .chain(&agents)
            .chain(&commands)
            .chain(&skills)
            .collect();

        let mut total = 0;
        let mut largest: Option<(&PathBuf, usize)> = None;
        for file in all.iter().copied() {
            let Some(content) = snapshot.read_file(file) else {
                continue;
            };
            let tokens = estimate_tokens(&content);
            total += tokens;
            if largest.map_or(true, |(_, t)| tokens > t) {
                largest = Some((file, tokens));
            }
        }

        debug!(
            branch = %snapshot.name(),
            files = all.len(),
            total,
            always_loaded,
            "token footprint"
        );

        let (largest_path, largest_tokens) = largest
            .map(|(p, t)| (p.display().to_string(), t))
            .unwrap_or_default();

        let loaded: Vec<String> = imports
            .loaded
            .iter()
            .map(|p| p.display().to_string())
            .collect();

        Ok(vec![
            EvaluationResult::metric(NAME, "total", total),
            EvaluationResult::metric(NAME, "always_loaded", always_loaded)
                .with_detail("files", json!(loaded)),
            EvaluationResult::metric(NAME, "agents", agent_tokens)
                .with_detail("files", agents.len()),
            EvaluationResult::metric(NAME, "commands", command_tokens)
                .with_detail("files", commands.len()),
            EvaluationResult::metric(NAME, "skills", skill_tokens)
                .with_detail("files", skills.len()),
            EvaluationResult::metric(NAME, "largest_file", largest_tokens)
                .with_detail("path", largest_path),
            EvaluationResult::metric(NAME, "file_count", all.len()),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::branch;
    use super::*;
    use crate::domain::MetricValue;

    fn value<'a>(results: &'a [EvaluationResult], name: &str) -> &'a MetricValue {
        &results.iter().find(|r| r.name == name).unwrap().value
    }

    #[tokio::test]
    async fn counts_buckets_and_dedupes_total() {
        let (_dir, snap) = branch(&[
            ("CLAUDE.md", format!("{} @.claude/agents/coach.md", "x".repeat(40)).as_str()),
            (".claude/agents/coach.md", "a".repeat(80).as_str()),
            (".claude/commands/ship.md", "c".repeat(8).as_str()),
        ]);
        let results = TokenEvaluator::new(ContextConfig::default())
            .evaluate_branch(&snap)
            .await
            .unwrap();

        // 40 x + " @.claude/agents/coach.md" (25 chars) = 65 chars -> 17 tokens.
        assert_eq!(value(&results, "tokens:always_loaded"), &MetricValue::Int(17 + 20));
        assert_eq!(value(&results, "tokens:agents"), &MetricValue::Int(20));
        assert_eq!(value(&results, "tokens:commands"), &MetricValue::Int(2));
        assert_eq!(value(&results, "tokens:skills"), &MetricValue::Int(0));
        // coach.md is both imported and an agent but counted once.
        assert_eq!(value(&results, "tokens:total"), &MetricValue::Int(17 + 20 + 2));
        assert_eq!(value(&results, "tokens:file_count"), &MetricValue::Int(3));
        assert_eq!(value(&results, "tokens:largest_file"), &MetricValue::Int(20));
    }

    #[tokio::test]
    async fn empty_branch_reports_zeroes() {
        let (_dir, snap) = branch(&[]);
        let results = TokenEvaluator::new(ContextConfig::default())
            .evaluate_branch(&snap)
            .await
            .unwrap();
        assert_eq!(results.len(), 7);
        assert_eq!(value(&results, "tokens:total"), &MetricValue::Int(0));
        assert!(results.iter().all(|r| r.passed()));
    }
}
