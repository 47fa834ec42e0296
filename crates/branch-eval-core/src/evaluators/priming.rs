//! Priming heuristics: shouting and negative framing in instructions.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{Map, Value};

use crate::config::ContextConfig;
use crate::domain::{BranchSnapshot, EvaluationResult, Result};
use crate::evaluator::Evaluator;

use super::{estimate_tokens, follow_imports};

const NAME: &str = "priming";

fn emphatic_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?:MUST|NEVER|ALWAYS|CRITICAL|IMPORTANT|REQUIRED)\b")
            .expect("emphatic pattern is valid")
    })
}

fn negation_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:don['’]t|do not|never)\b").expect("negation pattern is valid")
    })
}

/// Counts emphatic ALL-CAPS directives and negations across every file the
/// agent may load.
#[derive(Debug, Clone)]
pub struct PrimingEvaluator {
    context: ContextConfig,
}

impl PrimingEvaluator {
    pub fn new(context: ContextConfig) -> Self {
        Self { context }
    }

    fn scanned_files(&self, snapshot: &BranchSnapshot) -> BTreeSet<PathBuf> {
        let mut files: BTreeSet<PathBuf> =
            follow_imports(snapshot, Path::new(&self.context.root_file))
                .loaded
                .into_iter()
                .collect();
        for dir in [
            &self.context.agents_dir,
            &self.context.commands_dir,
            &self.context.skills_dir,
        ] {
            files.extend(snapshot.list_files(dir, Some("md")));
        }
        files
    }
}

#[async_trait]
impl Evaluator for PrimingEvaluator {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Emphatic directives and negations that over-prime the model"
    }

    fn lower_is_better(&self) -> bool {
        true
    }

    async fn evaluate_branch(&self, snapshot: &BranchSnapshot) -> Result<Vec<EvaluationResult>> {
        let mut emphatic = 0;
        let mut negations = 0;
        let mut tokens = 0;
        let mut by_file = Map::new();

        for file in self.scanned_files(snapshot) {
            let Some(content) = snapshot.read_file(&file) else {
                continue;
            };
            let shouted = emphatic_regex().find_iter(&content).count();
            emphatic += shouted;
            negations += negation_regex().find_iter(&content).count();
            tokens += estimate_tokens(&content);
            if shouted > 0 {
                by_file.insert(file.display().to_string(), Value::from(shouted));
            }
        }

        let density = if tokens == 0 {
            0.0
        } else {
            emphatic as f64 * 1000.0 / tokens as f64
        };

        Ok(vec![
            EvaluationResult::metric(NAME, "emphatic_directives", emphatic)
                .with_detail("by_file", by_file),
            EvaluationResult::metric(NAME, "negations", negations),
            EvaluationResult::metric(NAME, "directive_density", density)
                .with_detail("tokens", tokens),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::branch;
    use super::*;
    use crate::domain::MetricValue;

    #[tokio::test]
    async fn counts_caps_directives_and_negations() {
        let (_dir, snap) = branch(&[
            ("CLAUDE.md", "You MUST test. NEVER skip. must is fine lowercase."),
            (".claude/agents/a.md", "Don't guess. Do not rush. IMPORTANT: ALWAYSX is not a word match."),
        ]);
        let results = PrimingEvaluator::new(ContextConfig::default())
            .evaluate_branch(&snap)
            .await
            .unwrap();

        // MUST, NEVER, IMPORTANT
        assert_eq!(results[0].value, MetricValue::Int(3));
        // NEVER, Don't, Do not
        assert_eq!(results[1].value, MetricValue::Int(3));
        assert!(results[2].value.as_f64().unwrap() > 0.0);
        assert_eq!(results[0].details["by_file"]["CLAUDE.md"], 2);
    }

    #[tokio::test]
    async fn empty_branch_has_zero_density() {
        let (_dir, snap) = branch(&[]);
        let results = PrimingEvaluator::new(ContextConfig::default())
            .evaluate_branch(&snap)
            .await
            .unwrap();
        assert_eq!(results[2].value, MetricValue::Float(0.0));
    }
}
