//! Routing probes: can the model pick the right agent from the branch's
//! catalogue?

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::config::ContextConfig;
use crate::domain::{BranchSnapshot, EvalStatus, EvaluationResult, MetricValue, Result};
use crate::evaluator::Evaluator;
use crate::judge::{Judge, JudgeVerdict};

use super::{agent_catalogue, AgentEntry};

const NAME: &str = "routing";

/// Accuracy at or above which the routing metric passes.
pub const ROUTING_PASS_PCT: f64 = 80.0;

/// Reply budget for a routing decision.
const ROUTING_MAX_TOKENS: u32 = 64;

/// One routing probe. Extra fields in the suite file are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingProbe {
    pub id: String,
    pub prompt: String,
    /// Expected agent name; probes without one are skipped.
    #[serde(default)]
    pub expected: Option<String>,
}

/// Asks the judge's model to route each probe and checks the choice.
pub struct RoutingEvaluator {
    judge: Arc<Judge>,
    context: ContextConfig,
    probes_path: PathBuf,
}

impl RoutingEvaluator {
    /// `probes_path` is resolved inside each branch.
    pub fn new(judge: Arc<Judge>, context: ContextConfig, probes_path: impl Into<PathBuf>) -> Self {
        Self {
            judge,
            context,
            probes_path: probes_path.into(),
        }
    }

    fn routing_prompt(catalogue: &[AgentEntry], request: &str) -> String {
        let mut prompt = String::from(
            "You route user requests to specialist agents.\n\nAvailable agents:\n",
        );
        for agent in catalogue {
            prompt.push_str(&format!("- {}: {}\n", agent.name, agent.description));
        }
        prompt.push_str(&format!(
            "\nUser request:\n{request}\n\nReply with the name of the single best agent and nothing else."
        ));
        prompt
    }

    fn skipped(reason: &str) -> Vec<EvaluationResult> {
        vec![EvaluationResult::metric(NAME, "accuracy", MetricValue::Absent)
            .with_status(EvalStatus::Skipped)
            .with_detail("reason", reason)]
    }
}

impl std::fmt::Debug for RoutingEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutingEvaluator")
            .field("probes_path", &self.probes_path)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Evaluator for RoutingEvaluator {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "LLM routing accuracy against the branch's agent catalogue"
    }

    async fn evaluate_branch(&self, snapshot: &BranchSnapshot) -> Result<Vec<EvaluationResult>> {
        let Some(raw) = snapshot.read_file(&self.probes_path) else {
            return Ok(Self::skipped("no routing probes in branch"));
        };
        let probes: Vec<RoutingProbe> = serde_json::from_str(&raw)?;
        let probes: Vec<RoutingProbe> = probes.into_iter().filter(|p| p.expected.is_some()).collect();

        let catalogue = agent_catalogue(snapshot, &self.context);
        if catalogue.is_empty() {
            return Ok(Self::skipped("branch defines no agents"));
        }
        if probes.is_empty() {
            return Ok(Self::skipped("no probes with an expected agent"));
        }

        info!(branch = %snapshot.name(), probes = probes.len(), agents = catalogue.len(), "routing probes");

        let mut correct: usize = 0;
        let mut outcomes = Vec::with_capacity(probes.len());
        for probe in &probes {
            let expected = probe.expected.as_deref().unwrap_or_default();
            let prompt = Self::routing_prompt(&catalogue, &probe.prompt);
            let (actual, verdict) = match self.judge.complete(prompt, ROUTING_MAX_TOKENS).await {
                Ok(completion) => {
                    let verdict = self.judge.judge_routing(&completion.text, expected);
                    (completion.text.trim().to_string(), verdict)
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    warn!(probe = %probe.id, error = %err, "routing probe failed");
                    (String::new(), JudgeVerdict::zero(err.to_string()))
                }
            };
            if verdict.passed {
                correct += 1;
            }
            outcomes.push(json!({
                "id": probe.id,
                "expected": expected,
                "actual": actual,
                "passed": verdict.passed,
                "reasoning": verdict.reasoning,
            }));
        }

        let accuracy = correct as f64 / probes.len() as f64 * 100.0;
        let status = if accuracy >= ROUTING_PASS_PCT {
            EvalStatus::Passed
        } else {
            EvalStatus::Failed
        };

        Ok(vec![
            EvaluationResult::metric(NAME, "accuracy", accuracy)
                .with_status(status)
                .with_score(accuracy)
                .with_expected(100.0)
                .with_detail("probes", json!(outcomes)),
            EvaluationResult::metric(NAME, "correct", correct),
            EvaluationResult::metric(NAME, "probes", probes.len()),
        ])
    }
}
