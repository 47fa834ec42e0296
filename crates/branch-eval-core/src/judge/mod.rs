//! LLM-as-judge scoring with a hard budget.
//!
//! Every provider call goes through [`Judge::complete`], which charges the
//! judge's [`CostTracker`]. Provider failures degrade to zero-score
//! verdicts; only [`EvalError::BudgetExceeded`] escapes [`Judge::judge`].

pub mod cost;
pub mod parse;
pub mod provider;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::JudgeConfig;
use crate::domain::{EvalError, Result};

pub use cost::{estimate_cost, CallRecord, CostTracker, ModelPricing};
pub use parse::parse_verdict;
pub use provider::{
    api_key_from_env, Completion, CompletionProvider, CompletionRequest, GeminiProvider, Usage,
    API_KEY_VARS, SAFETY_BLOCKED,
};

/// Overall score (1-5 scale) at or above which a response passes.
pub const PASS_THRESHOLD: f64 = 3.5;

/// Reasoning attached to verdicts for empty or blocked responses.
pub const EMPTY_RESPONSE_REASONING: &str = "Response was empty or blocked";

/// Outcome of scoring one response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeVerdict {
    /// Overall score, 1-5 (0 when the response could not be scored).
    pub score: f64,
    pub passed: bool,
    pub criteria_scores: BTreeMap<String, f64>,
    pub reasoning: String,
}

impl JudgeVerdict {
    pub fn zero(reasoning: impl Into<String>) -> Self {
        Self {
            score: 0.0,
            passed: false,
            criteria_scores: BTreeMap::new(),
            reasoning: reasoning.into(),
        }
    }
}

/// Lowercase, treat `-`/`_` as spaces, collapse whitespace.
fn normalize_agent_name(s: &str) -> String {
    s.to_lowercase()
        .replace(['-', '_'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Routing check without an LLM call: does the response name the agent?
pub fn judge_routing(response: &str, expected_agent: &str) -> JudgeVerdict {
    let expected = normalize_agent_name(expected_agent);
    let found = !expected.is_empty() && normalize_agent_name(response).contains(&expected);
    if found {
        JudgeVerdict {
            score: 5.0,
            passed: true,
            criteria_scores: BTreeMap::new(),
            reasoning: format!("Expected agent '{expected_agent}' found in response"),
        }
    } else {
        JudgeVerdict {
            score: 1.0,
            passed: false,
            criteria_scores: BTreeMap::new(),
            reasoning: format!("Expected agent '{expected_agent}' not found in response"),
        }
    }
}

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Scores responses through a [`CompletionProvider`].
pub struct Judge {
    provider: Arc<dyn CompletionProvider>,
    config: JudgeConfig,
    tracker: Mutex<CostTracker>,
}

impl Judge {
    pub fn new(provider: Arc<dyn CompletionProvider>, config: JudgeConfig) -> Self {
        let tracker = Mutex::new(CostTracker::new(config.budget_usd));
        Self {
            provider,
            config,
            tracker,
        }
    }

    /// Judge backed by Gemini, keyed from the environment.
    pub fn from_env(config: JudgeConfig) -> Result<Self> {
        let provider = GeminiProvider::from_env()?;
        info!(model = %config.model, budget_usd = config.budget_usd, "judge initialized");
        Ok(Self::new(Arc::new(provider), config))
    }

    pub fn config(&self) -> &JudgeConfig {
        &self.config
    }

    /// Send a prompt and charge the result. Budget overruns surface here.
    pub async fn complete(&self, prompt: String, max_output_tokens: u32) -> Result<Completion> {
        let request = CompletionRequest {
            model: self.config.model.clone(),
            prompt,
            temperature: self.config.temperature,
            max_output_tokens,
        };
        let completion = self.provider.complete(&request).await?;

        let cost = self
            .tracker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .record_usage(&request.model, completion.usage)?;
        debug!(
            input_tokens = completion.usage.input_tokens,
            output_tokens = completion.usage.output_tokens,
            cost_usd = cost,
            "judge call"
        );
        Ok(completion)
    }

    /// Score `response` against `criteria`.
    pub async fn judge(
        &self,
        response: &str,
        criteria: &[String],
        context: Option<&str>,
        expected: Option<&str>,
    ) -> Result<JudgeVerdict> {
        if response.trim().is_empty() || response.contains(SAFETY_BLOCKED) {
            return Ok(JudgeVerdict::zero(EMPTY_RESPONSE_REASONING));
        }

        let prompt = self.scoring_prompt(response, criteria, context, expected);
        match self.complete(prompt, self.config.max_output_tokens).await {
            Ok(completion) if completion.is_blocked() => {
                warn!("judge reply was blocked");
                Ok(JudgeVerdict::zero("Judge response was blocked"))
            }
            Ok(completion) => Ok(parse_verdict(&completion.text)),
            Err(err @ EvalError::BudgetExceeded { .. }) => Err(err),
            Err(err) => {
                warn!(error = %err, "judge call failed");
                Ok(JudgeVerdict::zero(err.to_string()))
            }
        }
    }

    /// See [`judge_routing`].
    pub fn judge_routing(&self, response: &str, expected_agent: &str) -> JudgeVerdict {
        judge_routing(response, expected_agent)
    }

    fn scoring_prompt(
        &self,
        response: &str,
        criteria: &[String],
        context: Option<&str>,
        expected: Option<&str>,
    ) -> String {
        let mut prompt = String::from(
            "You are an impartial evaluator of AI assistant responses.\n\n",
        );
        if let Some(context) = context {
            prompt.push_str(&format!("## Context\n{context}\n\n"));
        }
        if let Some(expected) = expected {
            prompt.push_str(&format!("## Expected behavior\n{expected}\n\n"));
        }
        prompt.push_str("## Criteria\n");
        for (i, criterion) in criteria.iter().enumerate() {
            prompt.push_str(&format!("{}. {criterion}\n", i + 1));
        }
        prompt.push_str(&format!(
            "\n## Response\n{}\n\n",
            truncate_chars(response, self.config.max_response_chars)
        ));
        prompt.push_str(&format!(
            "Score each criterion from 1 to 5 and give an overall score from 1 to 5. \
             A response passes when overall_score >= {PASS_THRESHOLD}.\n\
             Reply with JSON only, no prose:\n\
             {{\"overall_score\": <1-5>, \"passed\": <bool>, \
             \"criteria_scores\": {{\"<criterion>\": <1-5>}}, \"reasoning\": \"<one paragraph>\"}}\n"
        ));
        prompt
    }

    pub fn spent(&self) -> f64 {
        self.tracker.lock().unwrap_or_else(|e| e.into_inner()).spent()
    }

    /// Copy of the tracker for reporting.
    pub fn cost_snapshot(&self) -> CostTracker {
        self.tracker.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl std::fmt::Debug for Judge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Judge")
            .field("model", &self.config.model)
            .field("spent", &self.spent())
            .finish_non_exhaustive()
    }
}
