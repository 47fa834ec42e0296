//! Spend accounting for LLM calls.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::{EvalError, Result};

use super::provider::Usage;

/// USD per million tokens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

/// Rate table matched by substring, first hit wins.
const PRICING: &[(&str, ModelPricing)] = &[
    ("gemini-2.5-pro", ModelPricing::new(1.25, 10.0)),
    ("gemini-2.5-flash", ModelPricing::new(0.30, 2.50)),
    ("gemini-2.0-flash", ModelPricing::new(0.10, 0.40)),
    ("gemini-1.5-pro", ModelPricing::new(1.25, 5.0)),
    ("gemini-1.5-flash", ModelPricing::new(0.075, 0.30)),
    ("opus", ModelPricing::new(15.0, 75.0)),
    ("sonnet", ModelPricing::new(3.0, 15.0)),
    ("haiku", ModelPricing::new(0.80, 4.0)),
];

/// Used for models missing from the table.
const FALLBACK_PRICING: ModelPricing = ModelPricing::new(3.0, 15.0);

impl ModelPricing {
    pub const fn new(input_per_million: f64, output_per_million: f64) -> Self {
        Self {
            input_per_million,
            output_per_million,
        }
    }

    pub fn for_model(model: &str) -> Self {
        let model = model.to_ascii_lowercase();
        PRICING
            .iter()
            .find(|(pattern, _)| model.contains(pattern))
            .map(|(_, p)| *p)
            .unwrap_or_else(|| {
                debug!(%model, "no pricing entry, using fallback rate");
                FALLBACK_PRICING
            })
    }

    pub fn cost(&self, usage: Usage) -> f64 {
        (usage.input_tokens as f64 * self.input_per_million
            + usage.output_tokens as f64 * self.output_per_million)
            / 1_000_000.0
    }
}

/// Estimated cost of `usage` on `model`.
pub fn estimate_cost(model: &str, usage: Usage) -> f64 {
    ModelPricing::for_model(model).cost(usage)
}

/// One ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_usd: f64,
    pub at: DateTime<Utc>,
}

/// Running spend against a fixed budget.
///
/// A charge that pushes the total over budget is still recorded before the
/// error is returned, so the ledger always reflects real spend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostTracker {
    budget: f64,
    spent: f64,
    calls: Vec<CallRecord>,
}

impl CostTracker {
    pub fn new(budget: f64) -> Self {
        Self {
            budget,
            spent: 0.0,
            calls: Vec::new(),
        }
    }

    /// Price `usage` for `model` and charge it.
    pub fn record_usage(&mut self, model: &str, usage: Usage) -> Result<f64> {
        let cost = estimate_cost(model, usage);
        self.charge(CallRecord {
            model: model.to_string(),
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            cost_usd: cost,
            at: Utc::now(),
        })?;
        Ok(cost)
    }

    /// Add a priced call to the ledger.
    pub fn charge(&mut self, record: CallRecord) -> Result<()> {
        self.spent += record.cost_usd;
        self.calls.push(record);
        if self.spent > self.budget {
            warn!(spent = self.spent, budget = self.budget, "judge budget exceeded");
            return Err(EvalError::BudgetExceeded {
                spent: self.spent,
                budget: self.budget,
            });
        }
        Ok(())
    }

    pub fn budget(&self) -> f64 {
        self.budget
    }

    pub fn spent(&self) -> f64 {
        self.spent
    }

    pub fn remaining(&self) -> f64 {
        (self.budget - self.spent).max(0.0)
    }

    pub fn calls(&self) -> &[CallRecord] {
        &self.calls
    }
}
