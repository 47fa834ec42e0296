//! Behavioral test cases and suite files.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AbError, Result};

/// Tag selecting the quick subset of a suite.
pub const SMOKE_TAG: &str = "smoke";

/// How a test case's response is scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestType {
    /// Response must name the expected agent.
    Routing,
    /// Response is scored by the judge against criteria.
    Quality,
}

impl TestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestType::Routing => "routing",
            TestType::Quality => "quality",
        }
    }
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "routing" => Ok(TestType::Routing),
            "quality" => Ok(TestType::Quality),
            other => Err(format!("unknown test type: {other}")),
        }
    }
}

/// One literal prompt executed against the agent.
///
/// `prompt` is kept as raw JSON so a malformed case fails on its own
/// instead of rejecting the whole suite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: String,
    pub prompt: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub criteria: Vec<String>,
    /// Extra context handed to the judge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl TestCase {
    pub fn new(id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            prompt: Value::String(prompt.into()),
            expected: None,
            criteria: Vec::new(),
            context: None,
            tags: Vec::new(),
        }
    }

    pub fn with_expected(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }

    pub fn with_criteria(mut self, criteria: &[&str]) -> Self {
        self.criteria = criteria.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Prompt text for display, empty when the prompt is not a string.
    pub fn prompt_text(&self) -> &str {
        self.prompt.as_str().unwrap_or_default()
    }

    pub fn is_smoke(&self) -> bool {
        self.tags.iter().any(|t| t == SMOKE_TAG)
    }
}

/// Load a JSON array of test cases.
pub fn load_cases(path: &Path) -> Result<Vec<TestCase>> {
    let raw = std::fs::read_to_string(path).map_err(|e| AbError::Suite {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    serde_json::from_str(&raw).map_err(|e| AbError::Suite {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Keep only smoke-tagged cases.
pub fn smoke_cases(cases: Vec<TestCase>) -> Vec<TestCase> {
    cases.into_iter().filter(TestCase::is_smoke).collect()
}
