//! Configuration loaded from `branch-eval.toml`.
//!
//! Every section is optional and falls back to defaults. Lookup order for
//! the file: explicit path, then `BRANCH_EVAL_CONFIG`, then
//! `./branch-eval.toml`, then built-in defaults. API keys never live here;
//! they come from the environment (see [`crate::judge::provider`]).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{EvalError, Result};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "BRANCH_EVAL_CONFIG";

/// Config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "branch-eval.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct EvalConfig {
    pub judge: JudgeConfig,
    pub agent: AgentConfig,
    pub context: ContextConfig,
    pub suites: SuiteConfig,
    pub pairs: Vec<BranchPair>,
    pub output: OutputConfig,
}

impl EvalConfig {
    /// Load configuration following the documented lookup order.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            return Self::from_file(Path::new(&path));
        }
        let local = Path::new(DEFAULT_CONFIG_FILE);
        if local.exists() {
            return Self::from_file(local);
        }
        debug!("no config file found, using defaults");
        Ok(Self::default())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| EvalError::Config(format!("cannot read {}: {e}", path.display())))?;
        let config = Self::from_toml(&raw)
            .map_err(|e| EvalError::Config(format!("{}: {e}", path.display())))?;
        debug!(path = %path.display(), pairs = config.pairs.len(), "loaded config");
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Resolve a branch pair by name; `None` selects the first configured
    /// pair, or the built-in default when none are configured.
    pub fn pair(&self, name: Option<&str>) -> Result<BranchPair> {
        match name {
            Some(name) => self
                .pairs
                .iter()
                .find(|p| p.name == name)
                .cloned()
                .ok_or_else(|| EvalError::Config(format!("unknown branch pair: {name}"))),
            None => Ok(self.pairs.first().cloned().unwrap_or_default()),
        }
    }
}

/// LLM judge settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct JudgeConfig {
    pub model: String,
    /// Hard spend ceiling in USD for one judge instance.
    pub budget_usd: f64,
    pub max_output_tokens: u32,
    pub temperature: f32,
    /// Responses are truncated to this many characters before scoring.
    pub max_response_chars: usize,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash".to_string(),
            budget_usd: 5.0,
            max_output_tokens: 1024,
            temperature: 0.0,
            max_response_chars: 8_000,
        }
    }
}

/// External agent process settings for behavioral runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    pub program: String,
    /// Arguments placed before the prompt.
    pub args: Vec<String>,
    /// Permission-bypass flag appended after `args`.
    pub permission_flag: Option<String>,
    pub timeout_secs: u64,
    /// Model name used to estimate cost when the agent reports none.
    pub pricing_model: String,
    /// Test cases run concurrently within one branch (1 = serial).
    pub max_concurrency: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            program: "claude".to_string(),
            args: vec![
                "-p".to_string(),
                "--output-format".to_string(),
                "json".to_string(),
            ],
            permission_flag: Some("--dangerously-skip-permissions".to_string()),
            timeout_secs: 120,
            pricing_model: "claude-sonnet".to_string(),
            max_concurrency: 1,
        }
    }
}

/// Where agent-configuration files live inside a branch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ContextConfig {
    /// Always-loaded root instructions file.
    pub root_file: String,
    pub agents_dir: String,
    pub commands_dir: String,
    pub skills_dir: String,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            root_file: "CLAUDE.md".to_string(),
            agents_dir: ".claude/agents".to_string(),
            commands_dir: ".claude/commands".to_string(),
            skills_dir: ".claude/skills".to_string(),
        }
    }
}

/// Behavioral test-suite files (JSON arrays of test cases).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SuiteConfig {
    pub routing: PathBuf,
    pub quality: PathBuf,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            routing: PathBuf::from("evals/routing_tests.json"),
            quality: PathBuf::from("evals/quality_tests.json"),
        }
    }
}

/// A named baseline/candidate pair of branch checkouts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BranchPair {
    pub name: String,
    pub branch_a: PathBuf,
    pub branch_b: PathBuf,
}

impl Default for BranchPair {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            branch_a: PathBuf::from("../main"),
            branch_b: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("eval-results"),
        }
    }
}
