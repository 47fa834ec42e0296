//! branch-eval behavioral A/B runner
//!
//! Executes literal prompts against an external agent process in each
//! branch checkout and compares the outcomes:
//! - Prompts are sanitized and passed as a single argv entry
//! - The child runs with an allow-listed environment and a timeout
//! - Output is parsed for response text, tokens and tool calls
//! - Responses are scored by routing match or the quality judge

pub mod agent;
pub mod case;
pub mod error;
pub mod parse;
pub mod result;
pub mod runner;
pub mod sandbox;
pub mod sanitize;

// Re-export key types
pub use agent::{AgentCommand, AgentExecutor, AgentOutput};
pub use case::{load_cases, smoke_cases, TestCase, TestType, SMOKE_TAG};
pub use error::{AbError, Result};
pub use parse::{parse_agent_output, ParsedOutput};
pub use result::{BranchMetrics, BranchResult, ComparisonResult, TestResult, LOWER_IS_BETTER};
pub use runner::{describe_plan, AbOptions, AbRunner};
pub use sandbox::{restricted_env, ENV_ALLOWLIST};
pub use sanitize::{sanitize_prompt, MAX_PROMPT_CHARS};
