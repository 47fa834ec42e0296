//! Prompt sanitizing before a prompt reaches the agent's argv.

use branch_eval_core::EvalError;
use serde_json::Value;

/// Hard ceiling on prompt length, in characters.
pub const MAX_PROMPT_CHARS: usize = 100_000;

/// Validate a raw JSON prompt and return its cleaned text.
pub fn sanitize_prompt(raw: &Value) -> Result<String, EvalError> {
    match raw {
        Value::String(text) => sanitize_text(text),
        other => Err(EvalError::InvalidPrompt(format!(
            "prompt must be a string, got {}",
            json_kind(other)
        ))),
    }
}

/// Reject oversized text and strip control characters other than newline
/// and tab.
pub fn sanitize_text(text: &str) -> Result<String, EvalError> {
    let len = text.chars().count();
    if len > MAX_PROMPT_CHARS {
        return Err(EvalError::InvalidPrompt(format!(
            "prompt is {len} characters, limit is {MAX_PROMPT_CHARS}"
        )));
    }
    Ok(text
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
