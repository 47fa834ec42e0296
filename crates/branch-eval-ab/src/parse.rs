//! Agent output parsing.
//!
//! The agent is expected to print a JSON result object (or a stream of JSON
//! lines ending in one). Anything else falls back to pattern extraction with
//! zero defaults.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

/// Normalized view of one agent run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedOutput {
    pub response: String,
    /// Prompt tokens including cache reads and writes.
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub tool_calls: u64,
    pub turns: Option<u64>,
    /// Cost reported by the agent itself.
    pub cost_usd: Option<f64>,
    /// Whether the structured form was found.
    pub structured: bool,
}

/// Parse stdout (and stderr, for the fallback patterns).
pub fn parse_agent_output(stdout: &str, stderr: &str) -> ParsedOutput {
    if let Some(parsed) = parse_structured(stdout) {
        return parsed;
    }
    debug!("agent output is not structured, using pattern fallback");
    parse_plain(stdout, stderr)
}

fn json_objects(stdout: &str) -> Vec<Value> {
    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(stdout.trim()) {
        return vec![value];
    }
    stdout
        .lines()
        .filter_map(|line| serde_json::from_str::<Value>(line.trim()).ok())
        .filter(Value::is_object)
        .collect()
}

fn parse_structured(stdout: &str) -> Option<ParsedOutput> {
    let objects = json_objects(stdout);
    let result = objects.iter().rev().find(|o| o.get("result").is_some())?;

    let response = match &result["result"] {
        Value::String(text) => text.trim().to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    };

    let usage = &result["usage"];
    let count = |v: &Value, key: &str| v.get(key).and_then(Value::as_u64).unwrap_or(0);
    let input_tokens = count(usage, "input_tokens")
        + count(usage, "cache_creation_input_tokens")
        + count(usage, "cache_read_input_tokens");

    let reported_tools = ["num_tool_calls", "tool_calls"]
        .iter()
        .find_map(|key| match result.get(*key) {
            Some(Value::Number(n)) => n.as_u64(),
            Some(Value::Array(items)) => Some(items.len() as u64),
            _ => None,
        });
    let tool_calls = reported_tools.unwrap_or_else(|| tool_uses(&objects));

    Some(ParsedOutput {
        response,
        input_tokens,
        output_tokens: count(usage, "output_tokens"),
        tool_calls,
        turns: result.get("num_turns").and_then(Value::as_u64),
        cost_usd: result
            .get("total_cost_usd")
            .or_else(|| result.get("cost_usd"))
            .and_then(Value::as_f64),
        structured: true,
    })
}

/// `tool_use` content blocks across streamed assistant messages.
fn tool_uses(objects: &[Value]) -> u64 {
    objects
        .iter()
        .filter_map(|o| o.pointer("/message/content").and_then(Value::as_array))
        .flatten()
        .filter(|block| block.get("type").and_then(Value::as_str) == Some("tool_use"))
        .count() as u64
}

struct Patterns {
    input: Regex,
    output: Regex,
    tools: Regex,
    tool_line: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        input: Regex::new(r#"(?i)input[_ ]tokens"?\s*[:=]\s*(\d+)"#).expect("valid pattern"),
        output: Regex::new(r#"(?i)output[_ ]tokens"?\s*[:=]\s*(\d+)"#).expect("valid pattern"),
        tools: Regex::new(r#"(?i)tool[_ ]calls?"?\s*[:=]\s*(\d+)"#).expect("valid pattern"),
        tool_line: Regex::new(r"(?m)^\s*Tool:").expect("valid pattern"),
    })
}

fn capture_u64(re: &Regex, text: &str) -> Option<u64> {
    re.captures(text)?.get(1)?.as_str().parse().ok()
}

fn parse_plain(stdout: &str, stderr: &str) -> ParsedOutput {
    let combined = format!("{stdout}\n{stderr}");
    let p = patterns();
    ParsedOutput {
        response: stdout.trim().to_string(),
        input_tokens: capture_u64(&p.input, &combined).unwrap_or(0),
        output_tokens: capture_u64(&p.output, &combined).unwrap_or(0),
        tool_calls: capture_u64(&p.tools, &combined)
            .unwrap_or_else(|| p.tool_line.find_iter(&combined).count() as u64),
        turns: None,
        cost_usd: None,
        structured: false,
    }
}
