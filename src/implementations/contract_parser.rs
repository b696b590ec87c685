use log::{ debug, warn };
use serde_json::Value;
use thiserror::Error;

use crate::models::execution::ExecutionOutcome;
use crate::models::verification::{ FinalVerdict, StepVerification };

/// Longest slice of an offending line kept in the error
const MAX_EXCERPT: usize = 200;

/// A stdout line that is not a JSON object
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line_number} is not a JSON object ({reason}): {content}")]
pub struct ContractViolation {
    pub line_number: usize,
    pub content: String,
    pub reason: String,
}

/// Everything read from one execution's stdout
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedContract {
    pub steps: Vec<StepVerification>,
    pub verdict: Option<FinalVerdict>,
    pub parse_error: Option<ContractViolation>,
}

impl ParsedContract {
    /// Whether the pipeline can diagnose the math from this output
    pub fn is_complete(&self) -> bool {
        self.parse_error.is_none() && self.verdict.is_some()
    }
}

/// Parses stdout that follows the newline-delimited JSON verification contract
#[derive(Debug, Clone, Copy, Default)]
pub struct ContractParser;

impl ContractParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, outcome: &ExecutionOutcome) -> ParsedContract {
        // Execution failures are diagnosed from the outcome, not from stdout
        if !outcome.succeeded {
            return ParsedContract::default();
        }
        self.parse_stdout(&outcome.stdout)
    }

    pub fn parse_stdout(&self, stdout: &str) -> ParsedContract {
        let mut steps = Vec::new();
        let mut verdict = None;

        for (index, raw) in stdout.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }

            let record = match serde_json::from_str::<Value>(line) {
                Ok(Value::Object(map)) => map,
                Ok(other) => {
                    let reason = format!("found {}", json_type_name(&other));
                    return violation(index + 1, line, reason);
                }
                Err(e) => {
                    return violation(index + 1, line, e.to_string());
                }
            };

            if record.contains_key("step") && record.contains_key("verified") {
                match (record.get("step").and_then(Value::as_i64), record.get("verified").and_then(Value::as_bool)) {
                    (Some(step_number), Some(verified)) => {
                        let description = record
                            .get("description")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string();
                        steps.push(StepVerification { step_number, description, verified });
                    }
                    _ => debug!("Skipping step record with mistyped fields: {}", line),
                }
            } else if let Some(field) = record.get("final_answer_verified") {
                match field.as_bool() {
                    // Last verdict wins
                    Some(answer_verified) => {
                        verdict = Some(FinalVerdict {
                            answer_verified,
                            computed_value: render_value(record.get("computed")),
                            claimed_value: render_value(record.get("claimed")),
                        });
                    }
                    None => debug!("Skipping verdict record with non-boolean flag: {}", line),
                }
            }
        }

        ParsedContract { steps, verdict, parse_error: None }
    }
}

fn violation(line_number: usize, line: &str, reason: String) -> ParsedContract {
    let content: String = line.chars().take(MAX_EXCERPT).collect();
    warn!("Verification output violates the contract at line {}: {}", line_number, reason);
    ParsedContract {
        steps: Vec::new(),
        verdict: None,
        parse_error: Some(ContractViolation { line_number, content, reason }),
    }
}

/// Strings verbatim, `null` as absent, anything else as compact JSON
fn render_value(value: Option<&Value>) -> Option<String> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
