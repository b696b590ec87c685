use std::collections::HashMap;
use serde::{ Deserialize, Serialize };

/// A candidate solution to be checked. Immutable input to verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningArtifact {
    pub original_problem: String,
    pub worked_solution: String,
    pub final_answer: String,
    /// Content the reasoning model produced inside its thinking block
    #[serde(default)]
    pub internal_reasoning: String,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ReasoningArtifact {
    pub fn new(
        original_problem: impl Into<String>,
        worked_solution: impl Into<String>,
        final_answer: impl Into<String>
    ) -> Self {
        Self {
            original_problem: original_problem.into(),
            worked_solution: worked_solution.into(),
            final_answer: final_answer.into(),
            internal_reasoning: String::new(),
            metadata: HashMap::new(),
        }
    }
}
