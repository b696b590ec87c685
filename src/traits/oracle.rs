use std::time::Duration;
use async_trait::async_trait;
use serde::{ Deserialize, Serialize };

use crate::errors::OracleError;
use crate::models::reasoning::ReasoningArtifact;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }
}

/// One call to a text-completion service
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Logical task name, used for call statistics
    pub task: String,
    pub messages: Vec<ChatMessage>,
    /// Overrides the backend's configured temperature
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub content: String,
    pub model: String,
    pub latency: Duration,
}

/// Free-text completion oracle (code generation and reasoning repair both use it)
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, OracleError>;
}

/// Produces a corrected solution after the verifier disproved the previous one
#[async_trait]
pub trait ReasoningOracle: Send + Sync {
    async fn generate_reasoning_repair(
        &self,
        original_problem: &str,
        failed_solution: &str,
        feedback: &str
    ) -> Result<ReasoningArtifact, OracleError>;
}
