use std::sync::Arc;

use async_trait::async_trait;
use log::{ info, warn };
use serde_json::Value;

use crate::config::{ render_template, VerifierConfig };
use crate::errors::OracleError;
use crate::implementations::reasoning_parser::parse_reasoning_response;
use crate::models::reasoning::ReasoningArtifact;
use crate::traits::oracle::{ ChatMessage, CompletionBackend, CompletionRequest, ReasoningOracle };

pub const REASONING_REPAIR_TASK: &str = "reasoning_repair";

/// Reasoning-repair oracle backed by a completion model.
///
/// The reply is split with the same parser used for first-pass reasoning,
/// so the model is expected to think in `<think>` tags and box its answer.
pub struct LlmReasoningRepairer {
    backend: Arc<dyn CompletionBackend>,
    system_template: String,
    user_template: String,
    temperature: f32,
}

impl LlmReasoningRepairer {
    pub fn new(backend: Arc<dyn CompletionBackend>, config: &VerifierConfig) -> Result<Self, OracleError> {
        let template = |name: &str| {
            config
                .get_template(name)
                .ok_or_else(|| OracleError::Template(format!("Template not found: {}", name)))
        };

        Ok(Self {
            backend,
            system_template: template("reasoning_repair_system")?,
            user_template: template("reasoning_repair")?,
            temperature: config.reasoning_repair.temperature,
        })
    }
}

#[async_trait]
impl ReasoningOracle for LlmReasoningRepairer {
    async fn generate_reasoning_repair(
        &self,
        original_problem: &str,
        failed_solution: &str,
        feedback: &str
    ) -> Result<ReasoningArtifact, OracleError> {
        let user = render_template(
            &self.user_template,
            &[
                ("original_problem", original_problem),
                ("failed_solution", failed_solution),
                ("verification_feedback", feedback),
            ]
        );

        let request = CompletionRequest {
            task: REASONING_REPAIR_TASK.to_string(),
            messages: vec![ChatMessage::system(&self.system_template), ChatMessage::user(user)],
            temperature: Some(self.temperature),
        };

        info!("Requesting repaired reasoning");
        let completion = self.backend.complete(&request).await?;
        let parsed = parse_reasoning_response(&completion.content);

        if parsed.worked_solution.is_empty() {
            warn!("Reasoning repair returned an empty solution");
            return Err(OracleError::Unusable("repaired solution is empty".to_string()));
        }

        let mut artifact = ReasoningArtifact::new(
            original_problem,
            parsed.worked_solution,
            parsed.final_answer
        );
        artifact.internal_reasoning = parsed.internal_reasoning;
        artifact.metadata.insert("source".to_string(), Value::String(REASONING_REPAIR_TASK.to_string()));
        artifact.metadata.insert("model_used".to_string(), Value::String(completion.model));
        artifact.metadata.insert(
            "raw_response_length".to_string(),
            Value::from(completion.content.len() as u64)
        );

        Ok(artifact)
    }
}
