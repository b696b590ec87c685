use std::collections::HashMap;
use std::sync::Arc;

use log::{ debug, info, warn };
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::config::{ render_template, VerifierConfig };
use crate::errors::{ GenerationError, OracleError };
use crate::models::reasoning::ReasoningArtifact;
use crate::traits::oracle::{ ChatMessage, CompletionBackend, CompletionRequest };

pub const CODEGEN_TASK: &str = "verification";

static PYTHON_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```(?:python|py|python3)[ \t]*\r?\n(.*?)```").expect("python fence regex is valid")
});
static BARE_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```[ \t]*\r?\n(.*?)```").expect("bare fence regex is valid")
});

/// Source code plus facts about the oracle call that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedCode {
    pub source_code: String,
    pub metadata: HashMap<String, Value>,
}

/// Extract verification code from free-text oracle output.
///
/// Fenced blocks win (`python`-tagged first). Without a fence, the whole
/// response is accepted only when `strict` is off and it carries the
/// structure of a verification script: both the symbolic and JSON imports
/// and more than three lines.
pub fn extract_code(response: &str, strict: bool) -> Option<String> {
    for pattern in [&*PYTHON_FENCE, &*BARE_FENCE] {
        if let Some(captures) = pattern.captures(response) {
            let code = captures[1].trim();
            if !code.is_empty() {
                return Some(code.to_string());
            }
        }
    }

    if strict {
        return None;
    }

    let trimmed = response.trim();
    let imports_sympy = trimmed.contains("import sympy") || trimmed.contains("from sympy");
    let imports_json = trimmed.contains("import json");
    if imports_sympy && imports_json && trimmed.lines().count() > 3 {
        debug!("No code fence found; accepting whole response as a verification script");
        return Some(trimmed.to_string());
    }

    None
}

/// Turns a reasoning artifact into symbolic verification code through the
/// code-generation oracle
pub struct SymbolicCodeGenerator {
    backend: Arc<dyn CompletionBackend>,
    system_template: String,
    user_template: String,
    repair_template: String,
    repair_temperature: f32,
    strict_code_fences: bool,
}

impl SymbolicCodeGenerator {
    pub fn new(backend: Arc<dyn CompletionBackend>, config: &VerifierConfig) -> Result<Self, OracleError> {
        let template = |name: &str| {
            config
                .get_template(name)
                .ok_or_else(|| OracleError::Template(format!("Template not found: {}", name)))
        };

        Ok(Self {
            backend,
            system_template: template("codegen_system")?,
            user_template: template("codegen_user")?,
            repair_template: template("codegen_repair")?,
            repair_temperature: config.verification.repair_temperature,
            strict_code_fences: config.verification.strict_code_fences,
        })
    }

    /// Generate verification code for `artifact`
    pub async fn generate(&self, artifact: &ReasoningArtifact) -> Result<GeneratedCode, GenerationError> {
        let user = render_template(
            &self.user_template,
            &[
                ("problem", &artifact.original_problem),
                ("solution", &artifact.worked_solution),
                ("final_answer", &artifact.final_answer),
            ]
        );

        info!("Generating verification code");
        self.call(vec![ChatMessage::system(&self.system_template), ChatMessage::user(user)], None, "codegen_user").await
    }

    /// Ask for a corrected version of `failed_code`. Same system contract,
    /// replacement user turn.
    pub async fn repair(
        &self,
        failed_code: &str,
        error_description: &str
    ) -> Result<GeneratedCode, GenerationError> {
        let user = render_template(
            &self.repair_template,
            &[
                ("error", error_description),
                ("code", failed_code),
            ]
        );

        info!("Requesting code repair");
        self.call(
            vec![ChatMessage::system(&self.system_template), ChatMessage::user(user)],
            Some(self.repair_temperature),
            "codegen_repair"
        ).await
    }

    async fn call(
        &self,
        messages: Vec<ChatMessage>,
        temperature: Option<f32>,
        prompt_name: &str
    ) -> Result<GeneratedCode, GenerationError> {
        let request = CompletionRequest {
            task: CODEGEN_TASK.to_string(),
            messages,
            temperature,
        };

        let completion = self.backend.complete(&request).await.map_err(|e| {
            warn!("Code generation call failed: {}", e);
            GenerationError::Oracle(e)
        })?;

        let source_code = extract_code(&completion.content, self.strict_code_fences).ok_or_else(|| {
            warn!("Oracle response contained no extractable code ({} characters)", completion.content.len());
            GenerationError::NoCodeBlock
        })?;

        let mut metadata = HashMap::new();
        metadata.insert("model_used".to_string(), Value::String(completion.model));
        metadata.insert(
            "latency_ms".to_string(),
            Value::from(completion.latency.as_millis() as u64)
        );
        metadata.insert("prompt".to_string(), Value::String(prompt_name.to_string()));
        metadata.insert("repair".to_string(), Value::Bool(temperature.is_some()));

        Ok(GeneratedCode { source_code, metadata })
    }
}
