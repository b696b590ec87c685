use anyhow::{ anyhow, Context, Result };
use log::info;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use mathverify::config::VerifierConfig;
use mathverify::implementations::{
    parse_reasoning_response,
    CallStats,
    HttpCompletionClient,
    LlmReasoningRepairer,
    SandboxExecutor,
    VerificationOrchestrator,
    VerificationPipeline,
};
use mathverify::models::ReasoningArtifact;
use mathverify::traits::{ CodeExecutor, CompletionBackend, ReasoningOracle };

use crate::cli::ui;

/// Where the artifact to verify comes from
pub enum ArtifactSource<'a> {
    Json(&'a Path),
    Files {
        problem: &'a Path,
        solution: &'a Path,
    },
}

pub async fn execute(
    config: &VerifierConfig,
    source: ArtifactSource<'_>,
    max_attempts: Option<u32>,
    deadline_secs: Option<u64>,
    json_output: bool
) -> Result<()> {
    let artifact = load_artifact(source)?;
    let max_attempts = max_attempts.unwrap_or(config.verification.max_reasoning_attempts);

    let stats = Arc::new(CallStats::new());
    let backend: Arc<dyn CompletionBackend> = Arc::new(
        HttpCompletionClient::new(config.llm.clone(), stats.clone())?
    );
    let executor: Arc<dyn CodeExecutor> = Arc::new(SandboxExecutor::new(config.sandbox.clone()));
    let pipeline = VerificationPipeline::from_config(backend.clone(), executor, config)?;
    let repairer: Arc<dyn ReasoningOracle> = Arc::new(LlmReasoningRepairer::new(backend, config)?);
    let orchestrator = VerificationOrchestrator::new(pipeline, repairer);

    info!("Verifying with a reasoning repair budget of {}", max_attempts);
    let spinner = if json_output { None } else { Some(ui::spinner_with_message("Verifying solution...")) };

    let (outcome, history) = match deadline_secs {
        Some(secs) => {
            let deadline = tokio::time::Instant::now() + Duration::from_secs(secs);
            orchestrator.verify_with_repair_until(&artifact, max_attempts, deadline).await
        }
        None => orchestrator.verify_with_repair(&artifact, max_attempts).await,
    };

    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    if json_output {
        let report =
            serde_json::json!({
            "outcome": outcome,
            "repair_history": history,
            "llm_calls": stats.snapshot(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    ui::print_header("Verification");
    ui::print_verification_status(outcome.status, outcome.confidence);
    if let Some(verdict) = &outcome.verdict {
        ui::print_result("Computed", verdict.computed_value.as_deref().unwrap_or("-"));
        ui::print_result("Claimed", verdict.claimed_value.as_deref().unwrap_or("-"));
    }

    ui::print_header("Steps");
    ui::print_steps(&outcome.steps);

    if !outcome.errors.is_empty() {
        ui::print_header("Errors");
        ui::print_errors(&outcome.errors);
    }

    if let Some(repair) = &outcome.codegen_repair {
        ui::print_header("Code Repair");
        ui::print_repair_history(std::slice::from_ref(repair));
    }

    ui::print_header("Reasoning Repairs");
    ui::print_repair_history(&history);

    if !outcome.source_code.is_empty() {
        ui::print_header("Verification Code");
        ui::print_code(&outcome.source_code);
    }

    for (task, task_stats) in stats.snapshot() {
        ui::print_result(
            &format!("LLM calls ({})", task),
            &format!(
                "{} ({} failed, mean {:.0} ms)",
                task_stats.calls,
                task_stats.failures,
                task_stats.mean_latency_ms()
            )
        );
    }

    Ok(())
}

fn load_artifact(source: ArtifactSource<'_>) -> Result<ReasoningArtifact> {
    match source {
        ArtifactSource::Json(path) => {
            let contents = fs
                ::read_to_string(path)
                .with_context(|| format!("Failed to read artifact file {}", path.display()))?;
            serde_json
                ::from_str(&contents)
                .map_err(|e| anyhow!("Invalid artifact {}: {}", path.display(), e))
        }
        ArtifactSource::Files { problem, solution } => {
            let problem = fs
                ::read_to_string(problem)
                .with_context(|| format!("Failed to read problem file {}", problem.display()))?;
            let response = fs
                ::read_to_string(solution)
                .with_context(|| format!("Failed to read solution file {}", solution.display()))?;

            let parsed = parse_reasoning_response(&response);
            let mut artifact = ReasoningArtifact::new(
                problem.trim(),
                parsed.worked_solution,
                parsed.final_answer
            );
            artifact.internal_reasoning = parsed.internal_reasoning;
            Ok(artifact)
        }
    }
}
