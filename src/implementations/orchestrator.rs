use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use log::{ info, warn };
use serde_json::Value;

use crate::implementations::pipeline::VerificationPipeline;
use crate::models::reasoning::ReasoningArtifact;
use crate::models::repair::{ RepairAttempt, RepairKind };
use crate::models::verification::{
    ErrorKind,
    VerificationError,
    VerificationOutcome,
    VerificationStatus,
};
use crate::traits::oracle::ReasoningOracle;

/// Runs the pipeline and, while the math keeps failing, asks the reasoning
/// oracle for a corrected solution up to a caller-supplied budget
pub struct VerificationOrchestrator {
    pipeline: VerificationPipeline,
    reasoning_oracle: Arc<dyn ReasoningOracle>,
}

impl VerificationOrchestrator {
    pub fn new(pipeline: VerificationPipeline, reasoning_oracle: Arc<dyn ReasoningOracle>) -> Self {
        Self { pipeline, reasoning_oracle }
    }

    pub fn pipeline(&self) -> &VerificationPipeline {
        &self.pipeline
    }

    pub async fn verify_with_repair(
        &self,
        artifact: &ReasoningArtifact,
        max_reasoning_attempts: u32
    ) -> (VerificationOutcome, Vec<RepairAttempt>) {
        self.verify_with_repair_cancellable(artifact, max_reasoning_attempts, std::future::pending()).await
    }

    /// Like [`verify_with_repair`](Self::verify_with_repair), bounded by an overall deadline
    pub async fn verify_with_repair_until(
        &self,
        artifact: &ReasoningArtifact,
        max_reasoning_attempts: u32,
        deadline: tokio::time::Instant
    ) -> (VerificationOutcome, Vec<RepairAttempt>) {
        self.verify_with_repair_cancellable(
            artifact,
            max_reasoning_attempts,
            tokio::time::sleep_until(deadline)
        ).await
    }

    /// Verify, stopping as soon as `cancel` resolves.
    ///
    /// Every pipeline run and oracle call is raced against `cancel`. The
    /// losing future is dropped, which kills any sandbox process it owns.
    pub async fn verify_with_repair_cancellable<C>(
        &self,
        artifact: &ReasoningArtifact,
        max_reasoning_attempts: u32,
        cancel: C
    ) -> (VerificationOutcome, Vec<RepairAttempt>)
        where C: Future<Output = ()>
    {
        tokio::pin!(cancel);

        let mut history: Vec<RepairAttempt> = Vec::new();
        let mut current = artifact.clone();
        let mut last: Option<VerificationOutcome> = None;
        let mut attempt = 0u32;

        loop {
            let outcome =
                tokio::select! {
                biased;
                _ = &mut cancel => return cancelled(last, history),
                outcome = self.pipeline.verify(&current) => outcome,
            };

            match outcome.status {
                VerificationStatus::Verified => {
                    info!("Verification successful after {} reasoning repair(s)", attempt);
                    return (outcome, history);
                }
                VerificationStatus::FailedReasoning => {}
                status => {
                    info!("Halting repair loop due to non-reasoning status: {}", status);
                    return (outcome, history);
                }
            }

            if attempt >= max_reasoning_attempts {
                return (exhausted(outcome, max_reasoning_attempts), history);
            }

            attempt += 1;
            info!("Reasoning repair attempt {}/{}", attempt, max_reasoning_attempts);

            let feedback = build_repair_feedback(&outcome);
            let started_at = Utc::now();
            let started = Instant::now();
            let repaired =
                tokio::select! {
                biased;
                _ = &mut cancel => return cancelled(Some(outcome), history),
                repaired = self.reasoning_oracle.generate_reasoning_repair(
                    &current.original_problem,
                    &current.worked_solution,
                    &feedback
                ) => repaired,
            };

            history.push(RepairAttempt {
                attempt_number: attempt,
                kind: RepairKind::Reasoning,
                reason: format!("Reasoning verification failed with status: {}", outcome.status),
                succeeded: repaired.is_ok(),
                duration: started.elapsed(),
                error: repaired.as_ref().err().map(|e| e.to_string()),
                started_at,
            });

            match repaired {
                Ok(mut next) => {
                    next.metadata
                        .entry("original_failure".to_string())
                        .or_insert_with(|| Value::String(outcome.status.to_string()));
                    current = next;
                    last = Some(outcome);
                }
                Err(e) => {
                    warn!("Reasoning repair failed to produce a new solution, halting: {}", e);
                    return (outcome, history);
                }
            }
        }
    }
}

/// Feedback for the reasoning oracle: one line per error, then the disproved steps
pub fn build_repair_feedback(outcome: &VerificationOutcome) -> String {
    let mut parts: Vec<String> = outcome.errors
        .iter()
        .map(|e| format!("- {}", e.message))
        .collect();

    let failed: Vec<_> = outcome.failed_steps().collect();
    if !failed.is_empty() {
        parts.push("\nThe following steps were proven incorrect:".to_string());
        for step in failed {
            parts.push(format!("  - Step {}: {}", step.step_number, step.description));
        }
    }

    parts.join("\n")
}

fn exhausted(mut outcome: VerificationOutcome, budget: u32) -> VerificationOutcome {
    if budget > 0 {
        info!("Max reasoning repair attempts reached");
        outcome.errors.push(
            VerificationError::new(
                ErrorKind::RepairExhausted,
                format!("Reasoning still fails after {} repair attempt(s)", budget)
            )
        );
    }
    outcome
}

fn cancelled(
    last: Option<VerificationOutcome>,
    history: Vec<RepairAttempt>
) -> (VerificationOutcome, Vec<RepairAttempt>) {
    warn!("Verification cancelled after {} repair attempt(s)", history.len());
    let outcome = match last {
        Some(mut outcome) if outcome.status != VerificationStatus::FailedPipeline => {
            outcome.metadata.insert("cancelled".to_string(), Value::Bool(true));
            outcome
        }
        Some(outcome) => outcome,
        None =>
            VerificationOutcome::pipeline_failure(
                vec![VerificationError::new(ErrorKind::TimeoutFault, "deadline exceeded")]
            ),
    };
    (outcome, history)
}
