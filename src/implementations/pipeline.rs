use std::collections::HashMap;
use std::sync::Arc;
use std::time::{ Duration, Instant };

use chrono::Utc;
use log::{ info, warn };
use serde_json::Value;

use crate::config::VerifierConfig;
use crate::errors::OracleError;
use crate::implementations::code_generator::SymbolicCodeGenerator;
use crate::implementations::contract_parser::ContractParser;
use crate::models::execution::ExecutionOutcome;
use crate::models::reasoning::ReasoningArtifact;
use crate::models::repair::{ RepairAttempt, RepairKind };
use crate::models::verification::{
    ErrorKind,
    FinalVerdict,
    StepVerification,
    VerificationError,
    VerificationOutcome,
    VerificationStatus,
};
use crate::traits::executor::CodeExecutor;
use crate::traits::oracle::CompletionBackend;

/// Why a run could not be diagnosed: the generated program itself is broken
#[derive(Debug, Clone)]
struct CodegenFault {
    error: VerificationError,
    /// Text handed to the code repairer
    feedback: String,
}

/// A run that executed cleanly and honored the contract
struct CleanRun {
    execution: ExecutionOutcome,
    steps: Vec<StepVerification>,
    verdict: FinalVerdict,
}

/// Generate, execute, parse and diagnose one reasoning artifact.
///
/// Mechanical faults in the generated program get exactly one code repair.
/// Mathematical faults are reported as `FailedReasoning` and never repaired
/// here.
pub struct VerificationPipeline {
    generator: SymbolicCodeGenerator,
    executor: Arc<dyn CodeExecutor>,
    parser: ContractParser,
    timeout: Duration,
    memory_limit: u64,
}

impl VerificationPipeline {
    pub fn new(
        generator: SymbolicCodeGenerator,
        executor: Arc<dyn CodeExecutor>,
        timeout: Duration,
        memory_limit: u64
    ) -> Self {
        Self {
            generator,
            executor,
            parser: ContractParser::new(),
            timeout,
            memory_limit,
        }
    }

    /// Build a pipeline whose limits come from the sandbox section of `config`
    pub fn from_config(
        backend: Arc<dyn CompletionBackend>,
        executor: Arc<dyn CodeExecutor>,
        config: &VerifierConfig
    ) -> Result<Self, OracleError> {
        let generator = SymbolicCodeGenerator::new(backend, config)?;
        Ok(Self::new(generator, executor, config.sandbox.timeout(), config.sandbox.memory_limit_bytes()))
    }

    pub async fn verify(&self, artifact: &ReasoningArtifact) -> VerificationOutcome {
        info!("Starting verification pipeline");

        let generated = match self.generator.generate(artifact).await {
            Ok(generated) => generated,
            Err(e) => {
                warn!("Initial code generation failed: {}", e);
                return VerificationOutcome::pipeline_failure(
                    vec![
                        VerificationError::new(
                            ErrorKind::GenerationFault,
                            format!("Initial code generation failed: {}", e)
                        )
                    ]
                );
            }
        };
        info!("Code generated ({} characters), executing", generated.source_code.len());

        let execution = self.run(&generated.source_code).await;
        let fault = match self.inspect(execution) {
            Ok(run) => {
                return self.finish(generated.source_code, run, generated.metadata, None);
            }
            Err(fault) => fault,
        };

        info!("Diagnosed as codegen fault ({}), attempting repair", fault.error.kind);
        self.repair(&generated.source_code, fault, generated.metadata).await
    }

    /// The single code repair: regenerate from the failure text, run once more
    async fn repair(
        &self,
        failed_code: &str,
        fault: CodegenFault,
        mut metadata: HashMap<String, Value>
    ) -> VerificationOutcome {
        let started_at = Utc::now();
        let started = Instant::now();

        let repaired = match self.generator.repair(failed_code, &fault.feedback).await {
            Ok(repaired) => repaired,
            Err(e) => {
                warn!("Codegen fault repair failed: {}", e);
                return VerificationOutcome::pipeline_failure(
                    vec![
                        fault.error,
                        VerificationError::new(
                            ErrorKind::GenerationFault,
                            format!("Codegen fault repair failed: {}", e)
                        )
                    ]
                );
            }
        };

        let execution = self.run(&repaired.source_code).await;
        match self.inspect(execution) {
            Ok(run) => {
                info!("Repaired code ran cleanly");
                for (key, value) in repaired.metadata {
                    metadata.insert(format!("repair_{}", key), value);
                }
                let attempt = RepairAttempt {
                    attempt_number: 1,
                    kind: RepairKind::Codegen,
                    reason: format!("Codegen fault: {}", fault.error.kind),
                    succeeded: true,
                    duration: started.elapsed(),
                    error: None,
                    started_at,
                };
                self.finish(repaired.source_code, run, metadata, Some(attempt))
            }
            Err(second) => {
                warn!("Repaired code still failed ({}), giving up", second.error.kind);
                VerificationOutcome::pipeline_failure(vec![fault.error, second.error])
            }
        }
    }

    async fn run(&self, source_code: &str) -> ExecutionOutcome {
        self.executor.execute(source_code, self.timeout, self.memory_limit).await
    }

    /// Separate clean runs from codegen faults
    fn inspect(&self, execution: ExecutionOutcome) -> Result<CleanRun, CodegenFault> {
        if !execution.succeeded {
            let kind = ErrorKind::from_exception_kind(execution.exception_kind.as_deref());
            let message = execution.exception_message
                .clone()
                .unwrap_or_else(|| execution.error_description());
            warn!("Execution failed with {}: {}", kind, message);
            return Err(CodegenFault {
                error: VerificationError::new(kind, message),
                feedback: execution.error_description(),
            });
        }

        let parsed = self.parser.parse(&execution);
        if let Some(violation) = parsed.parse_error {
            let message = format!("Output parsing failed: {}", violation);
            return Err(CodegenFault {
                feedback: stderr_or(&execution, &message),
                error: VerificationError::new(ErrorKind::ContractViolation, message),
            });
        }

        let Some(verdict) = parsed.verdict else {
            let message = "Missing final_answer_verified JSON object in output.".to_string();
            warn!("{}", message);
            return Err(CodegenFault {
                feedback: stderr_or(&execution, &message),
                error: VerificationError::new(ErrorKind::IncompleteOutput, message),
            });
        };

        Ok(CleanRun { execution, steps: parsed.steps, verdict })
    }

    fn finish(
        &self,
        source_code: String,
        run: CleanRun,
        mut metadata: HashMap<String, Value>,
        codegen_repair: Option<RepairAttempt>
    ) -> VerificationOutcome {
        let CleanRun { execution, steps, verdict } = run;
        let all_steps_ok = steps.iter().all(|s| s.verified);

        let mut errors = Vec::new();
        let status = if all_steps_ok && verdict.answer_verified {
            info!("Verification successful");
            VerificationStatus::Verified
        } else {
            info!("Verification failed, diagnosed as reasoning fault");
            if let Some(step) = steps.iter().find(|s| !s.verified) {
                errors.push(
                    VerificationError::new(
                        ErrorKind::StepMismatch,
                        format!("Step {} failed verification: {}", step.step_number, step.description)
                    )
                );
            }
            if !verdict.answer_verified {
                errors.push(
                    VerificationError::new(
                        ErrorKind::AnswerMismatch,
                        format!(
                            "Final answer mismatch. Computed: {}, Claimed: {}",
                            verdict.computed_value.as_deref().unwrap_or("none"),
                            verdict.claimed_value.as_deref().unwrap_or("none")
                        )
                    )
                );
            }
            VerificationStatus::FailedReasoning
        };

        metadata.insert(
            "repaired_from_codegen_fault".to_string(),
            Value::Bool(codegen_repair.is_some())
        );
        metadata.insert(
            "execution_time_ms".to_string(),
            Value::from(execution.duration.as_millis() as u64)
        );

        VerificationOutcome {
            status,
            confidence: confidence_score(&steps, &verdict),
            source_code,
            execution: Some(execution),
            steps,
            verdict: Some(verdict),
            errors,
            codegen_repair,
            metadata,
        }
    }
}

/// Ranking score for a clean run: 0.5 base, up to 0.25 for the share of
/// verified steps (full share when there are none), 0.25 for a true verdict
pub fn confidence_score(steps: &[StepVerification], verdict: &FinalVerdict) -> f64 {
    let mut score = 0.5;

    if steps.is_empty() {
        score += 0.25;
    } else {
        let verified = steps.iter().filter(|s| s.verified).count();
        score += ((verified as f64) / (steps.len() as f64)) * 0.25;
    }

    if verdict.answer_verified {
        score += 0.25;
    }

    (score.clamp(0.0, 1.0) * 10_000.0).round() / 10_000.0
}

fn stderr_or(execution: &ExecutionOutcome, fallback: &str) -> String {
    if execution.stderr.trim().is_empty() {
        fallback.to_string()
    } else {
        format!("{}\n{}", fallback, execution.stderr)
    }
}
