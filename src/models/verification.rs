use std::collections::HashMap;
use std::fmt;
use serde::{ Deserialize, Serialize };

use crate::models::execution::ExecutionOutcome;
use crate::models::repair::RepairAttempt;

/// One `{"step": .., "verified": ..}` record of the contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepVerification {
    pub step_number: i64,
    pub description: String,
    pub verified: bool,
}

/// The single `{"final_answer_verified": ..}` record of the contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalVerdict {
    pub answer_verified: bool,
    pub computed_value: Option<String>,
    pub claimed_value: Option<String>,
}

/// Fault taxonomy shared by the pipeline and the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    GenerationFault,
    SyntaxFault,
    ImportFault,
    RuntimeFault,
    TimeoutFault,
    MemoryFault,
    StepMismatch,
    AnswerMismatch,
    IncompleteOutput,
    ContractViolation,
    RepairExhausted,
}

impl ErrorKind {
    /// Map a sandbox `exception_kind` onto the taxonomy
    pub fn from_exception_kind(kind: Option<&str>) -> Self {
        match kind {
            Some("SyntaxFault") => ErrorKind::SyntaxFault,
            Some("ImportFault") => ErrorKind::ImportFault,
            Some("TimeoutFault") => ErrorKind::TimeoutFault,
            Some("MemoryFault") => ErrorKind::MemoryFault,
            _ => ErrorKind::RuntimeFault,
        }
    }

    /// Faults in the mechanics of the generated program
    pub fn is_codegen_fault(&self) -> bool {
        matches!(
            self,
            ErrorKind::GenerationFault |
                ErrorKind::SyntaxFault |
                ErrorKind::ImportFault |
                ErrorKind::RuntimeFault |
                ErrorKind::TimeoutFault |
                ErrorKind::MemoryFault |
                ErrorKind::IncompleteOutput |
                ErrorKind::ContractViolation
        )
    }

    /// Faults in the mathematics being verified
    pub fn is_reasoning_fault(&self) -> bool {
        matches!(self, ErrorKind::StepMismatch | ErrorKind::AnswerMismatch)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationError {
    pub kind: ErrorKind,
    pub message: String,
}

impl VerificationError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }
}

/// Status of a verification attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Verified, // Steps and final answer all proven
    FailedReasoning, // Code ran cleanly and proved the math wrong
    FailedCodegen, // Reserved for consumers that separate codegen from pipeline faults
    FailedPipeline, // Code could not be generated or repaired
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationStatus::Verified => write!(f, "verified"),
            VerificationStatus::FailedReasoning => write!(f, "failed_reasoning"),
            VerificationStatus::FailedCodegen => write!(f, "failed_codegen"),
            VerificationStatus::FailedPipeline => write!(f, "failed_pipeline"),
        }
    }
}

/// Terminal artifact of one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    pub status: VerificationStatus,
    pub confidence: f64,
    pub source_code: String,
    pub execution: Option<ExecutionOutcome>,
    pub steps: Vec<StepVerification>,
    pub verdict: Option<FinalVerdict>,
    pub errors: Vec<VerificationError>,
    /// The pipeline's single code repair, when it led to a diagnosed run
    pub codegen_repair: Option<RepairAttempt>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl VerificationOutcome {
    /// Outcome for an unrecoverable pipeline failure; only `errors` is populated
    pub fn pipeline_failure(errors: Vec<VerificationError>) -> Self {
        Self {
            status: VerificationStatus::FailedPipeline,
            confidence: 0.0,
            source_code: String::new(),
            execution: None,
            steps: Vec::new(),
            verdict: None,
            errors,
            codegen_repair: None,
            metadata: HashMap::new(),
        }
    }

    pub fn is_verified(&self) -> bool {
        self.status == VerificationStatus::Verified
    }

    pub fn failed_steps(&self) -> impl Iterator<Item = &StepVerification> {
        self.steps.iter().filter(|s| !s.verified)
    }
}
