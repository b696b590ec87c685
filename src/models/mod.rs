pub mod reasoning;
pub mod execution;
pub mod verification;
pub mod repair;

// Re-export common model types
pub use reasoning::ReasoningArtifact;
pub use execution::ExecutionOutcome;
pub use verification::{
    ErrorKind,
    FinalVerdict,
    StepVerification,
    VerificationError,
    VerificationOutcome,
    VerificationStatus,
};
pub use repair::{ RepairAttempt, RepairKind };
