pub mod models;
pub mod traits;
pub mod errors;
pub mod config;
pub mod implementations;
#[cfg(test)]
pub mod tests;

// Re-export core components
pub use config::{ ApiConfig, Provider, SandboxConfig, VerificationConfig, VerifierConfig };
pub use errors::{ GenerationError, OracleError };
pub use implementations::{
    sandbox::{ EnvironmentReport, SandboxExecutor },
    contract_parser::{ ContractParser, ParsedContract },
    code_generator::SymbolicCodeGenerator,
    reasoning_parser::parse_reasoning_response,
    reasoning_repairer::LlmReasoningRepairer,
    llm_client::HttpCompletionClient,
    metrics::{ CallStats, NoopMetrics },
    pipeline::VerificationPipeline,
    orchestrator::VerificationOrchestrator,
};
pub use models::{
    reasoning::ReasoningArtifact,
    execution::ExecutionOutcome,
    verification::{
        ErrorKind,
        FinalVerdict,
        StepVerification,
        VerificationError,
        VerificationOutcome,
        VerificationStatus,
    },
    repair::{ RepairAttempt, RepairKind },
};
pub use traits::{ CodeExecutor, CompletionBackend, MetricsCollector, ReasoningOracle };
