pub mod sandbox;
pub mod contract_parser;
pub mod code_generator;
pub mod reasoning_parser;
pub mod reasoning_repairer;
pub mod llm_client;
pub mod metrics;
pub mod pipeline;
pub mod orchestrator;

pub use sandbox::SandboxExecutor;
pub use contract_parser::{ ContractParser, ContractViolation, ParsedContract };
pub use code_generator::{ GeneratedCode, SymbolicCodeGenerator };
pub use reasoning_parser::{ parse_reasoning_response, ParsedReasoning };
pub use reasoning_repairer::LlmReasoningRepairer;
pub use llm_client::HttpCompletionClient;
pub use metrics::{ CallStats, NoopMetrics, TaskStats };
pub use pipeline::VerificationPipeline;
pub use orchestrator::VerificationOrchestrator;
