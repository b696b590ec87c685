pub mod executor;
pub mod oracle;
pub mod metrics;

// Re-export traits
pub use executor::CodeExecutor;
pub use oracle::{
    ChatMessage,
    Completion,
    CompletionBackend,
    CompletionRequest,
    ReasoningOracle,
    Role,
};
pub use metrics::MetricsCollector;
