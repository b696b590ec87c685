use thiserror::Error;

use crate::config::ConfigError;

/// Faults raised by the external text-completion services
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP error: {status} - {message}")]
    Http { status: u16, message: String },

    #[error("Failed to parse API response: {0}")]
    Parse(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Unusable oracle output: {0}")]
    Unusable(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// The code-generation oracle produced nothing the sandbox can run
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("LLM call for code generation failed: {0}")]
    Oracle(#[from] OracleError),

    #[error("No valid code block found in the model's response")]
    NoCodeBlock,
}
