use std::time::Duration;
use serde::{ Deserialize, Serialize };

/// Exception kinds reported by the sandbox
pub const SYNTAX_FAULT: &str = "SyntaxFault";
pub const IMPORT_FAULT: &str = "ImportFault";
pub const RUNTIME_FAULT: &str = "RuntimeFault";
pub const TIMEOUT_FAULT: &str = "TimeoutFault";
pub const MEMORY_FAULT: &str = "MemoryFault";

/// Result of one sandbox run. Created once, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub succeeded: bool,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
    pub exception_kind: Option<String>,
    pub exception_message: Option<String>,
    pub exception_trace: Option<String>,
    pub exit_code: Option<i32>,
    /// False when the platform could not apply the address-space ceiling
    pub memory_limit_enforced: bool,
    /// True when the run had private user, mount and network namespaces
    #[serde(default)]
    pub namespace_isolated: bool,
    pub output_truncated: bool,
}

impl ExecutionOutcome {
    pub fn success(stdout: String, stderr: String, duration: Duration) -> Self {
        Self {
            succeeded: true,
            stdout,
            stderr,
            duration,
            exception_kind: None,
            exception_message: None,
            exception_trace: None,
            exit_code: Some(0),
            memory_limit_enforced: true,
            namespace_isolated: false,
            output_truncated: false,
        }
    }

    pub fn failure(kind: &str, message: impl Into<String>, duration: Duration) -> Self {
        Self {
            succeeded: false,
            stdout: String::new(),
            stderr: String::new(),
            duration,
            exception_kind: Some(kind.to_string()),
            exception_message: Some(message.into()),
            exception_trace: None,
            exit_code: None,
            memory_limit_enforced: true,
            namespace_isolated: false,
            output_truncated: false,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.exception_kind.as_deref() == Some(TIMEOUT_FAULT)
    }

    /// Text handed to the code repairer: stderr first, then the exception summary
    pub fn error_description(&self) -> String {
        if !self.stderr.trim().is_empty() {
            return self.stderr.clone();
        }
        match (&self.exception_kind, &self.exception_message) {
            (Some(kind), Some(message)) => format!("{}: {}", kind, message),
            (Some(kind), None) => kind.clone(),
            _ => "Unknown execution error.".to_string(),
        }
    }
}
