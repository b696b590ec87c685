use std::time::Duration;
use async_trait::async_trait;

use crate::models::execution::ExecutionOutcome;

/// Runs generated verification code under hard resource bounds
#[async_trait]
pub trait CodeExecutor: Send + Sync {
    /// Execute `source_code`. Every failure mode is reported inside the
    /// returned outcome; this never errors and never outlives `timeout`
    /// by more than the kill-and-reap overhead.
    async fn execute(
        &self,
        source_code: &str,
        timeout: Duration,
        memory_limit: u64
    ) -> ExecutionOutcome;

    /// Whether the address-space ceiling is actually applied on this host
    fn memory_limit_supported(&self) -> bool;
}
