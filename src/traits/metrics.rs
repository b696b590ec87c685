use std::time::Duration;

/// Receives one record per oracle call
pub trait MetricsCollector: Send + Sync {
    fn record_call(&self, task: &str, latency: Duration, success: bool);
}
