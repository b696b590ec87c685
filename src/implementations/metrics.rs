use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;

use crate::traits::metrics::MetricsCollector;

/// Discards every record
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsCollector for NoopMetrics {
    fn record_call(&self, _task: &str, _latency: Duration, _success: bool) {}
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct TaskStats {
    pub calls: u64,
    pub successes: u64,
    pub failures: u64,
    pub total_latency_ms: u128,
}

impl TaskStats {
    pub fn mean_latency_ms(&self) -> f64 {
        if self.calls == 0 {
            0.0
        } else {
            (self.total_latency_ms as f64) / (self.calls as f64)
        }
    }
}

/// In-memory per-task call statistics
#[derive(Debug, Default)]
pub struct CallStats {
    tasks: Mutex<HashMap<String, TaskStats>>,
}

impl CallStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, task: &str) -> Option<TaskStats> {
        self.tasks.lock().ok()?.get(task).cloned()
    }

    pub fn snapshot(&self) -> HashMap<String, TaskStats> {
        self.tasks
            .lock()
            .map(|tasks| tasks.clone())
            .unwrap_or_default()
    }
}

impl MetricsCollector for CallStats {
    fn record_call(&self, task: &str, latency: Duration, success: bool) {
        // A poisoned lock only loses statistics
        let Ok(mut tasks) = self.tasks.lock() else {
            return;
        };
        let stats = tasks.entry(task.to_string()).or_default();
        stats.calls += 1;
        if success {
            stats.successes += 1;
        } else {
            stats.failures += 1;
        }
        stats.total_latency_ms += latency.as_millis();
    }
}
