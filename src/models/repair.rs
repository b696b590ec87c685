use std::time::Duration;
use chrono::{ DateTime, Utc };
use serde::{ Deserialize, Serialize };

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairKind {
    Reasoning,
    Codegen,
}

/// One entry of the append-only repair log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairAttempt {
    pub attempt_number: u32,
    pub kind: RepairKind,
    pub reason: String,
    pub succeeded: bool,
    pub duration: Duration,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
}
