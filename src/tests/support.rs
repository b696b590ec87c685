//! Scripted stand-ins for the oracles and the sandbox.

use std::collections::VecDeque;
use std::sync::{ Arc, Mutex };
use std::time::Duration;

use async_trait::async_trait;
use log::info;

use crate::config::VerifierConfig;
use crate::errors::OracleError;
use crate::implementations::orchestrator::VerificationOrchestrator;
use crate::implementations::pipeline::VerificationPipeline;
use crate::models::execution::ExecutionOutcome;
use crate::models::reasoning::ReasoningArtifact;
use crate::traits::executor::CodeExecutor;
use crate::traits::oracle::{ Completion, CompletionBackend, CompletionRequest, ReasoningOracle };

pub const VERIFIED_STDOUT: &str =
    "{\"step\":1,\"description\":\"ok\",\"verified\":true}\n{\"final_answer_verified\":true,\"computed\":\"4\",\"claimed\":\"4\"}";
pub const REFUTED_STDOUT: &str = "{\"final_answer_verified\":false,\"computed\":\"5\",\"claimed\":\"4\"}";

pub const SCRIPT: &str = "import json\nprint(json.dumps({\"final_answer_verified\": True}))";
pub const REPAIRED_SCRIPT: &str = "import json\n# repaired\nprint(json.dumps({\"final_answer_verified\": True}))";

// Initialize logging once for the whole test binary
pub fn setup() {
    if env_logger::builder().is_test(true).try_init().is_ok() {
        info!("Logger initialized");
    }
}

pub fn fenced(code: &str) -> String {
    format!("Here is the verification script:\n\n```python\n{}\n```\n", code)
}

pub fn clean(stdout: &str) -> ExecutionOutcome {
    ExecutionOutcome::success(stdout.to_string(), String::new(), Duration::from_millis(5))
}

pub fn fault(kind: &str, message: &str) -> ExecutionOutcome {
    ExecutionOutcome::failure(kind, message, Duration::from_millis(5))
}

pub fn sample_artifact() -> ReasoningArtifact {
    ReasoningArtifact::new("What is 2 + 2?", "Adding 2 and 2 gives 5.", "5")
}

/// Completion backend that replays queued responses in order
#[derive(Default)]
pub struct ScriptedBackend {
    responses: Mutex<VecDeque<Result<String, OracleError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedBackend {
    pub fn new(responses: Vec<Result<String, OracleError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn replying(contents: &[&str]) -> Arc<Self> {
        Self::new(
            contents
                .iter()
                .map(|c| Ok(c.to_string()))
                .collect()
        )
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, OracleError> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some(Ok(content)) =>
                Ok(Completion {
                    content,
                    model: "scripted".to_string(),
                    latency: Duration::from_millis(1),
                }),
            Some(Err(e)) => Err(e),
            None => Err(OracleError::Api("no scripted response left".to_string())),
        }
    }
}

/// Executor that replays queued outcomes and records the code it was given
#[derive(Default)]
pub struct ScriptedExecutor {
    outcomes: Mutex<VecDeque<ExecutionOutcome>>,
    sources: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl ScriptedExecutor {
    pub fn new(outcomes: Vec<ExecutionOutcome>) -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(outcomes.into()),
            sources: Mutex::new(Vec::new()),
            delay: None,
        })
    }

    /// Every call takes `delay` before returning
    pub fn slow(outcomes: Vec<ExecutionOutcome>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(outcomes.into()),
            sources: Mutex::new(Vec::new()),
            delay: Some(delay),
        })
    }

    pub fn sources(&self) -> Vec<String> {
        self.sources.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.sources.lock().unwrap().len()
    }
}

#[async_trait]
impl CodeExecutor for ScriptedExecutor {
    async fn execute(&self, source_code: &str, _timeout: Duration, _memory_limit: u64) -> ExecutionOutcome {
        self.sources.lock().unwrap().push(source_code.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.outcomes.lock().unwrap().pop_front();
        next.unwrap_or_else(|| fault("RuntimeFault", "no scripted outcome left"))
    }

    fn memory_limit_supported(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairCall {
    pub original_problem: String,
    pub failed_solution: String,
    pub feedback: String,
}

/// Reasoning oracle that replays queued artifacts; `hang` never answers
#[derive(Default)]
pub struct ScriptedOracle {
    replies: Mutex<VecDeque<Result<ReasoningArtifact, OracleError>>>,
    calls: Mutex<Vec<RepairCall>>,
    hang: bool,
}

impl ScriptedOracle {
    pub fn new(replies: Vec<Result<ReasoningArtifact, OracleError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
            hang: false,
        })
    }

    pub fn hanging() -> Arc<Self> {
        Arc::new(Self { hang: true, ..Self::default() })
    }

    pub fn calls(&self) -> Vec<RepairCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReasoningOracle for ScriptedOracle {
    async fn generate_reasoning_repair(
        &self,
        original_problem: &str,
        failed_solution: &str,
        feedback: &str
    ) -> Result<ReasoningArtifact, OracleError> {
        self.calls.lock().unwrap().push(RepairCall {
            original_problem: original_problem.to_string(),
            failed_solution: failed_solution.to_string(),
            feedback: feedback.to_string(),
        });
        if self.hang {
            std::future::pending::<()>().await;
        }
        let next = self.replies.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(OracleError::Unusable("no scripted reply left".to_string())))
    }
}

pub fn pipeline(backend: &Arc<ScriptedBackend>, executor: &Arc<ScriptedExecutor>) -> VerificationPipeline {
    let config = VerifierConfig::default();
    VerificationPipeline::from_config(backend.clone(), executor.clone(), &config).unwrap()
}

pub fn orchestrator(
    backend: &Arc<ScriptedBackend>,
    executor: &Arc<ScriptedExecutor>,
    oracle: &Arc<ScriptedOracle>
) -> VerificationOrchestrator {
    VerificationOrchestrator::new(pipeline(backend, executor), oracle.clone())
}
