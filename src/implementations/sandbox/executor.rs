use std::path::Path;
use std::process::{ ExitStatus, Stdio };
use std::time::{ Duration, Instant };

use async_trait::async_trait;
use log::{ debug, info, warn };
use serde::Deserialize;
use thiserror::Error;
use tokio::io::{ AsyncRead, AsyncReadExt };
use tokio::process::Command;
use tokio::task::JoinHandle;

use crate::config::SandboxConfig;
use crate::implementations::sandbox::containment;
use crate::implementations::sandbox::harness::{ render_harness, REPORTED_KINDS };
use crate::implementations::sandbox::limits::{
    ProcessGroupGuard,
    ResourceLimits,
    MEMORY_LIMIT_SUPPORTED,
};
use crate::models::execution::{
    ExecutionOutcome,
    MEMORY_FAULT,
    RUNTIME_FAULT,
    TIMEOUT_FAULT,
};
use crate::traits::executor::CodeExecutor;

/// How long to wait for the output pipes to close after the child is gone
const PIPE_DRAIN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
enum SandboxFault {
    #[error("failed to prepare sandbox workspace: {0}")]
    Workspace(#[from] std::io::Error),

    #[error("failed to start interpreter {interpreter}: {source}")]
    Spawn {
        interpreter: String,
        source: std::io::Error,
    },

    #[error("failed to wait for interpreter: {0}")]
    Wait(std::io::Error),
}

/// Fault file written by the harness
#[derive(Debug, Deserialize)]
struct FaultReport {
    kind: String,
    #[serde(rename = "type")]
    exception_type: String,
    message: String,
    trace: String,
}

#[derive(Debug, Default)]
struct CapturedStream {
    bytes: Vec<u8>,
    truncated: bool,
}

/// Executes verification code in a fresh interpreter process per call.
///
/// Each call gets its own temporary workspace, a cleared environment, its
/// own process group and rlimits applied before exec. Nothing is shared
/// between calls, so one executor can serve concurrent requests.
pub struct SandboxExecutor {
    config: SandboxConfig,
    harness: String,
}

impl SandboxExecutor {
    pub fn new(config: SandboxConfig) -> Self {
        if !MEMORY_LIMIT_SUPPORTED {
            warn!(
                "Memory limits cannot be enforced on this platform - verification code runs without an address-space ceiling"
            );
        }

        let harness = render_harness(&config.allowed_modules, &config.allowed_builtins);
        Self { config, harness }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Whether executions started now get private namespaces
    pub fn namespace_isolation(&self) -> bool {
        self.config.isolate_namespaces && containment::namespaces_available()
    }

    async fn run(
        &self,
        source_code: &str,
        timeout: Duration,
        memory_limit: u64,
        start: Instant
    ) -> Result<ExecutionOutcome, SandboxFault> {
        // Dropped at the end of the call, taking every file with it
        let workspace = tempfile::Builder::new().prefix("mathverify-").tempdir()?;
        let harness_path = workspace.path().join("harness.py");
        let source_path = workspace.path().join("solution.py");
        let fault_path = workspace.path().join("fault.json");

        tokio::fs::write(&harness_path, &self.harness).await?;
        tokio::fs::write(&source_path, source_code).await?;
        // The harness truncates this rather than creating it
        tokio::fs::write(&fault_path, b"").await?;

        let mut command = self.build_command(workspace.path(), &harness_path, &source_path, &fault_path);
        let namespace_isolated = apply_isolation(
            &mut command,
            ResourceLimits::for_execution(timeout, memory_limit),
            workspace.path(),
            self.namespace_isolation()
        )?;

        let mut child = command.spawn().map_err(|source| SandboxFault::Spawn {
            interpreter: self.config.interpreter.display().to_string(),
            source,
        })?;
        let group = ProcessGroupGuard::new(child.id());
        debug!("Spawned sandbox process {:?} in {}", child.id(), workspace.path().display());

        let cap = self.config.max_output_bytes;
        let stdout_task = spawn_reader(child.stdout.take(), cap);
        let stderr_task = spawn_reader(child.stderr.take(), cap);

        let waited = tokio::time::timeout(timeout, child.wait()).await;
        let (status, timed_out) = match waited {
            Ok(result) => (result.map_err(SandboxFault::Wait)?, false),
            Err(_) => {
                warn!("Sandbox execution exceeded {:?}, killing process group", timeout);
                group.kill();
                if let Err(e) = child.kill().await {
                    debug!("Child already exited while killing: {}", e);
                }
                (child.wait().await.map_err(SandboxFault::Wait)?, true)
            }
        };

        // Reap anything the program left behind in its group
        group.kill();

        let stdout = join_reader(stdout_task).await;
        let stderr = join_reader(stderr_task).await;
        let report = read_fault_report(&fault_path).await;

        Ok(
            self.classify(
                status,
                timed_out,
                timeout,
                report,
                stdout,
                stderr,
                start.elapsed(),
                namespace_isolated
            )
        )
    }

    fn build_command(
        &self,
        workdir: &Path,
        harness_path: &Path,
        source_path: &Path,
        fault_path: &Path
    ) -> Command {
        let mut command = Command::new(&self.config.interpreter);
        command
            .args(&self.config.interpreter_args)
            .arg(harness_path)
            .arg(source_path)
            .arg(fault_path)
            .current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Hermetic environment: only what the interpreter needs to start
        command.env_clear();
        command.env("PATH", std::env::var("PATH").unwrap_or_default());
        command.env("HOME", workdir);
        command.env("LANG", "C.UTF-8");
        command.env("PYTHONHASHSEED", "0");
        command.env("PYTHONDONTWRITEBYTECODE", "1");
        command.env("OMP_NUM_THREADS", "1");
        command
    }

    #[allow(clippy::too_many_arguments)]
    fn classify(
        &self,
        status: ExitStatus,
        timed_out: bool,
        timeout: Duration,
        report: Option<FaultReport>,
        stdout: CapturedStream,
        stderr: CapturedStream,
        duration: Duration,
        namespace_isolated: bool
    ) -> ExecutionOutcome {
        let output_truncated = stdout.truncated || stderr.truncated;
        let stdout_text = String::from_utf8_lossy(&stdout.bytes).into_owned();
        let mut stderr_text = String::from_utf8_lossy(&stderr.bytes).into_owned();
        if output_truncated {
            warn!("Sandbox output exceeded {} bytes and was truncated", self.config.max_output_bytes);
            stderr_text.push_str(
                &format!("\n[output truncated at {} bytes]", self.config.max_output_bytes)
            );
        }

        let mut outcome = if timed_out {
            let mut outcome = ExecutionOutcome::failure(
                TIMEOUT_FAULT,
                format!("Execution exceeded the time limit of {:.1}s", timeout.as_secs_f64()),
                duration
            );
            outcome.exit_code = status.code();
            outcome
        } else if let Some(report) = report {
            let kind = if REPORTED_KINDS.contains(&report.kind.as_str()) {
                report.kind
            } else {
                RUNTIME_FAULT.to_string()
            };
            let mut outcome = ExecutionOutcome::failure(
                &kind,
                format!("{}: {}", report.exception_type, report.message),
                duration
            );
            outcome.exception_trace = Some(report.trace);
            outcome.exit_code = status.code();
            outcome
        } else if status.success() {
            ExecutionOutcome::success(String::new(), String::new(), duration)
        } else {
            let (kind, message) = classify_abnormal_exit(status, &stderr_text);
            let mut outcome = ExecutionOutcome::failure(kind, message, duration);
            outcome.exit_code = status.code();
            outcome
        };

        outcome.stdout = stdout_text;
        outcome.stderr = stderr_text;
        outcome.memory_limit_enforced = MEMORY_LIMIT_SUPPORTED;
        outcome.namespace_isolated = namespace_isolated;
        outcome.output_truncated = output_truncated;

        info!(
            "Sandbox run finished in {:?}: succeeded={}, kind={:?}, namespaces={}",
            outcome.duration,
            outcome.succeeded,
            outcome.exception_kind,
            outcome.namespace_isolated
        );
        outcome
    }
}

#[async_trait]
impl CodeExecutor for SandboxExecutor {
    async fn execute(
        &self,
        source_code: &str,
        timeout: Duration,
        memory_limit: u64
    ) -> ExecutionOutcome {
        let start = Instant::now();
        match self.run(source_code, timeout, memory_limit, start).await {
            Ok(outcome) => outcome,
            Err(fault) => {
                warn!("Sandbox infrastructure failure: {}", fault);
                let mut outcome = ExecutionOutcome::failure(
                    RUNTIME_FAULT,
                    fault.to_string(),
                    start.elapsed()
                );
                outcome.memory_limit_enforced = MEMORY_LIMIT_SUPPORTED;
                outcome
            }
        }
    }

    fn memory_limit_supported(&self) -> bool {
        MEMORY_LIMIT_SUPPORTED
    }
}

/// Configure the child's pre-exec hook; returns whether it gets namespaces
#[cfg(target_os = "linux")]
fn apply_isolation(
    command: &mut Command,
    limits: ResourceLimits,
    workspace: &Path,
    isolate: bool
) -> std::io::Result<bool> {
    let contained = containment::for_workspace(workspace, isolate)?;
    let isolated = contained.is_some();
    command.process_group(0);
    unsafe {
        command.pre_exec(move || {
            if let Some(contained) = &contained {
                contained.enter()?;
            }
            containment::set_no_new_privs()?;
            limits.apply()
        });
    }
    Ok(isolated)
}

#[cfg(all(unix, not(target_os = "linux")))]
fn apply_isolation(
    command: &mut Command,
    limits: ResourceLimits,
    _workspace: &Path,
    _isolate: bool
) -> std::io::Result<bool> {
    command.process_group(0);
    unsafe {
        command.pre_exec(move || limits.apply());
    }
    Ok(false)
}

#[cfg(not(unix))]
fn apply_isolation(
    _command: &mut Command,
    _limits: ResourceLimits,
    _workspace: &Path,
    _isolate: bool
) -> std::io::Result<bool> {
    Ok(false)
}

/// Child died without a harness report: interpreter crash, signal or rlimit
fn classify_abnormal_exit(status: ExitStatus, stderr: &str) -> (&'static str, String) {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;

        if let Some(signal) = status.signal() {
            if signal == libc::SIGXCPU {
                return (TIMEOUT_FAULT, "CPU time limit exceeded".to_string());
            }
            if signal == libc::SIGKILL {
                return (
                    RUNTIME_FAULT,
                    "Process was killed (SIGKILL), possibly by the memory limit".to_string(),
                );
            }
            return (RUNTIME_FAULT, format!("Process terminated by signal {}", signal));
        }
    }

    // Allocation failures while the interpreter boots never reach the harness
    if stderr.contains("MemoryError") || stderr.contains("Cannot allocate memory") {
        return (MEMORY_FAULT, "Interpreter ran out of memory".to_string());
    }

    match status.code() {
        Some(code) => (RUNTIME_FAULT, format!("Interpreter exited with status {}", code)),
        None => (RUNTIME_FAULT, "Interpreter terminated abnormally".to_string()),
    }
}

fn spawn_reader<R>(stream: Option<R>, cap: usize) -> Option<JoinHandle<std::io::Result<CapturedStream>>>
    where R: AsyncRead + Unpin + Send + 'static
{
    stream.map(|reader| tokio::spawn(read_capped(reader, cap)))
}

/// Keep at most `cap` bytes, but keep draining so the child never blocks on a full pipe
async fn read_capped<R: AsyncRead + Unpin>(
    mut reader: R,
    cap: usize
) -> std::io::Result<CapturedStream> {
    let mut captured = CapturedStream::default();
    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        let room = cap.saturating_sub(captured.bytes.len());
        captured.bytes.extend_from_slice(&buf[..n.min(room)]);
        if n > room {
            captured.truncated = true;
        }
    }
    Ok(captured)
}

async fn join_reader(task: Option<JoinHandle<std::io::Result<CapturedStream>>>) -> CapturedStream {
    let Some(mut task) = task else {
        return CapturedStream::default();
    };

    match tokio::time::timeout(PIPE_DRAIN_GRACE, &mut task).await {
        Ok(Ok(Ok(captured))) => captured,
        Ok(Ok(Err(e))) => {
            warn!("Failed to read sandbox output: {}", e);
            CapturedStream::default()
        }
        Ok(Err(e)) => {
            warn!("Sandbox output reader panicked: {}", e);
            CapturedStream::default()
        }
        Err(_) => {
            warn!("Sandbox output pipe still open after the process exited");
            task.abort();
            CapturedStream::default()
        }
    }
}

async fn read_fault_report(path: &Path) -> Option<FaultReport> {
    let contents = tokio::fs::read_to_string(path).await.ok()?;
    if contents.trim().is_empty() {
        return None;
    }
    match serde_json::from_str(&contents) {
        Ok(report) => Some(report),
        Err(e) => {
            warn!("Ignoring unreadable fault report: {}", e);
            None
        }
    }
}
