use anyhow::{ Context, Result };
use std::fs;
use std::path::Path;
use std::time::Duration;

use mathverify::config::SandboxConfig;
use mathverify::implementations::{ ContractParser, SandboxExecutor };
use mathverify::traits::CodeExecutor;

use crate::cli::ui;

/// Run one script through the sandbox and show what the pipeline would see
pub async fn execute(
    sandbox: &SandboxConfig,
    code_path: &Path,
    timeout_secs: Option<u64>,
    memory_mb: Option<u64>,
    json_output: bool
) -> Result<()> {
    let code = fs
        ::read_to_string(code_path)
        .with_context(|| format!("Failed to read {}", code_path.display()))?;

    let timeout = Duration::from_secs(timeout_secs.unwrap_or(sandbox.timeout_secs));
    let memory_limit = memory_mb.map(|mb| mb * 1024 * 1024).unwrap_or(sandbox.memory_limit_bytes());

    let executor = SandboxExecutor::new(sandbox.clone());
    let outcome = executor.execute(&code, timeout, memory_limit).await;
    let parsed = ContractParser::new().parse(&outcome);

    if json_output {
        let report =
            serde_json::json!({
            "execution": outcome,
            "steps": parsed.steps,
            "verdict": parsed.verdict,
            "parse_error": parsed.parse_error.as_ref().map(|e| e.to_string()),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    ui::print_header("Sandbox Execution");
    ui::print_execution(&outcome);
    if outcome.succeeded {
        ui::print_contract(&parsed);
    }
    Ok(())
}
