use anyhow::Result;

use mathverify::config::SandboxConfig;
use mathverify::implementations::SandboxExecutor;

use crate::cli::ui;

pub async fn execute(sandbox: &SandboxConfig, json_output: bool) -> Result<()> {
    let executor = SandboxExecutor::new(sandbox.clone());

    let spinner = if json_output { None } else { Some(ui::spinner_with_message("Probing sandbox...")) };
    let report = executor.check_environment().await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    if json_output {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        ui::print_header("Sandbox Environment");
        ui::print_environment(&report);
    }
    Ok(())
}
