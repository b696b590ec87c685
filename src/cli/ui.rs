use colored::*;
use console::Term;
use indicatif::{ ProgressBar, ProgressStyle };
use std::time::Duration;
use textwrap::wrap;

use mathverify::implementations::contract_parser::ParsedContract;
use mathverify::implementations::sandbox::EnvironmentReport;
use mathverify::models::{
    ExecutionOutcome,
    RepairAttempt,
    StepVerification,
    VerificationError,
    VerificationStatus,
};

fn term_width() -> usize {
    let width = Term::stdout().size().1 as usize;
    if width == 0 { 80 } else { width }
}

/// Print a section header
pub fn print_header(title: &str) {
    let title = format!(" {} ", title);
    println!("\n{}\n", title.bold().white().on_blue());
}

/// Print a code listing with line numbers
pub fn print_code(code: &str) {
    for (number, line) in code.lines().enumerate() {
        println!("{} {}", format!("{:>4}", number + 1).dimmed(), line);
    }
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "ERROR:".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "WARNING:".yellow().bold(), message);
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "SUCCESS:".green().bold(), message);
}

/// Print a formatted result
pub fn print_result(label: &str, value: &str) {
    println!("{}: {}", label.bold(), value);
}

/// Print verification status with color
pub fn print_verification_status(status: VerificationStatus, confidence: f64) {
    let line = match status {
        VerificationStatus::Verified => format!("✓ Verified (confidence {:.2})", confidence).green(),
        VerificationStatus::FailedReasoning =>
            format!("✗ Reasoning disproved (confidence {:.2})", confidence).red(),
        VerificationStatus::FailedCodegen => "⚠ Verification code failed".to_string().yellow(),
        VerificationStatus::FailedPipeline => "⚠ Pipeline failure".to_string().red(),
    };
    println!("{}", line.bold());
}

pub fn print_steps(steps: &[StepVerification]) {
    if steps.is_empty() {
        println!("{}", "(no step records)".dimmed());
        return;
    }
    let width = term_width().saturating_sub(14).max(20);
    for step in steps {
        let mark = if step.verified { "✓".green() } else { "✗".red() };
        let mut lines = wrap(&step.description, width).into_iter();
        println!("  {} Step {:<3} {}", mark, step.step_number, lines.next().unwrap_or_default());
        for rest in lines {
            println!("{:>14}{}", "", rest);
        }
    }
}

pub fn print_errors(errors: &[VerificationError]) {
    for error in errors {
        println!("  {} {}", format!("[{}]", error.kind).red(), error.message);
    }
}

pub fn print_repair_history(history: &[RepairAttempt]) {
    if history.is_empty() {
        println!("{}", "(no reasoning repairs)".dimmed());
        return;
    }
    for attempt in history {
        let mark = if attempt.succeeded { "✓".green() } else { "✗".red() };
        println!(
            "  {} #{} {:?} in {:.1}s: {}",
            mark,
            attempt.attempt_number,
            attempt.kind,
            attempt.duration.as_secs_f64(),
            attempt.reason
        );
        if let Some(error) = &attempt.error {
            println!("      {}", error.dimmed());
        }
    }
}

pub fn print_execution(outcome: &ExecutionOutcome) {
    if outcome.succeeded {
        print_success(&format!("Executed in {:.2}s", outcome.duration.as_secs_f64()));
    } else {
        print_error(
            &format!(
                "{}: {}",
                outcome.exception_kind.as_deref().unwrap_or("RuntimeFault"),
                outcome.exception_message.as_deref().unwrap_or("unknown failure")
            )
        );
    }
    if !outcome.memory_limit_enforced {
        print_warning("Memory limit was not enforced on this platform");
    }
    if !outcome.namespace_isolated {
        print_warning("Ran without namespace isolation");
    }
    if outcome.output_truncated {
        print_warning("Output was truncated");
    }
    if !outcome.stdout.trim().is_empty() {
        print_header("Stdout");
        println!("{}", outcome.stdout.trim_end());
    }
    if !outcome.stderr.trim().is_empty() {
        print_header("Stderr");
        println!("{}", outcome.stderr.trim_end().dimmed());
    }
}

pub fn print_contract(parsed: &ParsedContract) {
    print_header("Contract");
    print_steps(&parsed.steps);
    match &parsed.verdict {
        Some(verdict) =>
            print_result(
                "Final answer verified",
                &format!(
                    "{} (computed {}, claimed {})",
                    verdict.answer_verified,
                    verdict.computed_value.as_deref().unwrap_or("-"),
                    verdict.claimed_value.as_deref().unwrap_or("-")
                )
            ),
        None => print_warning("No final verdict found"),
    }
    if let Some(violation) = &parsed.parse_error {
        print_error(&violation.to_string());
    }
}

pub fn print_environment(report: &EnvironmentReport) {
    print_result("Interpreter", &report.interpreter);
    print_result("SymPy", report.sympy_version.as_deref().unwrap_or("not found"));
    for check in &report.checks {
        let mark = match (check.status, check.required) {
            (true, _) => "✓".green(),
            (false, true) => "✗".red(),
            (false, false) => "⚠".yellow(),
        };
        println!("  {} {:<16} {}", mark, check.name, check.message);
    }
    if report.overall_status {
        print_success("Sandbox environment is ready");
    } else {
        print_error("Sandbox environment is not ready");
    }
}

/// Display a spinner while waiting for an operation to complete
pub fn spinner_with_message(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ").template("{spinner:.green} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}
