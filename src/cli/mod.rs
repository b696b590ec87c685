use clap::{ Parser, Subcommand };
use std::path::PathBuf;

pub mod commands;
pub mod ui;

#[derive(Parser)]
#[command(
    name = "mathverify",
    about = "Verifies worked math solutions by executing generated symbolic checks",
    version,
    author,
    long_about = None
)]
pub struct MathverifyCli {
    /// Sets the log level (error, warn, info, debug, trace)
    #[arg(short, long, global = true, default_value = "info")]
    pub log_level: String,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format (text, json)
    #[arg(long, global = true, default_value = "text")]
    pub output_format: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Verify a solution, repairing the reasoning when it is disproved
    Verify {
        /// Reasoning artifact as JSON (original_problem, worked_solution, final_answer)
        #[arg(short, long, conflicts_with_all = ["problem", "solution"])]
        artifact: Option<PathBuf>,

        /// Problem statement file
        #[arg(short, long, requires = "solution")]
        problem: Option<PathBuf>,

        /// Solution file, as produced by a reasoning model
        #[arg(short, long, requires = "problem")]
        solution: Option<PathBuf>,

        /// Reasoning repair budget (0 disables repair)
        #[arg(short, long)]
        max_attempts: Option<u32>,

        /// Overall deadline in seconds
        #[arg(short, long)]
        deadline_secs: Option<u64>,
    },

    /// Run a verification script in the sandbox and parse its output
    Exec {
        /// Path to the script
        #[arg(short = 'f', long)]
        code: PathBuf,

        /// Timeout in seconds
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Memory limit in megabytes
        #[arg(short, long)]
        memory_mb: Option<u64>,
    },

    /// Check that the sandbox can run verification code on this host
    Check,
}
