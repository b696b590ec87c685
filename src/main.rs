use anyhow::Result;
use clap::Parser;
use log::{ error, info };

use mathverify::config::VerifierConfig;

mod cli;
use cli::commands::verify::ArtifactSource;
use cli::{ Commands, MathverifyCli };

#[tokio::main]
async fn main() -> Result<()> {
    // Parse the command line arguments
    let cli = MathverifyCli::parse();

    // API keys may live in a local .env file
    dotenv::dotenv().ok();

    setup_logging(&cli.log_level);

    let config = match &cli.config {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            VerifierConfig::from_file(path).map_err(|e| {
                error!("Failed to load configuration: {}", e);
                e
            })?
        }
        None => VerifierConfig::default(),
    };

    let json_output = match cli.output_format.to_lowercase().as_str() {
        "json" => true,
        "text" => false,
        other => {
            cli::ui::print_warning(&format!("Unknown output format '{}', using text", other));
            false
        }
    };

    match &cli.command {
        Commands::Verify { artifact, problem, solution, max_attempts, deadline_secs } => {
            let source = match (artifact, problem, solution) {
                (Some(path), _, _) => ArtifactSource::Json(path),
                (None, Some(problem), Some(solution)) => ArtifactSource::Files { problem, solution },
                _ => {
                    cli::ui::print_error("Pass either --artifact or both --problem and --solution");
                    return Ok(());
                }
            };

            cli::commands::verify::execute(
                &config,
                source,
                *max_attempts,
                *deadline_secs,
                json_output
            ).await?;
        }

        Commands::Exec { code, timeout, memory_mb } => {
            cli::commands::exec::execute(&config.sandbox, code, *timeout, *memory_mb, json_output).await?;
        }

        Commands::Check => {
            cli::commands::check::execute(&config.sandbox, json_output).await?;
        }
    }

    Ok(())
}

fn setup_logging(log_level: &str) {
    // Set up the logger based on the log level
    let level = match log_level.to_lowercase().as_str() {
        "trace" => log::LevelFilter::Trace,
        "debug" => log::LevelFilter::Debug,
        "info" => log::LevelFilter::Info,
        "warn" => log::LevelFilter::Warn,
        "error" => log::LevelFilter::Error,
        _ => log::LevelFilter::Info,
    };

    env_logger::Builder::new().filter_level(level).init();

    info!("Logger initialized with level: {}", log_level);
}
