//! webreplay - browser interaction record and replay
//!
//! Main entry point for the webreplay CLI and stdio bridge.

mod cli;
mod cmd_bridge;
mod cmd_instruction;

use clap::Parser;
use tracing::{error, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use webreplay_config::{Config, ConfigLoader, ConfigValidator, LoggingConfig};

use cli::{Cli, Commands};
use cmd_bridge::handle_bridge_command;
use cmd_instruction::{
    delete_instruction, export_instructions, import_instructions, list_instructions,
    run_instruction, show_instruction,
};

/// Initialize tracing with console and file output.
///
/// Console output goes to stderr: stdout carries command output and bridge
/// frames. Log files rotate daily under `logging.dir`.
fn init_tracing(logging: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let log_dir = logging.dir_path();
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("webreplay")
        .filename_suffix("log")
        .max_log_files(30)
        .build(&log_dir)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Flushes the file writer on exit.
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_ansi(true),
        )
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(())
}

/// Print validation results. Returns false when the config has errors.
fn report_validation(config: &Config) -> Result<bool, Box<dyn std::error::Error>> {
    let result = ConfigValidator::validate(config)?;
    for warning in &result.warnings {
        println!("warning: {}: {}", warning.path, warning.message);
    }
    for error in &result.errors {
        println!("error: {}: {}", error.path, error.message);
    }
    Ok(result.is_valid())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = ConfigLoader::load_or_default(&cli.config)?;

    init_tracing(&config.logging)?;

    if let Commands::CheckConfig = cli.command {
        return if report_validation(&config)? {
            println!("{:?}: ok", cli.config);
            Ok(())
        } else {
            Err("configuration has errors".into())
        };
    }

    let validation = ConfigValidator::validate(&config)?;
    for warning in &validation.warnings {
        warn!("Config {}: {}", warning.path, warning.message);
    }
    if let Some(e) = validation.into_error() {
        error!("Invalid configuration: {}", e);
        return Err(e.into());
    }

    match cli.command {
        Commands::Run { id, vars, endpoint } => {
            run_instruction(&config, &id, vars, endpoint.as_deref()).await
        }
        Commands::List { url, name, format } => {
            list_instructions(&config, url, name, &format).await
        }
        Commands::Show { id, logs } => show_instruction(&config, &id, logs).await,
        Commands::Delete { id } => delete_instruction(&config, &id).await,
        Commands::Import { file } => import_instructions(&config, &file).await,
        Commands::Export { ids, output } => export_instructions(&config, &ids, output).await,
        Commands::Bridge { framing, endpoint } => {
            handle_bridge_command(&config, framing.into(), endpoint.as_deref()).await
        }
        Commands::CheckConfig => Ok(()),
    }
}
