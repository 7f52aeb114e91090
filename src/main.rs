use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::OpenOptions;
use std::path::Path;
use sublease_market::admin_cli::{handle_admin_command, AdminCli};
use sublease_market::app_log;
use sublease_market::{core::ConfigManager, start_web_server};

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "sublease_market=info,psu_sublease=info,rocket::server=off";

#[derive(Parser)]
#[command(name = "psu-sublease")]
#[command(about = "Penn State sublease marketplace API")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// Operator commands
    Admin(AdminCli),
}

fn init_logging(log_file: &Path) -> Result<()> {
    if let Some(parent) = log_file.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory: {}", parent.display()))?;
    }

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true) // Clear file on startup
        .open(log_file)
        .with_context(|| format!("Failed to open log file: {}", log_file.display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            fmt::layer()
                .json()
                .with_writer(file)
                .with_current_span(false)
                .with_span_list(false),
        )
        .with(filter)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ConfigManager::load()?;
    init_logging(&config.server.log_file)?;

    app_log!(info, "Environment: {}", config.environment);
    app_log!(info, "Log file: {}", config.server.log_file.display());

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            app_log!(info, "Server: http://0.0.0.0:{}", config.server.port);
            start_web_server(config).await
        }
        Command::Admin(admin) => handle_admin_command(admin, &config).await,
    }
}
