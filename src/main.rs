use clap::Parser;
use std::process::ExitCode;
use vaultgate::{
    cli::{run_cli, Cli},
    init_logging, Settings, APP_NAME, VERSION,
};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Load .env file if it exists (optional - won't fail if missing)
    // This must happen before any config is read from environment
    if let Err(e) = dotenvy::dotenv() {
        if !e.to_string().contains("not found") {
            eprintln!("Warning: Error loading .env file: {}", e);
        }
    }

    let cli = Cli::parse();

    let mut settings = Settings::from_env()?;
    if cli.verbose {
        settings.observability.log_level = "debug".to_string();
    }
    init_logging(&settings.observability)?;

    tracing::debug!(app_name = APP_NAME, version = VERSION, vault = ?settings.vault, "Loaded configuration");

    let succeeded = run_cli(cli, settings).await?;
    Ok(if succeeded { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
