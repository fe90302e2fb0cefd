use anyhow::{Context, Result};
use file_sync::cli::Cli;
use file_sync::config::{Config, Role};
use file_sync::{client, logging, server};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();
    logging::init_logging(cli.verbose)?;

    let config = Config::load(&cli.config_file)
        .inspect_err(|e| tracing::error!(error = %e, "invalid configuration"))
        .context("failed to load configuration")?;

    match config.role() {
        Role::Server => {
            tracing::info!(port = %config.port, "starting server");
            server::run_server(&config)
                .await
                .inspect_err(|e| tracing::error!(error = %e, "server stopped"))?;
        }
        Role::Client => {
            let file_name = cli
                .file_name
                .as_deref()
                .context("--fileName is required when a server is configured")?;
            client::run_client(&config, file_name, &cli.file_path)
                .await
                .inspect_err(|e| tracing::error!(error = %e, "upload failed"))?;
        }
    }

    Ok(())
}
