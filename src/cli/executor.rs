//! Dispatches a parsed command once configuration is loaded

use super::handlers::ServeCommandHandler;
use super::parser::{Cli, Commands};
use crate::config::Settings;
use crate::error::{AppError, AppResult};

/// Runs the command in `cli`.
///
/// A plain `serve` (or no subcommand) returns `Ok(())` immediately; `main`
/// starts the server afterwards.
pub async fn execute_command(cli: &Cli, settings: Settings) -> AppResult<()> {
    cli.validate().map_err(|reason| AppError::Validation {
        field: "cli_arguments".to_string(),
        reason,
    })?;

    match &cli.command {
        Some(Commands::Serve { dry_run, .. }) => {
            ServeCommandHandler::new(settings).execute(*dry_run).await
        }
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[tokio::test]
    async fn test_execute_serve_dry_run() {
        let cli = Cli::try_parse_from(["batchwork", "serve", "--dry-run"]).unwrap();
        assert!(execute_command(&cli, Settings::default()).await.is_ok());
    }

    #[tokio::test]
    async fn test_execute_without_subcommand() {
        let cli = Cli::try_parse_from(["batchwork"]).unwrap();
        assert!(execute_command(&cli, Settings::default()).await.is_ok());
    }

    #[tokio::test]
    async fn test_execute_rejects_invalid_arguments() {
        let cli = Cli::try_parse_from(["batchwork", "serve", "--host", "0.0.0.0", "--port", "443"])
            .unwrap();

        let result = execute_command(&cli, Settings::default()).await;
        assert!(matches!(result, Err(AppError::Validation { ref field, .. }) if field == "cli_arguments"));
    }

    #[tokio::test]
    async fn test_execute_dry_run_with_invalid_settings() {
        let cli = Cli::try_parse_from(["batchwork", "serve", "--dry-run"]).unwrap();
        let mut settings = Settings::default();
        settings.dispatcher.bulk.concurrency = 0;

        assert!(execute_command(&cli, settings).await.is_err());
    }
}
