use batchwork::cli::{self, Cli};
use batchwork::server::Server;
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = cli::load_and_merge_config(&cli)?;
    cli::init_logger_from_settings(&settings)?;

    let dry_run = cli.is_dry_run();
    cli::execute_command(&cli, settings.clone()).await?;
    if dry_run {
        return Ok(());
    }

    Server::new(settings).run().await
}
