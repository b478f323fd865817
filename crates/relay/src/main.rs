mod bootstrap;
mod cli;
mod server;

use clap::Parser;

use crate::cli::{Cli, run_cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    shared::env::configure_env()?;

    // Flags may come from the environment files loaded above
    let cli = Cli::parse();

    shared::logging::configure_logging(cli.log_level())?;
    shared::crypto::configure_crypto_provider()?;

    run_cli(cli).await
}
