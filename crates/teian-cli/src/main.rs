use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod config;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    let mut config = config::TeianConfig::load(cli.config.as_deref())?;
    if let Some(db) = &cli.db {
        config.db_path.clone_from(db);
    }

    // --verbose beats RUST_LOG, which beats the config file.
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    commands::run_command(cli, config)
}
