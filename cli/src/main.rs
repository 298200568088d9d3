#![deny(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
#![warn(clippy::expect_used)]

use crate::app_config::AppConfig;
use args::{CliArgs, Command};
use clap::Parser;
use commands::{
    config::config_cmd, counting::counting_cmd, record::record_cmd, sync::sync_cmd,
    taxon::taxon_cmd,
};
use profile::{get_profile_config_path, get_profile_name, Profile};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod app_config;
mod args;
mod commands;
mod formatters;
mod profile;

#[cfg(test)]
mod test;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    setup_tracing();

    let args = CliArgs::parse();

    let profile_name = get_profile_name(&args.config.profile_path);
    let profile_path = get_profile_config_path(&profile_name);

    if let Some(command) = args.command {
        let profile = Profile::from_path(&profile_path)?;
        let config = AppConfig::from_profile(&profile_name, &profile_path, profile);

        match command {
            Command::Config => config_cmd(&config)?,
            Command::Record(subcommand) => record_cmd(&config, subcommand).await?,
            Command::Taxon(subcommand) => taxon_cmd(&config, subcommand).await?,
            Command::Counting(subcommand) => counting_cmd(&config, subcommand).await?,
            Command::Sync => sync_cmd(&config).await?,
        }
    }

    Ok(())
}

/// Logs go to stderr so that command output stays parseable.
fn setup_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
