mod boundary;
mod catalog;
mod cli;
mod config;
mod download;
mod error;
mod filename;
mod listing;
mod logging;
mod pentad;
mod publish;
mod raster;
mod reconcile;
mod render;
mod stats;

use anyhow::{Error, Result};
use clap::Parser;
use cli::{command, resolve_hdx_key, site_url, Cli, Commands};
use command::run::RunOutcome;
use logging::{init_logging, LogConfig, LogFormat};
use tracing::error;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let cli = Cli::parse();

    init_logging(&LogConfig {
        level: cli.log_level,
        format: if cli.log_json {
            LogFormat::Json
        } else {
            LogFormat::Text
        },
    })?;

    match &cli.command {
        Commands::Run {
            hdx_site,
            hdx_key,
            mapbox_key,
            parquet,
        } => {
            let options = command::RunOptions {
                config_path: cli.config.clone(),
                site_url: site_url(hdx_site),
                hdx_key: resolve_hdx_key(hdx_key.clone()),
                mapbox_key: mapbox_key.clone(),
                parquet: *parquet,
            };
            match command::run(&options).await {
                Ok(RunOutcome::Completed { csv, published }) => {
                    println!("Statistics written to `{}`", csv.display());
                    println!("{} map(s) published", published.len());
                }
                Ok(outcome) => println!("Nothing published: {:?}", outcome),
                Err(e) => error!("Error: {:#}", e),
            }
        }
        Commands::Latest {} => match command::latest(&cli.config).await {
            Ok(latest) => {
                for (season, url) in latest {
                    println!("{}: {}", season, url.as_deref().unwrap_or("-"));
                }
            }
            Err(e) => error!("Error: {:#}", e),
        },
    }

    Ok(())
}
