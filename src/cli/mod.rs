//! Command line interface.

pub mod command;

use std::{fs, path::PathBuf, time::Duration};

use clap::{command, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use crate::{config::DEFAULT_CONFIG_PATH, logging::LogLevel};

/// File in the home directory holding the HDX API key.
const HDX_KEY_FILE: &str = ".hdxkey";

#[derive(Parser)]
#[command(version, about, long_about = None)]
/// Contains the commands
pub struct Cli {
    /// Project configuration
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// trace, debug, info, warn or error
    #[arg(long, global = true, default_value = "info")]
    pub log_level: LogLevel,

    /// Log as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Update the dataset, statistics and maps with the latest data
    Run {
        /// HDX site: prod, stage, feature or a full URL
        #[arg(long, env = "HDX_SITE", default_value = "prod")]
        hdx_site: String,

        /// HDX API key, read from ~/.hdxkey when absent
        #[arg(long, env = "HDX_KEY", hide_env_values = true)]
        hdx_key: Option<String>,

        /// Mapbox access token; maps are not published without one
        #[arg(long, env = "MAPBOX_KEY", hide_env_values = true)]
        mapbox_key: Option<String>,

        /// Also save the statistics as parquet in the home directory
        #[arg(long)]
        parquet: bool,
    },
    /// Print the latest file of each season
    Latest {},
}

/// Base URL of an HDX site.
pub fn site_url(site: &str) -> String {
    match site {
        "prod" => "https://data.humdata.org".to_string(),
        "stage" => "https://stage.data-humdata-org.ahconu.org".to_string(),
        "feature" => "https://feature.data-humdata-org.ahconu.org".to_string(),
        url => url.trim_end_matches('/').to_string(),
    }
}

/// The given key, or the contents of `~/.hdxkey`.
pub fn resolve_hdx_key(key: Option<String>) -> Option<String> {
    key.or_else(|| {
        let path = dirs::home_dir()?.join(HDX_KEY_FILE);
        let key = fs::read_to_string(path).ok()?;
        let key = key.trim();
        (!key.is_empty()).then(|| key.to_string())
    })
}

/// Creates a spinner.
pub fn create_spinner(message: String) -> ProgressBar {
    let bar = ProgressBar::new_spinner().with_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));

    bar
}

/// Creates a progress bar.
pub fn create_progress_bar(size: u64, message: String) -> ProgressBar {
    let bar = ProgressBar::new(size).with_message(message);
    if let Ok(style) = ProgressStyle::with_template("[{eta_precise}] {bar:40.cyan/blue} {msg}") {
        bar.set_style(style.progress_chars("##-"));
    }

    bar
}

// -- Tests -------------------------------------------------------------------
