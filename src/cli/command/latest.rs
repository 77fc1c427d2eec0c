use std::{collections::BTreeMap, path::Path};

use anyhow::Result;
use reqwest::Client;
use tracing::info;

use crate::{config::Config, listing::get_latest_data};

use super::http_client;

/// Latest product URL of every configured season.
pub async fn latest(config_path: &Path) -> Result<BTreeMap<String, Option<String>>> {
    let config = Config::from_file(config_path)?;
    let client = http_client()?;

    Ok(find_latest(&client, &config).await)
}

pub(crate) async fn find_latest(client: &Client, config: &Config) -> BTreeMap<String, Option<String>> {
    info!("Finding latest available data");
    let mut latest_data = BTreeMap::new();
    for (season, settings) in &config.seasons {
        let url = get_latest_data(client, &settings.base_url, config.exclude_year).await;
        latest_data.insert(season.clone(), url);
    }
    latest_data
}
