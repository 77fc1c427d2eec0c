//! Project configuration, read from YAML.

use std::{collections::BTreeMap, fs, path::Path, time::Duration};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::{
    publish::{MapTarget, RetryPolicy, MAPBOX_API_URL},
    render::LegendRule,
};

pub const DEFAULT_CONFIG_PATH: &str = "config/project_configuration.yml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Per season: where to list products and how to describe them.
    pub seasons: BTreeMap<String, SeasonConfig>,
    /// Products of this year are ignored.
    #[serde(default)]
    pub exclude_year: Option<i32>,
    pub boundaries: BoundaryConfig,
    pub output: OutputConfig,
    pub legend: Vec<LegendRule>,
    #[serde(default)]
    pub publish: PublishConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeasonConfig {
    pub base_url: String,
    /// Resource description; `{year}` is replaced and the pentad appended.
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BoundaryConfig {
    pub dataset: String,
    #[serde(default = "default_subnational_pattern")]
    pub subnational_pattern: String,
    #[serde(default = "default_world_pattern")]
    pub world_pattern: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    pub dataset: String,
    #[serde(default = "default_csv_name")]
    pub csv_name: String,
    /// Tileset per country and season. Its countries are the ones processed.
    pub mapbox: BTreeMap<String, BTreeMap<String, MapTarget>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    pub api_url: String,
    pub retries: u32,
    pub retry_delay_secs: u64,
}

impl Default for PublishConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        PublishConfig {
            api_url: MAPBOX_API_URL.to_string(),
            retries: policy.retries,
            retry_delay_secs: policy.delay.as_secs(),
        }
    }
}

impl PublishConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            retries: self.retries,
            delay: Duration::from_secs(self.retry_delay_secs),
        }
    }
}

fn default_subnational_pattern() -> String {
    "polbnda_adm".to_string()
}

fn default_world_pattern() -> String {
    "wrl_polbnda_int_1m".to_string()
}

fn default_csv_name() -> String {
    "subnational_anomaly_statistics.csv".to_string()
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("Invalid configuration {}", path.display()))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.seasons.is_empty() {
            return Err(anyhow!("No seasons configured"));
        }
        for (season, settings) in &self.seasons {
            if settings.base_url.trim().is_empty() {
                return Err(anyhow!("Season `{}` has no base URL", season));
            }
            if settings.description.trim().is_empty() {
                return Err(anyhow!("Season `{}` has no description", season));
            }
        }
        for rule in &self.legend {
            if rule.range[0] >= rule.range[1] {
                return Err(anyhow!(
                    "Legend range [{}, {}] is not ordered",
                    rule.range[0],
                    rule.range[1]
                ));
            }
        }
        Ok(())
    }

    /// Countries to summarize and render.
    pub fn countries(&self) -> Vec<String> {
        self.output.mapbox.keys().cloned().collect()
    }

    /// Description template per season.
    pub fn descriptions(&self) -> BTreeMap<String, String> {
        self.seasons
            .iter()
            .map(|(season, s)| (season.clone(), s.description.clone()))
            .collect()
    }

    pub fn map_target(&self, country: &str, season: &str) -> Option<&MapTarget> {
        self.output.mapbox.get(country)?.get(season)
    }
}

// -- Tests -------------------------------------------------------------------
