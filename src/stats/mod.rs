//! Subnational zonal statistics of the anomaly rasters.

pub mod csv;
pub mod parquet;

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use anyhow::Result;
use geo::MultiPolygon;
use reqwest::Client;
use tracing::{error, info};

pub use self::csv::write_csv;
pub use self::parquet::save_stats;

use crate::{
    boundary::{load_admin_layer, BoundaryFeature, BoundaryNaming},
    download::{download_file, extract_raster},
    raster::{read_geotiff, touched_cells, Raster},
};

/// Decimal places kept in the statistics.
const PRECISION: f64 = 1e5;

/// One boundary feature's statistics for one season.
#[derive(Debug, Clone, PartialEq)]
pub struct ZonalStatRow {
    pub country: String,
    pub admin_level: u8,
    pub pcode: String,
    pub reference_name: String,
    pub season: String,
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub properties: BTreeMap<String, String>,
}

impl ZonalStatRow {
    fn new(feature: &BoundaryFeature, season: &str, stats: FeatureStats) -> Self {
        ZonalStatRow {
            country: feature.country.clone(),
            admin_level: feature.admin_level,
            pcode: feature.pcode.clone(),
            reference_name: feature.reference_name.clone(),
            season: season.to_string(),
            mean: round5(stats.mean),
            min: round5(stats.min),
            max: round5(stats.max),
            properties: feature.properties.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FeatureStats {
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Statistics table plus the extracted raster of each season.
#[derive(Debug)]
pub struct Summary {
    pub rasters: BTreeMap<String, PathBuf>,
    pub rows: Vec<ZonalStatRow>,
}

/// Mean, min and max over the valid pixels the geometry touches.
pub fn zonal_stats(raster: &Raster, geometry: &MultiPolygon<f64>) -> FeatureStats {
    let mut count = 0usize;
    let mut sum = 0.0;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;

    for (row, col) in touched_cells(&raster.transform, raster.height(), raster.width(), geometry) {
        let value = raster.data[[row, col]];
        if !raster.is_valid(value) {
            continue;
        }
        let value = value as f64;
        count += 1;
        sum += value;
        min = min.min(value);
        max = max.max(value);
    }

    if count == 0 {
        return FeatureStats::default();
    }
    FeatureStats {
        mean: Some(sum / count as f64),
        min: Some(min),
        max: Some(max),
    }
}

/// Rounds to five decimals; null stays null.
pub fn round5(value: Option<f64>) -> Option<f64> {
    value.map(|v| (v * PRECISION).round() / PRECISION)
}

/// Statistics of every season's raster over every admin layer, for the
/// requested countries. Rows are ordered by season, then layer, then P-code.
pub fn summarize_data(
    rasters: &BTreeMap<String, PathBuf>,
    layers: &[PathBuf],
    countries: &[String],
    naming: &dyn BoundaryNaming,
) -> Result<Vec<ZonalStatRow>> {
    let layers = layers
        .iter()
        .map(|layer| load_admin_layer(layer, countries, naming))
        .collect::<Result<Vec<_>>>()?;

    let mut rows = Vec::new();
    for (season, path) in rasters {
        let raster = read_geotiff(path)?;
        for features in &layers {
            for feature in features {
                let stats = zonal_stats(&raster, &feature.geometry);
                rows.push(ZonalStatRow::new(feature, season, stats));
            }
        }
        info!(season = %season, rows = rows.len(), "Summarized season");
    }

    Ok(rows)
}

/// Downloads each season's archive, extracts its raster and summarizes.
///
/// Returns `None` when any archive cannot be downloaded or holds no raster.
pub async fn summarize_archives(
    client: &Client,
    latest_data: &BTreeMap<String, String>,
    layers: &[PathBuf],
    countries: &[String],
    naming: &dyn BoundaryNaming,
    folder: &Path,
) -> Result<Option<Summary>> {
    let mut rasters = BTreeMap::new();
    for (season, url) in latest_data {
        let archive = match download_file(client, url, folder).await {
            Ok(archive) => archive,
            Err(e) => {
                error!(season = %season, error = %e, "Could not download CHIRPS data");
                return Ok(None);
            }
        };
        match extract_raster(&archive, folder)? {
            Some(raster) => {
                rasters.insert(season.clone(), raster);
            }
            None => {
                error!(season = %season, archive = %archive.display(), "Could not extract CHIRPS data");
                return Ok(None);
            }
        }
    }

    let rows = summarize_data(&rasters, layers, countries, naming)?;
    Ok(Some(Summary { rasters, rows }))
}

// -- Tests -------------------------------------------------------------------
