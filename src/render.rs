//! Colorized per-country rasters for the map service.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use anyhow::Result;
use ndarray::{Array2, Array3};
use serde::Deserialize;
use tracing::{info, warn};

use crate::{
    boundary::WorldLayer,
    raster::{mask, read_geotiff, upscale_nearest, write_geotiff, write_rgba_geotiff},
};

/// Values at or below this are transparent.
pub const VALID_THRESHOLD: f32 = -100000.0;

/// Approximate rendered width in pixels.
pub const TARGET_WIDTH: f64 = 3000.0;

/// Colors pixels with `low < value <= high`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LegendRule {
    pub range: [f64; 2],
    pub color: [u8; 3],
}

impl LegendRule {
    pub fn applies(&self, value: f32) -> bool {
        let value = value as f64;
        self.range[0] < value && value <= self.range[1]
    }
}

/// Integer factor bringing `width` close to the target width, at least 1.
pub fn upscale_factor(width: usize) -> usize {
    if width == 0 {
        return 1;
    }
    (TARGET_WIDTH / width as f64).round().max(1.0) as usize
}

/// RGBA bands shaped (4, rows, cols). Later legend rules override earlier
/// ones; pixels matching no rule stay black.
pub fn colorize(data: &Array2<f32>, legend: &[LegendRule]) -> Array3<u8> {
    let (rows, cols) = data.dim();
    let mut bands = Array3::<u8>::zeros((4, rows, cols));

    for ((row, col), &value) in data.indexed_iter() {
        if let Some(rule) = legend.iter().rev().find(|rule| rule.applies(value)) {
            for (band, &channel) in rule.color.iter().enumerate() {
                bands[[band, row, col]] = channel;
            }
        }
        if value > VALID_THRESHOLD {
            bands[[3, row, col]] = 255;
        }
    }

    bands
}

/// Clips, upscales and colorizes every season's raster for every country.
///
/// Intermediate rasters are kept in `folder` next to the rendered ones.
/// Countries missing from the world layer, or whose outline touches no
/// pixel, are skipped.
pub fn generate_map_data(
    rasters: &BTreeMap<String, PathBuf>,
    world_layer: &Path,
    countries: &[String],
    legend: &[LegendRule],
    folder: &Path,
) -> Result<BTreeMap<String, BTreeMap<String, PathBuf>>> {
    let world = WorldLayer::load(world_layer)?;
    let mut rendered: BTreeMap<String, BTreeMap<String, PathBuf>> = BTreeMap::new();

    for (season, path) in rasters {
        let raster = read_geotiff(path)?;

        for country in countries {
            let Some(outline) = world.outline(country) else {
                warn!(country = %country, "Country not found in world boundaries");
                continue;
            };
            let Some(clipped) = mask(&raster, outline) else {
                warn!(country = %country, season = %season, "Country outline touches no pixel");
                continue;
            };
            let clip_path = folder.join(format!("{}_{}_clip.tif", country, season));
            write_geotiff(&clip_path, &clipped)?;

            let factor = upscale_factor(clipped.width());
            let resampled = upscale_nearest(&clipped, factor);
            let resample_path = folder.join(format!("{}_{}_resample.tif", country, season));
            write_geotiff(&resample_path, &resampled)?;

            let bands = colorize(&resampled.data, legend);
            let render_path = folder.join(format!("{}_{}_render.tif", country, season));
            write_rgba_geotiff(&render_path, &bands, &resampled.transform)?;

            info!(country = %country, season = %season, factor, "Rendered raster");
            rendered
                .entry(country.clone())
                .or_default()
                .insert(season.clone(), render_path);
        }
    }

    Ok(rendered)
}

// -- Tests -------------------------------------------------------------------
