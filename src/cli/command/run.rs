use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use anyhow::Result;
use reqwest::Client;
use tempfile::TempDir;
use tracing::{error, info, warn};

use crate::{
    boundary::{BoundaryNaming, BoundarySources, OchaNaming},
    catalog::{Catalog, CkanCatalog, CSV_FORMAT},
    config::Config,
    download::download_file,
    publish::{upload_with_retry, MapPublisher, MapboxUploader},
    reconcile::add_chirps_to_dataset,
    render::generate_map_data,
    stats::{save_stats, summarize_archives, write_csv},
};

use super::{http_client, latest::find_latest, make_parquet_file_name};

pub struct RunOptions {
    pub config_path: PathBuf,
    pub site_url: String,
    pub hdx_key: Option<String>,
    pub mapbox_key: Option<String>,
    pub parquet: bool,
}

/// How far a run got.
#[derive(Debug, PartialEq)]
pub enum RunOutcome {
    /// No season listing yielded a file.
    NoData,
    /// The dataset already holds the latest files.
    NoUpdate,
    /// Boundary layers were missing or could not be downloaded.
    NoBoundaries,
    /// A product archive could not be downloaded or held no raster.
    NoRaster,
    Completed {
        csv: PathBuf,
        /// Map ids uploaded successfully.
        published: Vec<String>,
    },
}

pub async fn run(options: &RunOptions) -> Result<RunOutcome> {
    let config = Config::from_file(&options.config_path)?;
    let client = http_client()?;
    let catalog = CkanCatalog::new(client.clone(), &options.site_url, options.hdx_key.clone());
    let uploader = options
        .mapbox_key
        .as_deref()
        .map(|key| MapboxUploader::new(client.clone(), &config.publish.api_url, key));
    let parquet_path = if options.parquet {
        Some(make_parquet_file_name("subnational")?)
    } else {
        None
    };

    let temp_dir = TempDir::new()?;
    run_pipeline(
        &config,
        &client,
        &catalog,
        uploader.as_ref().map(|u| u as &dyn MapPublisher),
        &OchaNaming,
        temp_dir.path(),
        parquet_path.as_deref(),
    )
    .await
}

/// Latest files → dataset update → statistics → maps. Stops early when
/// there is nothing new.
pub async fn run_pipeline(
    config: &Config,
    client: &Client,
    catalog: &dyn Catalog,
    publisher: Option<&dyn MapPublisher>,
    naming: &dyn BoundaryNaming,
    folder: &Path,
    parquet_path: Option<&Path>,
) -> Result<RunOutcome> {
    let countries = config.countries();

    let latest_data = find_latest(client, config).await;
    let available: BTreeMap<String, String> = latest_data
        .iter()
        .filter_map(|(season, url)| Some((season.clone(), url.clone()?)))
        .collect();
    if available.is_empty() {
        warn!("No data found for any season");
        return Ok(RunOutcome::NoData);
    }

    info!("Generating tif resources");
    let mut dataset = catalog.read_dataset(&config.output.dataset).await?;
    let updated =
        add_chirps_to_dataset(catalog, &mut dataset, &latest_data, &config.descriptions()).await;
    if !updated {
        info!("No new data found, will try again tomorrow");
        return Ok(RunOutcome::NoUpdate);
    }

    info!("Downloading international boundaries");
    let boundary_dataset = catalog.read_dataset(&config.boundaries.dataset).await?;
    let sources = BoundarySources::from_dataset(
        &boundary_dataset,
        &config.boundaries.subnational_pattern,
        &config.boundaries.world_pattern,
    );
    let Some((layers, world_layer)) = download_boundaries(client, &sources, folder).await else {
        return Ok(RunOutcome::NoBoundaries);
    };

    info!("Summarizing data subnationally");
    let Some(summary) =
        summarize_archives(client, &available, &layers, &countries, naming, folder).await?
    else {
        return Ok(RunOutcome::NoRaster);
    };

    info!("Updating HDX");
    let csv_path = folder.join(&config.output.csv_name);
    write_csv(&summary.rows, &csv_path)?;
    let csv_resources = dataset.resources_of_type(CSV_FORMAT);
    if csv_resources.is_empty() {
        warn!(dataset = %dataset.name, "No CSV resource to attach statistics to");
    }
    for resource in csv_resources {
        catalog.upload_resource_file(resource, &csv_path).await?;
    }
    if let Some(parquet_path) = parquet_path {
        save_stats(&summary.rows, parquet_path)?;
        info!(file = %parquet_path.display(), "Statistics saved");
    }

    info!("Preparing rasters for mapbox");
    let rendered = generate_map_data(
        &summary.rasters,
        &world_layer,
        &countries,
        &config.legend,
        folder,
    )?;

    let mut published = Vec::new();
    let Some(publisher) = publisher else {
        warn!("No Mapbox key, skipping map uploads");
        return Ok(RunOutcome::Completed {
            csv: csv_path,
            published,
        });
    };

    info!("Uploading rasters to mapbox");
    let policy = config.publish.retry_policy();
    for (country, seasons) in &rendered {
        for (season, file) in seasons {
            let Some(target) = config.map_target(country, season) else {
                warn!(country = %country, season = %season, "No map configured");
                continue;
            };
            if let Some(mapid) = upload_with_retry(publisher, target, file, &policy).await {
                published.push(mapid);
            }
        }
    }

    Ok(RunOutcome::Completed {
        csv: csv_path,
        published,
    })
}

/// Downloads the admin layers and the world layer. Failures are logged and
/// yield `None`.
async fn download_boundaries(
    client: &Client,
    sources: &BoundarySources<'_>,
    folder: &Path,
) -> Option<(Vec<PathBuf>, PathBuf)> {
    let Some(world) = sources.world else {
        error!("No world boundaries found");
        return None;
    };

    let mut layers = Vec::with_capacity(sources.subnational.len() + 1);
    for resource in sources.subnational.iter().copied().chain(Some(world)) {
        match download_file(client, &resource.url, folder).await {
            Ok(path) => layers.push(path),
            Err(e) => {
                error!(resource = %resource.name, error = %e, "Could not download boundaries");
                return None;
            }
        }
    }

    let world_layer = layers.pop()?;
    Some((layers, world_layer))
}

// -- Tests -------------------------------------------------------------------
