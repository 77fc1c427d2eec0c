//! Merges newly published product files into the catalog dataset.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::{debug, error, info, warn};

use crate::{
    catalog::{Catalog, Dataset, Resource, GEOTIFF_FORMAT},
    filename::ParsedFilename,
    pentad::pentad_window,
};

/// Placeholder replaced by the product year in description templates.
pub const YEAR_PLACEHOLDER: &str = "{year}";

/// Adds or updates one raster resource per season and persists the dataset.
///
/// Returns whether the catalog now holds newer data. A season whose resource
/// already carries the latest file name is left untouched, so running twice
/// with the same input reports `false` the second time. Catalog failures are
/// logged and reported as `false`, with `dataset` left as it was passed in.
pub async fn add_chirps_to_dataset(
    catalog: &dyn Catalog,
    dataset: &mut Dataset,
    latest_data: &BTreeMap<String, Option<String>>,
    descriptions: &BTreeMap<String, String>,
) -> bool {
    let original = dataset.clone();
    let mut updated = false;

    for (season, latest_url) in latest_data {
        let Some(latest_url) = latest_url else {
            debug!(season = %season, "No data for season");
            continue;
        };
        if merge_season(dataset, season, latest_url, descriptions.get(season)) {
            updated = true;
        }
    }

    if !updated {
        return false;
    }

    match coverage(dataset) {
        Some((start, end)) => dataset.set_date_of_dataset(start, end),
        None => warn!(dataset = %dataset.name, "Could not derive dataset dates"),
    }

    match catalog.update_dataset(dataset).await {
        Ok(stored) => {
            *dataset = stored;
            info!(dataset = %dataset.name, coverage = ?dataset.date_of_dataset(), "Dataset updated");
            true
        }
        Err(e) => {
            error!(error = %e, "Resources could not be added");
            *dataset = original;
            false
        }
    }
}

/// Applies one season's latest file; returns whether the dataset changed.
fn merge_season(
    dataset: &mut Dataset,
    season: &str,
    latest_url: &str,
    template: Option<&String>,
) -> bool {
    let parsed = match ParsedFilename::parse(latest_url) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(season, error = %e, "Unexpected file name {}", latest_url);
            return false;
        }
    };
    let resource_name = parsed.stem.as_str();

    let rasters: Vec<usize> = dataset
        .resources
        .iter()
        .enumerate()
        .filter(|(_, r)| r.is_raster())
        .map(|(i, _)| i)
        .collect();

    if rasters
        .iter()
        .any(|&i| dataset.resources[i].name == resource_name)
    {
        info!(season, resource = resource_name, "Resource already up to date");
        return false;
    }
    debug!(season, date = parsed.date_token, "New product");

    let template = template.map(String::as_str).unwrap_or_else(|| {
        warn!(season, "No description template for season");
        ""
    });
    let description = describe(template, &parsed);

    let existing = rasters
        .into_iter()
        .find(|&i| dataset.resources[i].name.contains(season));

    match existing {
        None => {
            info!(season, resource = resource_name, "Adding resource");
            dataset.resources.push(Resource::new(
                resource_name,
                &description,
                latest_url,
                GEOTIFF_FORMAT,
            ));
            true
        }
        Some(i) if dataset.resources[i].url != latest_url => {
            let resource = &mut dataset.resources[i];
            info!(season, from = %resource.name, to = resource_name, "Updating resource");
            resource.name = resource_name.to_string();
            resource.description = description;
            resource.url = latest_url.to_string();
            true
        }
        Some(_) => false,
    }
}

/// Description for a product: template with the year filled in, then the pentad.
pub fn describe(template: &str, parsed: &ParsedFilename) -> String {
    format!(
        "{}{}",
        template.replace(YEAR_PLACEHOLDER, &parsed.year.to_string()),
        parsed.pentad_label()
    )
}

/// Earliest start and latest end over the pentads of all raster resources.
pub fn coverage(dataset: &Dataset) -> Option<(NaiveDate, NaiveDate)> {
    dataset
        .resources
        .iter()
        .filter(|r| r.is_raster())
        .filter_map(|r| {
            let parsed = ParsedFilename::parse(&r.name)
                .map_err(|e| warn!(resource = %r.name, error = %e, "Skipping resource dates"))
                .ok()?;
            pentad_window(parsed.year, parsed.pentad).ok()
        })
        .fold(None, |range, (start, end)| match range {
            None => Some((start, end)),
            Some((s, e)) => Some((s.min(start), e.max(end))),
        })
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {

    use super::*;
    use crate::catalog::memory::MemoryCatalog;

    const SEASON: &str = "marmay";
    const LATEST: &str = "https://lala/ea_chirps_seasaccum_anom_marmay_202230_lta.zip";
    const DESC: &str = "March to May {year} (Mar pentad 1 thru May Pentad 6) - Average(1981-2010)\nPentad: ";

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn latest(pairs: &[(&str, Option<&str>)]) -> BTreeMap<String, Option<String>> {
        pairs
            .iter()
            .map(|(s, u)| (s.to_string(), u.map(str::to_string)))
            .collect()
    }

    fn descriptions() -> BTreeMap<String, String> {
        BTreeMap::from([
            (SEASON.to_string(), DESC.to_string()),
            ("octdec".to_string(), "October to December {year}\nPentad: ".to_string()),
        ])
    }

    fn dataset_fixture() -> Dataset {
        let mut dataset = Dataset::new("east-africa-chirps");
        let mut csv = Resource::new(
            "subnational_anomaly_statistics.csv",
            "Statistics",
            "https://data/subnational_anomaly_statistics.csv",
            "CSV",
        );
        csv.id = Some("csv-1".to_string());
        dataset.resources.push(csv);
        dataset
    }

    #[tokio::test]
    async fn should_add_first_resource() {
        let catalog = MemoryCatalog::with_dataset(dataset_fixture());
        let mut dataset = dataset_fixture();

        let updated = add_chirps_to_dataset(
            &catalog,
            &mut dataset,
            &latest(&[(SEASON, Some(LATEST))]),
            &descriptions(),
        )
        .await;

        assert!(updated);
        assert_eq!(dataset.date_of_dataset(), Some((ymd(2022, 5, 26), ymd(2022, 5, 31))));

        let rasters = dataset.resources_of_type("geotiff");
        assert_eq!(rasters.len(), 1);
        assert_eq!(rasters[0].name, "ea_chirps_seasaccum_anom_marmay_202230_lta");
        assert_eq!(rasters[0].url, LATEST);
        assert_eq!(rasters[0].format, "GeoTIFF");
        assert_eq!(
            rasters[0].description,
            "March to May 2022 (Mar pentad 1 thru May Pentad 6) - Average(1981-2010)\nPentad: 30"
        );

        let stored = catalog.stored("east-africa-chirps").unwrap();
        assert_eq!(stored.resources.len(), 2);
    }

    #[tokio::test]
    async fn should_be_idempotent() {
        let catalog = MemoryCatalog::with_dataset(dataset_fixture());
        let mut dataset = dataset_fixture();
        let latest = latest(&[(SEASON, Some(LATEST))]);

        assert!(add_chirps_to_dataset(&catalog, &mut dataset, &latest, &descriptions()).await);
        let after_first = dataset.clone();

        let mut reread = catalog.read_dataset("east-africa-chirps").await.unwrap();
        assert!(!add_chirps_to_dataset(&catalog, &mut reread, &latest, &descriptions()).await);
        assert_eq!(reread.resources, after_first.resources);

        assert!(!add_chirps_to_dataset(&catalog, &mut dataset, &latest, &descriptions()).await);
        assert_eq!(dataset, after_first);
    }

    #[tokio::test]
    async fn should_update_existing_season_in_place() {
        let mut dataset = dataset_fixture();
        let mut old = Resource::new(
            "ea_chirps_seasaccum_anom_marmay_202229_lta",
            "old",
            "https://lala/ea_chirps_seasaccum_anom_marmay_202229_lta.zip",
            "GeoTIFF",
        );
        old.id = Some("tif-1".to_string());
        dataset.resources.insert(0, old);
        let catalog = MemoryCatalog::with_dataset(dataset.clone());

        let updated = add_chirps_to_dataset(
            &catalog,
            &mut dataset,
            &latest(&[(SEASON, Some(LATEST))]),
            &descriptions(),
        )
        .await;

        assert!(updated);
        assert_eq!(dataset.resources.len(), 2);
        let resource = &dataset.resources[0];
        assert_eq!(resource.id.as_deref(), Some("tif-1"));
        assert_eq!(resource.name, "ea_chirps_seasaccum_anom_marmay_202230_lta");
        assert_eq!(resource.url, LATEST);
        assert!(resource.description.ends_with("Pentad: 30"));
        assert_eq!(dataset.date_of_dataset(), Some((ymd(2022, 5, 26), ymd(2022, 5, 31))));
    }

    #[tokio::test]
    async fn should_cover_all_seasons() {
        let mut dataset = dataset_fixture();
        dataset.resources.push(Resource::new(
            "ea_chirps_seasaccum_anom_octdec_202172_lta",
            "",
            "https://lala/ea_chirps_seasaccum_anom_octdec_202172_lta.zip",
            "GeoTIFF",
        ));
        let catalog = MemoryCatalog::with_dataset(dataset.clone());

        let updated = add_chirps_to_dataset(
            &catalog,
            &mut dataset,
            &latest(&[
                (SEASON, Some(LATEST)),
                ("octdec", Some("https://lala/ea_chirps_seasaccum_anom_octdec_202172_lta.zip")),
            ]),
            &descriptions(),
        )
        .await;

        assert!(updated);
        assert_eq!(dataset.resources_of_type("GeoTIFF").len(), 2);
        assert_eq!(dataset.date_of_dataset(), Some((ymd(2021, 12, 26), ymd(2022, 5, 31))));
    }

    #[tokio::test]
    async fn should_skip_seasons_without_data() {
        let catalog = MemoryCatalog::with_dataset(dataset_fixture());
        let mut dataset = dataset_fixture();

        let updated = add_chirps_to_dataset(
            &catalog,
            &mut dataset,
            &latest(&[(SEASON, None)]),
            &descriptions(),
        )
        .await;

        assert!(!updated);
        assert_eq!(dataset, dataset_fixture());
    }

    #[tokio::test]
    async fn should_downgrade_catalog_failure() {
        let catalog = MemoryCatalog::with_dataset(dataset_fixture()).failing();
        let mut dataset = dataset_fixture();

        let updated = add_chirps_to_dataset(
            &catalog,
            &mut dataset,
            &latest(&[(SEASON, Some(LATEST))]),
            &descriptions(),
        )
        .await;

        assert!(!updated);
        assert_eq!(catalog.stored("east-africa-chirps").unwrap(), dataset_fixture());
        assert_eq!(dataset, dataset_fixture());
    }

    #[test]
    fn should_describe_without_placeholder() {
        let parsed = ParsedFilename::parse(LATEST).unwrap();
        assert_eq!(describe("Pentad: ", &parsed), "Pentad: 30");
        assert_eq!(describe("{year} / ", &parsed), "2022 / 30");
    }

    #[test]
    fn should_ignore_unparsable_names_in_coverage() {
        let mut dataset = dataset_fixture();
        dataset.resources.push(Resource::new("legacy", "", "", "GeoTIFF"));
        assert_eq!(coverage(&dataset), None);

        dataset.resources.push(Resource::new(
            "ea_chirps_seasaccum_anom_marmay_202201_lta",
            "",
            "",
            "GeoTIFF",
        ));
        assert_eq!(coverage(&dataset), Some((ymd(2022, 1, 1), ymd(2022, 1, 5))));
    }
}
