//! Dataset and resource records of the open-data catalog.

pub mod ckan;
#[cfg(test)]
pub mod memory;

use std::path::Path;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CatalogError;

pub use ckan::CkanCatalog;

/// Format tag of raster resources.
pub const GEOTIFF_FORMAT: &str = "GeoTIFF";

/// Format tag of the statistics table.
pub const CSV_FORMAT: &str = "CSV";

/// Read and write access to catalog datasets.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn read_dataset(&self, id: &str) -> Result<Dataset, CatalogError>;

    /// Upserts resources by name and stores the coverage dates.
    async fn update_dataset(&self, dataset: &Dataset) -> Result<Dataset, CatalogError>;

    /// Replaces the file behind an existing resource.
    async fn upload_resource_file(&self, resource: &Resource, file: &Path)
        -> Result<(), CatalogError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub format: String,
    /// Fields the pipeline does not manage, kept for round trips.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Resource {
    pub fn new(name: &str, description: &str, url: &str, format: &str) -> Self {
        Resource {
            id: None,
            name: name.to_string(),
            description: description.to_string(),
            url: url.to_string(),
            format: format.to_string(),
            extra: Map::new(),
        }
    }

    /// Lower-cased format, e.g. `geotiff` or `csv`.
    pub fn file_type(&self) -> String {
        self.format.to_lowercase()
    }

    pub fn is_raster(&self) -> bool {
        self.file_type() == GEOTIFF_FORMAT.to_lowercase()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub id: String,
    pub name: String,
    /// Coverage in the catalog's `[start TO end]` notation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_date: Option<String>,
    #[serde(default)]
    pub resources: Vec<Resource>,
}

impl Dataset {
    pub fn new(name: &str) -> Self {
        Dataset {
            id: String::new(),
            name: name.to_string(),
            dataset_date: None,
            resources: Vec::new(),
        }
    }

    /// Sets the coverage, the end date inclusive.
    pub fn set_date_of_dataset(&mut self, start: NaiveDate, end: NaiveDate) {
        self.dataset_date = Some(format!(
            "[{}T00:00:00 TO {}T23:59:59]",
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d")
        ));
    }

    pub fn date_of_dataset(&self) -> Option<(NaiveDate, NaiveDate)> {
        let value = self.dataset_date.as_deref()?;
        let (start, end) = value
            .trim_start_matches('[')
            .trim_end_matches(']')
            .split_once(" TO ")?;
        let parse = |s: &str| NaiveDate::parse_from_str(s.get(..10)?, "%Y-%m-%d").ok();

        Some((parse(start)?, parse(end)?))
    }

    /// Resources whose format matches, case-insensitively.
    pub fn resources_of_type(&self, file_type: &str) -> Vec<&Resource> {
        let file_type = file_type.to_lowercase();
        self.resources
            .iter()
            .filter(|r| r.file_type() == file_type)
            .collect()
    }
}

// -- Tests -------------------------------------------------------------------
