//! In-process catalog for tests.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Mutex,
};

use async_trait::async_trait;

use super::{Catalog, Dataset, Resource};
use crate::error::CatalogError;

#[derive(Default)]
pub struct MemoryCatalog {
    datasets: Mutex<HashMap<String, Dataset>>,
    uploads: Mutex<Vec<(String, PathBuf)>>,
    fail_updates: bool,
}

impl MemoryCatalog {
    pub fn with_dataset(dataset: Dataset) -> Self {
        let catalog = MemoryCatalog::default();
        catalog.insert(dataset);
        catalog
    }

    pub fn insert(&self, dataset: Dataset) {
        self.datasets
            .lock()
            .unwrap()
            .insert(dataset.name.clone(), dataset);
    }

    /// Every update fails as if the catalog rejected it.
    pub fn failing(mut self) -> Self {
        self.fail_updates = true;
        self
    }

    pub fn stored(&self, name: &str) -> Option<Dataset> {
        self.datasets.lock().unwrap().get(name).cloned()
    }

    pub fn uploads(&self) -> Vec<(String, PathBuf)> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn read_dataset(&self, id: &str) -> Result<Dataset, CatalogError> {
        self.stored(id)
            .ok_or_else(|| CatalogError::DatasetNotFound(id.to_string()))
    }

    async fn update_dataset(&self, dataset: &Dataset) -> Result<Dataset, CatalogError> {
        if self.fail_updates {
            return Err(CatalogError::Api {
                action: "package_patch".to_string(),
                message: "rejected".to_string(),
            });
        }

        let mut stored = dataset.clone();
        for (i, resource) in stored.resources.iter_mut().enumerate() {
            if resource.id.is_none() {
                resource.id = Some(format!("{}-r{}", dataset.name, i));
            }
        }
        self.datasets
            .lock()
            .unwrap()
            .insert(dataset.name.clone(), stored.clone());

        Ok(stored)
    }

    async fn upload_resource_file(
        &self,
        resource: &Resource,
        file: &Path,
    ) -> Result<(), CatalogError> {
        let id = resource
            .id
            .clone()
            .ok_or_else(|| CatalogError::MissingResourceId(resource.name.clone()))?;
        self.uploads
            .lock()
            .unwrap()
            .push((id, file.to_path_buf()));
        Ok(())
    }
}
