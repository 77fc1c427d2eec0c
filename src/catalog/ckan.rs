//! CKAN action API client (HDX runs on CKAN).

use std::path::Path;

use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client, RequestBuilder,
};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{Catalog, Dataset, Resource};
use crate::error::CatalogError;

#[derive(Debug, Deserialize)]
struct ActionResponse<T> {
    success: bool,
    result: Option<T>,
    error: Option<Value>,
}

pub struct CkanCatalog {
    client: Client,
    site_url: String,
    api_key: Option<String>,
}

impl CkanCatalog {
    pub fn new(client: Client, site_url: &str, api_key: Option<String>) -> Self {
        CkanCatalog {
            client,
            site_url: site_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn action_url(&self, action: &str) -> String {
        format!("{}/api/3/action/{}", self.site_url, action)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("Authorization", key),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        action: &str,
        request: RequestBuilder,
    ) -> Result<T, CatalogError> {
        let response = self.authorize(request).send().await?;
        let status = response.status();
        let body: ActionResponse<T> = response.json().await.map_err(|e| CatalogError::Api {
            action: action.to_string(),
            message: format!("{} ({})", status, e),
        })?;

        match body {
            ActionResponse {
                success: true,
                result: Some(result),
                ..
            } => Ok(result),
            ActionResponse { error, .. } => Err(CatalogError::Api {
                action: action.to_string(),
                message: error
                    .as_ref()
                    .and_then(|e| e.get("message"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| status.to_string()),
            }),
        }
    }
}

#[async_trait]
impl Catalog for CkanCatalog {
    async fn read_dataset(&self, id: &str) -> Result<Dataset, CatalogError> {
        debug!(dataset = id, "Reading dataset");
        let request = self
            .client
            .get(self.action_url("package_show"))
            .query(&[("id", id)]);

        match self.send::<Dataset>("package_show", request).await {
            Err(CatalogError::Api { message, .. }) if message.contains("Not found") => {
                Err(CatalogError::DatasetNotFound(id.to_string()))
            }
            other => other,
        }
    }

    async fn update_dataset(&self, dataset: &Dataset) -> Result<Dataset, CatalogError> {
        info!(dataset = %dataset.name, resources = dataset.resources.len(), "Updating dataset");
        let id = if dataset.id.is_empty() {
            &dataset.name
        } else {
            &dataset.id
        };
        let mut body = json!({
            "id": id,
            "resources": dataset.resources,
        });
        if let Some(date) = &dataset.dataset_date {
            body["dataset_date"] = Value::from(date.as_str());
        }

        let request = self.client.post(self.action_url("package_patch")).json(&body);
        self.send("package_patch", request).await
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
        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| resource.name.clone());

        info!(resource = %resource.name, file = %file.display(), "Uploading resource file");
        let data = tokio::fs::read(file).await?;
        let form = Form::new()
            .text("id", id)
            .part("upload", Part::bytes(data).file_name(file_name));

        let request = self
            .client
            .post(self.action_url("resource_patch"))
            .multipart(form);
        let _: Value = self.send("resource_patch", request).await?;

        Ok(())
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::{
        matchers::{header, method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    fn dataset_json() -> Value {
        json!({
            "success": true,
            "result": {
                "id": "d1",
                "name": "east-africa-chirps",
                "dataset_date": "[2022-05-21T00:00:00 TO 2022-05-25T23:59:59]",
                "resources": [
                    {
                        "id": "r1",
                        "name": "ea_chirps_seasaccum_anom_marmay_202229_lta",
                        "description": "Pentad: 29",
                        "url": "https://lala/ea_chirps_seasaccum_anom_marmay_202229_lta.zip",
                        "format": "GeoTIFF"
                    },
                    {
                        "id": "r2",
                        "name": "subnational_anomaly_statistics.csv",
                        "url": "https://data/subnational_anomaly_statistics.csv",
                        "format": "CSV",
                        "url_type": "upload"
                    }
                ]
            }
        })
    }

    #[tokio::test]
    async fn should_read_dataset() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/3/action/package_show"))
            .and(query_param("id", "east-africa-chirps"))
            .and(header("Authorization", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(dataset_json()))
            .mount(&server)
            .await;

        let catalog = CkanCatalog::new(Client::new(), &server.uri(), Some("secret".to_string()));
        let dataset = catalog.read_dataset("east-africa-chirps").await.unwrap();

        assert_eq!(dataset.id, "d1");
        assert_eq!(dataset.resources.len(), 2);
        assert!(dataset.resources[0].is_raster());
        assert_eq!(dataset.resources_of_type("csv")[0].id.as_deref(), Some("r2"));
    }

    #[tokio::test]
    async fn should_map_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/3/action/package_show"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "success": false,
                "error": {"message": "Not found", "__type": "Not Found Error"}
            })))
            .mount(&server)
            .await;

        let catalog = CkanCatalog::new(Client::new(), &server.uri(), None);
        let err = catalog.read_dataset("missing").await.unwrap_err();

        assert!(matches!(err, CatalogError::DatasetNotFound(id) if id == "missing"));
    }

    #[tokio::test]
    async fn should_report_failed_update() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/3/action/package_patch"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "success": false,
                "error": {"message": "Access denied"}
            })))
            .mount(&server)
            .await;

        let catalog = CkanCatalog::new(Client::new(), &server.uri(), None);
        let err = catalog
            .update_dataset(&Dataset::new("east-africa-chirps"))
            .await
            .unwrap_err();

        assert!(matches!(err, CatalogError::Api { message, .. } if message == "Access denied"));
    }

    #[tokio::test]
    async fn should_upload_resource_file() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/3/action/resource_patch"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"success": true, "result": {}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let csv = temp_dir.path().join("stats.csv");
        std::fs::write(&csv, "a,b\n1,2\n").unwrap();

        let mut resource = Resource::new("stats", "", "", "CSV");
        let catalog = CkanCatalog::new(Client::new(), &server.uri(), None);

        assert!(matches!(
            catalog.upload_resource_file(&resource, &csv).await,
            Err(CatalogError::MissingResourceId(_))
        ));

        resource.id = Some("r2".to_string());
        catalog.upload_resource_file(&resource, &csv).await.unwrap();
    }
}
