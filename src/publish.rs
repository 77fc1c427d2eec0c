//! Publishing rendered rasters as map tilesets.

use std::{path::Path, time::Duration};

use async_trait::async_trait;
use aws_sdk_s3::{
    config::{Credentials, Region},
    error::DisplayErrorContext,
    primitives::ByteStream,
};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::error::PublishError;

pub const MAPBOX_API_URL: &str = "https://api.mapbox.com";

/// Region of the Mapbox staging bucket.
const STAGING_REGION: &str = "us-east-1";

/// Tileset to replace and its display name.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MapTarget {
    pub mapid: String,
    pub name: String,
}

impl MapTarget {
    /// Account owning the tileset, the part of the map id before the dot.
    pub fn username(&self) -> Result<&str, PublishError> {
        match self.mapid.split_once('.') {
            Some((user, tileset)) if !user.is_empty() && !tileset.is_empty() => Ok(user),
            _ => Err(PublishError::InvalidMapId(self.mapid.clone())),
        }
    }
}

/// Uploads a raster file as a tileset.
#[async_trait]
pub trait MapPublisher: Send + Sync {
    /// Returns the service's upload id.
    async fn upload(&self, target: &MapTarget, file: &Path) -> Result<String, PublishError>;
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            retries: 5,
            delay: Duration::from_secs(5),
        }
    }
}

/// Uploads with a fixed-delay retry on 422 responses.
///
/// Returns the map id on success. Exhausted retries and other failures are
/// logged and reported as `None`.
pub async fn upload_with_retry(
    publisher: &dyn MapPublisher,
    target: &MapTarget,
    file: &Path,
    policy: &RetryPolicy,
) -> Option<String> {
    let mut attempt = 0;
    loop {
        match publisher.upload(target, file).await {
            Ok(upload_id) => {
                info!(mapid = %target.mapid, upload = %upload_id, "Uploaded {}", target.name);
                return Some(target.mapid.clone());
            }
            Err(PublishError::Unprocessable(message)) if attempt < policy.retries => {
                attempt += 1;
                warn!(mapid = %target.mapid, attempt, message = %message, "Upload unprocessable, retrying");
                tokio::time::sleep(policy.delay).await;
            }
            Err(e) => {
                error!(mapid = %target.mapid, error = %e, "Could not upload {}", target.name);
                return None;
            }
        }
    }
}

/// Temporary credentials for the staging bucket.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StagingCredentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: String,
    bucket: String,
    key: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    id: String,
}

/// Mapbox uploads API: stage the file on S3, then create the upload.
pub struct MapboxUploader {
    client: Client,
    api_url: String,
    access_token: String,
}

impl MapboxUploader {
    pub fn new(client: Client, api_url: &str, access_token: &str) -> Self {
        MapboxUploader {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
        }
    }

    async fn staging_credentials(&self, user: &str) -> Result<StagingCredentials, PublishError> {
        let url = format!("{}/uploads/v1/{}/credentials", self.api_url, user);
        let response = self
            .client
            .post(&url)
            .query(&[("access_token", &self.access_token)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PublishError::Rejected {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        Ok(response.json().await?)
    }

    async fn stage(&self, credentials: &StagingCredentials, file: &Path) -> Result<(), PublishError> {
        let config = aws_sdk_s3::Config::builder()
            .credentials_provider(Credentials::new(
                &credentials.access_key_id,
                &credentials.secret_access_key,
                Some(credentials.session_token.clone()),
                None,
                "mapbox-staging",
            ))
            .region(Region::new(STAGING_REGION))
            .build();
        let s3 = aws_sdk_s3::Client::from_conf(config);

        let body = ByteStream::from_path(file)
            .await
            .map_err(|e| PublishError::Staging(e.to_string()))?;

        debug!(bucket = %credentials.bucket, key = %credentials.key, "Staging upload");
        s3.put_object()
            .bucket(&credentials.bucket)
            .key(&credentials.key)
            .body(body)
            .send()
            .await
            .map_err(|e| PublishError::Staging(DisplayErrorContext(e).to_string()))?;

        Ok(())
    }

    async fn create_upload(
        &self,
        user: &str,
        target: &MapTarget,
        staged_url: &str,
    ) -> Result<String, PublishError> {
        let url = format!("{}/uploads/v1/{}", self.api_url, user);
        let response = self
            .client
            .post(&url)
            .query(&[("access_token", &self.access_token)])
            .json(&json!({
                "url": staged_url,
                "tileset": target.mapid,
                "name": target.name,
            }))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNPROCESSABLE_ENTITY {
            return Err(PublishError::Unprocessable(response.text().await.unwrap_or_default()));
        }
        if !status.is_success() {
            return Err(PublishError::Rejected {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let upload: UploadResponse = response.json().await?;
        Ok(upload.id)
    }
}

#[async_trait]
impl MapPublisher for MapboxUploader {
    async fn upload(&self, target: &MapTarget, file: &Path) -> Result<String, PublishError> {
        let user = target.username()?;
        let credentials = self.staging_credentials(user).await?;
        self.stage(&credentials, file).await?;
        self.create_upload(user, target, &credentials.url).await
    }
}

// -- Tests -------------------------------------------------------------------
