//! Errors raised by the external collaborators.

use thiserror::Error;

/// Failure talking to the data catalog.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Catalog action `{action}` failed: {message}")]
    Api { action: String, message: String },

    #[error("Dataset not found: {0}")]
    DatasetNotFound(String),

    #[error("Resource has no id: {0}")]
    MissingResourceId(String),
}

/// Failure publishing a rendered raster.
#[derive(Error, Debug)]
pub enum PublishError {
    /// The service rejected the upload as unprocessable; worth retrying.
    #[error("Upload rejected with 422: {0}")]
    Unprocessable(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Staging upload failed: {0}")]
    Staging(String),

    #[error("Upload failed with {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("Invalid map id: {0}")]
    InvalidMapId(String),
}
