//! Downloads product archives and extracts the raster they carry.

use std::{
    fs::File,
    io::{self, Write},
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Error, Result};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::cli::create_spinner;

/// Fetches a page as text, e.g. a directory listing.
pub async fn fetch_text(client: &Client, url: &str) -> Result<String> {
    debug!(url, "Fetching");
    let response = client.get(url).send().await?;

    if !response.status().is_success() {
        return Err(anyhow!("Failed to fetch {}: {}", url, response.status()));
    }

    Ok(response.text().await?)
}

/// Downloads `url` into `folder`, keeping the remote file name.
pub async fn download_file(client: &Client, url: &str, folder: &Path) -> Result<PathBuf> {
    let file_name = url
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .ok_or_else(|| anyhow!("No file name in {}", url))?;
    let file_path = folder.join(file_name);

    let bar = create_spinner(format!("Downloading {}...", file_name));
    download_with_progress(client, url, &file_path, &bar).await?;
    bar.finish_with_message(format!("{} downloaded", file_name));

    Ok(file_path)
}

/// Streams a download to disk, converting the spinner to a bar when the size is known.
async fn download_with_progress(
    client: &Client,
    url: &str,
    file_path: &Path,
    progress_bar: &ProgressBar,
) -> Result<(), Error> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| Error::msg(format!("Failed to download file: {}", e)))?;

    if !response.status().is_success() {
        return Err(Error::msg(format!(
            "Failed to download file: {}",
            response.status()
        )));
    }

    let total_size = response.content_length().unwrap_or(0);
    if total_size > 0 {
        progress_bar.set_length(total_size);
        if let Ok(style) = ProgressStyle::with_template(
            "{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({percent}%) {eta}",
        ) {
            progress_bar.set_style(style.progress_chars("=> "));
        }
    }

    let mut file = File::create(file_path)?;
    let mut downloaded = 0u64;
    let mut stream = response.bytes_stream();

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| Error::msg(format!("Error reading chunk: {}", e)))?;
        file.write_all(&chunk)?;
        downloaded += chunk.len() as u64;
        progress_bar.set_position(downloaded);
    }

    Ok(())
}

/// Extracts the raster member of a product archive into `folder`.
///
/// Returns `None` when the archive holds no `.tif`/`.tiff` file.
pub fn extract_raster(archive_path: &Path, folder: &Path) -> Result<Option<PathBuf>> {
    let file = File::open(archive_path)
        .with_context(|| format!("Failed to open {}", archive_path.display()))?;
    let mut archive = ZipArchive::new(file).context("Failed to read zip archive")?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .with_context(|| format!("Failed to read zip entry at index {}", i))?;

        if entry.is_dir() {
            continue;
        }

        let Some(name) = entry
            .enclosed_name()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
        else {
            continue;
        };

        if !is_raster_name(&name) {
            continue;
        }

        let out_path = folder.join(&name);
        let mut out = File::create(&out_path)?;
        io::copy(&mut entry, &mut out)?;

        return Ok(Some(out_path));
    }

    warn!(archive = %archive_path.display(), "No raster member in archive");
    Ok(None)
}

fn is_raster_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.ends_with(".tif") || lower.ends_with(".tiff")
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::{fs, io::Write};
    use tempfile::TempDir;
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };
    use zip::{write::SimpleFileOptions, ZipWriter};

    fn make_zip(dir: &Path, members: &[(&str, &[u8])]) -> PathBuf {
        let zip_path = dir.join("archive.zip");
        let mut writer = ZipWriter::new(File::create(&zip_path).unwrap());
        for (name, data) in members {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
        zip_path
    }

    #[test]
    fn should_extract_raster_member() {
        let temp_dir = TempDir::new().unwrap();
        let zip_path = make_zip(
            temp_dir.path(),
            &[("readme.txt", b"hello"), ("ea_anom.tif", b"II*\0")],
        );

        let raster = extract_raster(&zip_path, temp_dir.path()).unwrap().unwrap();

        assert_eq!(raster, temp_dir.path().join("ea_anom.tif"));
        assert_eq!(fs::read(raster).unwrap(), b"II*\0");
    }

    #[test]
    fn should_return_none_without_raster_member() {
        let temp_dir = TempDir::new().unwrap();
        let zip_path = make_zip(temp_dir.path(), &[("readme.txt", b"hello")]);

        assert!(extract_raster(&zip_path, temp_dir.path()).unwrap().is_none());
    }

    #[tokio::test]
    async fn should_download_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/file_a.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"zipdata".to_vec()))
            .mount(&server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let url = format!("{}/data/file_a.zip", server.uri());
        let path = download_file(&Client::new(), &url, temp_dir.path())
            .await
            .unwrap();

        assert_eq!(path, temp_dir.path().join("file_a.zip"));
        assert_eq!(fs::read(path).unwrap(), b"zipdata");
    }

    #[tokio::test]
    async fn should_fail_on_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let url = format!("{}/missing.zip", server.uri());

        assert!(download_file(&Client::new(), &url, temp_dir.path())
            .await
            .is_err());
        assert!(fetch_text(&Client::new(), &url).await.is_err());
    }
}
