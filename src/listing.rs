//! Finds the newest product file in a remote directory listing.

use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, error, info};

use crate::{download::fetch_text, filename::date_token};

const ARCHIVE_EXTENSION: &str = ".zip";

/// Latest product URL under `base_url`, or `None` if there is nothing to fetch.
///
/// A listing that cannot be downloaded is logged and treated as no data.
pub async fn get_latest_data(
    client: &Client,
    base_url: &str,
    exclude_year: Option<i32>,
) -> Option<String> {
    let html = match fetch_text(client, base_url).await {
        Ok(html) => html,
        Err(e) => {
            error!(error = %e, "Could not get data from {}", base_url);
            return None;
        }
    };

    let latest_file = select_latest_file(&html, exclude_year)?;
    let latest_url = format!("{}{}", base_url, latest_file);
    info!(url = %latest_url, "Latest data found");

    Some(latest_url)
}

/// Picks the archive with the greatest date token from an HTML listing.
///
/// Ties keep the first-seen file.
pub fn select_latest_file(html: &str, exclude_year: Option<i32>) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("a").ok()?;

    let mut latest: Option<(u32, String)> = None;

    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        if !href.ends_with(ARCHIVE_EXTENSION) {
            continue;
        }

        let Some(file_date) = date_token(href) else {
            debug!(href, "Skipping file without date token");
            continue;
        };

        if let Some(year) = exclude_year {
            if file_date.to_string().starts_with(&year.to_string()) {
                debug!(href, year, "Skipping excluded year");
                continue;
            }
        }

        match &latest {
            Some((latest_date, _)) if file_date <= *latest_date => {}
            _ => latest = Some((file_date, href.to_string())),
        }
    }

    latest.map(|(_, file)| file)
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {

    use super::*;
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn listing(files: &[&str]) -> String {
        let anchors: Vec<String> = files
            .iter()
            .map(|f| format!("<tr><td><a href=\"{f}\">{f}</a></td></tr>"))
            .collect();
        format!(
            "<html><body><h1>Index of /pentadal</h1><table>\
             <tr><td><a href=\"/products/\">Parent Directory</a></td></tr>{}\
             </table></body></html>",
            anchors.join("")
        )
    }

    #[test]
    fn should_select_latest_file() {
        let html = listing(&[
            "ea_chirps_seasaccum_anom_marmay_202225_lta.zip",
            "ea_chirps_seasaccum_anom_marmay_202230_lta.zip",
            "ea_chirps_seasaccum_anom_marmay_202115_lta.zip",
        ]);

        assert_eq!(
            select_latest_file(&html, None).unwrap(),
            "ea_chirps_seasaccum_anom_marmay_202230_lta.zip"
        );
    }

    #[test]
    fn should_ignore_non_archives() {
        let html = listing(&[
            "ea_chirps_seasaccum_anom_marmay_202225_lta.zip",
            "ea_chirps_seasaccum_anom_marmay_202230_lta.tif",
        ]);

        assert_eq!(
            select_latest_file(&html, None).unwrap(),
            "ea_chirps_seasaccum_anom_marmay_202225_lta.zip"
        );
    }

    #[test]
    fn should_exclude_year() {
        let html = listing(&[
            "ea_chirps_seasaccum_anom_marmay_202130_lta.zip",
            "ea_chirps_seasaccum_anom_marmay_202205_lta.zip",
        ]);

        assert_eq!(
            select_latest_file(&html, Some(2022)).unwrap(),
            "ea_chirps_seasaccum_anom_marmay_202130_lta.zip"
        );
    }

    #[test]
    fn should_keep_first_seen_on_equal_dates() {
        let html = listing(&[
            "ea_chirps_seasaccum_anom_marmay_202230_lta.zip",
            "wa_chirps_seasaccum_anom_marmay_202230_lta.zip",
        ]);

        assert_eq!(
            select_latest_file(&html, None).unwrap(),
            "ea_chirps_seasaccum_anom_marmay_202230_lta.zip"
        );
    }

    #[test]
    fn should_return_none_for_listing_without_archives() {
        assert_eq!(select_latest_file(&listing(&[]), None), None);
        assert_eq!(select_latest_file("", None), None);
        assert_eq!(select_latest_file(&listing(&["readme.txt"]), None), None);
    }

    #[tokio::test]
    async fn should_build_latest_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pentadal/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(listing(&[
                "ea_chirps_seasaccum_anom_marmay_202225_lta.zip",
                "ea_chirps_seasaccum_anom_marmay_202230_lta.zip",
            ])))
            .mount(&server)
            .await;

        let base_url = format!("{}/pentadal/", server.uri());
        let url = get_latest_data(&Client::new(), &base_url, None).await.unwrap();

        assert_eq!(
            url,
            format!("{}ea_chirps_seasaccum_anom_marmay_202230_lta.zip", base_url)
        );
    }

    #[tokio::test]
    async fn should_report_unreachable_listing_as_no_data() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let base_url = format!("{}/pentadal/", server.uri());
        assert!(get_latest_data(&Client::new(), &base_url, None).await.is_none());
    }
}
