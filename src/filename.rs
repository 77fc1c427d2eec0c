//! Metadata encoded in CHIRPS product file names.
//!
//! Product files follow `{region}_chirps_seasaccum_anom_{season}_{YYYYPP}_lta.zip`
//! where `YYYY` is the year and `PP` the pentad of the year (1 to 72).

use anyhow::{anyhow, Result};

/// Underscore-delimited position of the `YYYYPP` date token.
pub const DATE_TOKEN_INDEX: usize = 5;

/// Pentads in a year: six per month.
pub const PENTADS_PER_YEAR: u32 = 72;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Structured view of a product file name.
pub struct ParsedFilename {
    pub stem: String,
    pub date_token: u32,
    pub year: i32,
    pub pentad: u32,
}

impl ParsedFilename {
    /// Parses a file name, URL or resource name.
    pub fn parse(name: &str) -> Result<Self> {
        let stem = file_stem(name);
        let parts: Vec<&str> = stem.split('_').collect();

        let date_token = parts
            .get(DATE_TOKEN_INDEX)
            .ok_or_else(|| anyhow!("`{}` has no date token", stem))?;
        let year = date_token
            .get(..4)
            .ok_or_else(|| anyhow!("`{}` has a short date token", stem))?
            .parse::<i32>()?;
        let date_token = date_token.parse::<u32>()?;

        if parts.len() < 2 {
            return Err(anyhow!("`{}` has no pentad token", stem));
        }
        let pentad_token = parts[parts.len() - 2];
        let pentad = pentad_token
            .get(pentad_token.len().saturating_sub(2)..)
            .ok_or_else(|| anyhow!("`{}` has no pentad", stem))?
            .parse::<u32>()?;

        if !(1..=PENTADS_PER_YEAR).contains(&pentad) {
            return Err(anyhow!("`{}` has pentad {} out of range", stem, pentad));
        }

        Ok(ParsedFilename {
            stem: stem.to_string(),
            date_token,
            year,
            pentad,
        })
    }

    /// Pentad as written in resource descriptions, e.g. `05` or `30`.
    pub fn pentad_label(&self) -> String {
        format!("{:02}", self.pentad)
    }
}

/// Reads only the date token, for ordering directory listings.
pub fn date_token(file_name: &str) -> Option<u32> {
    file_stem(file_name)
        .split('_')
        .nth(DATE_TOKEN_INDEX)
        .and_then(|t| t.parse().ok())
}

/// Last path segment without its extension.
pub fn file_stem(name: &str) -> &str {
    let file_name = name.rsplit('/').next().unwrap_or(name);
    file_name.split('.').next().unwrap_or(file_name)
}

// -- Tests -------------------------------------------------------------------
