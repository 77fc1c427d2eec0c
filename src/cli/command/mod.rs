pub mod latest;
pub mod run;

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use chrono::{Datelike, Local};
pub use latest::latest;
pub use run::{run, RunOptions};

pub fn make_parquet_file_name(name: &str) -> Result<PathBuf> {
    let today = Local::now();
    let file_name = format!(
        "chirps-{}-{}-{:02}-{:02}.parquet",
        name,
        today.year(),
        today.month(),
        today.day()
    );

    let home = dirs::home_dir().ok_or_else(|| anyhow!("No home directory"))?;
    Ok(home.join(file_name))
}

/// HTTP client shared by the commands.
pub fn http_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()?)
}
