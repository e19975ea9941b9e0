//! Download layer for TLC trip data and the zone lookup table.
//!
//! This sits outside the core transformation: it only has to land raw files
//! in the data directory or fail with a `DataUnavailable` error the caller
//! propagates. Files already present are never re-downloaded.

mod basic;
mod client;

pub use basic::BasicClient;
pub use client::HttpClient;

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::errors::PipelineError;

pub const TLC_BASE_URL: &str = "https://d37ci6vzurychx.cloudfront.net/trip-data";
pub const ZONE_LOOKUP_URL: &str =
    "https://d37ci6vzurychx.cloudfront.net/misc/taxi_zone_lookup.csv";

/// Builds the canonical URL for one monthly trip file.
pub fn tripdata_url(base: &str, prefix: &str, year: i32, month: u32) -> String {
    format!("{base}/{prefix}_tripdata_{year}-{month:02}.csv.gz")
}

/// Fetches `url` into memory, mapping transport and HTTP failures to
/// [`PipelineError::DataUnavailable`].
pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Vec<u8>> {
    let req = reqwest::Request::new(reqwest::Method::GET, url.parse()?);

    let resp = client
        .execute(req)
        .await
        .map_err(|e| PipelineError::data_unavailable(url, e.to_string()))?;

    if !resp.status().is_success() {
        return Err(
            PipelineError::data_unavailable(url, format!("HTTP {}", resp.status())).into(),
        );
    }

    Ok(resp.bytes().await?.to_vec())
}

/// Downloads `url` into `data_dir` unless the target file already exists.
/// Returns the local path either way.
pub async fn download_if_missing<C: HttpClient>(
    client: &C,
    url: &str,
    data_dir: &str,
) -> Result<PathBuf> {
    let filename = url.rsplit('/').next().unwrap_or(url);
    let path = Path::new(data_dir).join(filename);

    if path.exists() {
        debug!(file = filename, "Already cached");
        return Ok(path);
    }

    std::fs::create_dir_all(data_dir)?;

    info!(url, "Downloading");
    let bytes = fetch_bytes(client, url).await?;
    std::fs::write(&path, &bytes)?;

    info!(file = filename, bytes = bytes.len(), "Download complete");
    Ok(path)
}
