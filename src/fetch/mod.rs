//! Retrieval of the yearly Storm Events details files.
//!
//! The NOAA directory listing is scraped for `StormEvents_details-*` links and
//! each requested year is downloaded into the raw directory, skipping files
//! that are already present unless a refresh is forced.

mod basic;
mod client;
mod listing;

pub use basic::BasicClient;
pub use client::HttpClient;
pub use listing::{DEFAULT_BASE_URL, details_links, details_year, download_years};

use anyhow::{Result, bail};

pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Vec<u8>> {
    let req = reqwest::Request::new(reqwest::Method::GET, url.parse()?);

    let resp = client.execute(req).await?;
    if !resp.status().is_success() {
        bail!("GET {url} returned status {}", resp.status());
    }
    Ok(resp.bytes().await?.to_vec())
}
