use anyhow::{Context, Result};
use regex::Regex;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, info};

use super::{HttpClient, fetch_bytes};

pub const DEFAULT_BASE_URL: &str = "https://www.ncei.noaa.gov/pub/data/swdi/stormevents/csvfiles/";

static DETAILS_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^StormEvents_details-.*_d(\d{4})_c\d+\.csv\.gz$").expect("valid details pattern")
});

static DETAILS_HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"href="(StormEvents_details-[^"]+\.csv\.gz)""#).expect("valid href pattern")
});

/// Event year encoded in a details file name, e.g.
/// `StormEvents_details-ftp_v1.0_d1996_c20210803.csv.gz` → 1996.
pub fn details_year(file_name: &str) -> Option<i32> {
    DETAILS_FILE
        .captures(file_name)
        .and_then(|c| c[1].parse().ok())
}

/// Details-file names linked from a directory listing page.
pub fn details_links(html: &str) -> Vec<String> {
    let names: BTreeSet<String> = DETAILS_HREF
        .captures_iter(html)
        .map(|c| c[1].to_string())
        .filter(|name| details_year(name).is_some())
        .collect();
    names.into_iter().collect()
}

/// Downloads the details file of every requested year into `dir`.
///
/// Existing files are kept unless `force` is set. Returns how many files
/// were downloaded.
#[tracing::instrument(skip(client, years, dir), fields(dir = %dir.display()))]
pub async fn download_years<C: HttpClient>(
    client: &C,
    base_url: &str,
    dir: &Path,
    years: &[i32],
    force: bool,
) -> Result<usize> {
    std::fs::create_dir_all(dir)?;
    let index = fetch_bytes(client, base_url)
        .await
        .context("fetching directory listing")?;
    let links = details_links(&String::from_utf8_lossy(&index));
    debug!(links = links.len(), "Directory listing parsed");

    let mut downloaded = 0;
    for name in links {
        let Some(year) = details_year(&name) else {
            continue;
        };
        if !years.contains(&year) {
            continue;
        }
        let target = dir.join(&name);
        if target.exists() && !force {
            debug!(year, file = %name, "Already present");
            continue;
        }

        info!(year, file = %name, "Downloading");
        let url = format!("{}/{}", base_url.trim_end_matches('/'), name);
        let bytes = fetch_bytes(client, &url)
            .await
            .with_context(|| format!("downloading {name}"))?;
        tokio::fs::write(&target, bytes)
            .await
            .with_context(|| format!("writing {}", target.display()))?;
        downloaded += 1;
    }

    info!(downloaded, "Download complete");
    Ok(downloaded)
}
