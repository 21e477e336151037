//! Best-effort download of listing images.
//!
//! Each record's image is saved as `<imgs>/<slug>.jpg`. Downloads are retried
//! up to the job's ceiling; a download that never succeeds leaves the record
//! with an empty filename instead of failing it.

use crate::errors::{BotError, Result};
use crate::retry::retry;
use std::fmt::Display;
use std::path::Path;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{error, info, instrument, warn};

/// Fetches one remote asset into a local file.
pub trait AssetFetcher {
    fn download(&mut self, url: &str, dest: &Path) -> Result<()>;
}

/// `reqwest` downloader bridged onto a tokio runtime handle.
#[derive(Debug)]
pub struct HttpAssetFetcher {
    client: reqwest::Client,
    runtime: Handle,
}

fn download_err(e: impl Display) -> BotError {
    BotError::Download(e.to_string())
}

impl HttpAssetFetcher {
    pub fn new(runtime: Handle) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(download_err)?;
        Ok(HttpAssetFetcher { client, runtime })
    }
}

impl AssetFetcher for HttpAssetFetcher {
    fn download(&mut self, url: &str, dest: &Path) -> Result<()> {
        self.runtime.block_on(async {
            let response = self.client.get(url).send().await.map_err(download_err)?;
            let status = response.status();
            if status != reqwest::StatusCode::OK {
                warn!(url, %status, "Failed to download image");
                return Err(BotError::Download(format!("{url} answered {status}")));
            }
            let bytes = response.bytes().await.map_err(download_err)?;
            tokio::fs::write(dest, &bytes).await?;
            Ok(())
        })
    }
}

/// Download `url` to `<dir>/<slug>.jpg`, returning the saved path or `""`.
///
/// Nothing is attempted when the image URL or the slug is empty.
#[instrument(level = "debug", skip(fetcher, dir))]
pub fn save_image(
    fetcher: &mut dyn AssetFetcher,
    url: &str,
    dir: &Path,
    slug: &str,
    attempts: usize,
) -> String {
    if url.is_empty() || slug.is_empty() {
        return String::new();
    }
    let dest = dir.join(format!("{slug}.jpg"));
    match retry("download_image", attempts, || fetcher.download(url, &dest)) {
        Ok(()) => {
            info!(path = %dest.display(), "Image successfully downloaded");
            dest.display().to_string()
        }
        Err(e) => {
            error!(url, attempts, error = %e, "Unable to download image");
            String::new()
        }
    }
}
