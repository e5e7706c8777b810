//! Update downloads.

use crate::{UpdateError, UpdateResult};
use async_trait::async_trait;
use futures_util::StreamExt;
use std::path::Path;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Fetches an update payload to a local file.
#[async_trait]
pub trait Downloader: Send + Sync {
    async fn download(&self, url: &str, dest: &Path) -> UpdateResult<()>;
}

/// HTTP(S) downloader. Only a `200 OK` response counts as success; the body
/// is streamed to disk chunk by chunk.
pub struct HttpDownloader {
    client: reqwest::Client,
}

impl HttpDownloader {
    pub fn new(user_agent: &str) -> UpdateResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn download(&self, url: &str, dest: &Path) -> UpdateResult<()> {
        info!(url, dest = %dest.display(), "Downloading update");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| UpdateError::DownloadFailed(e.to_string()))?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(UpdateError::DownloadFailed(format!(
                "server returned {}",
                response.status()
            )));
        }

        let mut file = File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| UpdateError::DownloadFailed(e.to_string()))?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        debug!(url, bytes = written, "Download complete");
        Ok(())
    }
}
