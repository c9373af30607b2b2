//! Fetching result and error-record files from the engine.

use std::path::{Path, PathBuf};

use bench_common::{BenchError, BenchResult};
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use tracing::{info, instrument};

use crate::config::ClientSettings;

pub const RESULTS_PATH: &str = "/api/download-results";
pub const ERRORS_PATH: &str = "/api/download-errors";

/// What a download produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Saved { path: PathBuf, bytes: usize },
    /// The engine has no error records; not a failure.
    NoRecords,
}

impl DownloadOutcome {
    /// Message to show once the download finished.
    pub fn notice(&self) -> String {
        match self {
            DownloadOutcome::Saved { path, bytes } => {
                format!("Saved {} bytes to {}", bytes, path.display())
            }
            DownloadOutcome::NoRecords => "No error records for the last run".to_string(),
        }
    }
}

/// Downloads files produced by the engine into a local directory.
pub struct Downloader {
    client: Client,
    results_url: String,
    errors_url: String,
}

impl Downloader {
    pub fn new(settings: &ClientSettings) -> BenchResult<Self> {
        let client = Client::builder()
            .timeout(settings.download_timeout())
            .build()
            .map_err(|e| BenchError::Internal(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            results_url: settings.endpoint(RESULTS_PATH),
            errors_url: settings.endpoint(ERRORS_PATH),
        })
    }

    /// Save the latest results as a CSV file in `out_dir`.
    pub async fn download_results(&self, out_dir: &Path) -> BenchResult<DownloadOutcome> {
        let name = results_file_name(Utc::now());
        let bytes = self.fetch(&self.results_url).await?.ok_or_else(|| BenchError::Transport {
            status: Some(404),
            message: "no results file available".to_string(),
        })?;
        save(out_dir, &name, &bytes).await
    }

    /// Save the error records of the last run as a JSON file in `out_dir`.
    pub async fn download_errors(&self, out_dir: &Path) -> BenchResult<DownloadOutcome> {
        let name = errors_file_name(Utc::now());
        match self.fetch(&self.errors_url).await? {
            Some(bytes) => save(out_dir, &name, &bytes).await,
            None => {
                info!("Engine has no error records");
                Ok(DownloadOutcome::NoRecords)
            }
        }
    }

    /// GET `url`; `None` on 404.
    #[instrument(skip(self))]
    async fn fetch(&self, url: &str) -> BenchResult<Option<bytes::Bytes>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| BenchError::Transport {
                status: None,
                message: e.to_string(),
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(BenchError::Transport {
                status: Some(status.as_u16()),
                message: format!("download failed: {}", status),
            });
        }

        let bytes = response.bytes().await.map_err(|e| BenchError::Transport {
            status: Some(status.as_u16()),
            message: e.to_string(),
        })?;
        Ok(Some(bytes))
    }
}

pub fn results_file_name(now: DateTime<Utc>) -> String {
    format!("performance_comparison_{}.csv", now.format("%Y%m%d_%H%M%S"))
}

pub fn errors_file_name(now: DateTime<Utc>) -> String {
    format!("error_records_{}.json", now.format("%Y%m%d_%H%M%S"))
}

async fn save(out_dir: &Path, name: &str, bytes: &[u8]) -> BenchResult<DownloadOutcome> {
    tokio::fs::create_dir_all(out_dir).await?;
    let path = out_dir.join(name);
    tokio::fs::write(&path, bytes).await?;
    info!(path = %path.display(), bytes = bytes.len(), "Download saved");
    Ok(DownloadOutcome::Saved {
        path,
        bytes: bytes.len(),
    })
}
