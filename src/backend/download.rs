//! Artifact downloading over HTTP

use super::catalog::ModelSpec;
use super::installed::InstalledArtifact;
use crate::progress::{ProgressEvent, ProgressHandler};
use futures_util::StreamExt;
use reqwest::{Client, Url};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Suffix of files still being written
pub const PARTIAL_SUFFIX: &str = "partial";

/// Errors that can occur while fetching an artifact
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The source URL cannot be parsed or has no file name
    #[error("Invalid download URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// HTTP client could not be constructed
    #[error("Failed to initialize HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// Connection or transfer failure
    #[error("Network error while downloading {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Server answered with a non-success status
    #[error("Server returned HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    /// Destination could not be created or written (including a full disk)
    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Body ended before the announced length
    #[error("Download incomplete: received {received} of {expected} bytes")]
    Incomplete { expected: u64, received: u64 },
}

impl DownloadError {
    fn write(path: &Path, source: io::Error) -> Self {
        DownloadError::Write {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Derive the destination file name from a download URL.
///
/// The last path segment is used; any query string or fragment is dropped.
pub fn file_name_from_url(url: &str) -> Result<String, DownloadError> {
    let parsed = Url::parse(url).map_err(|e| DownloadError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    parsed
        .path_segments()
        .and_then(|segments| segments.last())
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .ok_or_else(|| DownloadError::InvalidUrl {
            url: url.to_string(),
            reason: "URL path has no file name".to_string(),
        })
}

/// Add execute permission for owner, group and others
#[cfg(unix)]
pub fn make_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(perms.mode() | 0o111);
    std::fs::set_permissions(path, perms)
}

#[cfg(not(unix))]
pub fn make_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}

/// Downloads catalog artifacts into the models directory
pub struct ArtifactDownloader {
    client: Client,
}

impl ArtifactDownloader {
    /// Creates a downloader with the given connect timeout.
    ///
    /// Only connecting is bounded; multi-gigabyte transfers may legitimately take hours.
    pub fn new(connect_timeout: Duration) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(DownloadError::Client)?;

        Ok(Self { client })
    }

    /// Fetch `spec` into `dest_dir` and mark it executable.
    ///
    /// Bytes stream into `<file>.partial`, which is renamed only once the whole body is on
    /// disk, so an interrupted transfer never looks installed. A failure to set permissions
    /// is reported as a warning and does not fail the download.
    pub async fn download(
        &self,
        spec: &ModelSpec,
        dest_dir: &Path,
        progress: &dyn ProgressHandler,
    ) -> Result<InstalledArtifact, DownloadError> {
        let file_name = file_name_from_url(spec.source_url)?;
        let final_path = dest_dir.join(&file_name);
        let partial_path = dest_dir.join(format!("{}.{}", file_name, PARTIAL_SUFFIX));

        tokio::fs::create_dir_all(dest_dir)
            .await
            .map_err(|e| DownloadError::write(dest_dir, e))?;

        info!("Downloading {} from {}", spec.name, spec.source_url);

        let fetched = match self.fetch_to(spec, &partial_path, progress).await {
            Ok(bytes) => tokio::fs::rename(&partial_path, &final_path)
                .await
                .map(|_| bytes)
                .map_err(|e| DownloadError::write(&final_path, e)),
            Err(e) => Err(e),
        };

        let bytes = match fetched {
            Ok(bytes) => bytes,
            Err(e) => {
                if let Err(cleanup) = tokio::fs::remove_file(&partial_path).await {
                    if cleanup.kind() != io::ErrorKind::NotFound {
                        debug!(
                            "Could not remove partial file {}: {}",
                            partial_path.display(),
                            cleanup
                        );
                    }
                }
                progress.on_progress(&ProgressEvent::DownloadFailed {
                    name: spec.name.to_string(),
                    error: e.to_string(),
                });
                return Err(e);
            }
        };

        if cfg!(not(windows)) {
            if let Err(e) = make_executable(&final_path) {
                warn!(
                    "Downloaded {} but could not mark it executable: {}",
                    final_path.display(),
                    e
                );
                progress.on_progress(&ProgressEvent::Warning {
                    message: format!(
                        "Could not mark {} as executable ({}). Run `chmod +x` on it manually.",
                        final_path.display(),
                        e
                    ),
                });
            }
        }

        progress.on_progress(&ProgressEvent::DownloadComplete {
            name: spec.name.to_string(),
            path: final_path.clone(),
            bytes,
        });
        info!("Model {} saved to {}", spec.name, final_path.display());

        Ok(InstalledArtifact {
            file_name,
            local_path: final_path,
        })
    }

    async fn fetch_to(
        &self,
        spec: &ModelSpec,
        partial_path: &Path,
        progress: &dyn ProgressHandler,
    ) -> Result<u64, DownloadError> {
        let url = spec.source_url;
        let network = |source| DownloadError::Network {
            url: url.to_string(),
            source,
        };

        let response = self.client.get(url).send().await.map_err(network)?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let total_bytes = response.content_length();
        progress.on_progress(&ProgressEvent::DownloadStarted {
            name: spec.name.to_string(),
            url: url.to_string(),
            total_bytes,
        });

        let mut file = tokio::fs::File::create(partial_path)
            .await
            .map_err(|e| DownloadError::write(partial_path, e))?;

        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(network)?;
            file.write_all(&chunk)
                .await
                .map_err(|e| DownloadError::write(partial_path, e))?;
            downloaded += chunk.len() as u64;

            progress.on_progress(&ProgressEvent::DownloadProgress {
                downloaded_bytes: downloaded,
                total_bytes,
            });
        }

        file.flush()
            .await
            .map_err(|e| DownloadError::write(partial_path, e))?;
        file.sync_all()
            .await
            .map_err(|e| DownloadError::write(partial_path, e))?;

        if let Some(expected) = total_bytes {
            if downloaded != expected {
                return Err(DownloadError::Incomplete {
                    expected,
                    received: downloaded,
                });
            }
        }

        debug!("Wrote {} bytes to {}", downloaded, partial_path.display());
        Ok(downloaded)
    }
}
