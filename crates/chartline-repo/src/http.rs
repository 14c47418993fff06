//! HTTP access to Helm-style chart repositories

use std::path::{Path, PathBuf};
use std::time::Duration;

use chartline_core::LoadedChart;

use crate::config::Repository;
use crate::error::{REQUEST_TIMEOUT_SECS, RepoError, Result};
use crate::index::{ChartVersion, RepositoryIndex};

/// HTTP client for repository indexes and chart archives
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(concat!("chartline/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RepoError::NetworkError {
                message: e.to_string(),
            })?;

        Ok(Self { client })
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RepoError::HttpError {
                status: status.as_u16(),
                message: format!("Request to {} failed", url),
            });
        }

        let bytes = response.bytes().await.map_err(|e| RepoError::NetworkError {
            message: e.to_string(),
        })?;
        Ok(bytes.to_vec())
    }

    /// Fetch a repository index, returning the raw bytes alongside the parsed index
    pub async fn fetch_index(&self, repo: &Repository) -> Result<(RepositoryIndex, Vec<u8>)> {
        let url = repo.index_url();
        tracing::debug!(repository = %repo.name, %url, "fetching index");

        let data = self.get_bytes(&url).await?;
        let index = RepositoryIndex::from_bytes(&data)?;
        Ok((index, data))
    }

    /// Download a chart archive and verify its digest when the index has one
    pub async fn download(&self, repo: &Repository, chart: &ChartVersion) -> Result<Vec<u8>> {
        let url = chart.download_url().ok_or_else(|| RepoError::NoDownloadUrl {
            name: chart.name.clone(),
            version: chart.version.to_string(),
            repo: repo.name.clone(),
        })?;
        let url = repo.resolve_url(url)?;
        tracing::debug!(chart = %chart.name, version = %chart.version, %url, "downloading chart");

        let data = self.get_bytes(&url).await?;

        if let Some(expected) = &chart.digest {
            let actual = compute_digest(&data);
            if !digest_matches(expected, &actual) {
                return Err(RepoError::IntegrityCheckFailed {
                    name: chart.name.clone(),
                    expected: expected.clone(),
                    actual,
                });
            }
        }

        Ok(data)
    }
}

/// Compute SHA256 digest of data
pub(crate) fn compute_digest(data: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    format!("sha256:{}", hex::encode(Sha256::digest(data)))
}

/// Compare digests, ignoring case and an optional `sha256:` prefix
fn digest_matches(expected: &str, actual: &str) -> bool {
    let normalize = |d: &str| {
        let d = d.trim().to_lowercase();
        d.strip_prefix("sha256:").map(str::to_string).unwrap_or(d)
    };
    normalize(expected) == normalize(actual)
}

/// Extract a chart archive (tar.gz) into `dest`
///
/// The archive is unpacked into a temporary directory next to `dest` and
/// the chart directory is renamed into place, so `dest` either holds a
/// complete chart or does not exist.
pub(crate) fn install_archive(data: &[u8], dest: &Path) -> Result<PathBuf> {
    use flate2::read::GzDecoder;
    use tar::Archive;

    let parent = dest.parent().ok_or_else(|| RepoError::InvalidArchive {
        message: format!("no parent directory for {}", dest.display()),
    })?;
    std::fs::create_dir_all(parent)?;

    let staging = tempfile::Builder::new()
        .prefix(".extract-")
        .tempdir_in(parent)?;
    Archive::new(GzDecoder::new(std::io::Cursor::new(data))).unpack(staging.path())?;

    let root = LoadedChart::locate_root(staging.path()).ok_or_else(|| RepoError::InvalidArchive {
        message: "no Chart.yaml found in archive".to_string(),
    })?;

    if dest.exists() {
        return Ok(dest.to_path_buf());
    }
    std::fs::rename(&root, dest)?;
    Ok(dest.to_path_buf())
}
