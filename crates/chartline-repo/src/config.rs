//! Repository configuration and on-disk layout
//!
//! Repositories are stored in `<config>/repositories.yaml`; indexes and
//! downloaded charts live under the cache directory.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{RepoError, Result};

/// Name of the repository assumed when no repositories file exists
pub const STABLE_REPOSITORY: &str = "stable";

/// URL of the default stable repository
pub const STABLE_REPOSITORY_URL: &str = "https://charts.helm.sh/stable";

/// Config and cache directories used by the repository store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Home {
    pub config_dir: PathBuf,
    pub cache_dir: PathBuf,
}

impl Home {
    /// Platform defaults: `<config_dir>/chartline` and `<cache_dir>/chartline`
    pub fn default_dirs() -> Result<Self> {
        let config = dirs::config_dir().ok_or_else(|| RepoError::InvalidConfig {
            message: "Could not determine config directory".to_string(),
        })?;
        let cache = dirs::cache_dir().ok_or_else(|| RepoError::InvalidConfig {
            message: "Could not determine cache directory".to_string(),
        })?;

        Ok(Self {
            config_dir: config.join("chartline"),
            cache_dir: cache.join("chartline"),
        })
    }

    /// Everything under a single root, as selected by `--home`
    pub fn at(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            config_dir: root.to_path_buf(),
            cache_dir: root.join("cache"),
        }
    }

    pub fn repositories_file(&self) -> PathBuf {
        self.config_dir.join("repositories.yaml")
    }

    /// Cached index of a repository
    pub fn index_file(&self, repository: &str) -> PathBuf {
        self.cache_dir
            .join("index")
            .join(format!("{}-index.yaml", repository))
    }

    /// Directory holding every cached version of a chart location
    pub fn chart_versions_dir(&self, location: &str) -> PathBuf {
        location
            .split('/')
            .filter(|segment| !segment.is_empty() && *segment != "..")
            .fold(self.cache_dir.join("charts"), |dir, segment| dir.join(segment))
    }

    /// Directory of one extracted chart version
    pub fn chart_dir(&self, location: &str, version: &semver::Version) -> PathBuf {
        self.chart_versions_dir(location).join(version.to_string())
    }

    /// Extraction directory of a local chart archive, keyed by content digest
    pub fn unpacked_archive_dir(&self, digest: &str) -> PathBuf {
        let key = digest.strip_prefix("sha256:").unwrap_or(digest);
        self.cache_dir.join("archives").join(key)
    }
}

/// Repository configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryConfig {
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Configured repositories, in lookup order
    #[serde(default)]
    pub repositories: Vec<Repository>,
}

fn default_api_version() -> String {
    "v1".to_string()
}

impl Default for RepositoryConfig {
    /// Configuration containing the stable repository
    fn default() -> Self {
        Self {
            api_version: default_api_version(),
            repositories: vec![Repository {
                name: STABLE_REPOSITORY.to_string(),
                url: STABLE_REPOSITORY_URL.to_string(),
            }],
        }
    }
}

impl RepositoryConfig {
    /// Load from a file, falling back to the default when it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_yaml::to_string(self)?)?;
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Repository> {
        self.repositories.iter().find(|r| r.name == name)
    }

    /// Add a repository or replace the URL of an existing one, keeping its position
    pub fn upsert(&mut self, repo: Repository) {
        match self.repositories.iter_mut().find(|r| r.name == repo.name) {
            Some(existing) => existing.url = repo.url,
            None => self.repositories.push(repo),
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.repositories.iter().map(|r| r.name.as_str()).collect()
    }
}

/// Repository definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    /// Unique name for this repository
    pub name: String,

    /// Base URL serving `index.yaml`
    pub url: String,
}

impl Repository {
    /// Create a repository, checking the name and the URL scheme
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let url = url.into();

        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(RepoError::InvalidConfig {
                message: format!("invalid repository name {:?}", name),
            });
        }

        let parsed = url::Url::parse(&url).map_err(|e| RepoError::InvalidRepositoryUrl {
            url: url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(RepoError::InvalidRepositoryUrl {
                url,
                reason: "URL must start with http:// or https://".to_string(),
            });
        }

        Ok(Self { name, url })
    }

    pub fn index_url(&self) -> String {
        format!("{}/index.yaml", self.url.trim_end_matches('/'))
    }

    /// Resolve a chart URL from the index, which may be relative to the repository
    pub fn resolve_url(&self, chart_url: &str) -> Result<String> {
        if chart_url.starts_with("http://") || chart_url.starts_with("https://") {
            return Ok(chart_url.to_string());
        }
        let base = url::Url::parse(&format!("{}/", self.url.trim_end_matches('/')))?;
        Ok(base.join(chart_url)?.to_string())
    }
}
