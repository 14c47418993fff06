//! Repository index types
//!
//! Helm-compatible `index.yaml`

use chrono::{DateTime, Utc};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{RepoError, Result};

/// Repository index (Helm-compatible)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryIndex {
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// When this index was generated
    #[serde(default)]
    pub generated: Option<DateTime<Utc>>,

    /// Charts indexed by name
    #[serde(default)]
    pub entries: HashMap<String, Vec<ChartEntry>>,
}

fn default_api_version() -> String {
    "v1".to_string()
}

impl Default for RepositoryIndex {
    fn default() -> Self {
        Self {
            api_version: default_api_version(),
            generated: None,
            entries: HashMap::new(),
        }
    }
}

impl RepositoryIndex {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| RepoError::IndexParseError {
            message: e.to_string(),
        })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let yaml = std::str::from_utf8(bytes).map_err(|e| RepoError::IndexParseError {
            message: format!("Invalid UTF-8: {}", e),
        })?;
        Self::from_yaml(yaml)
    }

    /// Downloadable versions of a chart
    ///
    /// Entries whose version is not valid semver are skipped.
    pub fn versions(&self, name: &str) -> Vec<ChartVersion> {
        let Some(entries) = self.entries.get(name) else {
            return Vec::new();
        };

        entries
            .iter()
            .filter_map(|entry| {
                let version = entry.parsed_version();
                if version.is_none() {
                    tracing::debug!(chart = name, version = %entry.version, "skipping unparseable version");
                }
                Some(ChartVersion {
                    name: entry.name.clone(),
                    version: version?,
                    urls: entry.urls.clone(),
                    digest: entry.digest.clone(),
                })
            })
            .collect()
    }
}

/// Chart entry in the index
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartEntry {
    pub name: String,

    /// Chart version (semver)
    pub version: String,

    #[serde(default)]
    pub app_version: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// URLs to download the chart archive
    #[serde(default)]
    pub urls: Vec<String>,

    /// SHA256 digest of the archive
    #[serde(default)]
    pub digest: Option<String>,

    #[serde(default)]
    pub created: Option<DateTime<Utc>>,

    #[serde(default)]
    pub deprecated: bool,
}

impl ChartEntry {
    pub fn parsed_version(&self) -> Option<Version> {
        Version::parse(self.version.trim_start_matches('v')).ok()
    }
}

/// One downloadable chart version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartVersion {
    pub name: String,
    pub version: Version,
    pub urls: Vec<String>,
    pub digest: Option<String>,
}

impl ChartVersion {
    /// Primary download URL
    pub fn download_url(&self) -> Option<&str> {
        self.urls.first().map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> RepositoryIndex {
        let yaml = r#"
apiVersion: v1
generated: "2024-01-01T00:00:00Z"
entries:
  web:
    - name: web
      version: "2.0.0"
      urls:
        - web-2.0.0.tgz
      digest: "sha256:abc123"
    - name: web
      version: "1.0.0"
      urls:
        - https://example.com/charts/web-1.0.0.tgz
    - name: web
      version: "1.2.0"
      urls:
        - https://example.com/charts/web-1.2.0.tgz
    - name: web
      version: "not-semver"
      urls:
        - https://example.com/charts/web-broken.tgz
  redis:
    - name: redis
      version: "17.0.0"
      description: Redis database
      urls:
        - https://example.com/charts/redis-17.0.0.tgz
"#;
        RepositoryIndex::from_yaml(yaml).unwrap()
    }

    #[test]
    fn test_parse_index() {
        let index = sample_index();
        assert_eq!(index.entries.len(), 2);
        assert!(index.generated.is_some());
        assert_eq!(index.versions("web").len(), 3);
        assert!(index.versions("missing").is_empty());
    }

    #[test]
    fn test_versions_keep_download_details() {
        let index = sample_index();
        let versions = index.versions("web");
        let numbers: Vec<String> = versions.iter().map(|v| v.version.to_string()).collect();
        assert_eq!(numbers, vec!["2.0.0", "1.0.0", "1.2.0"]);
        assert_eq!(versions[0].digest.as_deref(), Some("sha256:abc123"));
        assert_eq!(
            versions[2].download_url(),
            Some("https://example.com/charts/web-1.2.0.tgz")
        );
    }

    #[test]
    fn test_invalid_index() {
        assert!(RepositoryIndex::from_yaml("entries: [").is_err());
        assert!(RepositoryIndex::from_bytes(&[0xff]).is_err());
    }
}
