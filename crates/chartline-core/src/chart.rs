//! Chart definition and loading

use serde::{Deserialize, Serialize};
use semver::Version;
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};
use crate::values::Values;

/// Name of the chart metadata file
pub const CHART_FILE: &str = "Chart.yaml";

/// Template file extensions picked up from `templates/`
const TEMPLATE_EXTENSIONS: [&str; 7] = ["yaml", "yml", "tpl", "txt", "json", "j2", "jinja2"];

/// Chart metadata from Chart.yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMetadata {
    /// Chart API version (v1 or v2)
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Chart name (required)
    pub name: String,

    /// Chart version (required, SemVer)
    #[serde(with = "version_serde")]
    pub version: Version,

    /// Description
    #[serde(default)]
    pub description: Option<String>,

    /// Application version
    #[serde(default)]
    pub app_version: Option<String>,

    /// Chart type
    #[serde(default, rename = "type")]
    pub kind: ChartKind,

    /// Keywords
    #[serde(default)]
    pub keywords: Vec<String>,
}

fn default_api_version() -> String {
    "v2".to_string()
}

/// Chart type
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    #[default]
    Application,
    Library,
}

/// Chart information exposed to templates as `chart`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartInfo {
    pub name: String,
    pub version: String,
    pub app_version: Option<String>,
    pub description: Option<String>,
}

impl From<&ChartMetadata> for ChartInfo {
    fn from(meta: &ChartMetadata) -> Self {
        Self {
            name: meta.name.clone(),
            version: meta.version.to_string(),
            app_version: meta.app_version.clone(),
            description: meta.description.clone(),
        }
    }
}

/// Loaded chart with resolved paths
#[derive(Debug, Clone)]
pub struct LoadedChart {
    /// Chart metadata
    pub metadata: ChartMetadata,

    /// Root directory of the chart
    pub root: PathBuf,

    /// Templates directory
    pub templates_dir: PathBuf,

    /// Default values file path
    pub values_path: PathBuf,
}

impl LoadedChart {
    /// Load a chart from a directory
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let root = path.as_ref().to_path_buf();

        if !root.is_dir() {
            return Err(CoreError::ChartNotFound {
                path: root.display().to_string(),
            });
        }

        let chart_file = root.join(CHART_FILE);
        if !chart_file.exists() {
            return Err(CoreError::InvalidChart {
                message: format!("{} not found in {}", CHART_FILE, root.display()),
            });
        }

        let content = std::fs::read_to_string(&chart_file)?;
        let metadata: ChartMetadata = serde_yaml::from_str(&content)?;

        if !matches!(metadata.api_version.as_str(), "v1" | "v2") {
            return Err(CoreError::InvalidChart {
                message: format!(
                    "Unsupported chart API version: {}. Expected: v1 or v2",
                    metadata.api_version
                ),
            });
        }

        if metadata.name.trim().is_empty() {
            return Err(CoreError::InvalidChart {
                message: "chart name must not be empty".to_string(),
            });
        }

        Ok(Self {
            metadata,
            templates_dir: root.join("templates"),
            values_path: root.join("values.yaml"),
            root,
        })
    }

    /// Chart directory inside an extracted archive
    ///
    /// Archives conventionally wrap the chart in a single top-level directory.
    pub fn locate_root(extracted: &Path) -> Option<PathBuf> {
        if extracted.join(CHART_FILE).exists() {
            return Some(extracted.to_path_buf());
        }

        let mut candidates = std::fs::read_dir(extracted)
            .ok()?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.join(CHART_FILE).exists())
            .collect::<Vec<_>>();
        candidates.sort();
        candidates.into_iter().next()
    }

    /// Load chart default values (empty when values.yaml is absent)
    pub fn default_values(&self) -> Result<Values> {
        if self.values_path.exists() {
            Values::from_file(&self.values_path)
        } else {
            Ok(Values::new())
        }
    }

    /// Get list of template files, sorted by path
    pub fn template_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        if !self.templates_dir.exists() {
            return Ok(files);
        }

        for entry in walkdir::WalkDir::new(&self.templates_dir)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if path.is_file() {
                if let Some(ext) = path.extension() {
                    let ext = ext.to_string_lossy().to_lowercase();
                    if TEMPLATE_EXTENSIONS.contains(&ext.as_str()) {
                        files.push(path.to_path_buf());
                    }
                }
            }
        }

        files.sort();
        Ok(files)
    }
}

/// A declaration resolved to a chart on disk, ready to render
#[derive(Debug, Clone)]
pub struct ResolvedChart {
    /// Absolute path of the chart directory
    pub source_path: PathBuf,
    pub release_name: String,
    pub namespace: String,
    /// Overrides composed for this chart, without the chart's own defaults
    pub composed_values: Values,
}

mod version_serde {
    use semver::Version;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(version: &Version, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&version.to_string())
    }

    /// Accepts `1.2.3`, `v1.2.3` and unquoted numeric versions such as `0.1`
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Version, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = serde_yaml::Value::deserialize(deserializer)?;
        let text = match raw {
            serde_yaml::Value::String(s) => s,
            serde_yaml::Value::Number(n) => n.to_string(),
            other => {
                return Err(serde::de::Error::custom(format!(
                    "expected a version string, got {:?}",
                    other
                )));
            }
        };
        let text = text.trim().trim_start_matches('v');
        let padded = match text.matches('.').count() {
            0 => format!("{}.0.0", text),
            1 => format!("{}.0", text),
            _ => text.to_string(),
        };
        Version::parse(&padded).map_err(serde::de::Error::custom)
    }
}
