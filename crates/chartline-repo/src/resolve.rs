//! Chart reference resolution
//!
//! A declaration location becomes a chart directory on disk by checking, in
//! order: the local filesystem, the chart cache, then the repository indexes.

use semver::Version;
use std::path::{Path, PathBuf};

use chartline_core::{CHART_FILE, VersionConstraint};

use crate::config::Home;
use crate::error::{RepoError, ResolutionError};
use crate::http::{compute_digest, install_archive};
use crate::index::ChartVersion;
use crate::store::RepositoryStore;

/// Resolves chart locations against the working directory, cache and store
pub struct ChartReferenceResolver<'a> {
    store: &'a dyn RepositoryStore,
    home: Home,
    working_dir: PathBuf,
}

impl<'a> ChartReferenceResolver<'a> {
    pub fn new(store: &'a dyn RepositoryStore, home: Home, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            home,
            working_dir: working_dir.into(),
        }
    }

    /// Whether `location` names an existing path relative to the working directory
    pub fn is_local_reference(&self, location: &str) -> bool {
        self.working_dir.join(location).exists()
    }

    /// Whether `location` can only be satisfied from a repository
    pub fn is_repository_reference(&self, location: &str) -> bool {
        !self.is_local_reference(location) && !looks_like_path(location)
    }

    /// Resolve a location and optional constraint to a chart directory
    pub async fn resolve(
        &self,
        location: &str,
        constraint: Option<&str>,
    ) -> Result<PathBuf, ResolutionError> {
        let candidate = self.working_dir.join(location);
        if candidate.exists() {
            let path = std::path::absolute(&candidate).unwrap_or(candidate);
            if is_chart_archive(&path) {
                return self.unpack_local(location, &path).await;
            }
            tracing::debug!(location, path = %path.display(), "using local chart");
            return Ok(path);
        }

        if looks_like_path(location) {
            return Err(ResolutionError::MissingChart {
                location: location.to_string(),
                reason: "no such file or directory".to_string(),
            });
        }

        let constraint = constraint
            .map(VersionConstraint::parse)
            .transpose()
            .map_err(|e| ResolutionError::InvalidConstraint {
                location: location.to_string(),
                constraint: e.constraint,
                reason: e.reason,
            })?;

        if let Some(cached) = self.cached(location, constraint.as_ref()) {
            tracing::debug!(location, path = %cached.display(), "using cached chart");
            return Ok(cached);
        }

        let (repository, chart) = self.select(location, constraint.as_ref()).await?;
        tracing::debug!(location, repository = %repository, version = %chart.version, "selected chart version");

        let dest = self.home.chart_dir(location, &chart.version);
        self.store
            .download(&repository, &chart, &dest)
            .await
            .map_err(|source| ResolutionError::Fetch {
                location: location.to_string(),
                source,
            })
    }

    /// Extract a local `.tgz` chart into the cache, once per archive content
    async fn unpack_local(&self, location: &str, archive: &Path) -> Result<PathBuf, ResolutionError> {
        let fetch = |source: RepoError| ResolutionError::Fetch {
            location: location.to_string(),
            source,
        };

        let data = tokio::fs::read(archive).await.map_err(|e| fetch(e.into()))?;
        let dest = self.home.unpacked_archive_dir(&compute_digest(&data));
        if dest.join(CHART_FILE).exists() {
            tracing::debug!(location, path = %dest.display(), "using unpacked chart archive");
            return Ok(dest);
        }

        tracing::debug!(location, archive = %archive.display(), "unpacking chart archive");
        tokio::task::spawn_blocking(move || install_archive(&data, &dest))
            .await
            .map_err(|e| {
                fetch(RepoError::InvalidArchive {
                    message: e.to_string(),
                })
            })?
            .map_err(fetch)
    }

    /// Highest cached version compatible with the constraint
    fn cached(&self, location: &str, constraint: Option<&VersionConstraint>) -> Option<PathBuf> {
        let dir = self.home.chart_versions_dir(location);
        let entries = std::fs::read_dir(&dir).ok()?;

        let versions: Vec<Version> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().join(CHART_FILE).exists())
            .filter_map(|e| Version::parse(&e.file_name().to_string_lossy()).ok())
            .collect();

        let best = match constraint {
            Some(c) => c.highest_match(&versions),
            None => versions.iter().max(),
        }?;

        Some(dir.join(best.to_string()))
    }

    /// Pick the repository and version to download
    async fn select(
        &self,
        location: &str,
        constraint: Option<&VersionConstraint>,
    ) -> Result<(String, ChartVersion), ResolutionError> {
        let missing = |reason: String| ResolutionError::MissingChart {
            location: location.to_string(),
            reason,
        };

        let candidates = match location.split_once('/') {
            Some((repository, chart)) => {
                if !self.store.repositories().await.iter().any(|r| r == repository) {
                    return Err(missing(format!("repository {:?} is not configured", repository)));
                }
                let versions = self
                    .store
                    .load_index(repository, chart)
                    .await
                    .map_err(|source| ResolutionError::Fetch {
                        location: location.to_string(),
                        source,
                    })?;
                tag(repository, versions)
            }
            None => {
                let mut all = Vec::new();
                for repository in self.store.repositories().await {
                    match self.store.load_index(&repository, location).await {
                        Ok(versions) => all.extend(tag(&repository, versions)),
                        Err(e) => {
                            tracing::warn!(repository = %repository, error = %e, "skipping repository index")
                        }
                    }
                }
                all
            }
        };

        if candidates.is_empty() {
            return Err(missing("not found in any configured repository".to_string()));
        }

        let mut best: Option<(String, ChartVersion)> = None;
        for (repository, chart) in &candidates {
            if constraint.is_some_and(|c| !c.matches(&chart.version)) {
                continue;
            }
            // Strictly greater, so the first configured repository keeps a tie
            if best.as_ref().is_none_or(|(_, b)| chart.version > b.version) {
                best = Some((repository.clone(), chart.clone()));
            }
        }

        best.ok_or_else(|| ResolutionError::UnsatisfiableConstraint {
            location: location.to_string(),
            constraint: constraint.map(|c| c.to_string()).unwrap_or_default(),
            available: available_versions(&candidates),
        })
    }
}

fn tag(repository: &str, versions: Vec<ChartVersion>) -> Vec<(String, ChartVersion)> {
    versions
        .into_iter()
        .map(|v| (repository.to_string(), v))
        .collect()
}

fn is_chart_archive(path: &Path) -> bool {
    let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    path.is_file() && (name.ends_with(".tgz") || name.ends_with(".tar.gz"))
}

/// Absolute or `.`-prefixed locations never fall through to repositories
fn looks_like_path(location: &str) -> bool {
    location.starts_with('.') || Path::new(location).is_absolute()
}

/// Distinct versions, highest first
fn available_versions(candidates: &[(String, ChartVersion)]) -> String {
    let mut versions: Vec<&Version> = candidates.iter().map(|(_, c)| &c.version).collect();
    versions.sort_by(|a, b| b.cmp(a));
    versions.dedup();
    versions
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
