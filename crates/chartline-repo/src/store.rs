//! Repository store: configured repositories, cached indexes and chart downloads

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

use crate::config::{Home, Repository, RepositoryConfig};
use crate::error::{RepoError, Result};
use crate::http::{HttpClient, install_archive};
use crate::index::{ChartVersion, RepositoryIndex};

/// Operations the resolver needs from a repository backend
#[async_trait]
pub trait RepositoryStore: Send + Sync {
    /// Register a repository, fetching its index once
    async fn add_repository(&self, name: &str, url: &str) -> Result<()>;

    /// Names of configured repositories, in lookup order
    async fn repositories(&self) -> Vec<String>;

    /// Available versions of `chart` in `repository`
    async fn load_index(&self, repository: &str, chart: &str) -> Result<Vec<ChartVersion>>;

    /// Download and extract a chart version into `dest`
    async fn download(&self, repository: &str, chart: &ChartVersion, dest: &Path) -> Result<PathBuf>;

    /// Refresh every repository index except those named in `fresh`
    ///
    /// Failures are logged, never returned.
    async fn refresh(&self, fresh: &[String]);
}

/// Store backed by HTTP repositories and the on-disk cache
pub struct HttpRepositoryStore {
    home: Home,
    client: HttpClient,
    config: RwLock<RepositoryConfig>,
}

impl HttpRepositoryStore {
    pub fn open(home: Home) -> Result<Self> {
        let config = RepositoryConfig::load_from(&home.repositories_file())?;
        Ok(Self {
            client: HttpClient::new()?,
            config: RwLock::new(config),
            home,
        })
    }

    pub fn home(&self) -> &Home {
        &self.home
    }

    async fn repository(&self, name: &str) -> Result<Repository> {
        self.config
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| RepoError::RepositoryNotFound {
                name: name.to_string(),
            })
    }

    async fn fetch_and_store(client: &HttpClient, home: &Home, repo: &Repository) -> Result<RepositoryIndex> {
        let (index, raw) = client.fetch_index(repo).await?;
        let path = home.index_file(&repo.name);
        write_atomic(&path, &raw).await?;
        Ok(index)
    }
}

/// Write through a temporary sibling file and rename into place
async fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let parent = path.parent().ok_or_else(|| RepoError::InvalidConfig {
        message: format!("no parent directory for {}", path.display()),
    })?;
    tokio::fs::create_dir_all(parent).await?;

    let tmp = path.with_extension("yaml.tmp");
    tokio::fs::write(&tmp, data).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[async_trait]
impl RepositoryStore for HttpRepositoryStore {
    async fn add_repository(&self, name: &str, url: &str) -> Result<()> {
        let repo = Repository::new(name, url)?;

        Self::fetch_and_store(&self.client, &self.home, &repo)
            .await
            .map_err(|e| RepoError::Unreachable {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let mut config = self.config.write().await;
        config.upsert(repo);
        config.save_to(&self.home.repositories_file())?;
        tracing::info!(repository = name, url, "added repository");
        Ok(())
    }

    async fn repositories(&self) -> Vec<String> {
        self.config
            .read()
            .await
            .names()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    async fn load_index(&self, repository: &str, chart: &str) -> Result<Vec<ChartVersion>> {
        let path = self.home.index_file(repository);

        let index = match tokio::fs::read(&path).await {
            Ok(data) => RepositoryIndex::from_bytes(&data)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(repository, "no cached index, fetching");
                let repo = self.repository(repository).await?;
                Self::fetch_and_store(&self.client, &self.home, &repo).await?
            }
            Err(e) => return Err(e.into()),
        };

        Ok(index.versions(chart))
    }

    async fn download(&self, repository: &str, chart: &ChartVersion, dest: &Path) -> Result<PathBuf> {
        let repo = self.repository(repository).await?;
        let data = self.client.download(&repo, chart).await?;

        let dest = dest.to_path_buf();
        tokio::task::spawn_blocking(move || install_archive(&data, &dest))
            .await
            .map_err(|e| RepoError::InvalidArchive {
                message: e.to_string(),
            })?
    }

    async fn refresh(&self, fresh: &[String]) {
        let repositories = self.config.read().await.repositories.clone();

        let tasks = repositories
            .into_iter()
            .filter(|repo| !fresh.contains(&repo.name))
            .map(|repo| {
                let client = self.client.clone();
                let home = self.home.clone();
                tokio::spawn(async move {
                    let result = Self::fetch_and_store(&client, &home, &repo).await;
                    (repo.name, result)
                })
            });

        for joined in futures::future::join_all(tasks).await {
            match joined {
                Ok((name, Ok(_))) => tracing::debug!(repository = %name, "refreshed index"),
                Ok((name, Err(e))) => {
                    tracing::warn!(repository = %name, error = %e, "index refresh failed, using cached index")
                }
                Err(e) => tracing::warn!(error = %e, "index refresh task failed"),
            }
        }
    }
}
