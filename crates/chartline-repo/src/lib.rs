//! Chart repositories for chartline
//!
//! - **Repositories file**: named Helm-style repositories, `stable` by default
//! - **Index cache**: one `index.yaml` per repository, refreshed concurrently
//! - **Chart cache**: extracted chart versions keyed by location and version
//! - **Resolution**: local path, then cache, then the highest matching index entry
//!
//! ## Example
//!
//! ```rust,no_run
//! use chartline_repo::{ChartReferenceResolver, Home, HttpRepositoryStore, RepositoryStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let home = Home::default_dirs()?;
//! let store = HttpRepositoryStore::open(home.clone())?;
//! store.refresh(&[]).await;
//!
//! let resolver = ChartReferenceResolver::new(&store, home, std::env::current_dir()?);
//! let chart = resolver.resolve("stable/redis", Some("~>10.0")).await?;
//! println!("{}", chart.display());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod index;
pub mod resolve;
pub mod store;

pub use config::{Home, Repository, RepositoryConfig, STABLE_REPOSITORY, STABLE_REPOSITORY_URL};
pub use error::{RepoError, ResolutionError, ResolutionErrorKind, Result};
pub use http::HttpClient;
pub use index::{ChartEntry, ChartVersion, RepositoryIndex};
pub use resolve::ChartReferenceResolver;
pub use store::{HttpRepositoryStore, RepositoryStore};
