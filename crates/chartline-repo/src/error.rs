//! Error types for repository operations

use miette::Diagnostic;
use thiserror::Error;

/// Repository operation errors
#[derive(Debug, Error)]
pub enum RepoError {
    // ============ Configuration Errors ============
    #[error("Repository not found: {name}")]
    RepositoryNotFound { name: String },

    #[error("Invalid repository URL: {url} - {reason}")]
    InvalidRepositoryUrl { url: String, reason: String },

    #[error("Invalid repository configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Looks like {url:?} is not a valid chart repository or cannot be reached: {message}")]
    Unreachable { url: String, message: String },

    // ============ Network Errors ============
    #[error("HTTP error: {status} - {message}")]
    HttpError { status: u16, message: String },

    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Request timeout after {seconds}s")]
    Timeout { seconds: u64 },

    // ============ Index Errors ============
    #[error("Index parse error: {message}")]
    IndexParseError { message: String },

    // ============ Chart Errors ============
    #[error("Chart {name} {version} has no download URL in repository {repo}")]
    NoDownloadUrl {
        name: String,
        version: String,
        repo: String,
    },

    #[error("Integrity check failed for {name}: expected {expected}, got {actual}")]
    IntegrityCheckFailed {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("Archive does not contain a chart: {message}")]
    InvalidArchive { message: String },

    // ============ IO Errors ============
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for repository operations
pub type Result<T> = std::result::Result<T, RepoError>;

pub(crate) const REQUEST_TIMEOUT_SECS: u64 = 30;

impl From<reqwest::Error> for RepoError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RepoError::Timeout {
                seconds: REQUEST_TIMEOUT_SECS,
            }
        } else if e.is_connect() {
            RepoError::NetworkError {
                message: format!("Connection failed: {}", e),
            }
        } else if let Some(status) = e.status() {
            RepoError::HttpError {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else {
            RepoError::NetworkError {
                message: e.to_string(),
            }
        }
    }
}

impl From<serde_yaml::Error> for RepoError {
    fn from(e: serde_yaml::Error) -> Self {
        RepoError::Serialization(e.to_string())
    }
}

impl From<url::ParseError> for RepoError {
    fn from(e: url::ParseError) -> Self {
        RepoError::InvalidRepositoryUrl {
            url: String::new(),
            reason: e.to_string(),
        }
    }
}

/// Kind of a chart resolution failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionErrorKind {
    MissingChart,
    UnsatisfiableConstraint,
    InvalidConstraint,
    Fetch,
}

/// A chart declaration could not be turned into a chart on disk
#[derive(Debug, Error, Diagnostic)]
pub enum ResolutionError {
    #[error("chart {location:?} not found: {reason}")]
    #[diagnostic(
        code(chartline::resolution::missing_chart),
        help("use an existing local path, or `repo/name` for a chart in a configured repository")
    )]
    MissingChart { location: String, reason: String },

    #[error(
        "chart {location:?}: unable to fulfil chart version constraint {constraint:?} (available: {available})"
    )]
    #[diagnostic(code(chartline::resolution::unsatisfiable_constraint))]
    UnsatisfiableConstraint {
        location: String,
        constraint: String,
        available: String,
    },

    #[error("chart {location:?}: invalid chart version/constraint format {constraint:?}: {reason}")]
    #[diagnostic(code(chartline::resolution::invalid_constraint))]
    InvalidConstraint {
        location: String,
        constraint: String,
        reason: String,
    },

    #[error("chart {location:?}: {source}")]
    #[diagnostic(code(chartline::resolution::fetch))]
    Fetch {
        location: String,
        #[source]
        source: RepoError,
    },
}

impl ResolutionError {
    pub fn kind(&self) -> ResolutionErrorKind {
        match self {
            Self::MissingChart { .. } => ResolutionErrorKind::MissingChart,
            Self::UnsatisfiableConstraint { .. } => ResolutionErrorKind::UnsatisfiableConstraint,
            Self::InvalidConstraint { .. } => ResolutionErrorKind::InvalidConstraint,
            Self::Fetch { .. } => ResolutionErrorKind::Fetch,
        }
    }

    /// Location string of the declaration that failed
    pub fn location(&self) -> &str {
        match self {
            Self::MissingChart { location, .. }
            | Self::UnsatisfiableConstraint { location, .. }
            | Self::InvalidConstraint { location, .. }
            | Self::Fetch { location, .. } => location,
        }
    }
}
