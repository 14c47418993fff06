//! CLI error type with exit code handling

use chartline_core::{ConfigError, ValidationError};
use chartline_engine::EngineError;
use chartline_repo::{RepoError, ResolutionError};
use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

use crate::exit_codes;

/// Any failure of a compile run
#[derive(Error, Debug, Diagnostic)]
pub enum CompileError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Resolution(#[from] ResolutionError),

    /// The renderer failed for one chart declaration
    #[error("chart {location:?} failed to render")]
    #[diagnostic(code(chartline::cli::render))]
    Render {
        location: String,
        #[source]
        #[diagnostic_source]
        source: EngineError,
    },

    /// Repository setup failed before any chart was resolved
    #[error(transparent)]
    #[diagnostic(code(chartline::cli::repository))]
    Repository(#[from] RepoError),

    #[error("failed to load config partials from {}", dir.display())]
    #[diagnostic(code(chartline::cli::partials))]
    Partials {
        dir: PathBuf,
        #[source]
        source: EngineError,
    },

    #[error("{message}")]
    #[diagnostic(code(chartline::cli::io))]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

impl CompileError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            CompileError::Config(ConfigError::Template { .. }) => exit_codes::TEMPLATE_ERROR,
            CompileError::Config(_) | CompileError::Validation(_) => exit_codes::VALIDATION_ERROR,
            CompileError::Resolution(_) => exit_codes::RESOLUTION_ERROR,
            CompileError::Render { .. } => exit_codes::TEMPLATE_ERROR,
            CompileError::Repository(_) => exit_codes::ERROR,
            CompileError::Partials { .. } | CompileError::Io { .. } => exit_codes::IO_ERROR,
        }
    }

    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CompileError>;
