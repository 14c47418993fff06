//! Core error types

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Errors raised while expanding or decoding the charts configuration
#[derive(Error, Debug, Diagnostic)]
pub enum ConfigError {
    /// Template expansion of the raw configuration text failed
    #[error("charts config templating error: {message}")]
    #[diagnostic(code(chartline::config::template))]
    Template {
        message: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("error occurred here")]
        span: Option<SourceSpan>,
    },

    /// The expanded text is not valid YAML
    #[error("charts config parsing error: {message}")]
    #[diagnostic(code(chartline::config::yaml))]
    Yaml {
        message: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("invalid YAML here")]
        span: Option<SourceSpan>,
    },

    /// Valid YAML, but not shaped like a charts configuration
    #[error("charts config structure error: {message}")]
    #[diagnostic(
        code(chartline::config::structure),
        help("see `chartline --example-config` for the expected layout")
    )]
    Structure { message: String },

    #[error("charts config is not valid UTF-8: {0}")]
    #[diagnostic(code(chartline::config::encoding))]
    Encoding(#[from] std::str::Utf8Error),
}

impl ConfigError {
    /// Build a YAML decode error pointing into the expanded source
    pub fn yaml(err: &serde_yaml::Error, source_name: &str, source: &str) -> Self {
        let span = err
            .location()
            .map(|loc| SourceSpan::from((loc.index().min(source.len()), 1)));

        Self::Yaml {
            message: err.to_string(),
            src: NamedSource::new(source_name, source.to_string()),
            span,
        }
    }

    /// Build a templating error, optionally pointing at a 1-based line
    pub fn template(
        message: impl Into<String>,
        source_name: &str,
        source: &str,
        line: Option<usize>,
    ) -> Self {
        Self::Template {
            message: message.into(),
            src: NamedSource::new(source_name, source.to_string()),
            span: line.and_then(|line| line_span(source, line)),
        }
    }

    pub fn structure(message: impl Into<String>) -> Self {
        Self::Structure {
            message: message.into(),
        }
    }
}

/// Span covering a whole 1-based line of `source`
fn line_span(source: &str, line: usize) -> Option<SourceSpan> {
    let mut offset = 0;
    for (idx, text) in source.split_inclusive('\n').enumerate() {
        if idx + 1 == line {
            let len = text.trim_end_matches(['\n', '\r']).len().max(1);
            return Some(SourceSpan::from((offset, len)));
        }
        offset += text.len();
    }
    None
}

/// Kind of a validation failure, one per check in validation order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    MissingApiVersion,
    UnsupportedApiVersion,
    MissingName,
    MissingNamespace,
    NoCharts,
    EmptyChartLocation,
    InvalidVersionConstraint,
}

/// First invariant violated by a decoded configuration
#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing API version, please add \"apiVersion: v1\"")]
    #[diagnostic(code(chartline::validation::missing_api_version))]
    MissingApiVersion,

    #[error("Unknown API version \"{found}\", please set apiVersion to \"v1\"")]
    #[diagnostic(code(chartline::validation::unsupported_api_version))]
    UnsupportedApiVersion { found: String },

    #[error("Missing name, please add \"name: my-app-name\" or pass \"--name=my-app-name\"")]
    #[diagnostic(code(chartline::validation::missing_name))]
    MissingName,

    #[error(
        "Missing namespace, please add \"namespace: my-namespace\" or pass \"--namespace=my-namespace\""
    )]
    #[diagnostic(code(chartline::validation::missing_namespace))]
    MissingNamespace,

    #[error("Missing charts, you need to define at least one chart")]
    #[diagnostic(code(chartline::validation::no_charts))]
    NoCharts,

    #[error("Invalid or missing chart location (chart #{position})")]
    #[diagnostic(code(chartline::validation::empty_chart_location))]
    EmptyChartLocation { position: usize },

    #[error("Invalid version constraint \"{constraint}\" for chart \"{location}\": {reason}")]
    #[diagnostic(
        code(chartline::validation::invalid_version_constraint),
        help("use a semantic version (1.2.3) or a range such as \"^1.2\", \"~>1.0\" or \">=1.0, <2.0\"")
    )]
    InvalidVersionConstraint {
        location: String,
        constraint: String,
        reason: String,
    },
}

impl ValidationError {
    pub fn kind(&self) -> ValidationErrorKind {
        match self {
            Self::MissingApiVersion => ValidationErrorKind::MissingApiVersion,
            Self::UnsupportedApiVersion { .. } => ValidationErrorKind::UnsupportedApiVersion,
            Self::MissingName => ValidationErrorKind::MissingName,
            Self::MissingNamespace => ValidationErrorKind::MissingNamespace,
            Self::NoCharts => ValidationErrorKind::NoCharts,
            Self::EmptyChartLocation { .. } => ValidationErrorKind::EmptyChartLocation,
            Self::InvalidVersionConstraint { .. } => ValidationErrorKind::InvalidVersionConstraint,
        }
    }
}

/// General errors for chart loading and value handling
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Chart not found: {path}")]
    ChartNotFound { path: String },

    #[error("Invalid Chart.yaml: {message}")]
    InvalidChart { message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid version: {0}")]
    InvalidVersion(#[from] semver::Error),

    #[error("Values merge error: {message}")]
    ValuesMerge { message: String },
}

pub type Result<T> = std::result::Result<T, CoreError>;
