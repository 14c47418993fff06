//! Engine error types

use chartline_core::CoreError;
use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Main engine error type
#[derive(Error, Debug, Diagnostic)]
pub enum EngineError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Template(#[from] TemplateError),

    #[error("chart error: {0}")]
    #[diagnostic(code(chartline::render::chart))]
    Chart(#[from] CoreError),

    #[error("IO error: {0}")]
    #[diagnostic(code(chartline::render::io))]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    #[diagnostic(code(chartline::render::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

/// Error kind for categorizing template errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum TemplateErrorKind {
    UndefinedVariable,
    UnknownFilter,
    UnknownFunction,
    SyntaxError,
    TypeError,
    InvalidOperation,
    Other,
}

/// Template-specific error with source information
#[derive(Error, Debug, Diagnostic, Clone)]
#[error("{template}: {message}")]
#[diagnostic(code(chartline::render::template))]
pub struct TemplateError {
    /// Template name relative to the chart's templates directory
    pub template: String,

    pub message: String,

    pub kind: TemplateErrorKind,

    #[source_code]
    pub src: NamedSource<String>,

    #[label("error occurred here")]
    pub span: Option<SourceSpan>,

    #[help]
    pub suggestion: Option<String>,
}

impl TemplateError {
    /// Create a template error from a MiniJinja error
    pub fn from_minijinja(err: minijinja::Error, template_name: &str, template_source: &str) -> Self {
        let kind = categorize(&err);
        let message = err
            .detail()
            .map(str::to_string)
            .unwrap_or_else(|| err.kind().to_string());
        let span = err
            .line()
            .and_then(|line| calculate_span(template_source, line));
        let suggestion = suggestion_for(kind, &message);

        Self {
            template: template_name.to_string(),
            message,
            kind,
            src: NamedSource::new(template_name, template_source.to_string()),
            span,
            suggestion,
        }
    }

    pub fn kind(&self) -> TemplateErrorKind {
        self.kind
    }
}

fn categorize(err: &minijinja::Error) -> TemplateErrorKind {
    match err.kind() {
        minijinja::ErrorKind::UndefinedError => TemplateErrorKind::UndefinedVariable,
        minijinja::ErrorKind::UnknownFilter => TemplateErrorKind::UnknownFilter,
        minijinja::ErrorKind::UnknownFunction => TemplateErrorKind::UnknownFunction,
        minijinja::ErrorKind::SyntaxError => TemplateErrorKind::SyntaxError,
        minijinja::ErrorKind::InvalidOperation => TemplateErrorKind::InvalidOperation,
        minijinja::ErrorKind::NonPrimitive | minijinja::ErrorKind::NonKey => {
            TemplateErrorKind::TypeError
        }
        _ => TemplateErrorKind::Other,
    }
}

fn suggestion_for(kind: TemplateErrorKind, message: &str) -> Option<String> {
    match kind {
        TemplateErrorKind::UndefinedVariable => Some(
            "Check the key in values.yaml or the chart overrides, or use `| default(...)`. Pass --lenient to render undefined values as empty."
                .to_string(),
        ),
        TemplateErrorKind::UnknownFilter | TemplateErrorKind::UnknownFunction => Some(format!(
            "Available filters: {}",
            crate::filters::AVAILABLE_FILTERS.join(", ")
        )),
        TemplateErrorKind::SyntaxError if message.contains('}') || message.contains('%') => Some(
            "Check bracket matching: `{{ }}` for expressions, `{% %}` for statements".to_string(),
        ),
        _ => None,
    }
}

/// Span covering a given 1-based line
fn calculate_span(source: &str, line_num: usize) -> Option<SourceSpan> {
    let mut offset = 0;

    for (idx, line) in source.lines().enumerate() {
        if idx + 1 == line_num {
            return Some(SourceSpan::new(offset.into(), line.len()));
        }
        offset += line.len() + 1;
    }

    None
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_span() {
        let source = "a: 1\nbb: {{ x }}\n";
        assert_eq!(calculate_span(source, 2), Some(SourceSpan::from((5, 11))));
        assert_eq!(calculate_span(source, 5), None);
    }

    #[test]
    fn test_undefined_error_kind() {
        let mut env = minijinja::Environment::new();
        env.set_undefined_behavior(minijinja::UndefinedBehavior::Strict);
        env.add_template("t.yaml", "a: {{ values.missing }}").unwrap();
        let err = env
            .get_template("t.yaml")
            .unwrap()
            .render(minijinja::context! { values => minijinja::context! {} })
            .unwrap_err();

        let err = TemplateError::from_minijinja(err, "t.yaml", "a: {{ values.missing }}");
        assert_eq!(err.kind(), TemplateErrorKind::UndefinedVariable);
        assert!(err.span.is_some());
        assert!(err.suggestion.is_some());
        assert!(err.to_string().starts_with("t.yaml: "));
    }

    #[test]
    fn test_syntax_error_kind() {
        let mut env = minijinja::Environment::new();
        let err = env.add_template("t.yaml", "a: {{ x ").unwrap_err();
        let err = TemplateError::from_minijinja(err, "t.yaml", "a: {{ x ");
        assert_eq!(err.kind(), TemplateErrorKind::SyntaxError);
    }
}
