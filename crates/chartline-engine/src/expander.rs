//! Expansion of templating directives in the charts configuration text

use chartline_core::{ConfigError, TemplateExpander};
use minijinja::{Environment, UndefinedBehavior};
use std::path::Path;
use std::sync::Arc;

use crate::error::Result;
use crate::filters;
use crate::functions::{self, Bindings};

/// Expands the configuration with MiniJinja before it is decoded as YAML
pub struct ConfigExpander {
    bindings: Arc<Bindings>,
    partials: Vec<(String, String)>,
}

impl ConfigExpander {
    pub fn new(bindings: Bindings) -> Self {
        Self {
            bindings: Arc::new(bindings),
            partials: Vec::new(),
        }
    }

    /// Register every file under `dir` as a named template
    ///
    /// Names are paths relative to `dir` with `/` separators. A missing
    /// directory contributes nothing.
    pub fn with_partials_dir(mut self, dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            tracing::debug!(dir = %dir.display(), "partials directory not present");
            return Ok(self);
        }

        let mut entries = walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .collect::<Vec<_>>();
        entries.sort();

        for path in entries {
            let name = path
                .strip_prefix(dir)
                .unwrap_or(&path)
                .to_string_lossy()
                .replace('\\', "/");
            let content = std::fs::read_to_string(&path)?;
            tracing::debug!(partial = %name, "registered config partial");
            self.partials.push((name, content));
        }

        Ok(self)
    }

    fn environment(&self) -> Environment<'static> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Lenient);
        env.set_keep_trailing_newline(true);
        filters::register(&mut env);
        functions::register(&mut env);
        functions::register_env(&mut env, Arc::clone(&self.bindings));
        env
    }

    fn source_of<'a>(&'a self, name: Option<&str>, fallback: (&'a str, &'a str)) -> (&'a str, &'a str) {
        name.and_then(|name| {
            self.partials
                .iter()
                .find(|(partial, _)| partial == name)
                .map(|(partial, content)| (partial.as_str(), content.as_str()))
        })
        .unwrap_or(fallback)
    }
}

impl Default for ConfigExpander {
    fn default() -> Self {
        Self::new(Bindings::Process)
    }
}

impl TemplateExpander for ConfigExpander {
    fn expand(&self, source_name: &str, text: &str) -> std::result::Result<String, ConfigError> {
        let mut env = self.environment();

        let to_config_error = |err: minijinja::Error| {
            let (name, source) = self.source_of(err.name(), (source_name, text));
            let message = err
                .detail()
                .map(str::to_string)
                .unwrap_or_else(|| err.to_string());
            ConfigError::template(message, name, source, err.line())
        };

        for (name, content) in &self.partials {
            env.add_template_owned(name.clone(), content.clone())
                .map_err(&to_config_error)?;
        }

        env.add_template_owned(source_name.to_string(), text.to_string())
            .map_err(&to_config_error)?;

        let template = env.get_template(source_name).map_err(&to_config_error)?;
        template
            .render(minijinja::context! {})
            .map_err(&to_config_error)
    }
}
