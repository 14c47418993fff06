//! The compile pipeline
//!
//! Configuration is loaded and validated first. Repositories are registered
//! and refreshed, then each declaration is resolved, composed and rendered
//! strictly in declaration order. Output is only produced once every chart
//! has rendered.

use std::path::PathBuf;

use chartline_core::{
    ChartsConfiguration, ConfigLoader, OutputAssembler, ReleaseOverrides, ResolvedChart,
    TemplateExpander, ValueComposer, Validator,
};
use chartline_engine::{ChartRenderer, RendererAdapter};
use chartline_repo::{ChartReferenceResolver, Home, RepositoryStore};

use crate::error::{CompileError, Result};

/// Expand, decode and validate a charts configuration
pub fn load_configuration(
    expander: &dyn TemplateExpander,
    overrides: ReleaseOverrides,
    source_name: &str,
    input: &[u8],
) -> Result<ChartsConfiguration> {
    let config = ConfigLoader::new(expander)
        .with_overrides(overrides)
        .load(source_name, input)?;
    Validator::validate(&config)?;

    tracing::debug!(
        name = %config.name,
        namespace = %config.namespace,
        charts = config.charts.len(),
        "loaded charts config"
    );
    Ok(config)
}

/// Turns a validated configuration into one manifest stream
pub struct Pipeline<'a, R> {
    store: &'a dyn RepositoryStore,
    adapter: RendererAdapter<R>,
    home: Home,
    working_dir: PathBuf,
    repositories: Vec<(String, String)>,
}

impl<'a, R: ChartRenderer> Pipeline<'a, R> {
    pub fn new(store: &'a dyn RepositoryStore, renderer: R, home: Home, working_dir: PathBuf) -> Self {
        Self {
            store,
            adapter: RendererAdapter::new(renderer),
            home,
            working_dir,
            repositories: Vec::new(),
        }
    }

    /// Repositories to register before any chart is resolved
    pub fn with_repositories(mut self, repositories: Vec<(String, String)>) -> Self {
        self.repositories = repositories;
        self
    }

    pub async fn compile(&self, config: &ChartsConfiguration) -> Result<String> {
        let resolver =
            ChartReferenceResolver::new(self.store, self.home.clone(), self.working_dir.clone());

        let mut fresh = Vec::new();
        for (name, url) in self.repositories.iter().chain(&config.inline_repositories()) {
            self.store.add_repository(name, url).await?;
            fresh.push(name.clone());
        }

        if config
            .charts
            .iter()
            .any(|decl| resolver.is_repository_reference(&decl.location))
        {
            self.store.refresh(&fresh).await;
        }

        let mut assembler = OutputAssembler::new();
        for decl in &config.charts {
            let source_path = resolver
                .resolve(&decl.location, decl.constraint.as_deref())
                .await?;
            tracing::info!(chart = %decl.location, path = %source_path.display(), "resolved chart");

            let chart = ResolvedChart {
                source_path,
                release_name: config.name.clone(),
                namespace: config.namespace.clone(),
                composed_values: ValueComposer::new().layer(&decl.overrides).compose(),
            };

            let documents = self
                .adapter
                .render(&chart)
                .map_err(|source| CompileError::Render {
                    location: decl.location.clone(),
                    source,
                })?;
            assembler.push_chart(documents);
        }

        if assembler.is_empty() {
            tracing::warn!("no manifests rendered");
        }
        tracing::debug!(documents = assembler.len(), "assembled manifest stream");
        Ok(assembler.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chartline_core::{ConfigError, ValidationErrorKind, Values};
    use chartline_engine::{EngineError, TemplateError};
    use chartline_repo::{ChartVersion, RepoError, ResolutionErrorKind};
    use async_trait::async_trait;
    use indexmap::IndexMap;
    use std::cell::RefCell;
    use std::path::Path;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct Verbatim;

    impl TemplateExpander for Verbatim {
        fn expand(&self, _source_name: &str, text: &str) -> std::result::Result<String, ConfigError> {
            Ok(text.to_string())
        }
    }

    #[derive(Default)]
    struct FakeStore {
        events: Mutex<Vec<String>>,
    }

    impl FakeStore {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RepositoryStore for FakeStore {
        async fn add_repository(&self, name: &str, url: &str) -> chartline_repo::Result<()> {
            self.events.lock().unwrap().push(format!("add {name} {url}"));
            Ok(())
        }

        async fn repositories(&self) -> Vec<String> {
            vec!["stable".to_string()]
        }

        async fn load_index(&self, _repository: &str, _chart: &str) -> chartline_repo::Result<Vec<ChartVersion>> {
            Ok(Vec::new())
        }

        async fn download(
            &self,
            _repository: &str,
            chart: &ChartVersion,
            _dest: &Path,
        ) -> chartline_repo::Result<PathBuf> {
            Err(RepoError::NoDownloadUrl {
                name: chart.name.clone(),
                version: chart.version.to_string(),
                repo: "stable".to_string(),
            })
        }

        async fn refresh(&self, fresh: &[String]) {
            self.events
                .lock()
                .unwrap()
                .push(format!("refresh except [{}]", fresh.join(", ")));
        }
    }

    /// Renders one document per chart from its directory name and values
    #[derive(Default)]
    struct EchoRenderer {
        calls: RefCell<Vec<String>>,
        fail_on: Option<&'static str>,
    }

    impl ChartRenderer for &EchoRenderer {
        fn render(
            &self,
            chart_path: &Path,
            release_name: &str,
            namespace: &str,
            values_document: &Path,
        ) -> chartline_engine::error::Result<IndexMap<String, String>> {
            let chart = chart_path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            self.calls.borrow_mut().push(chart.clone());

            if self.fail_on == Some(chart.as_str()) {
                return Err(EngineError::Template(TemplateError {
                    template: "templates/broken.yaml".to_string(),
                    message: "undefined value".to_string(),
                    kind: chartline_engine::TemplateErrorKind::UndefinedVariable,
                    src: miette::NamedSource::new("templates/broken.yaml", String::new()),
                    span: None,
                    suggestion: None,
                }));
            }

            let values = Values::from_file(values_document)?;
            let mut outputs = IndexMap::new();
            outputs.insert(
                "cm.yaml".to_string(),
                format!(
                    "chart: {chart}\nrelease: {release_name}/{namespace}\nvalues: {}\n",
                    values.inner()
                ),
            );
            outputs.insert("NOTES.txt".to_string(), "installed".to_string());
            outputs.insert("_helpers.tpl".to_string(), "{{/* */}}".to_string());
            Ok(outputs)
        }
    }

    struct Fixture {
        _dir: TempDir,
        home: Home,
        work: PathBuf,
    }

    fn fixture(charts: &[&str]) -> Fixture {
        let dir = TempDir::new().unwrap();
        let work = dir.path().join("work");
        for chart in charts {
            std::fs::create_dir_all(work.join(chart)).unwrap();
        }
        std::fs::create_dir_all(&work).unwrap();
        Fixture {
            home: Home::at(dir.path().join("home")),
            work,
            _dir: dir,
        }
    }

    fn load(text: &str) -> Result<ChartsConfiguration> {
        load_configuration(&Verbatim, ReleaseOverrides::default(), "charts.yml", text.as_bytes())
    }

    #[test]
    fn test_load_applies_overrides_before_validation() {
        let overrides = ReleaseOverrides {
            name: Some("cli-name".to_string()),
            namespace: Some("cli-ns".to_string()),
        };
        let config = load_configuration(
            &Verbatim,
            overrides,
            "charts.yml",
            b"apiVersion: v1\ncharts:\n  ./web: {}\n",
        )
        .unwrap();
        assert_eq!(config.name, "cli-name");
        assert_eq!(config.namespace, "cli-ns");
    }

    #[test]
    fn test_load_reports_first_violation() {
        let err = load("apiVersion: v2\nname: demo\nnamespace: apps\ncharts: {}\n").unwrap_err();
        match err {
            CompileError::Validation(e) => {
                assert_eq!(e.kind(), ValidationErrorKind::UnsupportedApiVersion)
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_compile_local_charts_in_order() {
        let fx = fixture(&["b-chart", "a-chart"]);
        let config = load(
            "apiVersion: v1\nname: demo\nnamespace: apps\ncharts:\n  b-chart:\n    value: 1\n  a-chart: ~\n",
        )
        .unwrap();
        let store = FakeStore::default();
        let renderer = EchoRenderer::default();

        let output = Pipeline::new(&store, &renderer, fx.home.clone(), fx.work.clone())
            .compile(&config)
            .await
            .unwrap();

        assert_eq!(
            output,
            "---\nchart: b-chart\nrelease: demo/apps\nvalues: {\"value\":1}\n\n---\nchart: a-chart\nrelease: demo/apps\nvalues: {}\n"
        );
        assert_eq!(*renderer.calls.borrow(), vec!["b-chart", "a-chart"]);
        assert!(store.events().is_empty(), "local charts never touch repositories");
    }

    #[tokio::test]
    async fn test_compile_registers_repositories_and_refreshes() {
        let fx = fixture(&[]);
        let config = load(
            "apiVersion: v1\nname: demo\nnamespace: apps\ncharts:\n  - acme/web:\n      repo: https://charts.example.com\n",
        )
        .unwrap();
        let store = FakeStore::default();
        let renderer = EchoRenderer::default();

        let err = Pipeline::new(&store, &renderer, fx.home.clone(), fx.work.clone())
            .with_repositories(vec![("extra".to_string(), "https://extra.example.com".to_string())])
            .compile(&config)
            .await
            .unwrap_err();

        assert_eq!(
            store.events(),
            vec![
                "add extra https://extra.example.com",
                "add acme https://charts.example.com",
                "refresh except [extra, acme]"
            ]
        );
        match err {
            CompileError::Resolution(e) => {
                assert_eq!(e.kind(), ResolutionErrorKind::MissingChart);
                assert_eq!(e.location(), "acme/web");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(renderer.calls.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_render_failure_aborts_with_location() {
        let fx = fixture(&["first", "broken", "last"]);
        let config = load(
            "apiVersion: v1\nname: demo\nnamespace: apps\ncharts:\n  first: {}\n  broken: {}\n  last: {}\n",
        )
        .unwrap();
        let store = FakeStore::default();
        let renderer = EchoRenderer {
            fail_on: Some("broken"),
            ..EchoRenderer::default()
        };

        let err = Pipeline::new(&store, &renderer, fx.home.clone(), fx.work.clone())
            .compile(&config)
            .await
            .unwrap_err();

        match err {
            CompileError::Render { location, .. } => assert_eq!(location, "broken"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(*renderer.calls.borrow(), vec!["first", "broken"]);
    }
}
