//! Chart template renderer based on MiniJinja

use chartline_core::{CHART_FILE, CoreError, LoadedChart, ReleaseInfo, TemplateContext, Values};
use indexmap::IndexMap;
use minijinja::Environment;
use std::path::Path;
use tempfile::TempDir;

use crate::error::{Result, TemplateError};
use crate::filters;
use crate::functions;

/// Maximum nesting of bundled subcharts
pub const MAX_SUBCHART_DEPTH: usize = 10;

/// Directory holding a chart's bundled subcharts
pub const SUBCHARTS_DIR: &str = "charts";

/// Renders a chart directory into named outputs
///
/// Outputs are keyed by template path relative to `templates/`, in sorted
/// order. Bundled subcharts come first, keyed `charts/<subchart>/<path>`.
/// Every template is reported, including helpers and notes; callers decide
/// which outputs are manifests.
pub trait ChartRenderer {
    fn render(
        &self,
        chart_path: &Path,
        release_name: &str,
        namespace: &str,
        values_document: &Path,
    ) -> Result<IndexMap<String, String>>;
}

/// The chart template engine
pub struct ChartEngine {
    strict_mode: bool,
}

impl ChartEngine {
    /// Strict mode fails on undefined variables
    pub fn new(strict_mode: bool) -> Self {
        Self { strict_mode }
    }

    fn create_environment(&self) -> Environment<'static> {
        let mut env = Environment::new();

        if self.strict_mode {
            env.set_undefined_behavior(minijinja::UndefinedBehavior::Strict);
        } else {
            env.set_undefined_behavior(minijinja::UndefinedBehavior::Lenient);
        }

        filters::register(&mut env);
        functions::register(&mut env);
        env
    }

    /// Render every template of a loaded chart, subcharts excluded
    pub fn render_chart(
        &self,
        chart: &LoadedChart,
        context: &TemplateContext,
    ) -> Result<IndexMap<String, String>> {
        let mut env = self.create_environment();
        let mut sources = Vec::new();

        for file_path in chart.template_files()? {
            let name = file_path
                .strip_prefix(&chart.templates_dir)
                .unwrap_or(&file_path)
                .to_string_lossy()
                .replace('\\', "/");
            let content = std::fs::read_to_string(&file_path)?;

            env.add_template_owned(name.clone(), content.clone())
                .map_err(|e| TemplateError::from_minijinja(e, &name, &content))?;
            sources.push((name, content));
        }

        let base_path = format!("{}/templates", context.chart.name);
        let mut outputs = IndexMap::with_capacity(sources.len());

        for (name, content) in &sources {
            let tmpl = env
                .get_template(name)
                .map_err(|e| TemplateError::from_minijinja(e, name, content))?;

            let ctx = context.clone().with_template(name, &base_path);
            let rendered = tmpl
                .render(context_value(&ctx))
                .map_err(|e| TemplateError::from_minijinja(e, name, content))?;

            let output_name = name
                .strip_suffix(".j2")
                .or_else(|| name.strip_suffix(".jinja2"))
                .unwrap_or(name);
            tracing::debug!(template = %name, bytes = rendered.len(), "rendered template");
            outputs.insert(output_name.to_string(), rendered);
        }

        Ok(outputs)
    }

    /// Render a chart after its bundled subcharts, each with scoped values
    fn render_tree(
        &self,
        chart: &LoadedChart,
        values: Values,
        release: &ReleaseInfo,
        depth: usize,
    ) -> Result<IndexMap<String, String>> {
        let mut outputs = IndexMap::new();

        if depth >= MAX_SUBCHART_DEPTH {
            tracing::warn!(
                chart = %chart.metadata.name,
                max_depth = MAX_SUBCHART_DEPTH,
                "maximum subchart depth reached, nested charts skipped"
            );
        } else {
            let bundled = Subcharts::discover(chart)?;
            for subchart in &bundled.charts {
                let name = subchart.metadata.name.as_str();
                let scoped = Values::for_subchart(subchart.default_values()?, &values, name);
                tracing::debug!(parent = %chart.metadata.name, subchart = %name, "rendering subchart");

                for (template, text) in self.render_tree(subchart, scoped, release, depth + 1)? {
                    outputs.insert(format!("{SUBCHARTS_DIR}/{name}/{template}"), text);
                }
            }
        }

        let context = TemplateContext::new(values, release.clone(), &chart.metadata);
        outputs.extend(self.render_chart(chart, &context)?);
        Ok(outputs)
    }
}

impl ChartRenderer for ChartEngine {
    fn render(
        &self,
        chart_path: &Path,
        release_name: &str,
        namespace: &str,
        values_document: &Path,
    ) -> Result<IndexMap<String, String>> {
        let chart = LoadedChart::load(chart_path)?;

        let mut values = chart.default_values()?;
        values.merge(&Values::from_file(values_document)?);

        self.render_tree(&chart, values, &ReleaseInfo::new(release_name, namespace), 0)
    }
}

/// Subcharts bundled under a chart's `charts/` directory, sorted by name
///
/// Packaged subcharts (`.tgz`) are unpacked into a temporary directory
/// that lives as long as this value.
struct Subcharts {
    charts: Vec<LoadedChart>,
    _unpacked: Option<TempDir>,
}

impl Subcharts {
    fn discover(chart: &LoadedChart) -> Result<Self> {
        let dir = chart.root.join(SUBCHARTS_DIR);
        if !dir.is_dir() {
            return Ok(Self {
                charts: Vec::new(),
                _unpacked: None,
            });
        }

        let mut entries = std::fs::read_dir(&dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .collect::<Vec<_>>();
        entries.sort();

        let unpacked = if entries.iter().any(|p| is_chart_archive(p)) {
            Some(tempfile::Builder::new().prefix("chartline-subcharts-").tempdir()?)
        } else {
            None
        };

        let mut charts = Vec::new();
        for (index, path) in entries.iter().enumerate() {
            if path.is_dir() && path.join(CHART_FILE).exists() {
                charts.push(LoadedChart::load(path)?);
            } else if let Some(staging) = unpacked.as_ref().filter(|_| is_chart_archive(path)) {
                charts.push(unpack_subchart(path, &staging.path().join(index.to_string()))?);
            } else {
                tracing::debug!(path = %path.display(), "ignoring non-chart entry in charts directory");
            }
        }
        charts.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));

        Ok(Self {
            charts,
            _unpacked: unpacked,
        })
    }
}

fn is_chart_archive(path: &Path) -> bool {
    let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    path.is_file() && (name.ends_with(".tgz") || name.ends_with(".tar.gz"))
}

fn unpack_subchart(archive: &Path, dest: &Path) -> Result<LoadedChart> {
    let file = std::fs::File::open(archive)?;
    tar::Archive::new(flate2::read::GzDecoder::new(file)).unpack(dest)?;

    let root = LoadedChart::locate_root(dest).ok_or_else(|| CoreError::InvalidChart {
        message: format!("no {} found in {}", CHART_FILE, archive.display()),
    })?;
    Ok(LoadedChart::load(root)?)
}

fn context_value(context: &TemplateContext) -> minijinja::Value {
    minijinja::context! {
        values => &context.values,
        release => &context.release,
        chart => &context.chart,
        template => &context.template,
    }
}
