//! Per-chart rendering with manifest filtering

use chartline_core::{ResolvedChart, ValueComposer, retain_manifests};
use std::io::Write;

use crate::engine::ChartRenderer;
use crate::error::Result;

/// Hands composed values to a [`ChartRenderer`] and keeps only manifests
///
/// The values document lives in a temporary file for the duration of the
/// render call and is removed afterwards whether rendering succeeds or not.
pub struct RendererAdapter<R> {
    renderer: R,
}

impl<R: ChartRenderer> RendererAdapter<R> {
    pub fn new(renderer: R) -> Self {
        Self { renderer }
    }

    /// Render one chart into normalized documents, in renderer order
    pub fn render(&self, chart: &ResolvedChart) -> Result<Vec<String>> {
        let document = ValueComposer::document(&chart.composed_values)?;

        let mut values_file = tempfile::Builder::new()
            .prefix("chartline-values-")
            .suffix(".yaml")
            .tempfile()?;
        values_file.write_all(document.as_bytes())?;
        values_file.flush()?;

        let outputs = self.renderer.render(
            &chart.source_path,
            &chart.release_name,
            &chart.namespace,
            values_file.path(),
        )?;

        let documents = retain_manifests(outputs);
        tracing::debug!(
            chart = %chart.source_path.display(),
            documents = documents.len(),
            "rendered chart"
        );

        Ok(documents.into_iter().map(|(_, text)| text).collect())
    }
}
