//! Chartline Engine - MiniJinja templating for configurations and charts
//!
//! This crate provides:
//! - `ConfigExpander`: expands directives in the charts configuration (`env`, `expandenv`, partials)
//! - `ChartEngine`: renders a chart's templates with `values`, `release` and `chart`
//! - `RendererAdapter`: composes the values document and keeps only manifests

pub mod adapter;
pub mod engine;
pub mod error;
pub mod expander;
pub mod filters;
pub mod functions;

pub use adapter::RendererAdapter;
pub use engine::{ChartEngine, ChartRenderer, MAX_SUBCHART_DEPTH, SUBCHARTS_DIR};
pub use error::{EngineError, TemplateError, TemplateErrorKind};
pub use expander::ConfigExpander;
pub use filters::AVAILABLE_FILTERS;
pub use functions::Bindings;
