//! Chartline Core - configuration, validation and manifest assembly
//!
//! This crate provides the foundational pieces of the chartline pipeline:
//! - `ConfigLoader`: expands and decodes the charts configuration
//! - `Validator`: fail-fast checks of the decoded configuration
//! - `VersionConstraint`: version range parsing and selection
//! - `Values` / `ValueComposer`: override values with deep merge support
//! - `OutputAssembler`: ordered multi-document manifest stream
//! - `LoadedChart`: chart definition loaded from disk

pub mod chart;
pub mod config;
pub mod constraint;
pub mod context;
pub mod error;
pub mod output;
pub mod release;
pub mod validate;
pub mod values;

pub use chart::{CHART_FILE, ChartInfo, ChartKind, ChartMetadata, LoadedChart, ResolvedChart};
pub use config::{
    ChartDeclaration, ChartsConfiguration, ConfigLoader, ReleaseOverrides, TemplateExpander,
    split_location_key,
};
pub use constraint::{ConstraintError, VersionConstraint};
pub use context::{TemplateContext, TemplateInfo};
pub use error::{ConfigError, CoreError, ValidationError, ValidationErrorKind};
pub use output::{OutputAssembler, is_retained, normalize, retain_manifests};
pub use release::ReleaseInfo;
pub use validate::Validator;
pub use values::{ValueComposer, Values};
