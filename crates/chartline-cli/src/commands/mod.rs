//! CLI commands

pub mod compile;
pub mod example_config;
