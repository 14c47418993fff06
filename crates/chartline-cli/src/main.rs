//! chartline - compile a charts configuration into one Kubernetes manifest stream

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod commands;
mod error;
mod exit_codes;
mod pipeline;

use commands::compile::CompileOptions;
use error::CompileError;

/// Compile every chart of a charts configuration, with the configured
/// values, into a single manifest stream on stdout or in a file.
///
/// Charts are resolved from local paths or chart repositories and rendered
/// locally; nothing talks to a cluster.
#[derive(Parser)]
#[command(name = "chartline")]
#[command(version)]
#[command(about = "Compile Helm-style charts into Kubernetes manifests", long_about)]
struct Cli {
    /// Charts configuration file, or '-' for stdin
    #[arg(value_name = "CHARTS_CONFIG", required_unless_present = "example_config")]
    config: Option<String>,

    /// Release name, overriding `name` in the configuration
    #[arg(short = 'a', long)]
    name: Option<String>,

    /// Release namespace, overriding `namespace` in the configuration
    #[arg(short, long)]
    namespace: Option<String>,

    /// Write output to a file instead of stdout
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Repositories to add before compiling (repeatable, comma-separated)
    #[arg(
        short = 'r',
        long = "repo",
        value_name = "NAME=URL",
        value_delimiter = ',',
        value_parser = parse_repository
    )]
    repositories: Vec<(String, String)>,

    /// Directory of templates the configuration can include or import
    #[arg(long, value_name = "DIR")]
    partials: Option<PathBuf>,

    /// Render undefined chart values as empty instead of failing
    #[arg(long)]
    lenient: bool,

    /// Enable debug output
    #[arg(long)]
    debug: bool,

    /// Print an annotated example configuration and exit
    #[arg(long)]
    example_config: bool,

    /// Directory holding the repositories file and the chart cache
    #[arg(long, value_name = "DIR", env = "CHARTLINE_HOME")]
    home: Option<PathBuf>,
}

fn parse_repository(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((name, url)) if !name.trim().is_empty() && !url.trim().is_empty() => {
            Ok((name.trim().to_string(), url.trim().to_string()))
        }
        _ => Err(format!("expected NAME=URL, got {:?}", value)),
    }
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("chartline=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chartline=info"))
    };

    // Logs go to stderr; stdout carries the manifest stream
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}

fn main() -> ExitCode {
    miette::set_panic_hook();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if !err.use_stderr() => err.exit(),
        Err(err) => {
            let _ = err.print();
            return ExitCode::from(exit_codes::USAGE_ERROR);
        }
    };

    if cli.example_config {
        commands::example_config::run();
        return ExitCode::SUCCESS;
    }

    init_tracing(cli.debug);

    let Some(config) = cli.config else {
        eprintln!("error: CHARTS_CONFIG is required");
        return ExitCode::from(exit_codes::USAGE_ERROR);
    };

    let options = CompileOptions {
        config,
        name: cli.name,
        namespace: cli.namespace,
        output: cli.output,
        repositories: cli.repositories,
        partials: cli.partials,
        lenient: cli.lenient,
        home: cli.home,
    };

    match run(options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = err.exit_code();
            eprintln!("{:?}", miette::Report::new(err));
            ExitCode::from(code)
        }
    }
}

fn run(options: CompileOptions) -> Result<(), CompileError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CompileError::io("failed to start the async runtime", e))?;
    runtime.block_on(commands::compile::run(options))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_repo_flag_accepts_lists_and_repeats() {
        let cli = Cli::try_parse_from([
            "chartline",
            "charts.yml",
            "-r",
            "a=https://a.example.com,b=https://b.example.com",
            "--repo",
            "c=https://c.example.com",
        ])
        .unwrap();

        let names: Vec<_> = cli.repositories.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_repo_flag_rejects_missing_url() {
        assert!(Cli::try_parse_from(["chartline", "charts.yml", "-r", "broken"]).is_err());
    }

    #[test]
    fn test_example_config_needs_no_path() {
        let cli = Cli::try_parse_from(["chartline", "--example-config"]).unwrap();
        assert!(cli.example_config);
        assert!(cli.config.is_none());
    }
}
