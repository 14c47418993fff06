//! Compile command - render every chart of a charts configuration

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chartline_core::ReleaseOverrides;
use chartline_engine::{Bindings, ChartEngine, ConfigExpander};
use chartline_repo::{Home, HttpRepositoryStore};

use crate::error::{CompileError, Result};
use crate::pipeline::{Pipeline, load_configuration};

/// Source argument meaning standard input
pub const STDIN_SOURCE: &str = "-";

pub struct CompileOptions {
    pub config: String,
    pub name: Option<String>,
    pub namespace: Option<String>,
    pub output: Option<PathBuf>,
    pub repositories: Vec<(String, String)>,
    pub partials: Option<PathBuf>,
    pub lenient: bool,
    pub home: Option<PathBuf>,
}

pub async fn run(opts: CompileOptions) -> Result<()> {
    let (source_name, input) = read_input(&opts.config)?;

    let mut expander = ConfigExpander::new(Bindings::Process);
    if let Some(dir) = &opts.partials {
        expander = expander
            .with_partials_dir(dir)
            .map_err(|source| CompileError::Partials {
                dir: dir.clone(),
                source,
            })?;
    }

    let overrides = ReleaseOverrides {
        name: opts.name,
        namespace: opts.namespace,
    };
    let config = load_configuration(&expander, overrides, &source_name, &input)?;

    let home = match &opts.home {
        Some(root) => Home::at(root),
        None => Home::default_dirs()?,
    };
    let store = HttpRepositoryStore::open(home.clone())?;
    let working_dir = std::env::current_dir()
        .map_err(|e| CompileError::io("failed to determine the working directory", e))?;

    let output = Pipeline::new(&store, ChartEngine::new(!opts.lenient), home, working_dir)
        .with_repositories(opts.repositories)
        .compile(&config)
        .await?;

    write_output(opts.output.as_deref(), &output)
}

fn read_input(source: &str) -> Result<(String, Vec<u8>)> {
    if source == STDIN_SOURCE {
        let mut input = Vec::new();
        std::io::stdin()
            .read_to_end(&mut input)
            .map_err(|e| CompileError::io("failed to read charts config from stdin", e))?;
        return Ok(("<stdin>".to_string(), input));
    }

    let input = std::fs::read(source)
        .map_err(|e| CompileError::io(format!("failed to read charts config {}", source), e))?;
    Ok((source.to_string(), input))
}

fn write_output(path: Option<&Path>, output: &str) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, output)
                .map_err(|e| CompileError::io(format!("failed to write {}", path.display()), e))?;
            tracing::info!(path = %path.display(), "wrote manifests");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(output.as_bytes())
                .and_then(|()| stdout.flush())
                .map_err(|e| CompileError::io("failed to write to stdout", e))?;
        }
    }
    Ok(())
}
