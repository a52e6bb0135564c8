use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, Parser};
use protocore::{CompileError, Compiler, FsResolver, Target};

/// Compile .proto files and generate code for the requested targets.
#[derive(Debug, Parser)]
#[command(name = "protocore-codegen", version)]
struct Cli {
    /// Input files, as import paths relative to the proto paths
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Directory to search for imports, in order (default: .)
    #[arg(short = 'I', long = "proto-path")]
    proto_paths: Vec<PathBuf>,

    /// Target to generate, `name[:parameter]` (repeatable)
    #[arg(short = 't', long = "target", default_value = "rust")]
    targets: Vec<Target>,

    /// Directory receiving the generated files
    #[arg(short = 'o', long = "out-dir", default_value = ".")]
    out_dir: PathBuf,

    /// Increase verbosity (-v, -vv)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(count) => {
            tracing::info!(count, out_dir = %cli.out_dir.display(), "wrote generated files");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{fmt, EnvFilter};

    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter_layer = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

fn run(cli: &Cli) -> Result<usize, CompileError> {
    let proto_paths = if cli.proto_paths.is_empty() {
        vec![PathBuf::from(".")]
    } else {
        cli.proto_paths.clone()
    };
    let resolver = FsResolver::new(proto_paths);

    let mut roots = BTreeMap::new();
    for input in &cli.inputs {
        let file = resolver
            .locate(input)
            .ok_or_else(|| CompileError::Io {
                path: PathBuf::from(input),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found under any proto path"),
            })?;
        roots.insert(input.clone(), read(&file)?);
    }

    let outputs = Compiler::new().compile(&roots, &cli.targets, Some(&resolver))?;
    for (path, content) in &outputs {
        write(&cli.out_dir.join(path), content)?;
    }
    Ok(outputs.len())
}

fn read(path: &Path) -> Result<String, CompileError> {
    std::fs::read_to_string(path).map_err(|source| CompileError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write(path: &Path, content: &str) -> Result<(), CompileError> {
    let io = |source| CompileError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io)?;
    }
    std::fs::write(path, content).map_err(io)
}
