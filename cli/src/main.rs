use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use raml_shapes_core::{Category, Diagnostic, Location, OrderedMap, Severity};
use raml_shapes_loader::{LoaderConfig, LoaderError, ShapeRegistry, read_document};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "raml-shapes")]
#[command(about = "Resolve, validate and convert RAML type libraries")]
#[command(version)]
struct Cli {
    /// Loader configuration file (YAML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Print failures as JSON diagnostics instead of text.
    #[arg(long, global = true)]
    json_diagnostics: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load, resolve and validate one or more library files or directories.
    Check(CheckArgs),
    /// Convert a declared type to JSON Schema (draft-07).
    Convert(ConvertArgs),
    /// Validate a JSON or YAML value file against a declared type.
    ValidateValue(ValidateValueArgs),
}

#[derive(Debug, Args)]
struct CheckArgs {
    /// Library files and/or directories containing library files.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
}

#[derive(Debug, Args)]
struct ConvertArgs {
    /// Library file or directory.
    input: PathBuf,
    /// Name of the declared type to convert.
    #[arg(long = "type")]
    type_name: String,
    /// Output path (default: stdout).
    #[arg(long)]
    output: Option<PathBuf>,
    /// Prefix for the root `$id`; overrides the configuration.
    #[arg(long)]
    id_base: Option<String>,
    /// Emit every declared type under `definitions`.
    #[arg(long)]
    include_definitions: bool,
}

#[derive(Debug, Args)]
struct ValidateValueArgs {
    /// Library file or directory.
    input: PathBuf,
    /// Name of the declared type to validate against.
    #[arg(long = "type")]
    type_name: String,
    /// JSON or YAML file holding the value.
    #[arg(long)]
    value: PathBuf,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = load_config(cli.config.as_deref()).and_then(|config| match cli.command {
        Command::Check(args) => run_check(args, config),
        Command::Convert(args) => run_convert(args, config),
        Command::ValidateValue(args) => run_validate_value(args, config),
    });

    if let Err(err) = result {
        let diagnostic = diagnostic_for(&err);
        if cli.json_diagnostics {
            match serde_json::to_string_pretty(&diagnostic) {
                Ok(raw) => eprintln!("{raw}"),
                Err(_) => eprintln!("error: {err}"),
            }
        } else {
            eprint!("{}", render_diagnostic(&diagnostic));
        }
        std::process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> Result<LoaderConfig, LoaderError> {
    match path {
        Some(path) => {
            debug!(config = %path.display(), "Loading configuration");
            LoaderConfig::load(path)
        }
        None => Ok(LoaderConfig::default()),
    }
}

fn run_check(args: CheckArgs, config: LoaderConfig) -> Result<(), LoaderError> {
    let config = LoaderConfig {
        unwrap: true,
        validate: true,
        ..config
    };
    let mut types = 0;
    for input in &args.inputs {
        let registry = ShapeRegistry::load(input, &config)?;
        types += registry.len();
    }
    println!(
        "Checked {types} type(s) in {} input(s).",
        args.inputs.len()
    );
    Ok(())
}

fn run_convert(args: ConvertArgs, config: LoaderConfig) -> Result<(), LoaderError> {
    let mut schema_config = config.schema.clone();
    if args.id_base.is_some() {
        schema_config.id_base = args.id_base;
    }
    schema_config.include_definitions |= args.include_definitions;

    let mut registry = ShapeRegistry::load(&args.input, &config)?;
    let schema = registry.to_json_schema(&args.type_name, &schema_config)?;
    let raw = serde_json::to_string_pretty(&schema)?;

    match args.output {
        Some(output) => {
            if let Some(parent) = output.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            fs::write(&output, format!("{raw}\n"))?;
            println!(
                "Wrote JSON Schema for `{}` to '{}'.",
                args.type_name,
                output.display()
            );
        }
        None => println!("{raw}"),
    }
    Ok(())
}

fn run_validate_value(args: ValidateValueArgs, config: LoaderConfig) -> Result<(), LoaderError> {
    let mut registry = ShapeRegistry::load(&args.input, &config)?;
    let value = read_document(&args.value)?;
    registry.validate_value(&args.type_name, &value)?;
    println!(
        "'{}' is a valid `{}`.",
        args.value.display(),
        args.type_name
    );
    Ok(())
}

/// Builds the diagnostic chain for a loader failure.
fn diagnostic_for(err: &LoaderError) -> Diagnostic {
    let (category, location) = match err {
        LoaderError::ShapeError(shape_error) => return Diagnostic::from(shape_error),
        LoaderError::IoError(_) | LoaderError::NoLibraries(_) => (Category::Loading, Location::default()),
        LoaderError::JsonError(_) | LoaderError::YamlError(_) => (Category::Reading, Location::default()),
        LoaderError::InvalidDocument { path, .. } => {
            (Category::Reading, Location::new(path.display().to_string()))
        }
        LoaderError::DuplicateType { second, .. }
        | LoaderError::DuplicateAnnotationType { second, .. } => {
            (Category::Loading, Location::new(second.display().to_string()))
        }
        LoaderError::TypeNotFound(_) => (Category::Resolving, Location::default()),
    };
    Diagnostic {
        severity: Severity::Error,
        category,
        location,
        message: err.to_string(),
        cause: None,
        context: OrderedMap::new(),
    }
}

/// Renders a diagnostic chain, one line per level, innermost last.
fn render_diagnostic(diagnostic: &Diagnostic) -> String {
    let mut out = String::new();
    let mut current = Some(diagnostic);
    let mut depth = 0;
    while let Some(level) = current {
        let indent = "  ".repeat(depth);
        let prefix = if depth == 0 {
            format!("{}[{}]", level.severity, level.category)
        } else {
            "caused by".to_string()
        };
        let location = level.location.to_string();
        if location.is_empty() {
            out.push_str(&format!("{indent}{prefix}: {}", level.message));
        } else {
            out.push_str(&format!("{indent}{prefix}: {location}: {}", level.message));
        }
        if !level.context.is_empty() {
            let pairs: Vec<String> = level
                .context
                .iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect();
            out.push_str(&format!(" ({})", pairs.join(", ")));
        }
        out.push('\n');
        current = level.cause.as_deref();
        depth += 1;
    }
    out
}
