use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use std::path::PathBuf;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use foreign_linker::abi::{FunctionDescriptor, LinkerOptions, Platform};
use foreign_linker::config::Config;
use foreign_linker::layout::{MemoryLayout, PathElement};
use foreign_linker::linker::Linker;
use foreign_linker::lookup::{LibraryLookup, SymbolLookup};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Linker(#[from] foreign_linker::Error),

    #[error("Invalid platform: {0}")]
    Platform(String),

    #[error("Invalid path element '{0}'")]
    PathElement(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Symbol not found: {0}")]
    NotFound(String),
}

impl From<foreign_linker::layout::LayoutError> for AppError {
    fn from(err: foreign_linker::layout::LayoutError) -> Self {
        AppError::Linker(err.into())
    }
}

impl From<foreign_linker::abi::AbiError> for AppError {
    fn from(err: foreign_linker::abi::AbiError) -> Self {
        AppError::Linker(err.into())
    }
}

impl From<foreign_linker::linker::LinkerError> for AppError {
    fn from(err: foreign_linker::linker::LinkerError) -> Self {
        AppError::Linker(err.into())
    }
}

impl From<foreign_linker::lookup::LookupError> for AppError {
    fn from(err: foreign_linker::lookup::LookupError) -> Self {
        AppError::Linker(err.into())
    }
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// JSON, one document per command.
    Json,
}

#[derive(Parser)]
#[command(name = "foreign-linker")]
#[command(about = "Inspect native calling conventions, layouts and system symbols")]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, env = "FOREIGN_LINKER_CONFIG")]
    config: Option<PathBuf>,

    /// Target platform as `arch-os` (e.g. `ppc64-aix`); defaults to the configured or host platform
    #[arg(long, global = true)]
    platform: Option<String>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print where each argument and the return value of a signature are passed
    Arrange {
        /// Function descriptor, e.g. `(i4[d8d8])v`
        descriptor: String,

        /// Index of the first variadic argument
        #[arg(long)]
        variadic: Option<usize>,
    },

    /// Print the ABI type class of a layout
    Classify {
        /// Layout descriptor, e.g. `[f4f4]`
        layout: String,
    },

    /// Print the byte offset selected by a layout path
    Offset {
        /// Layout descriptor
        layout: String,

        /// Path elements separated by '.': `name`, `#N` (group member),
        /// `[N]` (sequence element), `[*]` (open), `[S:T]` (range), `^` (dereference)
        path: String,
    },

    /// Look up symbols in the system C library or a given library
    Lookup {
        /// Symbol names
        #[arg(required = true)]
        names: Vec<String>,

        /// Search this library instead of the system lookup
        #[arg(long)]
        library: Option<PathBuf>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("FOREIGN_LINKER_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_linker(config: Option<&PathBuf>, platform: Option<&str>) -> Result<Linker, AppError> {
    let mut config = match config {
        Some(path) => Config::from_file(path).map_err(foreign_linker::Error::from)?,
        None => Config::default(),
    };
    if let Some(platform) = platform {
        let platform: Platform = platform.parse().map_err(AppError::Platform)?;
        config.platform.arch = Some(platform.arch);
        config.platform.os = Some(platform.os);
    }
    Ok(Linker::from_config(&config)?)
}

fn parse_path(path: &str) -> Result<Vec<PathElement>, AppError> {
    if path.is_empty() {
        return Ok(Vec::new());
    }
    path.split('.').map(parse_path_element).collect()
}

fn parse_path_element(token: &str) -> Result<PathElement, AppError> {
    let invalid = || AppError::PathElement(token.to_string());
    if token == "^" {
        return Ok(PathElement::dereference());
    }
    if let Some(index) = token.strip_prefix('#') {
        let index = index.parse().map_err(|_| invalid())?;
        return Ok(PathElement::group_index(index)?);
    }
    let Some(inner) = token.strip_prefix('[').and_then(|t| t.strip_suffix(']')) else {
        return Ok(PathElement::group_name(token));
    };
    if inner == "*" {
        return Ok(PathElement::sequence_element());
    }
    match inner.split_once(':') {
        Some((start, step)) => {
            let start = start.parse().map_err(|_| invalid())?;
            let step = step.parse().map_err(|_| invalid())?;
            Ok(PathElement::sequence_range(start, step)?)
        }
        None => Ok(PathElement::sequence_index(inner.parse().map_err(|_| invalid())?)?),
    }
}

fn main() -> Result<(), AppError> {
    init_tracing();

    let cli = Cli::parse();
    let linker = load_linker(cli.config.as_ref(), cli.platform.as_deref())?;

    match cli.command {
        Commands::Arrange {
            descriptor,
            variadic,
        } => {
            let descriptor: FunctionDescriptor = descriptor.parse()?;
            let options = variadic
                .map(LinkerOptions::first_variadic_arg)
                .unwrap_or_default();
            let sequence = linker.calling_sequence(&descriptor, &options)?;
            match cli.format {
                OutputFormat::Text => println!("{}", sequence),
                OutputFormat::Json => {
                    let doc = json!({
                        "abi": sequence.abi().name(),
                        "descriptor": descriptor.to_string(),
                        "arguments": sequence.arguments(),
                        "return": sequence.return_binding(),
                        "stack_size": sequence.stack_size(),
                        "vector_count": sequence.vector_count(),
                    });
                    println!("{}", serde_json::to_string_pretty(&doc)?);
                }
            }
            Ok(())
        }
        Commands::Classify { layout } => {
            let layout: MemoryLayout = layout.parse()?;
            let class = linker.abi().classify(&layout)?;
            match cli.format {
                OutputFormat::Text => println!("{} {}: {}", linker.abi(), layout, class),
                OutputFormat::Json => {
                    let doc = json!({
                        "abi": linker.abi().name(),
                        "layout": layout.to_string(),
                        "class": class.to_string(),
                    });
                    println!("{}", serde_json::to_string_pretty(&doc)?);
                }
            }
            Ok(())
        }
        Commands::Offset { layout, path } => {
            let layout: MemoryLayout = layout.parse()?;
            let selected = layout.select(&parse_path(&path)?)?;
            let free = selected.coordinate_count();
            let offset = if free == 0 { Some(selected.offset()?) } else { None };
            match cli.format {
                OutputFormat::Text => match offset {
                    Some(offset) => println!("{} at offset {}", selected.layout(), offset),
                    None => println!("{} with {} free coordinates", selected.layout(), free),
                },
                OutputFormat::Json => {
                    let doc = json!({
                        "layout": selected.layout().to_string(),
                        "offset": offset,
                        "coordinates": free,
                    });
                    println!("{}", serde_json::to_string_pretty(&doc)?);
                }
            }
            Ok(())
        }
        Commands::Lookup { names, library } => {
            let lookup: Box<dyn SymbolLookup> = match library {
                Some(path) => Box::new(LibraryLookup::open(path)?),
                None => Box::new(linker.default_lookup()),
            };
            let found: Vec<(String, Option<u64>)> = names
                .into_iter()
                .map(|name| {
                    let address = lookup.find(&name);
                    (name, address)
                })
                .collect();
            match cli.format {
                OutputFormat::Text => {
                    for (name, address) in &found {
                        match address {
                            Some(address) => println!("{} 0x{:x}", name, address),
                            None => println!("{} not found", name),
                        }
                    }
                }
                OutputFormat::Json => {
                    let doc: serde_json::Map<String, serde_json::Value> = found
                        .iter()
                        .map(|(name, address)| (name.clone(), json!(address)))
                        .collect();
                    println!("{}", serde_json::to_string_pretty(&doc)?);
                }
            }
            match found.iter().find(|(_, address)| address.is_none()) {
                Some((name, _)) => Err(AppError::NotFound(name.clone())),
                None => Ok(()),
            }
        }
    }
}
