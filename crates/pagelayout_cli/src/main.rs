//! `pagelayout` command line entry point.
//!
//! # Responsibility
//! - Read layout files, run the core transcoder and print the result.
//! - Own process configuration (log level and log directory).
//!
//! # Invariants
//! - Results go to stdout; diagnostics go to stderr as `error: ...`.
//! - Any failure exits with status 1.

use clap::{Parser, Subcommand};
use log::info;
use pagelayout_core::{
    core_version, decode, default_log_level, encode_layout, init_logging, DecodedLayout,
    LayoutDocument, LayoutError,
};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "pagelayout")]
#[command(about = "Convert between compact page layouts and canonical layout trees")]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value_t = default_log_level().to_string())]
    log_level: String,

    /// Absolute directory for rolling log files; logging is off without it
    #[arg(long, global = true)]
    log_dir: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decode a stored layout (YAML or JSON) into a canonical tree (JSON)
    Decode { file: PathBuf },
    /// Encode a canonical tree (JSON or YAML) into a stored layout
    Encode {
        file: PathBuf,
        /// Print JSON instead of YAML
        #[arg(long)]
        json: bool,
    },
    /// Check that a stored layout survives a decode/encode cycle unchanged
    Check { file: PathBuf },
    /// Print the core version
    Version,
}

#[derive(Debug)]
enum CliError {
    Read { path: PathBuf, source: std::io::Error },
    Layout(LayoutError),
    Logging(String),
    Unstable(PathBuf),
}

impl Display for CliError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read { path, source } => {
                write!(f, "cannot read `{}`: {source}", path.display())
            }
            Self::Layout(err) => write!(f, "{err}"),
            Self::Logging(message) => write!(f, "logging setup failed: {message}"),
            Self::Unstable(path) => write!(
                f,
                "layout `{}` changes after a decode/encode cycle",
                path.display()
            ),
        }
    }
}

impl Error for CliError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            Self::Layout(err) => Some(err),
            Self::Logging(_) | Self::Unstable(_) => None,
        }
    }
}

impl From<LayoutError> for CliError {
    fn from(value: LayoutError) -> Self {
        Self::Layout(value)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    if let Some(log_dir) = cli.log_dir.as_deref() {
        init_logging(&cli.log_level, log_dir).map_err(CliError::Logging)?;
    }

    match cli.command {
        Command::Decode { file } => {
            let document = read_document(&file)?;
            let decoded = decode(&document);
            println!("{}", to_json(&decoded)?);
        }
        Command::Encode { file, json } => {
            let decoded = read_tree(&file)?;
            let document = encode_layout(&decoded);
            if json {
                println!("{}", document.to_json_string_pretty()?);
            } else {
                print!("{}", document.to_yaml_string()?);
            }
        }
        Command::Check { file } => {
            let document = read_document(&file)?;
            let first = decode(&document);
            let encoded = encode_layout(&first);
            let second = decode(&encoded);
            if second != first || encode_layout(&second) != encoded {
                return Err(CliError::Unstable(file));
            }
            info!(
                "event=layout_check module=cli status=ok nodes={}",
                first.node_count()
            );
            println!("ok: {} nodes", first.node_count());
        }
        Command::Version => println!("pagelayout {}", core_version()),
    }
    Ok(())
}

fn read_text(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .is_some_and(|extension| extension.eq_ignore_ascii_case("json"))
}

fn read_document(path: &Path) -> Result<LayoutDocument, CliError> {
    let text = read_text(path)?;
    let document = if is_json(path) {
        LayoutDocument::from_json_str(&text)?
    } else {
        LayoutDocument::from_yaml_str(&text)?
    };
    Ok(document)
}

fn read_tree(path: &Path) -> Result<DecodedLayout, CliError> {
    let text = read_text(path)?;
    let decoded = if is_json(path) {
        DecodedLayout::from_json_str(&text)?
    } else {
        DecodedLayout::from_yaml_str(&text)?
    };
    Ok(decoded)
}

fn to_json(decoded: &DecodedLayout) -> Result<String, CliError> {
    serde_json::to_string_pretty(decoded)
        .map_err(|err| CliError::Layout(LayoutError::from(err)))
}
