//! confly CLI - build layered configurations from the command line
//!
//! Usage:
//!   confly build --config-dir configs base experiments/big trainer.lr=0.1 --debug
//!   confly get --config-dir configs --key model.depth base model.depth=50
//!   confly check configs/base.yml configs/models/small.yml
//!
//! Tokens follow the usual rules: `key.path=value` is an override, `--name`
//! is shorthand for `name=True`, anything else names a config document.

use clap::{Parser, Subcommand};
use colored::Colorize;
use confly_core::{loader, Config, ConfigBuilder, Value};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// confly - layered YAML configuration with inline expressions
#[derive(Parser)]
#[command(name = "confly")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (sets log level to DEBUG)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a configuration and print or save it
    Build {
        /// Directory that config documents are relative to
        #[arg(short, long)]
        config_dir: Option<PathBuf>,

        /// Output format: yaml, json
        #[arg(short, long, default_value = "yaml")]
        format: String,

        /// Write to file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Config documents, overrides and flags
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        tokens: Vec<String>,
    },

    /// Build a configuration and print one value
    Get {
        /// Path to the value (e.g., model.depth)
        #[arg(short, long)]
        key: String,

        /// Directory that config documents are relative to
        #[arg(short, long)]
        config_dir: Option<PathBuf>,

        /// Output format: text, json, yaml
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Config documents, overrides and flags
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        tokens: Vec<String>,
    },

    /// Quick syntax check of config documents
    Check {
        /// Config document(s) to check
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

/// Run the CLI with the process arguments
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Build {
            config_dir,
            format,
            output,
            tokens,
        } => cmd_build(tokens, config_dir, &format, output),

        Commands::Get {
            key,
            config_dir,
            format,
            tokens,
        } => cmd_get(tokens, config_dir, &key, &format),

        Commands::Check { files } => cmd_check(files),
    }
}

fn init_logging(verbose: bool) {
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(log_filter(verbose))
        .try_init();
}

/// RUST_LOG in the environment always takes precedence; --verbose falls back to DEBUG
fn log_filter(verbose: bool) -> EnvFilter {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str()))
}

fn build_config(tokens: &[String], config_dir: Option<PathBuf>) -> Result<Config, String> {
    let mut builder = ConfigBuilder::new().args(tokens.iter().cloned());
    if let Some(dir) = config_dir {
        builder = builder.base_path(dir);
    }
    builder
        .build()
        .map_err(|e| format!("Failed to build configuration: {}", e))
}

/// Serialize a whole tree as yaml or json
fn render_tree(value: &Value, format: &str) -> Result<String, String> {
    match format {
        "json" => serde_json::to_string_pretty(value)
            .map(|s| s + "\n")
            .map_err(|e| e.to_string()),
        "yaml" | "yml" => loader::to_yaml_string(value).map_err(|e| e.to_string()),
        _ => Err(format!("Unsupported format: {}. Use yaml or json.", format)),
    }
}

/// Render a single value; text prints scalars bare and collections as YAML
fn render_value(value: &Value, format: &str) -> Result<String, String> {
    match format {
        "text" => match value {
            Value::Sequence(_) | Value::Mapping(_) => render_tree(value, "yaml"),
            scalar => Ok(format!("{}\n", scalar)),
        },
        _ => render_tree(value, format),
    }
}

fn cmd_build(
    tokens: Vec<String>,
    config_dir: Option<PathBuf>,
    format: &str,
    output: Option<PathBuf>,
) -> ExitCode {
    let config = match build_config(&tokens, config_dir) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", e.red());
            return ExitCode::from(1);
        }
    };

    let content = match render_tree(config.as_value(), format) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            return ExitCode::from(1);
        }
    };

    if let Some(output_path) = output {
        if let Err(e) = std::fs::write(&output_path, &content) {
            eprintln!("{}: {}", "Error writing file".red(), e);
            return ExitCode::from(2);
        }
        eprintln!("{} Wrote to {}", "✓".green(), output_path.display());
    } else {
        print!("{}", content);
    }
    ExitCode::SUCCESS
}

fn cmd_get(tokens: Vec<String>, config_dir: Option<PathBuf>, key: &str, format: &str) -> ExitCode {
    let config = match build_config(&tokens, config_dir) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", e.red());
            return ExitCode::from(1);
        }
    };

    let value = match config.get(key) {
        Ok(value) => value,
        Err(_) => {
            eprintln!("{}: Path '{}' not found", "Error".red(), key);
            return ExitCode::from(1);
        }
    };

    match render_value(value, format) {
        Ok(content) => {
            print!("{}", content);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            ExitCode::from(1)
        }
    }
}

fn cmd_check(files: Vec<PathBuf>) -> ExitCode {
    let mut all_valid = true;

    for file in files {
        let content = match std::fs::read_to_string(&file) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("{} {}: {}", "✗".red(), file.display(), e);
                all_valid = false;
                continue;
            }
        };

        match loader::parse_yaml(&content, &file.display().to_string()) {
            Ok(_) => println!("{} {}: valid YAML", "✓".green(), file.display()),
            Err(e) => {
                eprintln!("{} {}: {}", "✗".red(), file.display(), e);
                all_valid = false;
            }
        }
    }

    if all_valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}
