//! CloudFormation template composer CLI
//!
//! Usage:
//!   cfn-composer [OPTIONS] [STACK]
//!
//! Options:
//!   -c, --config <FILE>    Composer configuration (TOML format)
//!   --compact              Write single-line JSON
//!   --validate <FILE>      Re-check a serialized template ("-" for stdin)
//!   -l, --list             List the available stacks
//!   --check-exports        Check cross-stack exports of all stacks
//!   -h, --help             Print help

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cfn_composer::{check_exports, render_with_config, validate_json, ComposerConfig, Generator};

#[derive(Parser)]
#[command(name = "cfn-composer")]
#[command(about = "Compose and validate CloudFormation templates for Jira Data Center")]
struct Cli {
    /// Stack to print as CloudFormation JSON
    #[arg(value_enum)]
    stack: Option<Generator>,

    /// Composer configuration (TOML format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write single-line JSON instead of pretty output
    #[arg(long)]
    compact: bool,

    /// Re-check a serialized template ("-" reads stdin)
    #[arg(long, value_name = "FILE")]
    validate: Option<PathBuf>,

    /// List the available stacks
    #[arg(short, long)]
    list: bool,

    /// Check that every import of every stack has a matching export
    #[arg(long)]
    check_exports: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    if cli.list {
        for generator in Generator::all() {
            println!("{generator}");
        }
        return;
    }

    let mut config = match &cli.config {
        Some(path) => match ComposerConfig::from_file(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config '{}': {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => ComposerConfig::default(),
    };
    if cli.compact {
        config.pretty = false;
    }

    if let Some(path) = &cli.validate {
        let source = read_source(path);
        match validate_json(&source) {
            Ok(template) => {
                eprintln!(
                    "{}: ok ({} resources, {} outputs)",
                    path.display(),
                    template.resources().count(),
                    template.outputs().count()
                );
            }
            Err(e) => {
                eprintln!("Error: {}", e.report());
                std::process::exit(1);
            }
        }
        return;
    }

    if cli.check_exports {
        match check_exports(&config) {
            Ok(unresolved) if unresolved.is_empty() => eprintln!("all imports resolved"),
            Ok(unresolved) => {
                for import in &unresolved {
                    eprintln!("{}: no stack exports '{}'", import.template, import.name);
                }
                std::process::exit(1);
            }
            Err(e) => {
                eprintln!("Error: {}", e.report());
                std::process::exit(1);
            }
        }
        return;
    }

    let Some(generator) = cli.stack else {
        eprintln!("No stack given. Available stacks:");
        for generator in Generator::all() {
            eprintln!("    {generator}");
        }
        std::process::exit(1);
    };

    match render_with_config(generator, &config) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Error: {}", e.report());
            std::process::exit(1);
        }
    }
}

fn read_source(path: &Path) -> String {
    let result = if path.as_os_str() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer).map(|_| buffer)
    } else {
        fs::read_to_string(path)
    };
    match result {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error reading '{}': {}", path.display(), e);
            std::process::exit(1);
        }
    }
}
