//! Stencil Command Line Interface
//!
//! Compiles templates into cached host scripts.
//!
//! # Usage
//!
//! ```bash
//! # Compile templates whose artifacts are stale
//! stencil_cli --cache-dir storage/views compile views/home.blade.php views/nav.blade.php
//!
//! # Compile a snippet from stdin and print the script
//! echo '@if($user) {{ $user->name }} @endif' | stencil_cli --cache-dir /tmp string
//!
//! # Where would a template's artifact go?
//! stencil_cli --cache-dir storage/views path views/home.blade.php
//! ```

use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;

use stencil::batch::{compile_templates, BatchOutcome, BatchReport};
use stencil::{local_compiler, resolve_config};

#[derive(Parser)]
#[command(name = "stencil_cli")]
#[command(version = "0.1.0")]
#[command(about = "Compile directive templates into cached host scripts")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory for compiled artifacts
    #[arg(long, global = true, env = "STENCIL_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// YAML compiler configuration
    #[arg(long, global = true, env = "STENCIL_CONFIG")]
    config: Option<PathBuf>,

    /// Output format: json, text, or pretty (default)
    #[arg(long, short = 'o', global = true, default_value = "pretty", value_enum)]
    format: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Text,
    Pretty,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile templates whose artifacts are missing or stale
    Compile {
        /// Template paths
        #[arg(required = true)]
        templates: Vec<String>,

        /// Recompile even when the artifact is fresh
        #[arg(long)]
        force: bool,
    },

    /// Compile template text and print the result (no cache writes)
    String {
        /// Input file (reads stdin if not provided)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Print the artifact path for a template
    Path {
        template: String,
    },

    /// Report whether a template needs recompiling
    Expired {
        template: String,
    },
}

// =============================================================================
// MAIN
// =============================================================================

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Compile { templates, force } => cmd_compile(&cli, templates, *force),
        Commands::String { file } => cmd_string(&cli, file.clone()),
        Commands::Path { template } => cmd_path(&cli, template),
        Commands::Expired { template } => cmd_expired(&cli, template),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.format == OutputFormat::Json {
                println!("{}", serde_json::json!({ "error": format!("{:#}", e) }));
            } else {
                eprintln!("{}: {:#}", "error".red().bold(), e);
            }
            ExitCode::FAILURE
        }
    }
}

// =============================================================================
// COMMAND IMPLEMENTATIONS
// =============================================================================

fn cmd_compile(cli: &Cli, templates: &[String], force: bool) -> Result<()> {
    let config = resolve_config(cli.config.clone(), cli.cache_dir.clone())?;
    let mut compiler = local_compiler(&config)?;

    let report = compile_templates(&mut compiler, templates, force);
    print_report(&report, cli.format, cli.quiet)?;

    if report.has_failures() {
        bail!("{} of {} template(s) failed", report.failed(), report.outcomes.len());
    }
    Ok(())
}

fn cmd_string(cli: &Cli, file: Option<PathBuf>) -> Result<()> {
    let source = read_input(file)?;
    let config = resolve_config(cli.config.clone(), cli.cache_dir.clone())?;
    let compiler = local_compiler(&config)?;
    let compiled = compiler.compile_string(&source);

    match cli.format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "source_bytes": source.len(),
                "compiled": compiled,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text | OutputFormat::Pretty => print!("{}", compiled),
    }
    Ok(())
}

fn cmd_path(cli: &Cli, template: &str) -> Result<()> {
    let config = resolve_config(cli.config.clone(), cli.cache_dir.clone())?;
    let compiler = local_compiler(&config)?;
    let path = compiler.compiled_path(template);

    match cli.format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({ "template": template, "artifact": path })
        ),
        OutputFormat::Text | OutputFormat::Pretty => println!("{}", path.display()),
    }
    Ok(())
}

fn cmd_expired(cli: &Cli, template: &str) -> Result<()> {
    let config = resolve_config(cli.config.clone(), cli.cache_dir.clone())?;
    let compiler = local_compiler(&config)?;
    let expired = compiler.is_expired(template)?;

    match cli.format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({ "template": template, "expired": expired })
        ),
        OutputFormat::Text => println!("{}", expired),
        OutputFormat::Pretty => {
            if expired {
                println!("{} {} needs recompiling", "STALE".yellow().bold(), template);
            } else {
                println!("{} {} is up to date", "FRESH".green().bold(), template);
            }
        }
    }
    Ok(())
}

// =============================================================================
// HELPERS
// =============================================================================

fn print_report(report: &BatchReport, format: OutputFormat, quiet: bool) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "compiled": report.compiled(),
                "fresh": report.fresh(),
                "failed": report.failed(),
                "outcomes": report.outcomes,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => {
            for outcome in &report.outcomes {
                match outcome {
                    BatchOutcome::Compiled { template, artifact } => {
                        println!("compiled\t{}\t{}", template, artifact.display())
                    }
                    BatchOutcome::Fresh { template, artifact } => {
                        println!("fresh\t{}\t{}", template, artifact.display())
                    }
                    BatchOutcome::Failed { template, error } => {
                        println!("failed\t{}\t{}", template, error)
                    }
                }
            }
        }
        OutputFormat::Pretty => {
            for outcome in &report.outcomes {
                match outcome {
                    BatchOutcome::Compiled { template, artifact } => {
                        if !quiet {
                            println!(
                                "{} {} -> {}",
                                "OK".green(),
                                template,
                                artifact.display()
                            );
                        }
                    }
                    BatchOutcome::Fresh { template, .. } => {
                        if !quiet {
                            println!("{} {}", "--".dimmed(), template);
                        }
                    }
                    BatchOutcome::Failed { template, error } => {
                        println!("{} {}: {}", "FAIL".red().bold(), template, error);
                    }
                }
            }
            println!(
                "\n{} compiled, {} fresh, {} failed",
                report.compiled(),
                report.fresh(),
                report.failed()
            );
        }
    }
    Ok(())
}

fn read_input(file: Option<PathBuf>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read '{}'", path.display())),
        None => {
            if atty::is(atty::Stream::Stdin) {
                bail!("No input provided. Use --file or pipe input via stdin.");
            }
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read stdin")?;
            Ok(buffer)
        }
    }
}
