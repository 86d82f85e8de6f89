use clap::{ArgAction, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use tracing::warn;

use modelscout::cache::ModelCache;
use modelscout::config::{load_config, save_config, ModelScoutConfig};
use modelscout::scout::ModelScout;
use modelscout::types::Workflow;

/// Model reference resolution for workflow graphs.
#[derive(Parser)]
#[command(
    name = "modelscout",
    about = "Resolves workflow model references against the Hugging Face model index"
)]
struct Cli {
    /// Increase logging (-vv reaches trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a modelscout root with a default configuration
    Init {
        /// Root path (default: current directory)
        path: Option<String>,
    },
    /// Scan a workflow file and resolve its model references
    Scan {
        /// Workflow JSON file
        workflow: String,
        /// Root path holding modelscout state
        #[arg(short, long)]
        path: Option<String>,
    },
    /// Resolve an explicit model selection against a workflow
    Select {
        /// Workflow JSON file
        workflow: String,
        /// Filename of the model to select
        model: String,
        /// Root path holding modelscout state
        #[arg(short, long)]
        path: Option<String>,
    },
    /// List the filenames available for selection
    Options {
        /// Root path (default: current directory)
        path: Option<String>,
    },
    /// Show cache state
    Status {
        /// Root path (default: current directory)
        path: Option<String>,
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter =
        std::env::var("MODELSCOUT_LOG").unwrap_or_else(|_| format!("modelscout={level}"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn run(cli: Cli) -> modelscout::errors::Result<()> {
    match cli.command {
        Commands::Init { path } => {
            let root = resolve_path(path);
            save_config(&root, &ModelScoutConfig::default())?;
            println!("Initialized modelscout at {}", root.display());
        }
        Commands::Scan { workflow, path } => {
            let root = resolve_path(path);
            let scout = open_scout(&root)?;
            let workflow = read_workflow(&workflow)?;

            let result = scout.invoke(&workflow, None)?;
            scout.persist_state(&root)?;

            let models = scout.snapshot().known_artifacts;
            if models.is_empty() {
                println!("No valid models found");
            } else {
                println!("Resolved {} models:", models.len());
                for m in &models {
                    println!(
                        "  {} -> {} (dir: {})",
                        m.filename,
                        m.repo_id.as_deref().unwrap_or(""),
                        m.local_path
                    );
                }
                println!("First: {} from {}", result.filename, result.repo_id);
            }
        }
        Commands::Select {
            workflow,
            model,
            path,
        } => {
            let root = resolve_path(path);
            let scout = open_scout(&root)?;
            let workflow = read_workflow(&workflow)?;

            let result = scout.invoke(&workflow, Some(&model))?;
            scout.persist_state(&root)?;
            println!(
                "{} -> {} (dir: {})",
                result.filename, result.repo_id, result.local_path
            );
        }
        Commands::Options { path } => {
            let root = resolve_path(path);
            let mut cache = ModelCache::new();
            cache.load_state(&root)?;
            for option in cache.selection_options() {
                println!("{}", option);
            }
        }
        Commands::Status { path, json } => {
            let root = resolve_path(path);
            let mut cache = ModelCache::new();
            cache.load_state(&root)?;
            let snapshot = cache.snapshot();

            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&snapshot).unwrap_or_default()
                );
            } else {
                println!("ModelScout Status");
                println!("  Initialized: {}", snapshot.initialized);
                println!(
                    "  Fingerprint: {}",
                    snapshot.last_fingerprint.as_deref().unwrap_or("(none)")
                );
                println!("  Known:       {}", snapshot.known_artifacts.len());
                println!(
                    "  Resolved:    {}",
                    snapshot
                        .known_artifacts
                        .iter()
                        .filter(|m| m.repo_id.is_some())
                        .count()
                );
                if !snapshot.known_artifacts.is_empty() {
                    println!("\n  Models:");
                    for m in &snapshot.known_artifacts {
                        match &m.repo_id {
                            Some(repo) => {
                                println!("    {} -> {} ({})", m.filename, repo, m.local_path)
                            }
                            None => println!("    {} (unresolved, {})", m.filename, m.local_path),
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

/// Builds an engine for `root`, restoring any saved state. Corrupt state is
/// logged and ignored so the command can still run.
fn open_scout(root: &Path) -> modelscout::errors::Result<ModelScout> {
    let config = load_config(root)?;
    let scout = ModelScout::new(config, "modelscout-cli")?;
    if let Err(e) = scout.restore_state(root) {
        warn!("ignoring saved state: {}", e);
    }
    Ok(scout)
}

/// Reads and parses a workflow JSON file.
fn read_workflow(path: &str) -> modelscout::errors::Result<Workflow> {
    let text = fs::read_to_string(path)?;
    Workflow::parse(&text)
}

/// Resolves an optional path argument to a `PathBuf`.
///
/// Defaults to the current working directory if no path is provided.
fn resolve_path(path: Option<String>) -> PathBuf {
    match path {
        Some(p) => PathBuf::from(p),
        None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}
