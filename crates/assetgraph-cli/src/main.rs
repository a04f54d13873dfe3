use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use assetgraph_assets::default_registry;
use assetgraph_core::{AssetIdentity, Config, ResolutionState, RunReport, Verbosity};
use assetgraph_engine::{AssetRegistry, CancelSignal, DependencyGraph, Engine};
use assetgraph_store::DiskStore;

const DEFAULT_CONFIG_FILE: &str = "assetgraph.toml";

/// assetgraph - Resolve and write cluster installation assets
#[derive(Parser)]
#[command(name = "assetgraph")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: assetgraph.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output directory, overrides [output].dir
    #[arg(short, long, global = true)]
    dir: Option<PathBuf>,

    /// Resolve independent dependencies concurrently
    #[arg(long, global = true)]
    concurrent: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve targets and write their files to the output directory
    Create {
        /// Assets to create, by identity or name
        #[arg(required = true)]
        targets: Vec<String>,

        /// Output file for the JSON run report
        #[arg(short, long)]
        report: Option<PathBuf>,
    },

    /// Show the dependency graph of an asset (or of every asset)
    Graph {
        /// Asset to inspect, by identity or name
        target: Option<String>,
    },

    /// List registered assets
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref())?;
    if let Some(dir) = &cli.dir {
        config.output.dir = dir.clone();
    }
    if cli.concurrent {
        config.run.concurrent = true;
    }
    if cli.verbose {
        config.logging.validation = Verbosity::Debug;
    }

    init_tracing(&config, cli.verbose);

    let registry = default_registry()?;

    match cli.command {
        Commands::Create { targets, report } => {
            let report = report.or_else(|| config.output.report.clone());
            create_command(&config, registry, &targets, report.as_deref(), cli.verbose).await
        }
        Commands::Graph { target } => graph_command(&registry, target.as_deref()),
        Commands::List => list_command(&registry),
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    if let Some(path) = path {
        return Ok(Config::from_file(path)?);
    }

    let default_path = Path::new(DEFAULT_CONFIG_FILE);
    if default_path.exists() {
        Ok(Config::from_file(default_path)?)
    } else {
        Ok(Config::default())
    }
}

/// `RUST_LOG` wins over the configured level
fn init_tracing(config: &Config, verbose: bool) {
    let level = if verbose { "debug" } else { config.logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn resolve_targets(registry: &AssetRegistry, targets: &[String]) -> Result<Vec<AssetIdentity>> {
    targets
        .iter()
        .map(|target| {
            registry.find(target).ok_or_else(|| {
                anyhow::anyhow!(
                    "Asset '{}' not found. Run 'assetgraph list' to see registered assets",
                    target
                )
            })
        })
        .collect()
}

/// Create command - resolve targets and commit their output
async fn create_command(
    config: &Config,
    registry: AssetRegistry,
    targets: &[String],
    report_path: Option<&Path>,
    verbose: bool,
) -> Result<()> {
    let roots = resolve_targets(&registry, targets)?;
    let dir = config.output_dir();

    if verbose {
        eprintln!("{} {}", "Output directory:".cyan(), dir.display());
    }

    let store = DiskStore::new(&dir).with_state_dir(config.output.state_dir.clone());
    let cancel = CancelSignal::new();
    let engine = Engine::new(registry, Arc::new(store))
        .with_config(config)
        .with_cancel_signal(cancel.clone());

    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling run");
            cancel.cancel();
        }
    });
    let result = engine.create(&roots).await;
    interrupt.abort();

    let report = match result {
        Ok(outcome) => outcome.report,
        Err(err) => {
            eprintln!("{} {:#}", "✗ Run failed:".red().bold(), err);
            let report = Engine::failure_report(&roots, &err);
            if let Some(path) = report_path {
                save_report(&report, path, verbose)?;
            }
            std::process::exit(1);
        }
    };

    if let Some(path) = report_path {
        save_report(&report, path, verbose)?;
    }
    print_report_summary(&report);

    Ok(())
}

fn save_report(report: &RunReport, path: &Path, verbose: bool) -> Result<()> {
    report.save_to_file(path)?;
    if verbose {
        eprintln!("{} {}", "Report saved to:".green(), path.display());
    }
    Ok(())
}

fn print_report_summary(report: &RunReport) {
    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", "Assets".bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    for node in &report.nodes {
        let state = match node.state {
            ResolutionState::Generated => "generated".green(),
            ResolutionState::Loaded => "loaded".cyan(),
            _ => "unresolved".yellow(),
        };
        println!("  {:<24} {}", node.name, state);
        for file in &node.files {
            println!("    {} {} ({} bytes)", "→".dimmed(), file.path, file.size);
        }
    }

    println!();
    println!(
        "{} {} generated, {} loaded, {} files written",
        "Summary:".bold(),
        report.summary.generated,
        report.summary.loaded,
        report.summary.files_written
    );
    println!("{}", "=".repeat(60).bright_blue());
}

/// Graph command - show dependencies in resolution order
fn graph_command(registry: &AssetRegistry, target: Option<&str>) -> Result<()> {
    let graph = match target {
        Some(target) => {
            let roots = resolve_targets(registry, &[target.to_string()])?;
            DependencyGraph::reachable(registry, &roots)?
        }
        None => DependencyGraph::from_registry(registry),
    };

    if let Some(cycle) = graph.find_cycle() {
        let path: Vec<&str> = cycle.iter().map(AssetIdentity::as_str).collect();
        anyhow::bail!("dependency cycle: {}", path.join(" -> "));
    }
    let order = graph
        .topological_sort()
        .ok_or_else(|| anyhow::anyhow!("dependency graph is not acyclic"))?;

    println!("{}", "Resolution order:".bold());
    println!();
    for (i, identity) in order.iter().enumerate() {
        let name = registry.name(identity).unwrap_or("?");
        println!("  {}. {} ({})", i + 1, name.green(), identity);

        let parents = graph.parents(identity);
        if !parents.is_empty() {
            let parents: Vec<&str> = parents.iter().map(AssetIdentity::as_str).collect();
            println!("     {} {}", "depends on".dimmed(), parents.join(", "));
        }
    }

    Ok(())
}

/// List command - print every registered asset
fn list_command(registry: &AssetRegistry) -> Result<()> {
    println!("{}", "Registered assets:".bold());
    for identity in registry.identities() {
        let name = registry.name(&identity).unwrap_or("?");
        println!("  {:<18} {}", identity.as_str().cyan(), name);
    }
    Ok(())
}
