use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;

use hostkit::manifest::{AppManifest, ManifestLoader};
use hostkit::runtime::{resolve_manifest, resolve_plan, run, RunOptions, ShutdownOptions};
use hostkit::ModuleCatalog;
use hostkit_bootstrap::{default_logging_config, init_logging, AppConfig, CliArgs};

use std::path::{Path, PathBuf};

mod registered_modules;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// HostKit Server - micro-frontend module host
#[derive(Parser)]
#[command(name = "host-server")]
#[command(about = "HostKit Server - micro-frontend module host")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port override for HTTP server (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Directory holding the deployed manifest.json (overrides config)
    #[arg(long)]
    manifest_dir: Option<String>,

    /// Print effective configuration (YAML) and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Development mode with module mock handlers instead of the backend
    #[arg(long)]
    mock: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server
    Run,
    /// Validate configuration, manifest and activation plan, then exit
    Check,
    /// Emit the manifest as JSON
    Manifest {
        /// Always synthesize from the module tree, ignoring a deployed manifest
        #[arg(long)]
        synthesize: bool,
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Prepare CLI args that flow into AppConfig merge logic.
    let args = CliArgs {
        config: cli.config.as_ref().map(|p| p.to_string_lossy().to_string()),
        port: cli.port,
        manifest_dir: cli.manifest_dir.clone(),
        print_config: cli.print_config,
        verbose: cli.verbose,
        mock: cli.mock,
    };

    // Layered config:
    // 1) defaults -> 2) YAML (if provided) -> 3) env (APP__*) -> 4) CLI overrides
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    config.apply_cli_overrides(&args);

    let logging_config = config.logging.clone().unwrap_or_else(default_logging_config);
    let _logging = init_logging(&logging_config, Path::new(&config.server.home_dir));

    tracing::info!(
        environment = ?config.platform.environment,
        manifest_dir = %config.platform.manifest_dir,
        "HostKit Server starting"
    );

    if cli.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    // Dispatch subcommands (default: run)
    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_server(config).await,
        Commands::Check => check_config(config).await,
        Commands::Manifest { synthesize, output } => {
            emit_manifest(&config, synthesize, output.as_deref())
        }
    }
}

async fn run_server(config: AppConfig) -> Result<()> {
    tracing::info!("Bootstrapping modules…");
    run(RunOptions {
        config,
        shutdown: ShutdownOptions::Signals,
        customizer: None,
    })
    .await
}

async fn check_config(config: AppConfig) -> Result<()> {
    tracing::info!("Checking configuration…");
    config.platform.validate()?;

    let manifest = resolve_manifest(&config)?;
    let resolved = resolve_plan(&config, &manifest).await?;
    let catalog = ModuleCatalog::discover()?;

    let missing: Vec<&str> = resolved
        .plan
        .modules()
        .iter()
        .filter(|m| !m.is_remote() && !catalog.contains(&m.name))
        .map(|m| m.name.as_str())
        .collect();
    if !missing.is_empty() {
        anyhow::bail!("modules missing from the local catalog: {}", missing.join(", "));
    }

    println!("Configuration is valid");
    println!("Activation order: {}", resolved.plan.names().join(" -> "));
    for (name, reason) in resolved.plan.skipped() {
        println!("Skipped {name}: {reason}");
    }
    Ok(())
}

fn emit_manifest(config: &AppConfig, synthesize: bool, output: Option<&Path>) -> Result<()> {
    let manifest: AppManifest = if synthesize {
        ManifestLoader::new(&config.platform.manifest_dir, &config.platform.modules_dir)
            .synthesize()?
    } else {
        resolve_manifest(config)?
    };
    let json = serde_json::to_string_pretty(&manifest)?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            std::fs::write(path, json)
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(
                path = %path.display(),
                modules = manifest.modules.len(),
                "Manifest written"
            );
        }
        None => println!("{json}"),
    }
    Ok(())
}
