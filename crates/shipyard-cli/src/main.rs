//! Shipyard - repository to live deployment
//!
//! Usage:
//!   shipyard serve                # Run the POST /deploy endpoint
//!   shipyard deploy <source> ...  # Run one deployment attempt
//!   shipyard config               # Show the effective configuration

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shipyard_core::api::{self, AppState};
use shipyard_core::config::{ConfigStore, to_toml};
use shipyard_core::context::AppContext;
use shipyard_core::deploy::DeployStrategy;
use shipyard_core::types::{DeploymentRequest, DeploymentResult};

#[derive(Parser)]
#[command(name = "shipyard")]
#[command(about = "Build a repository and deploy it", long_about = None)]
struct Cli {
    /// Config file (default: <config dir>/shipyard/shipyard.toml)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the deployment HTTP endpoint
    Serve {
        /// Listen address (overrides server.bind)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Run one deployment attempt
    Deploy(Box<DeployArgs>),

    /// Show the effective configuration (deploy token redacted)
    Config {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },
}

#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable output
    #[default]
    Table,
    /// Machine-readable JSON
    Json,
}

#[derive(Args)]
struct DeployArgs {
    /// Source location (clone URL, path, github:org/repo[@ref[/path]])
    source: String,
    /// Deploy token (default: server.deploy_token / SHIPYARD_DEPLOY_TOKEN)
    #[arg(long, short)]
    token: Option<String>,
    /// Project subdirectory within the repository
    #[arg(long, short = 'd')]
    subdirectory: Option<String>,
    /// Framework hint
    #[arg(long)]
    framework: Option<String>,
    /// Build command override
    #[arg(long)]
    build_command: Option<String>,
    /// Output directory override
    #[arg(long)]
    output_directory: Option<String>,
    /// Deployment strategy (overrides deploy.strategy)
    #[arg(long, value_parser = parse_strategy)]
    strategy: Option<DeployStrategy>,
    /// Output format
    #[arg(short = 'o', long, default_value = "table")]
    format: OutputFormat,
}

fn parse_strategy(value: &str) -> std::result::Result<DeployStrategy, String> {
    value.parse()
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shipyard=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let store = ConfigStore::new(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { bind } => run_serve(&store, bind).await,
        Commands::Deploy(args) => run_deploy(&store, *args).await,
        Commands::Config { format } => run_config(&store, format),
    }
}

async fn run_serve(store: &ConfigStore, bind: Option<String>) -> Result<()> {
    let context = AppContext::new(store.load()?);
    let bind = bind.unwrap_or_else(|| context.config().server.bind.clone());
    let addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("Invalid listen address: {bind}"))?;

    let pipeline = context.pipeline()?;
    let state = Arc::new(AppState::new(
        pipeline,
        context.deploy_token().map(str::to_string),
    ));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(
        %addr,
        strategy = %context.config().deploy.strategy,
        workspace_root = %context.config().pipeline.effective_workspace_root().display(),
        "shipyard listening"
    );

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown requested");
    }
}

async fn run_deploy(store: &ConfigStore, args: DeployArgs) -> Result<()> {
    let mut config = store.load()?;
    if let Some(strategy) = args.strategy {
        config.deploy.strategy = strategy;
    }
    let context = AppContext::new(config);
    let pipeline = context.pipeline()?;

    let mut request = DeploymentRequest::new(&args.source, args.token.clone().unwrap_or_default())
        .or_token(context.deploy_token());
    if let Some(subdir) = &args.subdirectory {
        request = request.with_subdirectory(subdir);
    }
    if let Some(framework) = &args.framework {
        request = request.with_framework(framework);
    }
    if let Some(command) = &args.build_command {
        request = request.with_build_command(command);
    }
    if let Some(dir) = &args.output_directory {
        request = request.with_output_directory(dir);
    }

    let outcome = pipeline.deploy(&request).await;
    let result = match &outcome {
        Ok(result) => result.clone(),
        Err(err) => DeploymentResult::from(err),
    };

    match args.format {
        OutputFormat::Table => match &outcome {
            Ok(result) => {
                println!("✓ Deployed {}", args.source);
                if let Some(url) = &result.url {
                    println!("  URL:       {url}");
                }
                if let Some(id) = &result.deployment_id {
                    println!("  ID:        {id}");
                }
                if let Some(status) = &result.status {
                    println!("  Status:    {status}");
                }
                if let Some(inspector) = &result.inspector_url {
                    println!("  Inspector: {inspector}");
                }
            }
            Err(err) => {
                match err.stage() {
                    Some(stage) => println!("✗ Deployment failed during {stage}"),
                    None => println!("✗ Deployment failed"),
                }
                println!("  {err}");
            }
        },
        OutputFormat::Json => {
            let mut output = serde_json::to_value(&result)?;
            if let (Err(err), Some(map)) = (&outcome, output.as_object_mut())
                && let Some(stage) = err.stage()
            {
                map.insert("stage".to_string(), serde_json::json!(stage));
            }
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    if outcome.is_err() {
        std::process::exit(1);
    }
    Ok(())
}

fn run_config(store: &ConfigStore, format: OutputFormat) -> Result<()> {
    let config = store.load()?.redacted();
    match format {
        OutputFormat::Table => {
            println!("# {}", store.config_path().display());
            print!("{}", to_toml(&config)?);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }
    Ok(())
}
