//! DocRing - Consistent-Hashing Document Load Balancer
//!
//! Command-line front end: runs command scripts against an in-process
//! ring of document servers.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docring::command::{run_script, OutputFormat};
use docring::config::DocRingConfig;
use docring::error::Result;
use docring::lb::LoadBalancer;
use docring::ring::{ReplicaMode, REPLICA_ID_STRIDE};

/// DocRing - Consistent-Hashing Document Load Balancer
#[derive(Parser)]
#[command(name = "docring")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute commands from a script or stdin
    Run {
        /// Script file (defaults to stdin)
        #[arg(short, long)]
        script: Option<PathBuf>,

        /// Print one JSON object per response
        #[arg(long)]
        json: bool,

        /// Place three virtual replicas per server
        #[arg(long)]
        vnodes: bool,
    },

    /// Initialize a new configuration file
    Init {
        /// Output path for configuration file
        #[arg(short, long, default_value = "docring.toml")]
        output: PathBuf,
    },

    /// Validate configuration file
    Validate,

    /// Show effective configuration
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.command {
        Commands::Init { .. } => DocRingConfig::default(),
        _ => DocRingConfig::load(cli.config.as_ref())?,
    };

    let level = cli.log_level.as_deref().unwrap_or(&config.logging.level);
    init_logging(level, &config.logging.format);

    match cli.command {
        Commands::Run {
            script,
            json,
            vnodes,
        } => run(config, script, json, vnodes).await,
        Commands::Init { output } => run_init(output),
        Commands::Validate => run_validate(cli.config, &config),
        Commands::Info => run_info(&config),
    }
}

/// Initialize logging
fn init_logging(level: &str, format: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.into());

    // Protocol output owns stdout
    let registry = tracing_subscriber::registry().with(env_filter);
    if format == "compact" {
        registry
            .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Execute a command script
async fn run(
    mut config: DocRingConfig,
    script: Option<PathBuf>,
    json: bool,
    vnodes: bool,
) -> Result<()> {
    if vnodes {
        config.ring.replicas = ReplicaMode::Triple.count();
    }

    let lb = LoadBalancer::from_config(&config);
    let format = if json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    let mode = lb.mode().await;
    tracing::info!(
        mode = %mode,
        queue_capacity = config.ring.queue_capacity,
        "Starting load balancer"
    );

    let mut stdout = tokio::io::stdout();
    let summary = match &script {
        Some(path) => {
            let file = match tokio::fs::File::open(path).await {
                Ok(f) => f,
                Err(e) => {
                    tracing::error!("Failed to open script {:?}: {}", path, e);
                    return Err(e.into());
                }
            };
            run_script(&lb, tokio::io::BufReader::new(file), &mut stdout, format).await?
        }
        None => {
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            run_script(&lb, stdin, &mut stdout, format).await?
        }
    };

    let flushed = lb.shutdown().await;
    tracing::info!(
        executed = summary.executed,
        failed = summary.failed,
        topology_rejected = summary.topology_rejected,
        flushed = flushed.len(),
        "Script finished"
    );

    Ok(())
}

/// Write a default configuration file
fn run_init(output: PathBuf) -> Result<()> {
    let config_content = r#"# DocRing Configuration
# Generated configuration file

[ring]
# Virtual replicas per server: 1, or 3 to spread each server over the ring
replicas = 1
# Pending edits each server accepts before rejecting new ones
queue_capacity = 1000

[logging]
level = "info"
format = "pretty"
"#;

    std::fs::write(&output, config_content)?;
    println!("Configuration file created: {}", output.display());
    println!();
    println!("Next steps:");
    println!("  1. Adjust ring settings in {}", output.display());
    println!("  2. Run a script: docring --config {} run --script commands.txt", output.display());

    Ok(())
}

/// Validate configuration file
fn run_validate(config_path: Option<PathBuf>, config: &DocRingConfig) -> Result<()> {
    match config_path {
        Some(path) => println!("✓ Configuration is valid: {}", path.display()),
        None => println!("✓ No configuration file given, defaults are valid"),
    }
    println!("  Replicas per server: {}", config.ring.replicas);
    println!("  Queue capacity:      {}", config.ring.queue_capacity);
    Ok(())
}

/// Show effective configuration
fn run_info(config: &DocRingConfig) -> Result<()> {
    let mode = config.replica_mode();

    println!("DocRing Information");
    println!("===================");
    println!();
    println!("Ring Configuration:");
    println!("  Replica Mode:   {} ({} per server)", mode, mode.count());
    println!("  Replica Ids:    id + k * {}", REPLICA_ID_STRIDE);
    println!("  Max Server Id:  {}", REPLICA_ID_STRIDE - 1);
    println!("  Queue Capacity: {}", config.ring.queue_capacity);
    println!();
    println!("Logging:");
    println!("  Level:          {}", config.logging.level);
    println!("  Format:         {}", config.logging.format);

    Ok(())
}
