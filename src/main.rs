use std::path::PathBuf;

use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use okx_supervisor::config::SupervisorConfig;
use okx_supervisor::errors::{Result, SupervisorError};
use okx_supervisor::supervisor::Supervisor;

#[derive(Parser)]
#[command(name = "okx-supervisor")]
#[command(about = "Supervises the OKX monitor process per its declaration", long_about = None)]
struct Cli {
    /// Path to the process declaration
    #[arg(short, long, default_value = "supervisor.yaml")]
    config: PathBuf,

    /// Validate the declaration and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = SupervisorConfig::load_from_file(&cli.config)?;
    init_tracing(&config.supervisor.log_level);

    if cli.check {
        info!("Configuration is valid: {}", cli.config.display());
        return Ok(());
    }

    info!("{} v{} starting", okx_supervisor::NAME, okx_supervisor::VERSION);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received interrupt, shutting down");
            let _ = shutdown_tx.send(true);
        }
    });

    let mut supervisor = Supervisor::new(config.process);
    let result = supervisor.run(shutdown_rx).await;

    let status = supervisor.status();
    match &result {
        Ok(()) => info!("Supervision ended: {} is {}", status.name, status.state),
        Err(e) => error!("Supervision ended: {} is {} ({})", status.name, status.state, e),
    }

    result.map_err(SupervisorError::from)
}

fn init_tracing(log_level: &str) {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
