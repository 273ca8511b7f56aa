//! Paddock round service binary

use clap::Parser;
use paddock::{api::ApiServer, service, ConfigLoader};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "paddock")]
#[command(about = "Provably-fair race round service", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(long, short)]
    config: Option<String>,

    /// Override server host
    #[arg(long)]
    host: Option<String>,

    /// Override server port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "paddock=info,tower_http=info".into()),
        )
        .init();

    let args = Args::parse();

    let loader = match &args.config {
        Some(path) => ConfigLoader::new().with_path(path),
        None => ConfigLoader::new(),
    };
    let mut config = loader.load()?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    loader.validate(&config)?;

    info!(
        ledger = ?config.ledger.mode,
        storage = ?config.storage.backend,
        bet_window_ms = config.round.bet_window_ms,
        race_duration_ms = config.round.race_duration_ms,
        "Starting paddock"
    );

    let server_config = config.server.clone();
    let service = service::build(config)?;
    let server = ApiServer::new(server_config, service.state.clone());
    let rounds = tokio::spawn(service.orchestrator.run());

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!(error = %e, "API server failed");
                return Err(e.into());
            }
        }
        _ = rounds => {
            error!("Round orchestrator stopped unexpectedly");
        }
    }

    info!("Paddock stopped");
    Ok(())
}
