//! Train Heist Hub
//!
//! Accepts players over TCP and runs one authoritative game per full table.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use train_heist::{
    VERSION,
    network::server::{HubServer, ServerConfig},
};

#[derive(Parser)]
#[command(name = "heist-hub")]
#[command(about = "Train Heist game hub")]
struct Args {
    #[arg(short, long, help = "JSON config file; flags below override it")]
    config: Option<PathBuf>,

    #[arg(short, long)]
    bind: Option<String>,

    #[arg(short, long, help = "Players seated per game")]
    players: Option<usize>,

    #[arg(short, long, help = "Number of cars")]
    width: Option<usize>,

    #[arg(short, long)]
    rounds: Option<u32>,

    #[arg(long, help = "Base seed for loot layouts")]
    seed: Option<u64>,

    #[arg(long, help = "Seconds to wait for any single reply before dropping a player")]
    read_timeout: Option<u64>,
}

fn load_config(args: &Args) -> Result<ServerConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            ServerConfig::from_json(&text).with_context(|| format!("parsing {}", path.display()))?
        }
        None => ServerConfig::default(),
    };

    if let Some(bind) = &args.bind {
        config.bind_addr = bind.parse().with_context(|| format!("bad bind address {bind}"))?;
    }
    if let Some(players) = args.players {
        config.players_per_game = players;
    }
    if let Some(width) = args.width {
        config.game.width = width;
    }
    if let Some(rounds) = args.rounds {
        config.game.num_rounds = rounds;
    }
    if let Some(seed) = args.seed {
        config.game.seed = seed;
    }
    if args.read_timeout.is_some() {
        config.read_timeout_secs = args.read_timeout;
    }

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting tracing subscriber")?;

    let args = Args::parse();
    let config = load_config(&args)?;

    info!("Train Heist Hub v{}", VERSION);
    info!("Config: {:?}", config);

    let server = HubServer::new(config);
    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown.send(());
        }
    });

    server.run().await?;
    info!("Hub stopped");
    Ok(())
}
