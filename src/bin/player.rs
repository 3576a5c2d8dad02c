//! Train Heist Player
//!
//! Connects to a hub, follows the game and answers its prompts, either
//! automatically or from standard input. The round summaries and the
//! winners go to standard output; narration goes to standard error.

use std::io;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpStream;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use train_heist::client::{AutoPlayer, LinePlayer, Mirror, Replica, ReplicaOutcome};
use train_heist::network::{link::LineLink, session::join};

/// Exit status when the hub cannot be reached or the handshake fails.
const EXIT_NO_HUB: u8 = 7;

#[derive(Parser)]
#[command(name = "heist-player")]
#[command(about = "Train Heist player client")]
struct Args {
    #[arg(short, long, default_value = "127.0.0.1:4000")]
    server: String,

    #[arg(short, long)]
    name: String,

    #[arg(long, help = "Play automatically instead of reading orders from stdin")]
    auto: bool,

    #[arg(long, default_value_t = 1, help = "Seed for the automatic player")]
    seed: u64,
}

async fn play(args: Args) -> Result<ReplicaOutcome> {
    let stream = TcpStream::connect(&args.server)
        .await
        .with_context(|| format!("connecting to {}", args.server))?;
    let mut link = LineLink::from_tcp(stream);

    let setup = join(&mut link, &args.name).await.context("joining a game")?;
    let game = setup.build_game()?;
    info!("Seated as {} of {} on {} cars", setup.you, setup.players.len(), game.width);

    let mut summary = io::stdout();
    let outcome = if args.auto {
        Replica::new(game, setup.you, AutoPlayer::new(args.seed), Mirror)
            .run(&mut link, &mut summary)
            .await
    } else {
        let human = LinePlayer::new(io::stdin().lock(), io::stdout());
        Replica::new(game, setup.you, human, Mirror)
            .with_reprompt(true)
            .run(&mut link, &mut summary)
            .await
    };
    Ok(outcome)
}

fn main() -> ExitCode {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("tracing subscriber already set");
    }

    let args = Args::parse();
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start runtime: {}", e);
            return ExitCode::from(EXIT_NO_HUB);
        }
    };

    match runtime.block_on(play(args)) {
        Ok(outcome) => {
            info!(?outcome, "game ended");
            ExitCode::from(outcome.exit_code())
        }
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(EXIT_NO_HUB)
        }
    }
}
