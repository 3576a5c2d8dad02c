//! TCP Game Hub
//!
//! Accepts player connections, reads each player's name, and seats them in
//! arrival order at tables of a fixed size. Every full table becomes a
//! [`GameSession`] running on its own task; games never share state.

use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, instrument, warn};

use crate::core::rng::derive_game_seed;
use crate::game::state::{GameConfig, MAX_PLAYERS};
use crate::network::link::LineLink;
use crate::network::session::{read_name, GameSession, Seat};

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Players seated per game.
    pub players_per_game: usize,
    /// Per-read deadline during play, in seconds. `None` waits forever.
    pub read_timeout_secs: Option<u64>,
    /// Time allowed for a new connection to send its name, in seconds.
    pub handshake_timeout_secs: u64,
    /// Parameters of every game. `game.seed` is the base seed; each game
    /// derives its own from it.
    pub game: GameConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 4000)),
            players_per_game: 2,
            read_timeout_secs: None,
            handshake_timeout_secs: 30,
            game: GameConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Parse from JSON; missing fields take their defaults.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Per-read deadline during play.
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_secs.map(Duration::from_secs)
    }

    /// Reject configurations no game could be played with.
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.players_per_game == 0 || self.players_per_game > MAX_PLAYERS {
            return Err(ServerError::InvalidConfig(format!(
                "players_per_game must be 1..={}, got {}",
                MAX_PLAYERS, self.players_per_game
            )));
        }
        if self.game.width == 0 {
            return Err(ServerError::InvalidConfig("game.width must be at least 1".into()));
        }
        Ok(())
    }
}

/// Server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// Configuration is unusable.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// The game hub.
pub struct HubServer {
    /// Server configuration.
    config: ServerConfig,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl HubServer {
    /// Create a new hub.
    pub fn new(config: ServerConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self { config, shutdown_tx }
    }

    /// Configuration in use.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// A handle that stops the accept loop when sent to.
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Stop accepting connections. Games in progress run to completion.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Bind the configured address and serve until shutdown.
    pub async fn run(&self) -> Result<(), ServerError> {
        self.config.validate()?;
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener until shutdown.
    #[instrument(skip_all, fields(addr = ?listener.local_addr().ok()))]
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        self.config.validate()?;
        info!(
            "Hub listening, {} players per game, {} cars, {} rounds",
            self.config.players_per_game, self.config.game.width, self.config.game.num_rounds
        );

        let (seat_tx, seat_rx) = mpsc::channel::<Seat>(64);
        let tables = tokio::spawn(run_tables(seat_rx, self.config.clone(), self.shutdown_tx.subscribe()));

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            info!("New connection from {}", addr);
                            self.handle_connection(stream, addr, seat_tx.clone());
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        drop(seat_tx);
        if let Err(e) = tables.await {
            error!("Seating task failed: {}", e);
        }
        Ok(())
    }

    /// Read the newcomer's name, then queue them for a table.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr, seats: mpsc::Sender<Seat>) {
        let handshake = Duration::from_secs(self.config.handshake_timeout_secs);
        let read_timeout = self.config.read_timeout();

        tokio::spawn(async move {
            let mut link = LineLink::from_tcp(stream).with_read_timeout(Some(handshake));
            let name = match read_name(&mut link).await {
                Ok(name) => name,
                Err(e) => {
                    warn!("Handshake with {} failed: {}", addr, e);
                    link.close().await;
                    return;
                }
            };

            debug!("{} is {}", addr, name);
            let link = link.with_read_timeout(read_timeout);
            if seats.send(Seat { name, link }).await.is_err() {
                debug!("Hub shutting down, dropping {}", addr);
            }
        });
    }
}

/// Group queued seats into full tables and start a game for each.
async fn run_tables(
    mut seats: mpsc::Receiver<Seat>,
    config: ServerConfig,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let size = config.players_per_game;
    let mut waiting: Vec<Seat> = Vec::with_capacity(size);
    let mut game_number = 0u64;

    loop {
        let seat = tokio::select! {
            seat = seats.recv() => seat,
            _ = shutdown_rx.recv() => None,
        };
        let Some(seat) = seat else { break };

        info!("{} seated ({}/{})", seat.name, waiting.len() + 1, size);
        waiting.push(seat);
        if waiting.len() < size {
            continue;
        }

        let table = std::mem::replace(&mut waiting, Vec::with_capacity(size));
        let mut game_config = config.game.clone();
        game_config.seed = derive_game_seed(config.game.seed, game_number);
        game_number += 1;

        tokio::spawn(async move {
            match GameSession::open(table, game_config).await {
                Ok(session) => {
                    session.run().await;
                }
                Err(e) => error!("Failed to start game: {}", e),
            }
        });
    }

    if !waiting.is_empty() {
        info!("Dropping {} players still waiting for a table", waiting.len());
    }
}
