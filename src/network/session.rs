//! Game Session Management
//!
//! Everything between "a full table of connections" and "a finished game":
//! the name/setup handshake, building the authoritative game, and running
//! the round loop over it.
//!
//! Handshake, per connection:
//!
//! ```text
//! client → hub   <name>
//! hub → client   {"you":1,"players":["ann","bob"],"config":{...}}   (once the game is full)
//! ```
//!
//! The game stream follows immediately.

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::game::engine::TurnEngine;
use crate::game::rounds::{run_game, GameOutcome};
use crate::game::state::{Game, GameConfig, PlayerIndex, SetupError};
use crate::network::link::{Incoming, LineLink};

/// Longest accepted display name.
pub const MAX_NAME_LEN: usize = 32;

/// Longest accepted setup line.
pub const SETUP_LINE_LIMIT: usize = 4096;

/// Unique session identifier.
pub type SessionId = Uuid;

/// Setup sent to each player once their game is full.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSetup {
    /// The receiving player's index.
    pub you: PlayerIndex,
    /// Every player's name, in index order.
    pub players: Vec<String>,
    /// Board and round parameters, including the loot seed.
    pub config: GameConfig,
}

impl GameSetup {
    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Build the starting game both sides agree on.
    pub fn build_game(&self) -> Result<Game, SessionError> {
        if self.you >= self.players.len() {
            return Err(SessionError::BadSetup(format!(
                "index {} in a game of {}",
                self.you,
                self.players.len()
            )));
        }
        Ok(Game::new(self.players.iter().cloned(), &self.config)?)
    }
}

/// Session errors.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The peer hung up during the handshake.
    #[error("connection closed during handshake")]
    Closed,

    /// The peer sent an unusable name.
    #[error("invalid player name")]
    InvalidName,

    /// The setup line could not be used.
    #[error("bad setup: {0}")]
    BadSetup(String),

    /// Setup JSON failed to parse or serialize.
    #[error("setup encoding: {0}")]
    Json(#[from] serde_json::Error),

    /// Game could not be built.
    #[error(transparent)]
    Setup(#[from] SetupError),

    /// Writing the handshake failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Check a display name. Names show up in comma-separated winner lists
/// and `name:x/y` summaries, so those separators are refused.
pub fn validate_name(raw: &str) -> Result<String, SessionError> {
    let name = raw.trim();
    let ok = !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && name.chars().all(|c| c.is_ascii_graphic() && c != ',' && c != ':');
    if ok {
        Ok(name.to_string())
    } else {
        Err(SessionError::InvalidName)
    }
}

/// Hub side: read the opening name line.
pub async fn read_name(link: &mut LineLink) -> Result<String, SessionError> {
    match link.recv_line(MAX_NAME_LEN).await {
        Incoming::Line(line) => validate_name(&line),
        Incoming::Garbled => Err(SessionError::InvalidName),
        Incoming::Closed => Err(SessionError::Closed),
    }
}

/// Client side: announce `name` and wait for the setup.
pub async fn join(link: &mut LineLink, name: &str) -> Result<GameSetup, SessionError> {
    let name = validate_name(name)?;
    link.send_line(&name).await?;

    match link.recv_line(SETUP_LINE_LIMIT).await {
        Incoming::Line(line) => Ok(GameSetup::from_json(&line)?),
        Incoming::Garbled => Err(SessionError::BadSetup("unreadable setup line".into())),
        Incoming::Closed => Err(SessionError::Closed),
    }
}

/// A named connection waiting for its game.
#[derive(Debug)]
pub struct Seat {
    /// Display name.
    pub name: String,
    /// Connection to the player.
    pub link: LineLink,
}

/// One game instance: the engine plus its identity.
#[derive(Debug)]
pub struct GameSession {
    /// Unique session identifier.
    pub id: SessionId,
    engine: TurnEngine,
}

impl GameSession {
    /// Seat players in the given order and send each their setup.
    pub async fn open(seats: Vec<Seat>, config: GameConfig) -> Result<Self, SessionError> {
        let names: Vec<String> = seats.iter().map(|s| s.name.clone()).collect();
        let game = Game::new(names.iter().cloned(), &config)?;

        let mut links = Vec::with_capacity(seats.len());
        for (you, seat) in seats.into_iter().enumerate() {
            let mut link = seat.link;
            let setup = GameSetup { you, players: names.clone(), config: config.clone() };
            if let Err(e) = link.send_line(&setup.to_json()?).await {
                // The round loop will notice when it first reads from them
                warn!("Failed to send setup to {}: {}", seat.name, e);
            }
            links.push(link);
        }

        Ok(Self {
            id: Uuid::new_v4(),
            engine: TurnEngine::new(game, links)?,
        })
    }

    /// The authoritative game.
    pub fn game(&self) -> &Game {
        self.engine.game()
    }

    /// Play the game to the end and hang up on everyone.
    #[instrument(skip(self), fields(session = %self.id))]
    pub async fn run(mut self) -> GameOutcome {
        info!(players = ?self.game().players.iter().map(|p| &p.name).collect::<Vec<_>>(), "game starting");

        let outcome = run_game(&mut self.engine).await;
        self.engine.close_all().await;

        info!(
            ?outcome,
            digest = %hex::encode(self.engine.game().compute_digest()),
            "game finished"
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::link::link_pair;

    #[test]
    fn test_setup_json_roundtrip() {
        let setup = GameSetup {
            you: 1,
            players: vec!["ann".into(), "bob".into()],
            config: GameConfig { width: 4, seed: 31, ..Default::default() },
        };
        let json = setup.to_json().unwrap();
        assert!(!json.contains('\n'));
        assert_eq!(GameSetup::from_json(&json).unwrap(), setup);
    }

    #[test]
    fn test_setup_config_fields_default() {
        let setup = GameSetup::from_json(r#"{"you":0,"players":["solo"],"config":{"width":2}}"#).unwrap();
        assert_eq!(setup.config.num_rounds, GameConfig::default().num_rounds);
        assert_eq!(setup.build_game().unwrap().width, 2);
    }

    #[test]
    fn test_setup_index_out_of_range() {
        let setup = GameSetup { you: 2, players: vec!["a".into()], config: GameConfig::default() };
        assert!(matches!(setup.build_game(), Err(SessionError::BadSetup(_))));
    }

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name("  ann ").unwrap(), "ann");
        assert!(validate_name("").is_err());
        assert!(validate_name("a,b").is_err());
        assert!(validate_name("a:b").is_err());
        assert!(validate_name("two words").is_err());
        assert!(validate_name(&"n".repeat(MAX_NAME_LEN + 1)).is_err());
    }

    #[tokio::test]
    async fn test_handshake_builds_matching_games() {
        let config = GameConfig { width: 3, seed: 8, ..Default::default() };
        let (hub_a, mut client_a) = link_pair();
        let (hub_b, mut client_b) = link_pair();

        client_a.send_line("ann").await.unwrap();
        client_b.send_line("bob").await.unwrap();

        let mut seats = Vec::new();
        for mut link in [hub_a, hub_b] {
            let name = read_name(&mut link).await.unwrap();
            seats.push(Seat { name, link });
        }
        let session = GameSession::open(seats, config.clone()).await.unwrap();

        let setup = match client_b.recv_line(SETUP_LINE_LIMIT).await {
            Incoming::Line(line) => GameSetup::from_json(&line).unwrap(),
            other => panic!("no setup: {other:?}"),
        };
        assert_eq!(setup.you, 1);
        assert_eq!(setup.players, vec!["ann", "bob"]);
        assert_eq!(setup.build_game().unwrap().compute_digest(), session.game().compute_digest());

        let setup = match client_a.recv_line(SETUP_LINE_LIMIT).await {
            Incoming::Line(line) => GameSetup::from_json(&line).unwrap(),
            other => panic!("no setup: {other:?}"),
        };
        assert_eq!(setup.you, 0);
    }

    #[tokio::test]
    async fn test_join_reads_setup() {
        let (mut hub, mut client) = link_pair();
        let setup = GameSetup { you: 0, players: vec!["cat".into()], config: GameConfig::default() };
        hub.send_line(&setup.to_json().unwrap()).await.unwrap();

        assert_eq!(join(&mut client, "cat").await.unwrap(), setup);
        assert_eq!(read_name(&mut hub).await.unwrap(), "cat");
    }

    #[tokio::test]
    async fn test_read_name_rejects_hangup() {
        let (mut hub, mut client) = link_pair();
        client.close().await;
        assert!(matches!(read_name(&mut hub).await, Err(SessionError::Closed)));
    }
}
