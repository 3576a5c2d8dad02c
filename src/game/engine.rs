//! Hub Turn Engine
//!
//! The authoritative half of the game. Collects one order per player and
//! resolves it against the movement and targeting rules, prompting the
//! acting player for details and broadcasting every outcome.
//!
//! Illegal details are answered with `no` and re-prompted without limit.
//! Anything that is not even the right kind of message is a protocol error,
//! and a closed stream is a disconnect. Both end the operation; deciding
//! what that means for the game is the round loop's job.

use tracing::{debug, info, instrument};

use crate::game::state::{Direction, Game, Level, OrderCode, PlayerIndex, SetupError};
use crate::game::targeting::{validate_horizontal, validate_long, validate_short};
use crate::network::link::LineLink;
use crate::network::protocol::{HubMessage, PlayerMessage, Target};

/// Engine failures, each naming the player responsible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// The player's stream ended.
    #[error("player {0} disconnected")]
    ClientDisconnected(PlayerIndex),

    /// The player sent a message that makes no sense at this point.
    #[error("player {0} broke protocol")]
    ProtocolError(PlayerIndex),
}

impl EngineError {
    /// The player at fault.
    pub fn player(&self) -> PlayerIndex {
        match *self {
            EngineError::ClientDisconnected(i) | EngineError::ProtocolError(i) => i,
        }
    }
}

/// Called whenever a player actually picks up loot.
pub trait LootHook: Send {
    /// `player` has just taken one unit; `game` already reflects it.
    fn loot_taken(&mut self, game: &Game, player: PlayerIndex);
}

/// Loot hook that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLootHook;

impl LootHook for NoLootHook {
    fn loot_taken(&mut self, _game: &Game, _player: PlayerIndex) {}
}

/// How an order was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collected {
    /// Dried out: recover was filled in without asking.
    Forced,
    /// The player was prompted and answered.
    Prompted,
}

/// What resolving an order did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Hits cleared.
    Recovered,
    /// Now on this level.
    MovedVertically(Level),
    /// Moved one car this way.
    MovedHorizontally(Direction),
    /// Long range shot at this target.
    TargetedLong(Target),
    /// Short range shot.
    TargetedShort {
        /// Who was shot, if anyone.
        object: Target,
        /// Whether the victim dropped loot.
        loot_dropped: bool,
    },
    /// Loot attempt. The broadcast is the same either way.
    Looted {
        /// Whether there was loot to take.
        picked_up: bool,
    },
}

/// Authoritative game plus one link per player.
pub struct TurnEngine {
    game: Game,
    links: Vec<LineLink>,
    loot_hook: Box<dyn LootHook>,
}

impl TurnEngine {
    /// Pair a game with its player links, in player order.
    pub fn new(game: Game, links: Vec<LineLink>) -> Result<Self, SetupError> {
        if links.len() != game.player_count() {
            return Err(SetupError::LinkCountMismatch {
                players: game.player_count(),
                links: links.len(),
            });
        }
        Ok(Self {
            game,
            links,
            loot_hook: Box::new(NoLootHook),
        })
    }

    /// Replace the loot hook.
    pub fn with_loot_hook(mut self, hook: impl LootHook + 'static) -> Self {
        self.loot_hook = Box::new(hook);
        self
    }

    /// The authoritative game.
    pub fn game(&self) -> &Game {
        &self.game
    }

    /// The authoritative game, mutably.
    pub fn game_mut(&mut self) -> &mut Game {
        &mut self.game
    }

    /// Take the game and links apart again.
    pub fn into_parts(self) -> (Game, Vec<LineLink>) {
        (self.game, self.links)
    }

    // =========================================================================
    // SENDING
    // =========================================================================

    /// Send to one player. A failed write is logged; the next read from
    /// that player reports the disconnect.
    pub async fn send_to(&mut self, index: PlayerIndex, message: &HubMessage) {
        if let Err(e) = self.links[index].send_hub(message).await {
            debug!("Write to {} failed: {}", self.game.player(index).letter(), e);
        }
    }

    /// Send to every connected player.
    pub async fn broadcast(&mut self, message: &HubMessage) {
        for index in 0..self.links.len() {
            if self.game.player(index).disconnected {
                continue;
            }
            self.send_to(index, message).await;
        }
    }

    /// Close every link so clients see end of stream.
    pub async fn close_all(&mut self) {
        for link in &mut self.links {
            link.close().await;
        }
    }

    // =========================================================================
    // ORDERS
    // =========================================================================

    /// Obtain this round's order from `index`.
    ///
    /// A dried-out player is not asked: their order becomes recover.
    /// Everyone else gets `yourturn` and must answer with `play<C>`.
    pub async fn collect_order(&mut self, index: PlayerIndex) -> Result<Collected, EngineError> {
        if self.game.is_dried_out(index) {
            debug!("{} is dried out, forcing recover", self.game.player(index).letter());
            self.game.player_mut(index).order = Some(OrderCode::Recover);
            return Ok(Collected::Forced);
        }

        self.send_to(index, &HubMessage::YourTurn).await;
        self.receive_order(index).await?;
        Ok(Collected::Prompted)
    }

    /// Read one `play<C>` from `index` and store it.
    pub async fn receive_order(&mut self, index: PlayerIndex) -> Result<OrderCode, EngineError> {
        match self.links[index].recv_player().await {
            PlayerMessage::EndOfStream => Err(EngineError::ClientDisconnected(index)),
            PlayerMessage::Play(order) => {
                self.game.player_mut(index).order = Some(order);
                Ok(order)
            }
            other => {
                debug!("Expected an order from {}, got {:?}", self.game.player(index).letter(), other);
                Err(EngineError::ProtocolError(index))
            }
        }
    }

    /// Carry out the stored order of `index` and broadcast the result.
    #[instrument(skip(self), fields(player = %self.game.player(index).letter()))]
    pub async fn resolve_order(&mut self, index: PlayerIndex) -> Result<Resolution, EngineError> {
        let order = self
            .game
            .player_mut(index)
            .order
            .take()
            .ok_or(EngineError::ProtocolError(index))?;

        let resolution = match order {
            OrderCode::Recover => {
                self.game.player_mut(index).hits = 0;
                self.broadcast(&HubMessage::Recovered { subject: index }).await;
                Resolution::Recovered
            }
            OrderCode::MoveVertical => {
                let player = self.game.player_mut(index);
                player.position.level = player.position.level.toggled();
                let level = player.position.level;
                self.broadcast(&HubMessage::MovedVertically { subject: index }).await;
                Resolution::MovedVertically(level)
            }
            OrderCode::MoveHorizontal => self.resolve_horizontal(index).await?,
            OrderCode::TargetLong => self.resolve_long(index).await?,
            OrderCode::TargetShort => self.resolve_short(index).await?,
            OrderCode::Loot => {
                let picked_up = self.game.pick_up_loot(index);
                if picked_up {
                    self.loot_hook.loot_taken(&self.game, index);
                }
                self.broadcast(&HubMessage::Looted { subject: index }).await;
                Resolution::Looted { picked_up }
            }
        };

        info!(?resolution, "resolved");
        Ok(resolution)
    }

    async fn resolve_horizontal(&mut self, index: PlayerIndex) -> Result<Resolution, EngineError> {
        self.send_to(index, &HubMessage::ChooseHorizontal).await;
        loop {
            let direction = match self.links[index].recv_player().await {
                PlayerMessage::EndOfStream => return Err(EngineError::ClientDisconnected(index)),
                PlayerMessage::Sideways(direction) => direction,
                _ => return Err(EngineError::ProtocolError(index)),
            };

            match validate_horizontal(&self.game, index, direction) {
                Ok(x) => {
                    self.send_to(index, &HubMessage::Ack).await;
                    self.game.player_mut(index).position.x = x;
                    self.broadcast(&HubMessage::MovedHorizontally { subject: index, direction })
                        .await;
                    return Ok(Resolution::MovedHorizontally(direction));
                }
                Err(why) => {
                    debug!("Rejected {:?}: {}", direction, why);
                    self.send_to(index, &HubMessage::Nack).await;
                }
            }
        }
    }

    async fn resolve_long(&mut self, index: PlayerIndex) -> Result<Resolution, EngineError> {
        self.send_to(index, &HubMessage::ChooseLong).await;
        loop {
            let object = match self.links[index].recv_player().await {
                PlayerMessage::EndOfStream => return Err(EngineError::ClientDisconnected(index)),
                PlayerMessage::TargetLong(object) => object,
                _ => return Err(EngineError::ProtocolError(index)),
            };

            match validate_long(&self.game, index, object) {
                Ok(()) => {
                    if let Target::Player(victim) = object {
                        self.game.player_mut(victim).hits += 1;
                    }
                    self.send_to(index, &HubMessage::Ack).await;
                    self.broadcast(&HubMessage::TargetedLong { subject: index, object }).await;
                    return Ok(Resolution::TargetedLong(object));
                }
                Err(why) => {
                    debug!("Rejected long shot at {:?}: {}", object, why);
                    self.send_to(index, &HubMessage::Nack).await;
                }
            }
        }
    }

    async fn resolve_short(&mut self, index: PlayerIndex) -> Result<Resolution, EngineError> {
        self.send_to(index, &HubMessage::ChooseShort).await;
        loop {
            let object = match self.links[index].recv_player().await {
                PlayerMessage::EndOfStream => return Err(EngineError::ClientDisconnected(index)),
                PlayerMessage::TargetShort(object) => object,
                _ => return Err(EngineError::ProtocolError(index)),
            };

            match validate_short(&self.game, index, object) {
                Ok(()) => {
                    let mut loot_dropped = false;
                    if let Target::Player(victim) = object {
                        loot_dropped = self.game.drop_loot(victim);
                    }
                    self.send_to(index, &HubMessage::Ack).await;
                    self.broadcast(&HubMessage::TargetedShort { subject: index, object }).await;
                    return Ok(Resolution::TargetedShort { object, loot_dropped });
                }
                Err(why) => {
                    debug!("Rejected short shot at {:?}: {}", object, why);
                    self.send_to(index, &HubMessage::Nack).await;
                }
            }
        }
    }
}

impl std::fmt::Debug for TurnEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnEngine")
            .field("game", &self.game)
            .field("links", &self.links.len())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// TESTS
// =============================================================================
