//! Game State Definitions
//!
//! The board, the players and the per-car loot counters. The same types
//! back the authoritative hub game and every client's mirror of it.

use std::io::{self, Write};

use serde::{Serialize, Deserialize};

use crate::core::hash::{StateHash, compute_state_hash};
use crate::core::rng::DeterministicRng;
use crate::network::protocol::index_to_letter;

// =============================================================================
// PLAYER INDEX
// =============================================================================

/// Zero-based player index, stable for the lifetime of a game.
///
/// The wire identity letter is derived from it by the codec
/// (see [`index_to_letter`]).
pub type PlayerIndex = usize;

/// One identity letter per player: `A` through `Z`.
pub const MAX_PLAYERS: usize = 26;

/// Number of vertical levels in every car.
pub const LEVELS: usize = 2;

// =============================================================================
// ORDERS AND MOVEMENT
// =============================================================================

/// The single action a player commits to for a round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderCode {
    /// `r`: clear all hits.
    Recover,
    /// `v`: switch between the lower and upper level.
    MoveVertical,
    /// `h`: move one car left or right.
    MoveHorizontal,
    /// `l`: long range shot.
    TargetLong,
    /// `s`: short range shot at someone in the same car and level.
    TargetShort,
    /// `$`: pick up one unit of loot from the current car and level.
    Loot,
}

impl OrderCode {
    /// Every order, in wire-code order.
    pub const ALL: [OrderCode; 6] = [
        OrderCode::Recover,
        OrderCode::MoveVertical,
        OrderCode::MoveHorizontal,
        OrderCode::TargetLong,
        OrderCode::TargetShort,
        OrderCode::Loot,
    ];

    /// One-character wire code.
    pub fn code(self) -> u8 {
        match self {
            OrderCode::Recover => b'r',
            OrderCode::MoveVertical => b'v',
            OrderCode::MoveHorizontal => b'h',
            OrderCode::TargetLong => b'l',
            OrderCode::TargetShort => b's',
            OrderCode::Loot => b'$',
        }
    }

    /// Parse a wire code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            b'r' => Some(OrderCode::Recover),
            b'v' => Some(OrderCode::MoveVertical),
            b'h' => Some(OrderCode::MoveHorizontal),
            b'l' => Some(OrderCode::TargetLong),
            b's' => Some(OrderCode::TargetShort),
            b'$' => Some(OrderCode::Loot),
            _ => None,
        }
    }
}

/// Vertical level inside a car.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Level {
    /// Inside the car (`y = 0`).
    #[default]
    Lower,
    /// On the roof (`y = 1`).
    Upper,
}

impl Level {
    /// Numeric level, 0 or 1.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Level::Lower => 0,
            Level::Upper => 1,
        }
    }

    /// The other level.
    #[inline]
    pub fn toggled(self) -> Self {
        match self {
            Level::Lower => Level::Upper,
            Level::Upper => Level::Lower,
        }
    }
}

/// Direction of a horizontal move.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Towards car 0 (`-`).
    Left,
    /// Towards car `W - 1` (`+`).
    Right,
}

impl Direction {
    /// Signed car delta.
    #[inline]
    pub fn delta(self) -> isize {
        match self {
            Direction::Left => -1,
            Direction::Right => 1,
        }
    }

    /// Wire sign character.
    pub fn sign(self) -> u8 {
        match self {
            Direction::Left => b'-',
            Direction::Right => b'+',
        }
    }

    /// Parse a wire sign character.
    pub fn from_sign(sign: u8) -> Option<Self> {
        match sign {
            b'-' => Some(Direction::Left),
            b'+' => Some(Direction::Right),
            _ => None,
        }
    }

    /// Car reached by moving one step from `x`, if it is on a board of `width` cars.
    pub fn step(self, x: usize, width: usize) -> Option<usize> {
        let next = x as isize + self.delta();
        if next < 0 || next as usize >= width {
            None
        } else {
            Some(next as usize)
        }
    }
}

/// A player's place on the board.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    /// Car index, `0..width`.
    pub x: usize,
    /// Level inside the car.
    pub level: Level,
}

impl Position {
    /// Create a position.
    pub const fn new(x: usize, level: Level) -> Self {
        Self { x, level }
    }
}

/// Phase of the current round, mirrored on hub and clients.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RoundState {
    /// Waiting for the first round.
    #[default]
    Start,
    /// Collecting one order per player.
    Orders,
    /// Resolving the collected orders.
    Execute,
}

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Parameters of a single game instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Number of cars.
    pub width: usize,
    /// Rounds played before the game ends.
    pub num_rounds: u32,
    /// Hit count at or above which the player's order is forced to recover.
    pub dry_out_limit: u32,
    /// Seed for the initial loot layout.
    pub seed: u64,
    /// Upper bound of loot placed on a single level of a car at setup.
    pub max_loot_per_level: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            width: 5,
            num_rounds: 15,
            dry_out_limit: 3,
            seed: 0,
            max_loot_per_level: 2,
        }
    }
}

/// Reasons a game cannot be created.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SetupError {
    /// A game needs at least one player.
    #[error("a game needs at least one player")]
    NoPlayers,

    /// More players than identity letters.
    #[error("{0} players requested, at most 26 supported")]
    TooManyPlayers(usize),

    /// The board must have at least one car.
    #[error("board width must be at least 1")]
    ZeroWidth,

    /// One player link is needed per player.
    #[error("{links} links supplied for {players} players")]
    LinkCountMismatch {
        /// Players in the game.
        players: usize,
        /// Links supplied.
        links: usize,
    },
}

// =============================================================================
// PLAYER
// =============================================================================

/// State of a single player.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Index into `Game::players`
    pub index: PlayerIndex,

    /// Display name
    pub name: String,

    /// Loot carried
    pub loot: u32,

    /// Hits taken since the last recover
    pub hits: u32,

    /// Current car and level
    pub position: Position,

    /// Order committed for the current round
    pub order: Option<OrderCode>,

    /// Connection lost
    pub disconnected: bool,
}

impl Player {
    /// Create a player at a starting position.
    pub fn new(index: PlayerIndex, name: impl Into<String>, position: Position) -> Self {
        Self {
            index,
            name: name.into(),
            loot: 0,
            hits: 0,
            position,
            order: None,
            disconnected: false,
        }
    }

    /// Wire identity letter.
    #[inline]
    pub fn letter(&self) -> char {
        index_to_letter(self.index)
    }
}

// =============================================================================
// GAME
// =============================================================================

/// Complete state of one game instance.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Game {
    /// Players in index order; never reordered.
    pub players: Vec<Player>,

    /// Number of cars.
    pub width: usize,

    /// Loot per car, indexed `[x][level]`.
    loot: Vec<[u32; LEVELS]>,

    /// Rounds in the game.
    pub num_rounds: u32,

    /// Hits at or above which a player is forced to recover.
    pub dry_out_limit: u32,

    /// Seed the loot layout was derived from.
    pub seed: u64,

    /// Current round phase.
    pub phase: RoundState,

    /// Set once `game_over` has been sent or received.
    pub game_over: bool,
}

impl Game {
    /// Create a game with players seated in the given order.
    ///
    /// Player `i` starts at car `i % width` on the lower level. Loot is
    /// scattered from `config.seed`, car by car, lower level first.
    pub fn new<S: Into<String>>(
        names: impl IntoIterator<Item = S>,
        config: &GameConfig,
    ) -> Result<Self, SetupError> {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(SetupError::NoPlayers);
        }
        if names.len() > MAX_PLAYERS {
            return Err(SetupError::TooManyPlayers(names.len()));
        }
        if config.width == 0 {
            return Err(SetupError::ZeroWidth);
        }

        let players = names
            .into_iter()
            .enumerate()
            .map(|(i, name)| Player::new(i, name, Position::new(i % config.width, Level::Lower)))
            .collect();

        let mut rng = DeterministicRng::new(config.seed);
        let bound = config.max_loot_per_level.saturating_add(1);
        let loot = (0..config.width)
            .map(|_| {
                let lower = rng.next_int(bound);
                let upper = rng.next_int(bound);
                [lower, upper]
            })
            .collect();

        Ok(Self {
            players,
            width: config.width,
            loot,
            num_rounds: config.num_rounds,
            dry_out_limit: config.dry_out_limit,
            seed: config.seed,
            phase: RoundState::Start,
            game_over: false,
        })
    }

    /// Number of players.
    #[inline]
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Get a player by index.
    #[inline]
    pub fn player(&self, index: PlayerIndex) -> &Player {
        &self.players[index]
    }

    /// Get a player mutably by index.
    #[inline]
    pub fn player_mut(&mut self, index: PlayerIndex) -> &mut Player {
        &mut self.players[index]
    }

    /// Whether `index` refers to a seated player.
    #[inline]
    pub fn has_player(&self, index: PlayerIndex) -> bool {
        index < self.players.len()
    }

    /// Whether the player's next order is forced to recover.
    pub fn is_dried_out(&self, index: PlayerIndex) -> bool {
        self.players[index].hits >= self.dry_out_limit
    }

    /// Loot lying at a position.
    #[inline]
    pub fn loot_at(&self, position: Position) -> u32 {
        self.loot[position.x][position.level.index()]
    }

    /// Overwrite the loot lying at a position.
    pub fn set_loot_at(&mut self, position: Position, amount: u32) {
        self.loot[position.x][position.level.index()] = amount;
    }

    /// Move one unit of loot from the board to the player standing at `index`.
    ///
    /// Returns false (and changes nothing) if their spot is empty.
    pub fn pick_up_loot(&mut self, index: PlayerIndex) -> bool {
        let position = self.players[index].position;
        let cell = &mut self.loot[position.x][position.level.index()];
        if *cell == 0 {
            return false;
        }
        *cell -= 1;
        self.players[index].loot += 1;
        true
    }

    /// Make the player at `index` drop one unit of carried loot in their car.
    ///
    /// Returns false (and changes nothing) if they carry none.
    pub fn drop_loot(&mut self, index: PlayerIndex) -> bool {
        let player = &mut self.players[index];
        if player.loot == 0 {
            return false;
        }
        player.loot -= 1;
        let position = player.position;
        self.loot[position.x][position.level.index()] += 1;
        true
    }

    /// Loot on the board plus loot carried by players.
    pub fn total_loot(&self) -> u64 {
        let on_board: u64 = self
            .loot
            .iter()
            .flat_map(|car| car.iter())
            .map(|&n| n as u64)
            .sum();
        let carried: u64 = self.players.iter().map(|p| p.loot as u64).sum();
        on_board + carried
    }

    /// Players tied for the most loot, in player order.
    pub fn winners(&self) -> Vec<PlayerIndex> {
        let high = self.players.iter().map(|p| p.loot).max().unwrap_or(0);
        self.players
            .iter()
            .filter(|p| p.loot == high)
            .map(|p| p.index)
            .collect()
    }

    /// Write the per-player and per-car summary.
    pub fn write_summary<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for p in &self.players {
            writeln!(
                out,
                "{}: {}:{}/{} $={},h={}",
                p.letter(),
                p.name,
                p.position.x,
                p.position.level.index(),
                p.loot,
                p.hits
            )?;
        }
        for (x, car) in self.loot.iter().enumerate() {
            writeln!(out, "Carriage {}: $={},$={}", x, car[0], car[1])?;
        }
        out.flush()
    }

    /// Write the `Winner(s):` line.
    pub fn write_winners<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let names: Vec<&str> = self
            .winners()
            .into_iter()
            .map(|i| self.players[i].name.as_str())
            .collect();
        writeln!(out, "Winner(s):{}", names.join(","))?;
        out.flush()
    }

    /// Digest of everything the replicas mirror.
    ///
    /// Pending orders, the phase and disconnect flags are excluded: they are
    /// bookkeeping, not replicated board state.
    pub fn compute_digest(&self) -> StateHash {
        compute_state_hash(self.width, self.seed, |hasher| {
            hasher.update_usize(self.players.len());
            for p in &self.players {
                hasher.update_usize(p.index);
                hasher.update_str(&p.name);
                hasher.update_u32(p.loot);
                hasher.update_u32(p.hits);
                hasher.update_usize(p.position.x);
                hasher.update_u8(p.position.level.index() as u8);
            }
            for car in &self.loot {
                hasher.update_u32(car[0]);
                hasher.update_u32(car[1]);
            }
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
