//! Game Logic Module
//!
//! The board, the rules and the authoritative turn engine.
//!
//! ## Module Structure
//!
//! - `state`: Game, player and board state
//! - `targeting`: Nearest neighbours and legal targets
//! - `engine`: Order collection and resolution against player links
//! - `rounds`: The round loop driving an engine to the end of a game

pub mod state;
pub mod targeting;
pub mod engine;
pub mod rounds;

// Re-export key types
pub use state::{Game, GameConfig, Player, PlayerIndex, OrderCode, Position, Level, Direction, RoundState};
pub use engine::{TurnEngine, EngineError, LootHook, Resolution};
pub use rounds::{run_game, GameOutcome};
