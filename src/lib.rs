//! # Train Heist
//!
//! Authoritative hub, wire codec and client replica for Train Heist, a
//! turn-based game of looting and shooting aboard a moving train.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        TRAIN HEIST                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── rng.rs      - Xorshift128+ PRNG, per-game seeds         │
//! │  └── hash.rs     - State digests for replica checks          │
//! │                                                              │
//! │  game/           - Rules and the authoritative engine        │
//! │  ├── state.rs    - Game, players, loot counters              │
//! │  ├── targeting.rs- Neighbours and legal targets              │
//! │  ├── engine.rs   - Order collection and resolution           │
//! │  └── rounds.rs   - Round loop                                │
//! │                                                              │
//! │  network/        - Wire and transport                        │
//! │  ├── protocol.rs - Line codec                                │
//! │  ├── link.rs     - Buffered line endpoints                   │
//! │  ├── session.rs  - Handshake and game sessions               │
//! │  └── server.rs   - TCP hub                                   │
//! │                                                              │
//! │  client/         - Player side                               │
//! │  ├── replica.rs  - Replica state machine                     │
//! │  ├── mirror.rs   - Applies broadcasts to the local copy      │
//! │  └── actor.rs    - Decision sources                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Replication
//!
//! Clients never receive the board. Each builds the starting game from the
//! setup handshake (names, width, seed) and then applies the hub's
//! broadcasts with the same rules the hub used. Two games built from the
//! same setup and fed the same broadcasts have equal
//! [`Game::compute_digest`](game::state::Game::compute_digest) values.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;
pub mod client;

// Re-export commonly used types
pub use crate::core::rng::DeterministicRng;
pub use crate::game::state::{Game, GameConfig, PlayerIndex, OrderCode};
pub use crate::network::protocol::{HubMessage, PlayerMessage};
pub use crate::client::replica::{Replica, ReplicaOutcome};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
