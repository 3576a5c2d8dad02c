//! Core deterministic primitives.
//!
//! Shared by the hub and the client replica: both sides must derive
//! identical boards and digests from the same inputs.

pub mod rng;
pub mod hash;

// Re-export core types
pub use rng::{DeterministicRng, derive_game_seed};
pub use hash::{StateHash, StateHasher, compute_state_hash};
