//! Client Side
//!
//! A replica of the game rebuilt from the hub's broadcasts, and the actors
//! that make this player's decisions.

pub mod actor;
pub mod mirror;
pub mod replica;

pub use actor::{OrderSource, ExecuteHandler, AutoPlayer, LinePlayer};
pub use mirror::{Mirror, MirrorError};
pub use replica::{Replica, ReplicaOutcome, transition};
