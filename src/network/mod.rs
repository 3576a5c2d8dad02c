//! Network Layer
//!
//! The line protocol and the TCP hub around it.

pub mod protocol;
pub mod link;
pub mod session;
pub mod server;

pub use protocol::{HubMessage, PlayerMessage, Target, index_to_letter, letter_to_index};
pub use link::{LineLink, Incoming};
pub use session::{GameSession, GameSetup, Seat, SessionError};
pub use server::{HubServer, ServerConfig, ServerError};
