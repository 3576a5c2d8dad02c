//! Client Mirror
//!
//! Applies execute-phase broadcasts to the client's copy of the game, with
//! the same rules the hub used to produce them. A broadcast the mirror
//! cannot reproduce means the replica has diverged.

use tracing::info;

use crate::client::actor::ExecuteHandler;
use crate::game::state::{Game, OrderCode, PlayerIndex};
use crate::game::targeting::{validate_horizontal, validate_long, validate_short, IllegalMove};
use crate::network::protocol::{index_to_letter, HubMessage, Target};

/// A broadcast that does not fit the mirrored state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MirrorError {
    /// The move or shot is illegal in the mirrored state.
    #[error("{action} by {letter} is illegal here: {reason}")]
    Illegal {
        /// Acting player's letter.
        letter: char,
        /// What they did.
        action: &'static str,
        /// Why the mirror rejects it.
        reason: IllegalMove,
    },

    /// Not an execute-phase broadcast.
    #[error("unexpected message during execute: {0:?}")]
    Unexpected(HubMessage),
}

/// Standard execute handler: applies broadcasts and narrates them.
#[derive(Debug, Default, Clone, Copy)]
pub struct Mirror;

fn illegal(subject: PlayerIndex, action: &'static str) -> impl FnOnce(IllegalMove) -> MirrorError {
    move |reason| MirrorError::Illegal {
        letter: index_to_letter(subject),
        action,
        reason,
    }
}

impl ExecuteHandler for Mirror {
    fn record_order(&mut self, game: &Game, player: PlayerIndex, order: OrderCode) {
        info!("{} ({}) ordered {}", game.player(player).letter(), game.player(player).name, order.code() as char);
    }

    fn process_execute(&mut self, game: &mut Game, message: &HubMessage) -> Result<(), MirrorError> {
        match *message {
            HubMessage::MovedHorizontally { subject, direction } => {
                let x = validate_horizontal(game, subject, direction)
                    .map_err(illegal(subject, "horizontal move"))?;
                game.player_mut(subject).position.x = x;
                info!("{} moved to car {}", index_to_letter(subject), x);
            }
            HubMessage::MovedVertically { subject } => {
                let player = game.player_mut(subject);
                player.position.level = player.position.level.toggled();
                info!("{} moved to level {}", index_to_letter(subject), player.position.level.index());
            }
            HubMessage::TargetedLong { subject, object } => {
                validate_long(game, subject, object).map_err(illegal(subject, "long shot"))?;
                match object {
                    Target::Player(victim) => {
                        game.player_mut(victim).hits += 1;
                        info!("{} shot {} from range", index_to_letter(subject), index_to_letter(victim));
                    }
                    Target::Missing => info!("{} had nobody to shoot", index_to_letter(subject)),
                }
            }
            HubMessage::TargetedShort { subject, object } => {
                validate_short(game, subject, object).map_err(illegal(subject, "short shot"))?;
                match object {
                    Target::Player(victim) => {
                        let dropped = game.drop_loot(victim);
                        info!(
                            "{} shot {} up close{}",
                            index_to_letter(subject),
                            index_to_letter(victim),
                            if dropped { ", loot dropped" } else { "" }
                        );
                    }
                    Target::Missing => info!("{} had nobody to punch", index_to_letter(subject)),
                }
            }
            HubMessage::Looted { subject } => {
                // The wire does not say whether anything was found; the
                // mirrored counters do.
                if game.pick_up_loot(subject) {
                    info!("{} picked up loot", index_to_letter(subject));
                } else {
                    info!("{} found nothing to loot", index_to_letter(subject));
                }
            }
            HubMessage::Recovered { subject } => {
                game.player_mut(subject).hits = 0;
                info!("{} recovered", index_to_letter(subject));
            }
            other => return Err(MirrorError::Unexpected(other)),
        }
        Ok(())
    }
}
