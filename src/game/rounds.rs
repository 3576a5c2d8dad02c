//! Round Loop
//!
//! Drives a [`TurnEngine`] through a whole game: order collection, then
//! resolution, once per round, then `game_over`.

use tracing::{info, instrument, warn};

use crate::game::engine::{Collected, EngineError, TurnEngine};
use crate::game::state::{PlayerIndex, RoundState};
use crate::network::protocol::HubMessage;

/// How a game ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameOutcome {
    /// All rounds were played.
    Completed {
        /// Players tied for the most loot.
        winners: Vec<PlayerIndex>,
    },
    /// A player's stream ended mid-game.
    Disconnected(PlayerIndex),
    /// A player broke protocol.
    ProtocolViolation(PlayerIndex),
}

/// Play every round of the engine's game.
///
/// A failure is announced to the remaining players (`disco` or `badmsg`)
/// and ends the game immediately.
#[instrument(skip(engine), fields(players = engine.game().player_count()))]
pub async fn run_game(engine: &mut TurnEngine) -> GameOutcome {
    let rounds = engine.game().num_rounds;

    for round in 0..rounds {
        info!(round, "round start");
        if let Err(e) = play_round(engine).await {
            return abort(engine, e).await;
        }
    }

    engine.game_mut().game_over = true;
    engine.broadcast(&HubMessage::GameOver).await;

    let winners = engine.game().winners();
    info!(?winners, "game over");
    GameOutcome::Completed { winners }
}

async fn play_round(engine: &mut TurnEngine) -> Result<(), EngineError> {
    let count = engine.game().player_count();

    engine.game_mut().phase = RoundState::Orders;
    engine.broadcast(&HubMessage::Round).await;

    for index in 0..count {
        let collected = match engine.collect_order(index).await {
            Err(EngineError::ProtocolError(_)) => {
                // One second chance, without a fresh prompt
                engine.send_to(index, &HubMessage::Nack).await;
                engine.receive_order(index).await?;
                Collected::Prompted
            }
            other => other?,
        };

        if collected == Collected::Prompted {
            engine.send_to(index, &HubMessage::Ack).await;
        }
        if let Some(order) = engine.game().player(index).order {
            engine
                .broadcast(&HubMessage::Ordered { subject: index, order })
                .await;
        }
    }

    engine.game_mut().phase = RoundState::Execute;
    engine.broadcast(&HubMessage::ExecutePhase).await;

    for index in 0..count {
        engine.resolve_order(index).await?;
    }

    Ok(())
}

async fn abort(engine: &mut TurnEngine, error: EngineError) -> GameOutcome {
    warn!("Ending game: {}", error);
    match error {
        EngineError::ClientDisconnected(index) => {
            engine.game_mut().player_mut(index).disconnected = true;
            engine.broadcast(&HubMessage::Disconnected { subject: index }).await;
            GameOutcome::Disconnected(index)
        }
        EngineError::ProtocolError(index) => {
            engine.broadcast(&HubMessage::BadMessage { subject: index }).await;
            GameOutcome::ProtocolViolation(index)
        }
    }
}
