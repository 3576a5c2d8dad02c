//! Decision Actors
//!
//! The replica asks an [`OrderSource`] whenever the hub wants a decision
//! and hands every execute broadcast to an [`ExecuteHandler`]. Two order
//! sources ship with the crate: a seeded automatic player and a human
//! driven by lines of text.

use std::io::{BufRead, Write};

use crate::client::mirror::MirrorError;
use crate::core::rng::DeterministicRng;
use crate::game::state::{Direction, Game, OrderCode, PlayerIndex};
use crate::game::targeting::{long_targets, short_targets};
use crate::network::protocol::{letter_to_index, HubMessage, Target};

/// Source of this player's decisions.
///
/// Returning `None` means no more input is available; the replica stops
/// with an input-exhausted outcome.
pub trait OrderSource {
    /// Order for this round.
    fn choose_order(&mut self, game: &Game, me: PlayerIndex) -> Option<OrderCode>;

    /// Direction for a horizontal move.
    fn choose_direction(&mut self, game: &Game, me: PlayerIndex) -> Option<Direction>;

    /// Target for a long range shot.
    fn choose_long_target(&mut self, game: &Game, me: PlayerIndex) -> Option<Target>;

    /// Target for a short range shot.
    fn choose_short_target(&mut self, game: &Game, me: PlayerIndex) -> Option<Target>;
}

/// Applies hub broadcasts to the local mirror.
pub trait ExecuteHandler {
    /// A player committed an order. Narration only; the mirror is unchanged.
    fn record_order(&mut self, _game: &Game, _player: PlayerIndex, _order: OrderCode) {}

    /// Apply one execute-phase broadcast to `game`.
    fn process_execute(&mut self, game: &mut Game, message: &HubMessage) -> Result<(), MirrorError>;
}

// =============================================================================
// AUTOMATIC PLAYER
// =============================================================================

/// Seeded player that only ever makes legal choices.
#[derive(Debug, Clone)]
pub struct AutoPlayer {
    rng: DeterministicRng,
}

impl AutoPlayer {
    /// Create a player from a seed.
    pub fn new(seed: u64) -> Self {
        Self { rng: DeterministicRng::new(seed) }
    }

    fn pick_target(&mut self, candidates: Vec<PlayerIndex>) -> Target {
        match self.rng.choose(&candidates) {
            Some(&index) => Target::Player(index),
            None => Target::Missing,
        }
    }
}

impl OrderSource for AutoPlayer {
    fn choose_order(&mut self, game: &Game, me: PlayerIndex) -> Option<OrderCode> {
        let position = game.player(me).position;
        if game.loot_at(position) > 0 && self.rng.one_in(2) {
            return Some(OrderCode::Loot);
        }

        // A one-car train has nowhere to go sideways
        let orders: Vec<OrderCode> = OrderCode::ALL
            .into_iter()
            .filter(|&o| o != OrderCode::MoveHorizontal || game.width > 1)
            .collect();
        self.rng.choose(&orders).copied()
    }

    fn choose_direction(&mut self, game: &Game, me: PlayerIndex) -> Option<Direction> {
        let x = game.player(me).position.x;
        let legal: Vec<Direction> = [Direction::Left, Direction::Right]
            .into_iter()
            .filter(|d| d.step(x, game.width).is_some())
            .collect();
        Some(self.rng.choose(&legal).copied().unwrap_or(Direction::Left))
    }

    fn choose_long_target(&mut self, game: &Game, me: PlayerIndex) -> Option<Target> {
        let candidates = long_targets(game, me).iter().collect();
        Some(self.pick_target(candidates))
    }

    fn choose_short_target(&mut self, game: &Game, me: PlayerIndex) -> Option<Target> {
        let candidates = short_targets(game, me).iter().collect();
        Some(self.pick_target(candidates))
    }
}

// =============================================================================
// LINE-DRIVEN PLAYER
// =============================================================================

/// Human player answering prompts on a text stream.
///
/// Malformed answers are asked again; legality is left to the hub.
#[derive(Debug)]
pub struct LinePlayer<R, W> {
    input: R,
    prompt: W,
}

impl<R: BufRead, W: Write> LinePlayer<R, W> {
    /// Read answers from `input`, writing prompts to `prompt`.
    pub fn new(input: R, prompt: W) -> Self {
        Self { input, prompt }
    }

    /// Ask until `parse` accepts an answer. `None` on end of input.
    fn ask<T>(&mut self, question: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
        loop {
            // A broken prompt stream is not fatal; answers can still arrive
            let _ = write!(self.prompt, "{question}");
            let _ = self.prompt.flush();

            let mut line = String::new();
            match self.input.read_line(&mut line) {
                Ok(0) | Err(_) => return None,
                Ok(_) => {}
            }
            if let Some(answer) = parse(line.trim()) {
                return Some(answer);
            }
        }
    }
}

fn parse_order(answer: &str) -> Option<OrderCode> {
    match answer.as_bytes() {
        [c] => OrderCode::from_code(*c),
        _ => None,
    }
}

fn parse_direction(answer: &str) -> Option<Direction> {
    match answer.as_bytes() {
        [d] => Direction::from_sign(*d),
        _ => None,
    }
}

fn parse_target(answer: &str) -> Option<Target> {
    match answer.as_bytes() {
        [b'-'] => Some(Target::Missing),
        [l] => letter_to_index(l.to_ascii_uppercase()).map(Target::Player),
        _ => None,
    }
}

impl<R: BufRead, W: Write> OrderSource for LinePlayer<R, W> {
    fn choose_order(&mut self, game: &Game, me: PlayerIndex) -> Option<OrderCode> {
        let player = game.player(me);
        let question = format!(
            "[{} at {}/{}] order (r v h l s $): ",
            player.letter(),
            player.position.x,
            player.position.level.index()
        );
        self.ask(&question, parse_order)
    }

    fn choose_direction(&mut self, _game: &Game, _me: PlayerIndex) -> Option<Direction> {
        self.ask("direction (+ -): ", parse_direction)
    }

    fn choose_long_target(&mut self, _game: &Game, _me: PlayerIndex) -> Option<Target> {
        self.ask("long range target (letter or -): ", parse_target)
    }

    fn choose_short_target(&mut self, _game: &Game, _me: PlayerIndex) -> Option<Target> {
        self.ask("short range target (letter or -): ", parse_target)
    }
}
