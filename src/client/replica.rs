//! Client Replica State Machine
//!
//! Rebuilds the game from the hub's broadcasts alone. Every incoming
//! message goes through [`transition`], a pure function of the current
//! phase and the message that says what to do with it. The replica then
//! carries that out: change phase, ask the [`OrderSource`] and negotiate
//! the answer, or hand a broadcast to the [`ExecuteHandler`].
//!
//! ```text
//!            round            execute
//!   Start ──────────► Orders ─────────► Execute
//!                       ▲                  │
//!                       └───── round ──────┘  (summary written)
//! ```
//!
//! `game_over`, end of stream, garbage, `disco` and `badmsg` end the loop
//! from any phase.

use std::io::Write;

use tracing::{debug, info, instrument, warn};

use crate::client::actor::{ExecuteHandler, OrderSource};
use crate::game::state::{Game, OrderCode, PlayerIndex, RoundState};
use crate::network::link::LineLink;
use crate::network::protocol::{HubMessage, PlayerMessage};

/// A decision the hub is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// `yourturn`
    Order,
    /// `h?`
    Direction,
    /// `l?`
    LongTarget,
    /// `s?`
    ShortTarget,
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ending {
    /// `game_over` arrived.
    GameOver,
    /// The hub closed the stream.
    ServerDisconnected,
    /// `disco<L>`.
    PeerDisconnected(PlayerIndex),
    /// `badmsg<L>`.
    PeerProtocolError(PlayerIndex),
    /// Something arrived that makes no sense here.
    CommunicationError,
    /// The order source ran dry.
    InputExhausted,
}

/// What to do with one incoming message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Switch to this phase.
    Enter(RoundState),
    /// A new round after execution: write the summary, then take orders.
    NextRound,
    /// Obtain a decision and negotiate it with the hub.
    Decide(Decision),
    /// Note a player's order.
    Record {
        /// Ordering player.
        subject: PlayerIndex,
        /// Their order.
        order: OrderCode,
    },
    /// Apply an execute broadcast to the mirror.
    Apply,
    /// Stop.
    End(Ending),
}

fn terminal(message: &HubMessage) -> Option<Ending> {
    match *message {
        HubMessage::EndOfStream => Some(Ending::ServerDisconnected),
        HubMessage::GameOver => Some(Ending::GameOver),
        HubMessage::DecodeError => Some(Ending::CommunicationError),
        HubMessage::Disconnected { subject } => Some(Ending::PeerDisconnected(subject)),
        HubMessage::BadMessage { subject } => Some(Ending::PeerProtocolError(subject)),
        _ => None,
    }
}

/// Decide how `message` is handled in `phase`.
pub fn transition(phase: RoundState, message: &HubMessage) -> Step {
    if let Some(ending) = terminal(message) {
        return Step::End(ending);
    }

    match (phase, *message) {
        (RoundState::Start, HubMessage::Round) => Step::Enter(RoundState::Orders),

        (RoundState::Orders, HubMessage::YourTurn) => Step::Decide(Decision::Order),
        (RoundState::Orders, HubMessage::Ordered { subject, order }) => Step::Record { subject, order },
        (RoundState::Orders, HubMessage::ExecutePhase) => Step::Enter(RoundState::Execute),

        (RoundState::Execute, HubMessage::Round) => Step::NextRound,
        (RoundState::Execute, HubMessage::ChooseHorizontal) => Step::Decide(Decision::Direction),
        (RoundState::Execute, HubMessage::ChooseLong) => Step::Decide(Decision::LongTarget),
        (RoundState::Execute, HubMessage::ChooseShort) => Step::Decide(Decision::ShortTarget),
        (
            RoundState::Execute,
            HubMessage::MovedHorizontally { .. }
            | HubMessage::MovedVertically { .. }
            | HubMessage::TargetedLong { .. }
            | HubMessage::TargetedShort { .. }
            | HubMessage::Looted { .. }
            | HubMessage::Recovered { .. },
        ) => Step::Apply,

        _ => Step::End(Ending::CommunicationError),
    }
}

/// Final result of a replica run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplicaOutcome {
    /// The game ran to completion.
    Finished {
        /// Names of the players tied for the most loot, in player order.
        winners: Vec<String>,
    },
    /// The hub went away.
    ServerDisconnected,
    /// Another player disconnected.
    PeerDisconnected(PlayerIndex),
    /// Another player broke protocol.
    PeerProtocolError(PlayerIndex),
    /// The hub sent something this replica cannot follow.
    CommunicationError,
    /// No more decisions were available.
    InputExhausted,
}

impl ReplicaOutcome {
    /// Process exit status for this outcome.
    pub fn exit_code(&self) -> u8 {
        match self {
            ReplicaOutcome::Finished { .. } => 0,
            ReplicaOutcome::ServerDisconnected => 7,
            ReplicaOutcome::PeerDisconnected(_) => 8,
            ReplicaOutcome::CommunicationError => 9,
            ReplicaOutcome::PeerProtocolError(_) => 10,
            ReplicaOutcome::InputExhausted => 11,
        }
    }
}

/// One player's view of a game, driven by the hub's stream.
pub struct Replica<S, H> {
    game: Game,
    me: PlayerIndex,
    source: S,
    handler: H,
    reprompt: bool,
}

impl<S: OrderSource, H: ExecuteHandler> Replica<S, H> {
    /// Create a replica for player `me` of `game`.
    pub fn new(game: Game, me: PlayerIndex, source: S, handler: H) -> Self {
        Self {
            game,
            me,
            source,
            handler,
            reprompt: false,
        }
    }

    /// Ask the source again after a `no` instead of giving up.
    pub fn with_reprompt(mut self, reprompt: bool) -> Self {
        self.reprompt = reprompt;
        self
    }

    /// The mirrored game.
    pub fn game(&self) -> &Game {
        &self.game
    }

    /// This replica's player index.
    pub fn me(&self) -> PlayerIndex {
        self.me
    }

    /// Follow the hub's stream until the game ends.
    ///
    /// Round summaries, and on a clean finish the winners, go to `summary`.
    #[instrument(skip_all, fields(me = %self.game.player(self.me).letter()))]
    pub async fn run<O: Write>(&mut self, link: &mut LineLink, summary: &mut O) -> ReplicaOutcome {
        let player_count = self.game.player_count();

        loop {
            let message = link.recv_hub(player_count).await;
            let step = transition(self.game.phase, &message);
            debug!(?message, ?step, "incoming");

            let ending = match step {
                Step::Enter(phase) => {
                    self.game.phase = phase;
                    None
                }
                Step::NextRound => {
                    self.write_summary(summary);
                    self.game.phase = RoundState::Orders;
                    None
                }
                Step::Record { subject, order } => {
                    self.handler.record_order(&self.game, subject, order);
                    None
                }
                Step::Apply => match self.handler.process_execute(&mut self.game, &message) {
                    Ok(()) => None,
                    Err(e) => {
                        warn!("Mirror diverged: {}", e);
                        Some(Ending::CommunicationError)
                    }
                },
                Step::Decide(decision) => self.negotiate(link, decision).await,
                Step::End(ending) => Some(ending),
            };

            if let Some(ending) = ending {
                return self.finish(ending, summary);
            }
        }
    }

    /// Send a decision and wait for `yes`, asking again after `no` when allowed.
    async fn negotiate(&mut self, link: &mut LineLink, decision: Decision) -> Option<Ending> {
        let player_count = self.game.player_count();

        loop {
            let Some(answer) = self.decide(decision) else {
                return Some(Ending::InputExhausted);
            };
            if let Err(e) = link.send_player(&answer).await {
                debug!("Write to hub failed: {}", e);
                return Some(Ending::ServerDisconnected);
            }

            match link.recv_hub(player_count).await {
                HubMessage::Ack => return None,
                HubMessage::Nack if self.reprompt => {
                    info!("{:?} rejected, asking again", answer);
                }
                HubMessage::Nack => {
                    warn!("{:?} rejected", answer);
                    return Some(Ending::CommunicationError);
                }
                other => return Some(terminal(&other).unwrap_or(Ending::CommunicationError)),
            }
        }
    }

    fn decide(&mut self, decision: Decision) -> Option<PlayerMessage> {
        let (game, me) = (&self.game, self.me);
        match decision {
            Decision::Order => self.source.choose_order(game, me).map(PlayerMessage::Play),
            Decision::Direction => self.source.choose_direction(game, me).map(PlayerMessage::Sideways),
            Decision::LongTarget => self.source.choose_long_target(game, me).map(PlayerMessage::TargetLong),
            Decision::ShortTarget => self.source.choose_short_target(game, me).map(PlayerMessage::TargetShort),
        }
    }

    fn write_summary<O: Write>(&self, out: &mut O) {
        if let Err(e) = self.game.write_summary(out) {
            warn!("Failed to write summary: {}", e);
        }
    }

    fn finish<O: Write>(&mut self, ending: Ending, summary: &mut O) -> ReplicaOutcome {
        debug!(digest = %hex::encode(self.game.compute_digest()), ?ending, "replica stopped");

        match ending {
            Ending::GameOver => {
                self.game.game_over = true;
                self.write_summary(summary);
                if let Err(e) = self.game.write_winners(summary) {
                    warn!("Failed to write winners: {}", e);
                }
                let winners = self
                    .game
                    .winners()
                    .into_iter()
                    .map(|i| self.game.player(i).name.clone())
                    .collect();
                ReplicaOutcome::Finished { winners }
            }
            Ending::ServerDisconnected => ReplicaOutcome::ServerDisconnected,
            Ending::PeerDisconnected(i) => ReplicaOutcome::PeerDisconnected(i),
            Ending::PeerProtocolError(i) => ReplicaOutcome::PeerProtocolError(i),
            Ending::CommunicationError => ReplicaOutcome::CommunicationError,
            Ending::InputExhausted => ReplicaOutcome::InputExhausted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    use crate::client::actor::{AutoPlayer, LinePlayer};
    use crate::client::mirror::Mirror;
    use crate::game::engine::TurnEngine;
    use crate::game::rounds::{run_game, GameOutcome};
    use crate::game::state::{Direction, GameConfig};
    use crate::network::link::{link_pair, Incoming};
    use crate::network::protocol::Target;

    fn game(n: usize, config: &GameConfig) -> Game {
        let names: Vec<String> = (0..n).map(|i| format!("p{i}")).collect();
        Game::new(names, config).unwrap()
    }

    /// Order source that must never be consulted.
    struct Silent;

    impl OrderSource for Silent {
        fn choose_order(&mut self, _: &Game, _: PlayerIndex) -> Option<OrderCode> {
            None
        }
        fn choose_direction(&mut self, _: &Game, _: PlayerIndex) -> Option<Direction> {
            None
        }
        fn choose_long_target(&mut self, _: &Game, _: PlayerIndex) -> Option<Target> {
            None
        }
        fn choose_short_target(&mut self, _: &Game, _: PlayerIndex) -> Option<Target> {
            None
        }
    }

    #[test]
    fn test_terminal_messages_win_in_every_phase() {
        for phase in [RoundState::Start, RoundState::Orders, RoundState::Execute] {
            assert_eq!(transition(phase, &HubMessage::EndOfStream), Step::End(Ending::ServerDisconnected));
            assert_eq!(transition(phase, &HubMessage::GameOver), Step::End(Ending::GameOver));
            assert_eq!(transition(phase, &HubMessage::DecodeError), Step::End(Ending::CommunicationError));
            assert_eq!(
                transition(phase, &HubMessage::Disconnected { subject: 2 }),
                Step::End(Ending::PeerDisconnected(2))
            );
            assert_eq!(
                transition(phase, &HubMessage::BadMessage { subject: 0 }),
                Step::End(Ending::PeerProtocolError(0))
            );
        }
    }

    #[test]
    fn test_phase_table() {
        use RoundState::*;
        let comm = Step::End(Ending::CommunicationError);

        assert_eq!(transition(Start, &HubMessage::Round), Step::Enter(Orders));
        assert_eq!(transition(Start, &HubMessage::YourTurn), comm);

        assert_eq!(transition(Orders, &HubMessage::YourTurn), Step::Decide(Decision::Order));
        assert_eq!(
            transition(Orders, &HubMessage::Ordered { subject: 1, order: OrderCode::Loot }),
            Step::Record { subject: 1, order: OrderCode::Loot }
        );
        assert_eq!(transition(Orders, &HubMessage::ExecutePhase), Step::Enter(Execute));
        assert_eq!(transition(Orders, &HubMessage::Round), comm);
        assert_eq!(transition(Orders, &HubMessage::Looted { subject: 0 }), comm);

        assert_eq!(transition(Execute, &HubMessage::Round), Step::NextRound);
        assert_eq!(transition(Execute, &HubMessage::ChooseHorizontal), Step::Decide(Decision::Direction));
        assert_eq!(transition(Execute, &HubMessage::ChooseLong), Step::Decide(Decision::LongTarget));
        assert_eq!(transition(Execute, &HubMessage::ChooseShort), Step::Decide(Decision::ShortTarget));
        assert_eq!(transition(Execute, &HubMessage::Recovered { subject: 0 }), Step::Apply);
        assert_eq!(transition(Execute, &HubMessage::YourTurn), comm);
        assert_eq!(transition(Execute, &HubMessage::Ack), comm);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(ReplicaOutcome::Finished { winners: vec![] }.exit_code(), 0);
        assert_eq!(ReplicaOutcome::ServerDisconnected.exit_code(), 7);
        assert_eq!(ReplicaOutcome::PeerDisconnected(0).exit_code(), 8);
        assert_eq!(ReplicaOutcome::CommunicationError.exit_code(), 9);
        assert_eq!(ReplicaOutcome::PeerProtocolError(1).exit_code(), 10);
        assert_eq!(ReplicaOutcome::InputExhausted.exit_code(), 11);
    }

    #[tokio::test]
    async fn test_peer_disconnect_stops_without_reading_further() {
        let config = GameConfig::default();
        let (mut hub, mut client) = link_pair();
        for line in ["round", "orderedAr", "discoB", "round"] {
            hub.send_line(line).await.unwrap();
        }

        let mut replica = Replica::new(game(2, &config), 0, Silent, Mirror);
        let mut out = Vec::new();
        assert_eq!(replica.run(&mut client, &mut out).await, ReplicaOutcome::PeerDisconnected(1));
        assert!(out.is_empty());
        assert_eq!(client.recv().await, Incoming::Line("round".to_string()));
    }

    #[tokio::test]
    async fn test_nack_without_reprompt_is_communication_error() {
        let config = GameConfig::default();
        let (mut hub, mut client) = link_pair();
        for line in ["round", "yourturn", "no"] {
            hub.send_line(line).await.unwrap();
        }

        let mut replica = Replica::new(game(1, &config), 0, AutoPlayer::new(1), Mirror);
        let outcome = replica.run(&mut client, &mut Vec::new()).await;
        assert_eq!(outcome, ReplicaOutcome::CommunicationError);
    }

    #[tokio::test]
    async fn test_human_is_asked_again_after_nack() {
        let config = GameConfig { width: 2, max_loot_per_level: 0, ..Default::default() };
        let (mut hub, mut client) = link_pair();
        for line in [
            "round", "yourturn", "no", "yes", "orderedAh", "execute", "h?", "no", "yes", "hmoveA+",
            "game_over",
        ] {
            hub.send_line(line).await.unwrap();
        }

        let human = LinePlayer::new(Cursor::new("h\nh\n-\n+\n"), std::io::sink());
        let mut replica = Replica::new(game(1, &config), 0, human, Mirror).with_reprompt(true);
        let mut out = Vec::new();
        let outcome = replica.run(&mut client, &mut out).await;

        assert_eq!(outcome, ReplicaOutcome::Finished { winners: vec!["p0".to_string()] });
        assert_eq!(replica.game().player(0).position.x, 1);
        assert!(replica.game().game_over);
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "A: p0:1/0 $=0,h=0\nCarriage 0: $=0,$=0\nCarriage 1: $=0,$=0\nWinner(s):p0\n");

        drop(client);
        let mut sent = Vec::new();
        while let Incoming::Line(line) = hub.recv().await {
            sent.push(line);
        }
        assert_eq!(sent, vec!["playh", "playh", "sideways-", "sideways+"]);
    }

    #[tokio::test]
    async fn test_input_exhausted() {
        let config = GameConfig::default();
        let (mut hub, mut client) = link_pair();
        for line in ["round", "yourturn"] {
            hub.send_line(line).await.unwrap();
        }
        let mut replica = Replica::new(game(1, &config), 0, Silent, Mirror);
        assert_eq!(replica.run(&mut client, &mut Vec::new()).await, ReplicaOutcome::InputExhausted);
    }

    #[tokio::test]
    async fn test_server_hangup_and_garbage() {
        let config = GameConfig::default();

        let (mut hub, mut client) = link_pair();
        hub.send_line("round").await.unwrap();
        hub.close().await;
        let mut replica = Replica::new(game(1, &config), 0, Silent, Mirror);
        assert_eq!(replica.run(&mut client, &mut Vec::new()).await, ReplicaOutcome::ServerDisconnected);

        let (mut hub, mut client) = link_pair();
        // A peer letter beyond the player count is garbage to this replica
        for line in ["round", "orderedCr"] {
            hub.send_line(line).await.unwrap();
        }
        let mut replica = Replica::new(game(2, &config), 0, Silent, Mirror);
        assert_eq!(replica.run(&mut client, &mut Vec::new()).await, ReplicaOutcome::CommunicationError);
    }

    #[tokio::test]
    async fn test_replicas_track_the_hub_exactly() {
        let config = GameConfig { width: 4, num_rounds: 12, seed: 77, ..Default::default() };
        let players = 3;

        let (hub_ends, player_ends): (Vec<_>, Vec<_>) = (0..players).map(|_| link_pair()).unzip();
        let mut engine = TurnEngine::new(game(players, &config), hub_ends).unwrap();
        let hub = tokio::spawn(async move {
            let outcome = run_game(&mut engine).await;
            engine.close_all().await;
            (outcome, engine.game().compute_digest(), engine.game().total_loot())
        });

        let mut clients = Vec::new();
        for (me, mut link) in player_ends.into_iter().enumerate() {
            let mirror = game(players, &config);
            clients.push(tokio::spawn(async move {
                let mut replica = Replica::new(mirror, me, AutoPlayer::new(100 + me as u64), Mirror);
                let mut out = Vec::new();
                let outcome = replica.run(&mut link, &mut out).await;
                (outcome, replica.game().compute_digest(), String::from_utf8(out).unwrap())
            }));
        }

        let (hub_outcome, hub_digest, hub_loot) = hub.await.unwrap();
        let winners = match hub_outcome {
            GameOutcome::Completed { winners } => winners,
            other => panic!("hub did not complete: {other:?}"),
        };
        let expected: Vec<String> = winners.iter().map(|i| format!("p{i}")).collect();
        assert_eq!(hub_loot, game(players, &config).total_loot());

        for client in clients {
            let (outcome, digest, out) = client.await.unwrap();
            assert_eq!(outcome, ReplicaOutcome::Finished { winners: expected.clone() });
            assert_eq!(digest, hub_digest);
            assert_eq!(out.matches("Carriage 0:").count(), 12);
            assert!(out.ends_with(&format!("Winner(s):{}\n", expected.join(","))));
        }
    }
}
