//! Protocol Messages
//!
//! Line-oriented wire format between the hub and its players. Every message
//! is one short ASCII line; the `\n` terminator is added and stripped by the
//! link, never by this codec.
//!
//! Players are named on the wire by a single identity letter, `A` for index
//! 0 through `Z` for index 25.

use crate::game::state::{Direction, OrderCode, PlayerIndex, MAX_PLAYERS};

/// Longest line either side will accept, excluding the terminator.
pub const MAX_LINE_LEN: usize = 19;

const LETTER_BASE: u8 = b'A';
const MISSING_OBJECT: u8 = b'-';

// =============================================================================
// IDENTITY LETTERS
// =============================================================================

/// Identity letter of a player index.
#[inline]
pub fn index_to_letter(index: PlayerIndex) -> char {
    debug_assert!(index < MAX_PLAYERS, "player index {index} has no letter");
    (LETTER_BASE + index as u8) as char
}

/// Player index of an identity letter, if it is one.
#[inline]
pub fn letter_to_index(letter: u8) -> Option<PlayerIndex> {
    if letter.is_ascii_uppercase() {
        Some((letter - LETTER_BASE) as PlayerIndex)
    } else {
        None
    }
}

/// Object of a targeting message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    /// A specific player.
    Player(PlayerIndex),
    /// No target selected (`-` on the wire).
    Missing,
}

impl Target {
    /// The targeted player, if any.
    pub fn player(self) -> Option<PlayerIndex> {
        match self {
            Target::Player(index) => Some(index),
            Target::Missing => None,
        }
    }

    fn to_wire(self) -> char {
        match self {
            Target::Player(index) => index_to_letter(index),
            Target::Missing => MISSING_OBJECT as char,
        }
    }

    fn from_wire(byte: u8) -> Option<Self> {
        if byte == MISSING_OBJECT {
            Some(Target::Missing)
        } else {
            letter_to_index(byte).map(Target::Player)
        }
    }

    fn in_range(self, player_count: usize) -> bool {
        match self {
            Target::Player(index) => index < player_count,
            Target::Missing => true,
        }
    }
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from the hub to a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubMessage {
    /// `yes`: the last reply was accepted.
    Ack,
    /// `no`: the last reply was rejected.
    Nack,
    /// `round`: a new round starts.
    Round,
    /// `execute`: all orders are in; resolution starts.
    ExecutePhase,
    /// `yourturn`: send an order now.
    YourTurn,
    /// `game_over`: the game has ended.
    GameOver,
    /// `h?`: choose a direction.
    ChooseHorizontal,
    /// `l?`: choose a long range target.
    ChooseLong,
    /// `s?`: choose a short range target.
    ChooseShort,

    /// The hub closed the connection. Never sent.
    EndOfStream,
    /// A line that matched nothing. Never sent.
    DecodeError,

    /// `badmsg<L>`: player sent something unacceptable.
    BadMessage {
        /// Offending player.
        subject: PlayerIndex,
    },
    /// `disco<L>`: player disconnected.
    Disconnected {
        /// Departed player.
        subject: PlayerIndex,
    },
    /// `driedout<L>`: player recovered and cleared their hits.
    Recovered {
        /// Recovering player.
        subject: PlayerIndex,
    },
    /// `hmove<L><d>`: player moved one car.
    MovedHorizontally {
        /// Moving player.
        subject: PlayerIndex,
        /// Direction of travel.
        direction: Direction,
    },
    /// `vmove<L>`: player switched level.
    MovedVertically {
        /// Moving player.
        subject: PlayerIndex,
    },
    /// `long<L><T>`: long range shot.
    TargetedLong {
        /// Shooter.
        subject: PlayerIndex,
        /// Victim, or `Missing` if nobody was in range.
        object: Target,
    },
    /// `short<L><T>`: short range shot.
    TargetedShort {
        /// Shooter.
        subject: PlayerIndex,
        /// Victim, or `Missing` if nobody was in range.
        object: Target,
    },
    /// `looted<L>`: player tried to pick up loot.
    Looted {
        /// Looting player.
        subject: PlayerIndex,
    },
    /// `ordered<L><C>`: player committed an order.
    Ordered {
        /// Ordering player.
        subject: PlayerIndex,
        /// The order.
        order: OrderCode,
    },
}

impl HubMessage {
    /// Encode to a wire line without terminator.
    ///
    /// Returns `None` for the local-only variants.
    pub fn encode(&self) -> Option<String> {
        let line = match *self {
            HubMessage::Ack => "yes".to_string(),
            HubMessage::Nack => "no".to_string(),
            HubMessage::Round => "round".to_string(),
            HubMessage::ExecutePhase => "execute".to_string(),
            HubMessage::YourTurn => "yourturn".to_string(),
            HubMessage::GameOver => "game_over".to_string(),
            HubMessage::ChooseHorizontal => "h?".to_string(),
            HubMessage::ChooseLong => "l?".to_string(),
            HubMessage::ChooseShort => "s?".to_string(),
            HubMessage::EndOfStream | HubMessage::DecodeError => return None,
            HubMessage::BadMessage { subject } => format!("badmsg{}", index_to_letter(subject)),
            HubMessage::Disconnected { subject } => format!("disco{}", index_to_letter(subject)),
            HubMessage::Recovered { subject } => format!("driedout{}", index_to_letter(subject)),
            HubMessage::MovedHorizontally { subject, direction } => {
                format!("hmove{}{}", index_to_letter(subject), direction.sign() as char)
            }
            HubMessage::MovedVertically { subject } => format!("vmove{}", index_to_letter(subject)),
            HubMessage::TargetedLong { subject, object } => {
                format!("long{}{}", index_to_letter(subject), object.to_wire())
            }
            HubMessage::TargetedShort { subject, object } => {
                format!("short{}{}", index_to_letter(subject), object.to_wire())
            }
            HubMessage::Looted { subject } => format!("looted{}", index_to_letter(subject)),
            HubMessage::Ordered { subject, order } => {
                format!("ordered{}{}", index_to_letter(subject), order.code() as char)
            }
        };
        Some(line)
    }

    /// Decode a wire line (terminator already stripped).
    ///
    /// Anything unrecognised becomes [`HubMessage::DecodeError`].
    pub fn decode(line: &str) -> Self {
        Self::parse(line).unwrap_or(HubMessage::DecodeError)
    }

    /// Decode, additionally rejecting references to players beyond `player_count`.
    pub fn decode_for(line: &str, player_count: usize) -> Self {
        let message = Self::decode(line);
        if message.refers_within(player_count) {
            message
        } else {
            HubMessage::DecodeError
        }
    }

    /// The player a parameterized message is about.
    pub fn subject(&self) -> Option<PlayerIndex> {
        match *self {
            HubMessage::BadMessage { subject }
            | HubMessage::Disconnected { subject }
            | HubMessage::Recovered { subject }
            | HubMessage::MovedHorizontally { subject, .. }
            | HubMessage::MovedVertically { subject }
            | HubMessage::TargetedLong { subject, .. }
            | HubMessage::TargetedShort { subject, .. }
            | HubMessage::Looted { subject }
            | HubMessage::Ordered { subject, .. } => Some(subject),
            _ => None,
        }
    }

    fn refers_within(&self, player_count: usize) -> bool {
        let object_ok = match *self {
            HubMessage::TargetedLong { object, .. } | HubMessage::TargetedShort { object, .. } => {
                object.in_range(player_count)
            }
            _ => true,
        };
        object_ok && self.subject().map_or(true, |s| s < player_count)
    }

    fn parse(line: &str) -> Option<Self> {
        if line.len() > MAX_LINE_LEN {
            return None;
        }

        let fixed = match line {
            "yes" => Some(HubMessage::Ack),
            "no" => Some(HubMessage::Nack),
            "round" => Some(HubMessage::Round),
            "execute" => Some(HubMessage::ExecutePhase),
            "yourturn" => Some(HubMessage::YourTurn),
            "game_over" => Some(HubMessage::GameOver),
            "h?" => Some(HubMessage::ChooseHorizontal),
            "l?" => Some(HubMessage::ChooseLong),
            "s?" => Some(HubMessage::ChooseShort),
            _ => None,
        };
        if fixed.is_some() {
            return fixed;
        }

        if let Some(rest) = line.strip_prefix("badmsg") {
            let [l] = rest.as_bytes() else { return None };
            return Some(HubMessage::BadMessage { subject: letter_to_index(*l)? });
        }
        if let Some(rest) = line.strip_prefix("disco") {
            let [l] = rest.as_bytes() else { return None };
            return Some(HubMessage::Disconnected { subject: letter_to_index(*l)? });
        }
        if let Some(rest) = line.strip_prefix("driedout") {
            let [l] = rest.as_bytes() else { return None };
            return Some(HubMessage::Recovered { subject: letter_to_index(*l)? });
        }
        if let Some(rest) = line.strip_prefix("hmove") {
            let [l, d] = rest.as_bytes() else { return None };
            return Some(HubMessage::MovedHorizontally {
                subject: letter_to_index(*l)?,
                direction: Direction::from_sign(*d)?,
            });
        }
        if let Some(rest) = line.strip_prefix("vmove") {
            let [l] = rest.as_bytes() else { return None };
            return Some(HubMessage::MovedVertically { subject: letter_to_index(*l)? });
        }
        if let Some(rest) = line.strip_prefix("long") {
            let [l, t] = rest.as_bytes() else { return None };
            return Some(HubMessage::TargetedLong {
                subject: letter_to_index(*l)?,
                object: Target::from_wire(*t)?,
            });
        }
        if let Some(rest) = line.strip_prefix("short") {
            let [l, t] = rest.as_bytes() else { return None };
            return Some(HubMessage::TargetedShort {
                subject: letter_to_index(*l)?,
                object: Target::from_wire(*t)?,
            });
        }
        if let Some(rest) = line.strip_prefix("looted") {
            let [l] = rest.as_bytes() else { return None };
            return Some(HubMessage::Looted { subject: letter_to_index(*l)? });
        }
        if let Some(rest) = line.strip_prefix("ordered") {
            let [l, c] = rest.as_bytes() else { return None };
            return Some(HubMessage::Ordered {
                subject: letter_to_index(*l)?,
                order: OrderCode::from_code(*c)?,
            });
        }

        None
    }
}

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from a player to the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerMessage {
    /// A line that matched nothing. Never sent.
    DecodeError,
    /// The player closed the connection. Never sent.
    EndOfStream,
    /// `play<C>`: the order for this round.
    Play(OrderCode),
    /// `sideways<d>`: direction for a horizontal move.
    Sideways(Direction),
    /// `target_short<T>`: short range target.
    TargetShort(Target),
    /// `target_long<T>`: long range target.
    TargetLong(Target),
}

impl PlayerMessage {
    /// Encode to a wire line without terminator.
    ///
    /// Returns `None` for the local-only variants.
    pub fn encode(&self) -> Option<String> {
        let line = match *self {
            PlayerMessage::DecodeError | PlayerMessage::EndOfStream => return None,
            PlayerMessage::Play(order) => format!("play{}", order.code() as char),
            PlayerMessage::Sideways(direction) => format!("sideways{}", direction.sign() as char),
            PlayerMessage::TargetShort(target) => format!("target_short{}", target.to_wire()),
            PlayerMessage::TargetLong(target) => format!("target_long{}", target.to_wire()),
        };
        Some(line)
    }

    /// Decode a wire line (terminator already stripped).
    ///
    /// Object letters are not range-checked here; the engine rejects
    /// unknown players with `no` like any other illegal target.
    pub fn decode(line: &str) -> Self {
        Self::parse(line).unwrap_or(PlayerMessage::DecodeError)
    }

    fn parse(line: &str) -> Option<Self> {
        if line.len() > MAX_LINE_LEN {
            return None;
        }

        if let Some(rest) = line.strip_prefix("play") {
            let [c] = rest.as_bytes() else { return None };
            return OrderCode::from_code(*c).map(PlayerMessage::Play);
        }
        if let Some(rest) = line.strip_prefix("sideways") {
            let [d] = rest.as_bytes() else { return None };
            return Direction::from_sign(*d).map(PlayerMessage::Sideways);
        }
        if let Some(rest) = line.strip_prefix("target_short") {
            let [t] = rest.as_bytes() else { return None };
            return Target::from_wire(*t).map(PlayerMessage::TargetShort);
        }
        if let Some(rest) = line.strip_prefix("target_long") {
            let [t] = rest.as_bytes() else { return None };
            return Target::from_wire(*t).map(PlayerMessage::TargetLong);
        }

        None
    }
}

// =============================================================================
// TESTS
// =============================================================================
