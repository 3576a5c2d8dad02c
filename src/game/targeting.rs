//! Geometry and Targeting
//!
//! Pure functions over a [`Game`]: nearest neighbours, legal target sets
//! and the legality checks shared by the hub engine and client mirrors.
//!
//! Long range fire on the roof travels along the train and stops at the
//! first body in its path. Inside a car only the neighbouring cars can be
//! reached, and line of sight does not matter.

use crate::game::state::{Direction, Game, Level, PlayerIndex};
use crate::network::protocol::Target;

/// Legal targets for one shooter, one flag per player index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Targets {
    flags: Vec<bool>,
}

impl Targets {
    fn none(player_count: usize) -> Self {
        Self { flags: vec![false; player_count] }
    }

    /// Whether any player can be targeted.
    #[inline]
    pub fn any(&self) -> bool {
        self.flags.iter().any(|&f| f)
    }

    /// Whether `index` can be targeted.
    #[inline]
    pub fn contains(&self, index: PlayerIndex) -> bool {
        self.flags.get(index).copied().unwrap_or(false)
    }

    /// Targetable player indices in order.
    pub fn iter(&self) -> impl Iterator<Item = PlayerIndex> + '_ {
        self.flags
            .iter()
            .enumerate()
            .filter(|(_, &f)| f)
            .map(|(i, _)| i)
    }
}

/// Distance to the closest other player on each side: `(left, right)`.
///
/// Only players on the same level count, and players in the same car are
/// ignored. A side with nobody on it reports the board width, which is
/// farther than any real distance.
pub fn closest(game: &Game, player: PlayerIndex) -> (usize, usize) {
    let me = game.player(player).position;
    let mut left = game.width;
    let mut right = game.width;

    for other in &game.players {
        if other.index == player {
            continue;
        }
        let pos = other.position;
        if pos.level != me.level || pos.x == me.x {
            continue;
        }
        if pos.x < me.x {
            left = left.min(me.x - pos.x);
        } else {
            right = right.min(pos.x - me.x);
        }
    }

    (left, right)
}

/// Players a short range shot from `player` can hit: anyone else in the
/// same car and level.
pub fn short_targets(game: &Game, player: PlayerIndex) -> Targets {
    let me = game.player(player).position;
    let mut targets = Targets::none(game.player_count());

    for other in &game.players {
        if other.index != player && other.position == me {
            targets.flags[other.index] = true;
        }
    }

    targets
}

/// Players a long range shot from `player` can hit.
///
/// Lower level: exactly the lower-level players in the neighbouring cars.
/// Upper level: the nearest upper-level player on each side.
pub fn long_targets(game: &Game, player: PlayerIndex) -> Targets {
    let me = game.player(player).position;
    let mut targets = Targets::none(game.player_count());

    match me.level {
        Level::Lower => {
            for other in &game.players {
                let pos = other.position;
                if other.index != player
                    && pos.level == Level::Lower
                    && pos.x.abs_diff(me.x) == 1
                {
                    targets.flags[other.index] = true;
                }
            }
        }
        Level::Upper => {
            let (left, right) = closest(game, player);
            for other in &game.players {
                let pos = other.position;
                if other.index == player || pos.level != me.level || pos.x == me.x {
                    continue;
                }
                targets.flags[other.index] = if pos.x < me.x {
                    me.x - pos.x == left
                } else {
                    pos.x - me.x == right
                };
            }
        }
    }

    targets
}

/// Why a requested move or shot was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum IllegalMove {
    /// The move would leave the train.
    #[error("move leaves the train")]
    OffBoard,
    /// The object letter names nobody in this game.
    #[error("no such player")]
    NoSuchPlayer,
    /// Players cannot target themselves.
    #[error("cannot target self")]
    SelfTarget,
    /// Shots never cross levels.
    #[error("target is on another level")]
    DifferentLevel,
    /// Long range needs distance; short range needs the same car.
    #[error("target is in the wrong car")]
    WrongCar,
    /// Lower-level long shots only reach the neighbouring cars.
    #[error("target is not adjacent")]
    NotAdjacent,
    /// Someone closer on that side takes the shot.
    #[error("line of sight is blocked")]
    Blocked,
    /// Declining to shoot is only allowed when nobody can be hit.
    #[error("a legal target exists")]
    TargetAvailable,
}

/// Check a horizontal move and return the car it lands in.
pub fn validate_horizontal(
    game: &Game,
    player: PlayerIndex,
    direction: Direction,
) -> Result<usize, IllegalMove> {
    let x = game.player(player).position.x;
    direction.step(x, game.width).ok_or(IllegalMove::OffBoard)
}

/// Check a long range shot.
pub fn validate_long(game: &Game, shooter: PlayerIndex, target: Target) -> Result<(), IllegalMove> {
    let object = match target {
        Target::Missing => {
            return if long_targets(game, shooter).any() {
                Err(IllegalMove::TargetAvailable)
            } else {
                Ok(())
            };
        }
        Target::Player(object) => object,
    };

    if !game.has_player(object) {
        return Err(IllegalMove::NoSuchPlayer);
    }
    if object == shooter {
        return Err(IllegalMove::SelfTarget);
    }
    let me = game.player(shooter).position;
    let them = game.player(object).position;
    if me.level != them.level {
        return Err(IllegalMove::DifferentLevel);
    }
    if me.x == them.x {
        return Err(IllegalMove::WrongCar);
    }
    if long_targets(game, shooter).contains(object) {
        Ok(())
    } else if me.level == Level::Lower {
        Err(IllegalMove::NotAdjacent)
    } else {
        Err(IllegalMove::Blocked)
    }
}

/// Check a short range shot.
pub fn validate_short(game: &Game, shooter: PlayerIndex, target: Target) -> Result<(), IllegalMove> {
    let object = match target {
        Target::Missing => {
            return if short_targets(game, shooter).any() {
                Err(IllegalMove::TargetAvailable)
            } else {
                Ok(())
            };
        }
        Target::Player(object) => object,
    };

    if !game.has_player(object) {
        return Err(IllegalMove::NoSuchPlayer);
    }
    if object == shooter {
        return Err(IllegalMove::SelfTarget);
    }
    let me = game.player(shooter).position;
    let them = game.player(object).position;
    if me.level != them.level {
        return Err(IllegalMove::DifferentLevel);
    }
    if me.x != them.x {
        return Err(IllegalMove::WrongCar);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::{GameConfig, Position};
    use proptest::prelude::*;

    /// Build a game with players at the given `(x, level)` spots.
    fn board(width: usize, spots: &[(usize, u8)]) -> Game {
        let config = GameConfig { width, max_loot_per_level: 0, ..Default::default() };
        let names: Vec<String> = (0..spots.len()).map(|i| format!("p{i}")).collect();
        let mut game = Game::new(names, &config).unwrap();
        for (i, &(x, y)) in spots.iter().enumerate() {
            let level = if y == 0 { Level::Lower } else { Level::Upper };
            game.player_mut(i).position = Position::new(x, level);
        }
        game
    }

    #[test]
    fn test_closest_missing_sides_report_width() {
        let game = board(5, &[(2, 0)]);
        assert_eq!(closest(&game, 0), (5, 5));
    }

    #[test]
    fn test_closest_ignores_other_level_and_same_car() {
        let game = board(5, &[(2, 1), (1, 0), (2, 1), (4, 1), (3, 1)]);
        // (1,0) is on the other level, (2,1) shares the car
        assert_eq!(closest(&game, 0), (5, 1));
    }

    #[test]
    fn test_short_targets_same_spot_only() {
        let game = board(3, &[(1, 0), (1, 0), (1, 1), (0, 0)]);
        let targets = short_targets(&game, 0);
        assert!(targets.any());
        assert_eq!(targets.iter().collect::<Vec<_>>(), vec![1]);

        let alone = board(3, &[(0, 0), (1, 0)]);
        assert!(!short_targets(&alone, 0).any());
    }

    #[test]
    fn test_long_targets_lower_level_neighbours() {
        let game = board(5, &[(2, 0), (1, 0), (3, 0), (4, 0), (2, 0), (3, 1)]);
        let targets = long_targets(&game, 0);
        assert_eq!(targets.iter().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_long_targets_upper_level_nearest_each_side() {
        let game = board(6, &[(2, 1), (0, 1), (1, 1), (5, 1), (4, 0)]);
        let targets = long_targets(&game, 0);
        // (1,1) blocks (0,1); nearest on the right is (5,1)
        assert_eq!(targets.iter().collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn test_long_targets_upper_level_ties_both_legal() {
        let game = board(5, &[(0, 1), (3, 1), (3, 1)]);
        let targets = long_targets(&game, 0);
        assert_eq!(targets.iter().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_long_targets_upper_level_alone() {
        let game = board(4, &[(1, 1), (1, 1), (3, 0)]);
        assert!(!long_targets(&game, 0).any());
    }

    #[test]
    fn test_validate_long_lower_level_distance_two() {
        // Player A at (0,0), player B at (2,0): too far inside the train
        let game = board(3, &[(0, 0), (2, 0)]);
        assert_eq!(
            validate_long(&game, 0, Target::Player(1)),
            Err(IllegalMove::NotAdjacent)
        );
        assert_eq!(validate_long(&game, 0, Target::Missing), Ok(()));
    }

    #[test]
    fn test_validate_long_rejections() {
        let game = board(4, &[(1, 1), (1, 1), (0, 0), (3, 1), (2, 1)]);
        assert_eq!(validate_long(&game, 0, Target::Player(9)), Err(IllegalMove::NoSuchPlayer));
        assert_eq!(validate_long(&game, 0, Target::Player(0)), Err(IllegalMove::SelfTarget));
        assert_eq!(validate_long(&game, 0, Target::Player(1)), Err(IllegalMove::WrongCar));
        assert_eq!(validate_long(&game, 0, Target::Player(2)), Err(IllegalMove::DifferentLevel));
        assert_eq!(validate_long(&game, 0, Target::Player(3)), Err(IllegalMove::Blocked));
        assert_eq!(validate_long(&game, 0, Target::Player(4)), Ok(()));
        assert_eq!(validate_long(&game, 0, Target::Missing), Err(IllegalMove::TargetAvailable));
    }

    #[test]
    fn test_validate_short() {
        let game = board(3, &[(1, 0), (1, 0), (1, 1), (2, 0)]);
        assert_eq!(validate_short(&game, 0, Target::Player(1)), Ok(()));
        assert_eq!(validate_short(&game, 0, Target::Player(2)), Err(IllegalMove::DifferentLevel));
        assert_eq!(validate_short(&game, 0, Target::Player(3)), Err(IllegalMove::WrongCar));
        assert_eq!(validate_short(&game, 0, Target::Missing), Err(IllegalMove::TargetAvailable));
        assert_eq!(validate_short(&game, 3, Target::Missing), Ok(()));
    }

    #[test]
    fn test_validate_horizontal_edges() {
        let game = board(3, &[(2, 0), (0, 0)]);
        assert_eq!(validate_horizontal(&game, 0, Direction::Right), Err(IllegalMove::OffBoard));
        assert_eq!(validate_horizontal(&game, 0, Direction::Left), Ok(1));
        assert_eq!(validate_horizontal(&game, 1, Direction::Left), Err(IllegalMove::OffBoard));
    }

    fn spots() -> impl Strategy<Value = (usize, Vec<(usize, u8)>)> {
        (1usize..8).prop_flat_map(|width| {
            (
                Just(width),
                prop::collection::vec((0..width, 0u8..2), 1..8),
            )
        })
    }

    proptest! {
        #[test]
        fn prop_closest_sentinel_is_width((width, spots) in spots()) {
            let game = board(width, &spots);
            for p in 0..spots.len() {
                let (left, right) = closest(&game, p);
                let me = game.player(p).position;
                let has_left = game.players.iter().any(|o| o.position.level == me.level && o.position.x < me.x);
                let has_right = game.players.iter().any(|o| o.position.level == me.level && o.position.x > me.x);
                prop_assert_eq!(left == width, !has_left);
                prop_assert_eq!(right == width, !has_right);
            }
        }

        #[test]
        fn prop_lower_long_targets_are_neighbouring_cars((width, spots) in spots()) {
            let game = board(width, &spots);
            for p in 0..spots.len() {
                let me = game.player(p).position;
                if me.level != Level::Lower {
                    continue;
                }
                let targets = long_targets(&game, p);
                for o in &game.players {
                    let expected = o.index != p
                        && o.position.level == Level::Lower
                        && (o.position.x + 1 == me.x || o.position.x == me.x + 1);
                    prop_assert_eq!(targets.contains(o.index), expected);
                }
            }
        }

        #[test]
        fn prop_upper_long_targets_have_no_closer_blocker((width, spots) in spots()) {
            let game = board(width, &spots);
            for p in 0..spots.len() {
                let me = game.player(p).position;
                if me.level != Level::Upper {
                    continue;
                }
                let targets = long_targets(&game, p);
                for o in &game.players {
                    if o.index == p || o.position.level != Level::Upper || o.position.x == me.x {
                        prop_assert!(!targets.contains(o.index));
                        continue;
                    }
                    let d = o.position.x.abs_diff(me.x);
                    let same_side = |x: usize| (x < me.x) == (o.position.x < me.x) && x != me.x;
                    let blocked = game.players.iter().any(|b| {
                        b.position.level == Level::Upper
                            && same_side(b.position.x)
                            && b.position.x.abs_diff(me.x) < d
                    });
                    prop_assert_eq!(targets.contains(o.index), !blocked);
                }
            }
        }
    }
}
