//! Move resolution against walls, power-ups and penalty zones.
//! Pure functions over room state; all timing and persistence side
//! effects stay in the room actor.

use rand::Rng;

use super::room::{GameState, Player, PowerUp};
use super::{PENALTY_THRESHOLD, TRACK_LENGTH};

/// Direction of a move command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
}

/// Effect of a resolved move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Out-of-bounds right move; nothing changed, nothing to broadcast
    Ignored,
    /// An active wall absorbed the move; position unchanged
    WallHit { position: u8, destroyed: bool },
    /// The player moved; `finished` marks arrival on the last cell
    Moved { position: u8, finished: bool },
}

/// Outcome of the post-move penalty check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PenaltyOutcome {
    /// Outside any penalty zone; counter cleared
    Clear,
    /// In a zone, counter below the threshold
    Ticking(u8),
    /// Third consecutive in-zone landing; counter reset, wins decrement due
    Struck,
}

/// Resolve a move against walls and track bounds. Mutates the player's
/// position/boost and wall hit counters; never evaluates power-ups or
/// penalties (callers run those only after a successful position change).
pub fn resolve_move(player: &mut Player, state: &mut GameState, direction: Direction) -> MoveOutcome {
    match direction {
        Direction::Left => {
            player.position = player.position.saturating_sub(1);
            MoveOutcome::Moved {
                position: player.position,
                finished: false,
            }
        }
        Direction::Right => {
            let mut next = player.position + 1;

            // A live boost doubles the step, but only strictly within
            // bounds: it may land exactly on the finish, never past it.
            if player.speed_boost && next < TRACK_LENGTH {
                next += 1;
                player.speed_boost = false;
            }

            if let Some(idx) = state
                .walls
                .iter()
                .position(|w| w.position == next && w.hits < w.max_hits)
            {
                let wall = &mut state.walls[idx];
                wall.hits += 1;
                let destroyed = wall.hits == wall.max_hits;
                if destroyed {
                    state.walls.remove(idx);
                }
                return MoveOutcome::WallHit {
                    position: next,
                    destroyed,
                };
            }

            if next <= TRACK_LENGTH {
                player.position = next;
                MoveOutcome::Moved {
                    position: next,
                    finished: next == TRACK_LENGTH,
                }
            } else {
                MoveOutcome::Ignored
            }
        }
    }
}

/// Power-up pickup check after a successful position change.
/// Returns true when the power-up was consumed (the caller schedules the
/// respawn).
pub fn check_power_up(player: &mut Player, state: &mut GameState) -> bool {
    match state.power_up {
        Some(PowerUp { position }) if position == player.position => {
            player.speed_boost = true;
            state.power_up = None;
            true
        }
        _ => false,
    }
}

/// Penalty-zone check after a successful position change.
/// The counter is position-triggered: stepping outside a zone clears it
/// unconditionally.
pub fn check_penalty(player: &mut Player, state: &GameState) -> PenaltyOutcome {
    if state.penalty_zones.contains(&player.position) {
        player.penalty_time += 1;
        if player.penalty_time >= PENALTY_THRESHOLD {
            player.penalty_time = 0;
            PenaltyOutcome::Struck
        } else {
            PenaltyOutcome::Ticking(player.penalty_time)
        }
    } else {
        player.penalty_time = 0;
        PenaltyOutcome::Clear
    }
}

/// Choose a respawn cell for the power-up: uniform among cells free of
/// active walls and penalty zones. None when the track is saturated.
pub fn pick_power_up_cell(state: &GameState, rng: &mut impl Rng) -> Option<u8> {
    let free: Vec<u8> = (0..=TRACK_LENGTH)
        .filter(|p| !state.walls.iter().any(|w| w.position == *p))
        .filter(|p| !state.penalty_zones.contains(p))
        .collect();

    if free.is_empty() {
        None
    } else {
        Some(free[rng.gen_range(0..free.len())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::room::Wall;
    use crate::game::{START_POSITION, WALL_MAX_HITS};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use uuid::Uuid;

    fn player_at(position: u8) -> Player {
        let mut player = Player::new(Uuid::new_v4());
        player.position = position;
        player
    }

    fn state_with_walls(walls: Vec<Wall>) -> GameState {
        GameState {
            walls,
            power_up: None,
            penalty_zones: vec![2, 7],
            started: true,
        }
    }

    fn wall_at(position: u8) -> Wall {
        Wall {
            position,
            hits: 0,
            max_hits: WALL_MAX_HITS,
        }
    }

    #[test]
    fn left_move_decrements_and_clamps_at_zero() {
        let mut state = state_with_walls(vec![]);

        let mut player = player_at(START_POSITION);
        assert_eq!(
            resolve_move(&mut player, &mut state, Direction::Left),
            MoveOutcome::Moved { position: 4, finished: false }
        );

        let mut player = player_at(0);
        assert_eq!(
            resolve_move(&mut player, &mut state, Direction::Left),
            MoveOutcome::Moved { position: 0, finished: false }
        );
        assert_eq!(player.position, 0);
    }

    #[test]
    fn left_move_ignores_walls() {
        let mut state = state_with_walls(vec![wall_at(4)]);
        let mut player = player_at(5);

        resolve_move(&mut player, &mut state, Direction::Left);
        assert_eq!(player.position, 4);
        assert_eq!(state.walls[0].hits, 0);
    }

    #[test]
    fn right_move_into_wall_absorbs_and_counts_hits() {
        let mut state = state_with_walls(vec![wall_at(6)]);
        let mut player = player_at(5);

        for expected_hits in 1..WALL_MAX_HITS {
            let outcome = resolve_move(&mut player, &mut state, Direction::Right);
            assert_eq!(
                outcome,
                MoveOutcome::WallHit { position: 6, destroyed: false }
            );
            assert_eq!(player.position, 5);
            assert_eq!(state.walls[0].hits, expected_hits);
        }

        // Third hit breaks the wall and removes it from the active set
        let outcome = resolve_move(&mut player, &mut state, Direction::Right);
        assert_eq!(outcome, MoveOutcome::WallHit { position: 6, destroyed: true });
        assert!(state.walls.is_empty());

        // The cell is now passable
        let outcome = resolve_move(&mut player, &mut state, Direction::Right);
        assert_eq!(outcome, MoveOutcome::Moved { position: 6, finished: false });
    }

    #[test]
    fn right_move_commits_and_detects_finish() {
        let mut state = state_with_walls(vec![]);
        let mut player = player_at(9);

        let outcome = resolve_move(&mut player, &mut state, Direction::Right);
        assert_eq!(outcome, MoveOutcome::Moved { position: 10, finished: true });
    }

    #[test]
    fn right_move_past_track_end_is_ignored() {
        let mut state = state_with_walls(vec![]);
        let mut player = player_at(TRACK_LENGTH);

        let outcome = resolve_move(&mut player, &mut state, Direction::Right);
        assert_eq!(outcome, MoveOutcome::Ignored);
        assert_eq!(player.position, TRACK_LENGTH);
    }

    #[test]
    fn boost_doubles_step_and_is_consumed() {
        let mut state = state_with_walls(vec![]);
        let mut player = player_at(3);
        player.speed_boost = true;

        let outcome = resolve_move(&mut player, &mut state, Direction::Right);
        assert_eq!(outcome, MoveOutcome::Moved { position: 5, finished: false });
        assert!(!player.speed_boost);
    }

    #[test]
    fn boost_can_land_exactly_on_finish() {
        let mut state = state_with_walls(vec![]);
        let mut player = player_at(8);
        player.speed_boost = true;

        let outcome = resolve_move(&mut player, &mut state, Direction::Right);
        assert_eq!(outcome, MoveOutcome::Moved { position: 10, finished: true });
        assert!(!player.speed_boost);
    }

    #[test]
    fn boost_not_consumed_on_final_step() {
        // At 9 the base step already reaches the finish; the boost must
        // neither fire nor push past the track end.
        let mut state = state_with_walls(vec![]);
        let mut player = player_at(9);
        player.speed_boost = true;

        let outcome = resolve_move(&mut player, &mut state, Direction::Right);
        assert_eq!(outcome, MoveOutcome::Moved { position: 10, finished: true });
        assert!(player.speed_boost);
    }

    #[test]
    fn boost_skips_over_adjacent_wall() {
        // The wall check applies to the post-boost cell only
        let mut state = state_with_walls(vec![wall_at(4)]);
        let mut player = player_at(3);
        player.speed_boost = true;

        let outcome = resolve_move(&mut player, &mut state, Direction::Right);
        assert_eq!(outcome, MoveOutcome::Moved { position: 5, finished: false });
        assert_eq!(state.walls[0].hits, 0);
    }

    #[test]
    fn boosted_move_into_wall_is_absorbed() {
        let mut state = state_with_walls(vec![wall_at(5)]);
        let mut player = player_at(3);
        player.speed_boost = true;

        let outcome = resolve_move(&mut player, &mut state, Direction::Right);
        assert_eq!(outcome, MoveOutcome::WallHit { position: 5, destroyed: false });
        assert_eq!(player.position, 3);
        // The boost was still consumed by the attempt
        assert!(!player.speed_boost);
    }

    #[test]
    fn power_up_consumed_on_position_match() {
        let mut state = state_with_walls(vec![]);
        state.power_up = Some(PowerUp { position: 4 });
        let mut player = player_at(4);

        assert!(check_power_up(&mut player, &mut state));
        assert!(player.speed_boost);
        assert!(state.power_up.is_none());

        // Nothing left to pick up
        assert!(!check_power_up(&mut player, &mut state));
    }

    #[test]
    fn penalty_counts_up_and_strikes_at_threshold() {
        let state = state_with_walls(vec![]);
        let mut player = player_at(7);

        assert_eq!(check_penalty(&mut player, &state), PenaltyOutcome::Ticking(1));
        assert_eq!(check_penalty(&mut player, &state), PenaltyOutcome::Ticking(2));
        assert_eq!(check_penalty(&mut player, &state), PenaltyOutcome::Struck);
        assert_eq!(player.penalty_time, 0);
    }

    #[test]
    fn leaving_zone_resets_counter_immediately() {
        let state = state_with_walls(vec![]);
        let mut player = player_at(7);

        check_penalty(&mut player, &state);
        check_penalty(&mut player, &state);
        assert_eq!(player.penalty_time, 2);

        player.position = 6;
        assert_eq!(check_penalty(&mut player, &state), PenaltyOutcome::Clear);
        assert_eq!(player.penalty_time, 0);
    }

    #[test]
    fn power_up_cell_avoids_walls_and_zones() {
        let state = state_with_walls(vec![wall_at(3), wall_at(8)]);
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        for _ in 0..100 {
            let cell = pick_power_up_cell(&state, &mut rng).unwrap();
            assert!(![2u8, 3, 7, 8].contains(&cell), "bad cell {}", cell);
            assert!(cell <= TRACK_LENGTH);
        }
    }

    #[test]
    fn power_up_cell_none_when_track_saturated() {
        // Walls on every cell outside the penalty zones
        let walls = (0..=TRACK_LENGTH)
            .filter(|p| ![2u8, 7].contains(p))
            .map(wall_at)
            .collect();
        let state = state_with_walls(walls);
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        assert_eq!(pick_power_up_cell(&state, &mut rng), None);
    }
}
