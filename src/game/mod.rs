//! Room and game-state engine

pub mod countdown;
pub mod registry;
pub mod room;
pub mod rules;

pub use registry::RoomRegistry;
pub use room::{GameRoom, RoomCommand, RoomHandle};

use std::time::Duration;

/// Last track cell; landing here wins the race (11 cells, 0-indexed)
pub const TRACK_LENGTH: u8 = 10;
/// Cell every player starts (and resets) on
pub const START_POSITION: u8 = 5;
/// Hits required to break a wall
pub const WALL_MAX_HITS: u8 = 3;
/// Consecutive in-zone landings before a penalty strike
pub const PENALTY_THRESHOLD: u8 = 3;
/// Fixed penalty cells per game
pub const PENALTY_ZONES: [u8; 2] = [2, 7];
/// Pre-game countdown length in seconds
pub const COUNTDOWN_SECONDS: u32 = 10;
/// Delay before a consumed power-up respawns
pub const POWERUP_RESPAWN: Duration = Duration::from_millis(5000);
/// Allowed room capacity range
pub const MIN_ROOM_PLAYERS: usize = 2;
pub const MAX_ROOM_PLAYERS: usize = 10;

/// Rejections surfaced to the initiating connection only.
/// None of these ever mutate room state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    #[error("Room not found")]
    NotFound,

    #[error("Room is full")]
    Full,

    #[error("Game has already started")]
    AlreadyStarted,

    #[error("Invalid player limit: {0}")]
    InvalidConfig(usize),
}

impl RoomError {
    /// Stable machine-readable code for the wire error payload
    pub fn code(&self) -> &'static str {
        match self {
            RoomError::NotFound => "room_not_found",
            RoomError::Full => "room_full",
            RoomError::AlreadyStarted => "game_already_started",
            RoomError::InvalidConfig(_) => "invalid_config",
        }
    }
}
