//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::LeaderboardEntry;

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Open a new room and become its first player
    CreateRoom {
        max_players: usize,
    },

    /// Join an existing room by its 4-digit code
    JoinRoom {
        room_code: String,
    },

    /// Set display identity (persisted and reflected in the current room)
    SetUserInfo {
        username: String,
        avatar: Option<String>,
    },

    /// Chat message to the current room
    SendMessage {
        message: String,
    },

    /// Step one cell towards the track start
    MoveLeft,

    /// Step towards the finish (two cells with a live speed boost)
    MoveRight,

    /// Reset the current room to a fresh pre-game state
    ResetGame,

    /// Request the global top-5 leaderboard
    GetLeaderboard,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Room creation confirmation (caller only)
    RoomCreated {
        room_code: String,
        max_players: usize,
    },

    /// Join confirmation (caller only)
    JoinedRoom {
        room_code: String,
        max_players: usize,
    },

    /// Full room snapshot: every player plus the track state
    UpdatePlayers {
        players: Vec<PlayerView>,
        game_state: GameStateView,
    },

    /// A player entered the room
    PlayerJoined {
        id: Uuid,
    },

    /// A player left the room
    PlayerLeft {
        id: Uuid,
    },

    /// Pre-game countdown tick
    Countdown {
        seconds_remaining: u32,
    },

    /// The countdown was cancelled (a player left before start)
    CountdownStopped,

    /// The race has started
    GameStarted,

    /// A player reached the end of the track
    GameOver {
        winner_id: Uuid,
        username: String,
    },

    /// Chat message relayed to the room
    NewMessage {
        username: String,
        avatar: Option<String>,
        message: String,
        timestamp: u64,
    },

    /// Top players by wins (caller only)
    Leaderboard {
        leaderboard: Vec<LeaderboardEntry>,
    },

    /// Rejection of a requested action (caller only)
    Error {
        code: String,
        message: String,
    },
}

/// Player state in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: Uuid,
    pub username: Option<String>,
    pub avatar: Option<String>,
    /// Track cell in [0, TRACK_LENGTH]
    pub position: u8,
    /// One-shot double-step boost
    pub speed_boost: bool,
    /// Consecutive turns spent in a penalty zone
    pub penalty_time: u8,
}

/// Wall state in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WallView {
    pub position: u8,
    pub hits: u8,
    pub max_hits: u8,
}

/// Power-up state in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerUpView {
    pub position: u8,
}

/// Track state in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameStateView {
    pub walls: Vec<WallView>,
    pub power_up: Option<PowerUpView>,
    pub penalty_zones: Vec<u8>,
    pub started: bool,
}
