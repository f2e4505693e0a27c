//! Registry of live rooms, keyed by their 4-digit join code.
//!
//! The registry only holds handles; all room state lives inside the
//! room tasks. Map operations are brief (insert, lookup, remove), so
//! traffic for one room never stalls another.

use std::sync::Arc;

use dashmap::DashMap;
use rand::Rng;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::store::RecordStore;
use crate::ws::protocol::ServerMsg;

use super::room::{GameRoom, RoomHandle, RoomInfo};
use super::{RoomError, MAX_ROOM_PLAYERS, MIN_ROOM_PLAYERS};

/// All live rooms plus a connection-to-room index
#[derive(Default)]
pub struct RoomRegistry {
    rooms: DashMap<String, RoomHandle>,
    conn_index: DashMap<Uuid, String>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a room, seat the creator and spawn its task. The task
    /// removes the room from the registry when the last player leaves.
    pub fn create_room(
        self: &Arc<Self>,
        max_players: usize,
        conn_id: Uuid,
        tx: mpsc::Sender<ServerMsg>,
        records: Arc<dyn RecordStore>,
    ) -> Result<RoomInfo, RoomError> {
        if !(MIN_ROOM_PLAYERS..=MAX_ROOM_PLAYERS).contains(&max_players) {
            return Err(RoomError::InvalidConfig(max_players));
        }

        let mut rng = rand::thread_rng();
        let code = loop {
            let candidate = format!("{}", rng.gen_range(1000..10000));
            if !self.rooms.contains_key(&candidate) {
                break candidate;
            }
        };
        let seed = rng.gen();

        let (room, handle) = GameRoom::new(code.clone(), max_players, conn_id, tx, records, seed);
        self.rooms.insert(code.clone(), handle);
        self.conn_index.insert(conn_id, code.clone());

        let registry = Arc::clone(self);
        let room_code = code.clone();
        tokio::spawn(async move {
            room.run().await;
            registry.rooms.remove(&room_code);
            debug!(room = %room_code, "Room removed from registry");
        });

        Ok(RoomInfo {
            room_code: code,
            max_players,
        })
    }

    pub fn get(&self, code: &str) -> Option<RoomHandle> {
        self.rooms.get(code).map(|entry| entry.value().clone())
    }

    /// Record which room a connection belongs to
    pub fn bind(&self, conn_id: Uuid, code: &str) {
        self.conn_index.insert(conn_id, code.to_string());
    }

    /// Drop the connection-to-room binding, returning the room code
    pub fn unbind(&self, conn_id: &Uuid) -> Option<String> {
        self.conn_index.remove(conn_id).map(|(_, code)| code)
    }

    /// Handle of the room the connection is currently bound to
    pub fn room_for(&self, conn_id: &Uuid) -> Option<RoomHandle> {
        let code = self.conn_index.get(conn_id)?.value().clone();
        self.get(&code)
    }

    pub fn active_rooms(&self) -> usize {
        self.rooms.len()
    }

    pub fn total_players(&self) -> usize {
        self.rooms
            .iter()
            .map(|entry| entry.value().player_count())
            .sum()
    }
}
