//! Player record types and the store abstraction

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Persisted record for a player, keyed by connection identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub conn_id: Uuid,
    #[serde(default = "default_username")]
    pub username: String,
    pub avatar: Option<String>,
    #[serde(default)]
    pub wins: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl PlayerRecord {
    pub fn new(conn_id: Uuid) -> Self {
        Self {
            conn_id,
            username: default_username(),
            avatar: None,
            wins: 0,
            created_at: chrono::Utc::now(),
        }
    }
}

fn default_username() -> String {
    "Anonymous".to_string()
}

/// Leaderboard row derived from the record store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub username: String,
    pub wins: i64,
}

/// Abstraction over the persistence layer for player records.
/// Every caller on the game path treats failures as best-effort:
/// logged and recovered with in-memory fallback data.
pub trait RecordStore: Send + Sync {
    /// Look up a record by connection identity
    fn find(&self, conn_id: Uuid) -> BoxFuture<'static, Result<Option<PlayerRecord>, StoreError>>;

    /// Create or update the display identity for a connection
    fn set_identity(
        &self,
        conn_id: Uuid,
        username: String,
        avatar: Option<String>,
    ) -> BoxFuture<'static, Result<PlayerRecord, StoreError>>;

    /// Adjust the win counter (lazily creating the record) and return the result
    fn add_wins(
        &self,
        conn_id: Uuid,
        delta: i64,
    ) -> BoxFuture<'static, Result<PlayerRecord, StoreError>>;

    /// Top records by wins, descending
    fn top_by_wins(
        &self,
        limit: usize,
    ) -> BoxFuture<'static, Result<Vec<LeaderboardEntry>, StoreError>>;
}

/// Record store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    Parse(reqwest::Error),

    #[error("No row returned from insert")]
    NoRowReturned,
}
