//! In-memory record store, used when no persistence backend is configured

use std::sync::Arc;

use dashmap::DashMap;
use futures::future::BoxFuture;
use uuid::Uuid;

use super::records::{LeaderboardEntry, PlayerRecord, RecordStore, StoreError};

/// DashMap-backed record store. Keeps records for the process lifetime only.
#[derive(Clone, Default)]
pub struct MemoryRecordStore {
    records: Arc<DashMap<Uuid, PlayerRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryRecordStore {
    fn find(&self, conn_id: Uuid) -> BoxFuture<'static, Result<Option<PlayerRecord>, StoreError>> {
        let records = self.records.clone();
        Box::pin(async move { Ok(records.get(&conn_id).map(|r| r.value().clone())) })
    }

    fn set_identity(
        &self,
        conn_id: Uuid,
        username: String,
        avatar: Option<String>,
    ) -> BoxFuture<'static, Result<PlayerRecord, StoreError>> {
        let records = self.records.clone();
        Box::pin(async move {
            let mut entry = records
                .entry(conn_id)
                .or_insert_with(|| PlayerRecord::new(conn_id));
            entry.username = username;
            entry.avatar = avatar;
            Ok(entry.value().clone())
        })
    }

    fn add_wins(
        &self,
        conn_id: Uuid,
        delta: i64,
    ) -> BoxFuture<'static, Result<PlayerRecord, StoreError>> {
        let records = self.records.clone();
        Box::pin(async move {
            let mut entry = records
                .entry(conn_id)
                .or_insert_with(|| PlayerRecord::new(conn_id));
            entry.wins += delta;
            Ok(entry.value().clone())
        })
    }

    fn top_by_wins(
        &self,
        limit: usize,
    ) -> BoxFuture<'static, Result<Vec<LeaderboardEntry>, StoreError>> {
        let records = self.records.clone();
        Box::pin(async move {
            let mut entries: Vec<LeaderboardEntry> = records
                .iter()
                .map(|r| LeaderboardEntry {
                    username: r.username.clone(),
                    wins: r.wins,
                })
                .collect();
            entries.sort_by(|a, b| b.wins.cmp(&a.wins));
            entries.truncate(limit);
            Ok(entries)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_identity_creates_and_updates() {
        let store = MemoryRecordStore::new();
        let id = Uuid::new_v4();

        let record = store
            .set_identity(id, "Alice".into(), Some("🚗".into()))
            .await
            .unwrap();
        assert_eq!(record.username, "Alice");
        assert_eq!(record.avatar.as_deref(), Some("🚗"));
        assert_eq!(record.wins, 0);

        let record = store.set_identity(id, "Alicia".into(), None).await.unwrap();
        assert_eq!(record.username, "Alicia");
        assert_eq!(record.avatar, None);
    }

    #[tokio::test]
    async fn add_wins_lazily_creates_record() {
        let store = MemoryRecordStore::new();
        let id = Uuid::new_v4();

        let record = store.add_wins(id, 1).await.unwrap();
        assert_eq!(record.username, "Anonymous");
        assert_eq!(record.wins, 1);

        let record = store.add_wins(id, -1).await.unwrap();
        assert_eq!(record.wins, 0);
    }

    #[tokio::test]
    async fn leaderboard_sorted_and_truncated() {
        let store = MemoryRecordStore::new();
        for wins in 0..7 {
            let id = Uuid::new_v4();
            store
                .set_identity(id, format!("player{}", wins), None)
                .await
                .unwrap();
            store.add_wins(id, wins).await.unwrap();
        }

        let top = store.top_by_wins(5).await.unwrap();
        assert_eq!(top.len(), 5);
        assert_eq!(top[0].wins, 6);
        assert_eq!(top[0].username, "player6");
        assert!(top.windows(2).all(|w| w[0].wins >= w[1].wins));
    }

    #[tokio::test]
    async fn find_missing_returns_none() {
        let store = MemoryRecordStore::new();
        assert!(store.find(Uuid::new_v4()).await.unwrap().is_none());
    }
}
