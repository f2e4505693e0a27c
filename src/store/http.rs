//! REST client for the player-record store (PostgREST-style API)

use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

use futures::future::BoxFuture;

use super::records::{LeaderboardEntry, PlayerRecord, RecordStore, StoreError};

const RECORDS_TABLE: &str = "player_records";

/// Serialized identity patch
#[derive(Debug, Clone, Serialize)]
struct IdentityUpdate {
    username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    avatar: Option<String>,
}

/// Serialized wins patch
#[derive(Debug, Clone, Serialize)]
struct WinsUpdate {
    wins: i64,
}

/// HTTP-backed record store using a service API key
#[derive(Clone)]
pub struct RestRecordStore {
    client: Client,
    base_url: String,
    api_key: String,
}

impl RestRecordStore {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Get the REST API URL for a table
    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
    }

    /// Make an authenticated GET request
    async fn get<T: DeserializeOwned>(&self, table: &str, query: &str) -> Result<Vec<T>, StoreError> {
        let url = format!("{}?{}", self.rest_url(table), query);

        let response = self
            .authed(self.client.get(&url))
            .send()
            .await
            .map_err(StoreError::Request)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Api { status: status.as_u16(), body });
        }

        response.json().await.map_err(StoreError::Parse)
    }

    /// Make an authenticated GET request expecting a single row
    async fn get_one<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &str,
    ) -> Result<Option<T>, StoreError> {
        let url = format!("{}?{}", self.rest_url(table), query);

        let response = self
            .authed(self.client.get(&url))
            .header("Accept", "application/vnd.pgrst.object+json")
            .send()
            .await
            .map_err(StoreError::Request)?;

        if response.status() == reqwest::StatusCode::NOT_ACCEPTABLE {
            // No rows found
            return Ok(None);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Api { status: status.as_u16(), body });
        }

        response.json().await.map(Some).map_err(StoreError::Parse)
    }

    /// Make an authenticated POST request (insert)
    async fn insert<T: Serialize, R: DeserializeOwned>(
        &self,
        table: &str,
        data: &T,
    ) -> Result<R, StoreError> {
        let url = self.rest_url(table);

        let response = self
            .authed(self.client.post(&url))
            .header("Prefer", "return=representation")
            .json(data)
            .send()
            .await
            .map_err(StoreError::Request)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Api { status: status.as_u16(), body });
        }

        // The API returns an array, get first element
        let results: Vec<R> = response.json().await.map_err(StoreError::Parse)?;
        results.into_iter().next().ok_or(StoreError::NoRowReturned)
    }

    /// Make an authenticated PATCH request (update), returning the updated row
    async fn update_returning<T: Serialize, R: DeserializeOwned>(
        &self,
        table: &str,
        query: &str,
        data: &T,
    ) -> Result<R, StoreError> {
        let url = format!("{}?{}", self.rest_url(table), query);

        let response = self
            .authed(self.client.patch(&url))
            .header("Prefer", "return=representation")
            .json(data)
            .send()
            .await
            .map_err(StoreError::Request)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Api { status: status.as_u16(), body });
        }

        let results: Vec<R> = response.json().await.map_err(StoreError::Parse)?;
        results.into_iter().next().ok_or(StoreError::NoRowReturned)
    }

    async fn find_inner(&self, conn_id: Uuid) -> Result<Option<PlayerRecord>, StoreError> {
        let query = format!("conn_id=eq.{}", conn_id);
        self.get_one(RECORDS_TABLE, &query).await
    }

    async fn set_identity_inner(
        &self,
        conn_id: Uuid,
        username: String,
        avatar: Option<String>,
    ) -> Result<PlayerRecord, StoreError> {
        let query = format!("conn_id=eq.{}", conn_id);
        match self.find_inner(conn_id).await? {
            Some(_) => {
                let update = IdentityUpdate { username, avatar };
                self.update_returning(RECORDS_TABLE, &query, &update).await
            }
            None => {
                let mut record = PlayerRecord::new(conn_id);
                record.username = username;
                record.avatar = avatar;
                self.insert(RECORDS_TABLE, &record).await
            }
        }
    }

    async fn add_wins_inner(&self, conn_id: Uuid, delta: i64) -> Result<PlayerRecord, StoreError> {
        // Best-effort read-modify-write; callers tolerate store races
        let query = format!("conn_id=eq.{}", conn_id);
        match self.find_inner(conn_id).await? {
            Some(existing) => {
                let update = WinsUpdate { wins: existing.wins + delta };
                self.update_returning(RECORDS_TABLE, &query, &update).await
            }
            None => {
                let mut record = PlayerRecord::new(conn_id);
                record.wins = delta;
                self.insert(RECORDS_TABLE, &record).await
            }
        }
    }

    async fn top_by_wins_inner(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, StoreError> {
        let query = format!("select=username,wins&order=wins.desc&limit={}", limit);
        self.get(RECORDS_TABLE, &query).await
    }
}

impl RecordStore for RestRecordStore {
    fn find(&self, conn_id: Uuid) -> BoxFuture<'static, Result<Option<PlayerRecord>, StoreError>> {
        let this = self.clone();
        Box::pin(async move { this.find_inner(conn_id).await })
    }

    fn set_identity(
        &self,
        conn_id: Uuid,
        username: String,
        avatar: Option<String>,
    ) -> BoxFuture<'static, Result<PlayerRecord, StoreError>> {
        let this = self.clone();
        Box::pin(async move { this.set_identity_inner(conn_id, username, avatar).await })
    }

    fn add_wins(
        &self,
        conn_id: Uuid,
        delta: i64,
    ) -> BoxFuture<'static, Result<PlayerRecord, StoreError>> {
        let this = self.clone();
        Box::pin(async move { this.add_wins_inner(conn_id, delta).await })
    }

    fn top_by_wins(
        &self,
        limit: usize,
    ) -> BoxFuture<'static, Result<Vec<LeaderboardEntry>, StoreError>> {
        let this = self.clone();
        Box::pin(async move { this.top_by_wins_inner(limit).await })
    }
}
