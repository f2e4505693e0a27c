//! Application state shared across routes

use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::game::RoomRegistry;
use crate::store::{MemoryRecordStore, RecordStore, RestRecordStore};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub records: Arc<dyn RecordStore>,
    pub rooms: Arc<RoomRegistry>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        // Player records go to the REST backend when configured,
        // otherwise to an in-process map (wins lost on restart)
        let records: Arc<dyn RecordStore> = match (&config.records_url, &config.records_api_key) {
            (Some(url), Some(api_key)) => {
                info!("Using REST record store at {}", url);
                Arc::new(RestRecordStore::new(url, api_key))
            }
            _ => {
                info!("RECORDS_URL not set, using in-memory record store");
                Arc::new(MemoryRecordStore::new())
            }
        };

        let rooms = Arc::new(RoomRegistry::new());

        Self {
            config,
            records,
            rooms,
        }
    }
}
