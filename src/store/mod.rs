//! Player-record store (external persistence boundary)

mod http;
mod memory;
mod records;

pub use http::RestRecordStore;
pub use memory::MemoryRecordStore;
pub use records::{LeaderboardEntry, PlayerRecord, RecordStore, StoreError};
