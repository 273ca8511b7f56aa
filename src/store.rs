//! Round persistence: snapshots keyed by round id and a newest-first
//! history index. Writes are best-effort from the orchestrator's side.

use crate::errors::StoreError;
use crate::round::state::RoundSnapshot;
use async_trait::async_trait;
use rocksdb::{Direction, IteratorMode, Options, WriteBatch, DB};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    path::Path,
    sync::{Arc, Mutex},
};

const SNAPSHOT_PREFIX: &str = "round:snapshot:";
const HISTORY_PREFIX: &[u8] = b"round:history:";

/// Settled round summary kept for history queries
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoundRecord {
    pub id: u64,
    pub winner: usize,
    pub winner_name: String,
    pub total_pool: f64,
    pub settled_at: u64,
}

#[async_trait]
pub trait RoundStore: Send + Sync {
    async fn save_snapshot(&self, snapshot: &RoundSnapshot) -> Result<(), StoreError>;

    async fn load_snapshot(&self, round_id: u64) -> Result<Option<RoundSnapshot>, StoreError>;

    async fn append_history(&self, record: &RoundRecord) -> Result<(), StoreError>;

    /// Most recent records first
    async fn recent_history(&self, limit: usize) -> Result<Vec<RoundRecord>, StoreError>;
}

fn snapshot_key(round_id: u64) -> Vec<u8> {
    format!("{}{}", SNAPSHOT_PREFIX, round_id).into_bytes()
}

fn history_key(record: &RoundRecord) -> Vec<u8> {
    // prefix | inv_settled_at(be) | id(be)
    let inv = u64::MAX - record.settled_at;
    let mut key = Vec::with_capacity(HISTORY_PREFIX.len() + 16);
    key.extend_from_slice(HISTORY_PREFIX);
    key.extend_from_slice(&inv.to_be_bytes());
    key.extend_from_slice(&record.id.to_be_bytes());
    key
}

#[derive(Clone)]
pub struct RocksRoundStore {
    db: Arc<DB>,
}

impl RocksRoundStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

        let db = DB::open(&opts, path).map_err(|e| StoreError::OpenFailed(e.to_string()))?;
        Ok(Self { db: Arc::new(db) })
    }
}

#[async_trait]
impl RoundStore for RocksRoundStore {
    async fn save_snapshot(&self, snapshot: &RoundSnapshot) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(snapshot).map_err(|e| {
            StoreError::WriteFailed(format!("Failed to encode snapshot for round {}: {}", snapshot.id, e))
        })?;
        self.db.put(snapshot_key(snapshot.id), bytes)?;
        Ok(())
    }

    async fn load_snapshot(&self, round_id: u64) -> Result<Option<RoundSnapshot>, StoreError> {
        let Some(bytes) = self
            .db
            .get(snapshot_key(round_id))
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?
        else {
            return Ok(None);
        };
        let snapshot = serde_json::from_slice(&bytes).map_err(|e| {
            StoreError::CorruptedData(format!("Failed to decode snapshot for round {}: {}", round_id, e))
        })?;
        Ok(Some(snapshot))
    }

    async fn append_history(&self, record: &RoundRecord) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(record).map_err(|e| {
            StoreError::WriteFailed(format!("Failed to encode history for round {}: {}", record.id, e))
        })?;
        let mut batch = WriteBatch::default();
        batch.put(history_key(record), bytes);
        self.db.write(batch)?;
        Ok(())
    }

    async fn recent_history(&self, limit: usize) -> Result<Vec<RoundRecord>, StoreError> {
        let mut records = Vec::with_capacity(limit);
        let iter = self
            .db
            .iterator(IteratorMode::From(HISTORY_PREFIX, Direction::Forward));

        for item in iter {
            if records.len() >= limit {
                break;
            }
            let (key, value) = item.map_err(|e| StoreError::ReadFailed(e.to_string()))?;
            if !key.starts_with(HISTORY_PREFIX) {
                break;
            }
            let record: RoundRecord = serde_json::from_slice(&value)
                .map_err(|e| StoreError::CorruptedData(format!("Failed to decode history entry: {}", e)))?;
            records.push(record);
        }
        Ok(records)
    }
}

/// Process-local store for tests and runs without a data directory
#[derive(Default)]
pub struct MemoryRoundStore {
    snapshots: Mutex<HashMap<u64, RoundSnapshot>>,
    history: Mutex<Vec<RoundRecord>>,
}

impl MemoryRoundStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::WriteFailed("store lock poisoned".to_string())
}

#[async_trait]
impl RoundStore for MemoryRoundStore {
    async fn save_snapshot(&self, snapshot: &RoundSnapshot) -> Result<(), StoreError> {
        self.snapshots
            .lock()
            .map_err(poisoned)?
            .insert(snapshot.id, snapshot.clone());
        Ok(())
    }

    async fn load_snapshot(&self, round_id: u64) -> Result<Option<RoundSnapshot>, StoreError> {
        Ok(self.snapshots.lock().map_err(poisoned)?.get(&round_id).cloned())
    }

    async fn append_history(&self, record: &RoundRecord) -> Result<(), StoreError> {
        self.history.lock().map_err(poisoned)?.push(record.clone());
        Ok(())
    }

    async fn recent_history(&self, limit: usize) -> Result<Vec<RoundRecord>, StoreError> {
        let history = self.history.lock().map_err(poisoned)?;
        Ok(history.iter().rev().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ServerSeed;
    use crate::round::state::{Round, RoundStatus};
    use tempfile::TempDir;

    fn record(id: u64, settled_at: u64) -> RoundRecord {
        RoundRecord {
            id,
            winner: (id % 6) as usize,
            winner_name: format!("runner-{}", id),
            total_pool: id as f64 * 0.1,
            settled_at,
        }
    }

    fn snapshot(id: u64) -> RoundSnapshot {
        let seed = ServerSeed::from_bytes([9u8; 32]);
        let commitment = seed.commitment();
        let mut round = Round::new(id, seed, commitment, false, 6, 1_000, 121_000);
        round.advance(RoundStatus::Open).unwrap();
        round.pool.record(1, 0.25).unwrap();
        round.snapshot()
    }

    #[tokio::test]
    async fn test_rocks_history_newest_first() {
        let dir = TempDir::new().unwrap();
        let store = RocksRoundStore::open(dir.path()).unwrap();

        store.append_history(&record(1, 1_000)).await.unwrap();
        store.append_history(&record(2, 3_000)).await.unwrap();
        store.append_history(&record(3, 2_000)).await.unwrap();

        let ids: Vec<u64> = store
            .recent_history(10)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![2, 3, 1]);
        assert_eq!(store.recent_history(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rocks_snapshot_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = RocksRoundStore::open(dir.path()).unwrap();
            store.save_snapshot(&snapshot(5)).await.unwrap();
        }
        let store = RocksRoundStore::open(dir.path()).unwrap();
        let loaded = store.load_snapshot(5).await.unwrap().unwrap();
        assert_eq!(loaded, snapshot(5));
        assert_eq!(loaded.total_pool, 0.25);
        assert!(store.load_snapshot(6).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryRoundStore::new();
        for id in 1..=5 {
            store.append_history(&record(id, id * 10)).await.unwrap();
        }
        let recent = store.recent_history(2).await.unwrap();
        assert_eq!(recent.iter().map(|r| r.id).collect::<Vec<_>>(), vec![5, 4]);
    }
}
