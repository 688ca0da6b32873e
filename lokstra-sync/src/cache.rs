//! The local read-side cache (spec §4.I "Read path"): a sorted map guarded
//! by an RW lock, refreshed from the table on startup, on explicit `Sync`,
//! and on CRC mismatch. Kept separate from `SyncConfigPg` so its
//! idempotence and CRC bookkeeping can be unit-tested without a pool.

use crate::crc;
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct Cache {
    entries: RwLock<BTreeMap<String, Value>>,
}

impl Cache {
    pub fn new() -> Self {
        Cache::default()
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        self.entries.read().await.get(key).cloned()
    }

    pub async fn get_all(&self) -> BTreeMap<String, Value> {
        self.entries.read().await.clone()
    }

    /// Write path idempotence (spec §4.I): read-only check so the caller can
    /// skip the DB write (and the cache commit) when `value` already equals
    /// what is cached, without mutating anything. The cache itself is only
    /// committed via [`Self::set`] once the caller's write has actually
    /// succeeded (spec §4.I failure model: "DB write failure -> ... cache
    /// unchanged").
    pub async fn is_unchanged(&self, key: &str, value: &Value) -> bool {
        self.entries.read().await.get(key) == Some(value)
    }

    /// Unconditional set, used both to commit a write the caller already
    /// persisted to the DB and to apply a NOTIFY for a row that changed on
    /// another process.
    pub async fn set(&self, key: &str, value: Value) {
        self.entries.write().await.insert(key.to_string(), value);
    }

    pub async fn delete(&self, key: &str) -> bool {
        self.entries.write().await.remove(key).is_some()
    }

    pub async fn replace_all(&self, fresh: BTreeMap<String, Value>) {
        *self.entries.write().await = fresh;
    }

    pub async fn crc(&self) -> u32 {
        crc::compute(&*self.entries.read().await)
    }
}
