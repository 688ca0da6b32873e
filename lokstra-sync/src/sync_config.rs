//! `SyncConfigPg` (spec §4.I): the Postgres-backed cluster key/value store.
//! One table, one NOTIFY channel, one LISTEN connection per process, a
//! local cache kept consistent by the listener loop and periodically
//! cross-checked by a CRC heartbeat.

use crate::cache::Cache;
use crate::error::SyncError;
use crate::notify::NotifyPayload;
use crate::settings::{HeartbeatSchedule, SyncConfigSettings};
use crate::subscriber::{Callback, SubscriberRegistry};
use serde_json::Value;
use sqlx::postgres::{PgListener, PgPool};
use sqlx::Row;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

type InstanceKey = (String, String, String);
type InstanceTable = dashmap::DashMap<InstanceKey, Arc<SyncConfigPg>>;

fn instances() -> &'static InstanceTable {
    static INSTANCES: OnceLock<InstanceTable> = OnceLock::new();
    INSTANCES.get_or_init(InstanceTable::new)
}

pub struct SyncConfigPg {
    settings: SyncConfigSettings,
    pool: PgPool,
    cache: Cache,
    subscribers: SubscriberRegistry,
    cancel: CancellationToken,
    running: AtomicBool,
}

struct Queries {
    select_all: String,
    upsert: String,
    delete: String,
}

fn build_queries(table: &str) -> Queries {
    Queries {
        select_all: format!("SELECT key, value FROM {table}"),
        upsert: format!(
            "INSERT INTO {table} (key, value, updated_at) VALUES ($1, $2, now()) \
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = EXCLUDED.updated_at"
        ),
        delete: format!("DELETE FROM {table} WHERE key = $1"),
    }
}

impl SyncConfigPg {
    /// `NewSyncConfigPG` (spec §4.I "Singleton-by-config"): the same
    /// `(poolName, table, channel)` tuple always returns the already-live
    /// instance, so multiple callers share one LISTEN connection and one
    /// cache. Callers passing a differently-configured `pool` for an
    /// identity that already has a live instance get the existing instance
    /// back, not a new connection - identity is config, not the pool value.
    pub async fn connect(settings: SyncConfigSettings, pool: PgPool) -> Result<Arc<SyncConfigPg>, SyncError> {
        let key = settings.identity();
        if let Some(existing) = instances().get(&key) {
            return Ok(existing.clone());
        }

        let instance = Arc::new(SyncConfigPg {
            settings,
            pool,
            cache: Cache::new(),
            subscribers: SubscriberRegistry::new(),
            cancel: CancellationToken::new(),
            running: AtomicBool::new(true),
        });

        instance.ensure_schema().await?;
        instance.sync().await?;
        instance.clone().spawn_listener_loop();
        instance.clone().spawn_heartbeat_loop();

        instances().insert(key, instance.clone());
        Ok(instance)
    }

    async fn ensure_schema(&self) -> Result<(), SyncError> {
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {} (key TEXT PRIMARY KEY, value JSONB NOT NULL, updated_at TIMESTAMPTZ NOT NULL)",
            self.settings.table
        );
        sqlx::query(&ddl).execute(&self.pool).await?;
        Ok(())
    }

    /// Write path (spec §4.I): skips the DB write entirely when the new
    /// value equals the cached one. On a failed write the cache is left
    /// exactly as it was - the DB is the write authority, and the cache
    /// only ever reflects a write that has actually committed.
    pub async fn set(&self, key: &str, value: Value) -> Result<(), SyncError> {
        if self.cache.is_unchanged(key, &value).await {
            return Ok(());
        }
        let queries = build_queries(&self.settings.table);
        sqlx::query(&queries.upsert).bind(key).bind(&value).execute(&self.pool).await?;
        self.cache.set(key, value).await;
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        self.cache.get(key).await
    }

    pub async fn get_all(&self) -> BTreeMap<String, Value> {
        self.cache.get_all().await
    }

    /// Same DB-before-cache ordering as [`Self::set`]: nothing to delete
    /// from the DB if the key isn't cached, and the cache entry is only
    /// dropped once the DB delete has actually committed.
    pub async fn delete(&self, key: &str) -> Result<(), SyncError> {
        if self.cache.get(key).await.is_none() {
            return Ok(());
        }
        let queries = build_queries(&self.settings.table);
        sqlx::query(&queries.delete).bind(key).execute(&self.pool).await?;
        self.cache.delete(key).await;
        Ok(())
    }

    pub fn subscribe(&self, cb: Callback) -> u64 {
        self.subscribers.subscribe(cb)
    }

    pub fn unsubscribe(&self, id: u64) -> bool {
        self.subscribers.unsubscribe(id)
    }

    pub async fn get_crc(&self) -> u32 {
        self.cache.crc().await
    }

    /// Reload the cache from the table (spec §4.I "Read path"): called on
    /// startup, whenever `Sync` is called explicitly, and whenever a CRC
    /// mismatch is observed with `sync_on_mismatch` enabled.
    pub async fn sync(&self) -> Result<(), SyncError> {
        let queries = build_queries(&self.settings.table);
        let rows = sqlx::query(&queries.select_all).fetch_all(&self.pool).await?;
        let mut fresh = BTreeMap::new();
        for row in rows {
            let key: String = row.try_get("key").map_err(|e| SyncError::Write(e.to_string()))?;
            let value: Value = row.try_get("value").map_err(|e| SyncError::Write(e.to_string()))?;
            fresh.insert(key, value);
        }
        self.cache.replace_all(fresh).await;
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Cancels the background loops and drops this instance from the
    /// singleton table (spec §4.I "Shutdown removes from the singleton
    /// table and drains goroutines").
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::Relaxed);
        self.cancel.cancel();
        instances().remove(&self.settings.identity());
    }

    fn spawn_listener_loop(self: Arc<Self>) {
        tokio::spawn(async move {
            loop {
                if self.cancel.is_cancelled() {
                    return;
                }
                match PgListener::connect_with(&self.pool).await {
                    Ok(mut listener) => {
                        if let Err(err) = listener.listen(&self.settings.channel).await {
                            tracing::warn!(error = %err, "sync config: LISTEN failed, retrying");
                        } else {
                            self.drain_notifications(&mut listener).await;
                        }
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "sync config: listener connect failed, retrying");
                    }
                }
                if self.cancel.is_cancelled() {
                    return;
                }
                tokio::select! {
                    _ = tokio::time::sleep(self.settings.reconnect_interval) => {}
                    _ = self.cancel.cancelled() => return,
                }
            }
        });
    }

    async fn drain_notifications(&self, listener: &mut PgListener) {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                received = listener.recv() => {
                    match received {
                        Ok(notification) => self.apply_notification(notification.payload()).await,
                        Err(err) => {
                            tracing::warn!(error = %err, "sync config: listener connection lost");
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn apply_notification(&self, raw: &str) {
        let payload = match NotifyPayload::parse(raw) {
            Ok(p) => p,
            Err(err) => {
                tracing::warn!(error = %err, payload = raw, "sync config: dropping malformed notify payload");
                return;
            }
        };
        match payload {
            NotifyPayload::Insert { key, value } | NotifyPayload::Update { key, value } => {
                self.cache.set(&key, value.clone()).await;
                self.subscribers.dispatch(&key, Some(value));
            }
            NotifyPayload::Delete { key, .. } => {
                self.cache.delete(&key).await;
                self.subscribers.dispatch(&key, None);
            }
            NotifyPayload::Heartbeat { crc: remote_crc } => {
                let local_crc = self.cache.crc().await;
                if local_crc != remote_crc && self.settings.sync_on_mismatch {
                    tracing::info!(local_crc, remote_crc, "sync config: CRC mismatch, resyncing");
                    if let Err(err) = self.sync().await {
                        tracing::warn!(error = %err, "sync config: resync after CRC mismatch failed");
                    }
                }
            }
        }
    }

    fn spawn_heartbeat_loop(self: Arc<Self>) {
        tokio::spawn(async move {
            loop {
                let wait = self.next_heartbeat_delay();
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    _ = self.cancel.cancelled() => return,
                }
                if self.cancel.is_cancelled() {
                    return;
                }
                let crc = self.cache.crc().await;
                let payload = NotifyPayload::Heartbeat { crc }.to_json();
                if let Err(err) = sqlx::query("SELECT pg_notify($1, $2)")
                    .bind(&self.settings.channel)
                    .bind(&payload)
                    .execute(&self.pool)
                    .await
                {
                    tracing::warn!(error = %err, "sync config: heartbeat notify failed");
                }
            }
        });
    }

    fn next_heartbeat_delay(&self) -> Duration {
        match &self.settings.heartbeat {
            HeartbeatSchedule::Interval(d) => *d,
            HeartbeatSchedule::Cron(expr) => match expr.parse::<cron::Schedule>() {
                Ok(schedule) => schedule
                    .upcoming(chrono::Utc)
                    .next()
                    .and_then(|next| (next - chrono::Utc::now()).to_std().ok())
                    .unwrap_or(Duration::from_secs(10)),
                Err(err) => {
                    tracing::warn!(error = %err, expr, "sync config: invalid heartbeat cron expression, falling back to 10s");
                    Duration::from_secs(10)
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queries_are_scoped_to_the_configured_table() {
        let q = build_queries("sync_config");
        assert_eq!(q.select_all, "SELECT key, value FROM sync_config");
        assert!(q.upsert.contains("INSERT INTO sync_config"));
        assert!(q.upsert.contains("ON CONFLICT (key) DO UPDATE"));
        assert_eq!(q.delete, "DELETE FROM sync_config WHERE key = $1");
    }
}
