//! Cluster config-sync subsystem (spec §4.I): a PostgreSQL-backed
//! replicated key/value store kept consistent across processes via
//! LISTEN/NOTIFY, with a CRC heartbeat that triggers a resync on mismatch.

mod cache;
mod crc;
mod error;
mod notify;
mod settings;
mod subscriber;
mod sync_config;

pub use error::SyncError;
pub use notify::NotifyPayload;
pub use settings::{HeartbeatSchedule, SyncConfigSettings};
pub use subscriber::Callback;
pub use sync_config::SyncConfigPg;
