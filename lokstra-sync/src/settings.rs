//! Configuration and singleton identity for a `SyncConfigPg` instance
//! (spec §4.I "Singleton-by-config").

use std::time::Duration;

/// How often the heartbeat NOTIFY fires. `Cron` mirrors the teacher's
/// scheduler-style configuration (`r2e_scheduler::ScheduleConfig`); most
/// deployments just want a fixed interval.
#[derive(Debug, Clone)]
pub enum HeartbeatSchedule {
    Interval(Duration),
    Cron(String),
}

impl Default for HeartbeatSchedule {
    fn default() -> Self {
        HeartbeatSchedule::Interval(Duration::from_secs(10))
    }
}

#[derive(Debug, Clone)]
pub struct SyncConfigSettings {
    pub pool_name: String,
    pub table: String,
    pub channel: String,
    pub reconnect_interval: Duration,
    pub heartbeat: HeartbeatSchedule,
    pub sync_on_mismatch: bool,
}

impl SyncConfigSettings {
    pub fn new(pool_name: impl Into<String>, table: impl Into<String>, channel: impl Into<String>) -> Self {
        SyncConfigSettings {
            pool_name: pool_name.into(),
            table: table.into(),
            channel: channel.into(),
            reconnect_interval: Duration::from_secs(5),
            heartbeat: HeartbeatSchedule::default(),
            sync_on_mismatch: true,
        }
    }

    pub fn with_reconnect_interval(mut self, d: Duration) -> Self {
        self.reconnect_interval = d;
        self
    }

    pub fn with_heartbeat(mut self, schedule: HeartbeatSchedule) -> Self {
        self.heartbeat = schedule;
        self
    }

    pub fn with_sync_on_mismatch(mut self, enabled: bool) -> Self {
        self.sync_on_mismatch = enabled;
        self
    }

    /// Identity used for the singleton table (spec §4.I): the same
    /// `(poolName, table, channel)` tuple must return the already-live
    /// instance. Schema is folded into `pool_name` (SPEC_FULL §3.1 open
    /// question): a schema-qualified table belongs to a differently-named
    /// pool, not a fourth identity component.
    pub fn identity(&self) -> (String, String, String) {
        (self.pool_name.clone(), self.table.clone(), self.channel.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_the_pool_table_channel_triple() {
        let a = SyncConfigSettings::new("primary", "sync_config", "config_changes");
        let b = SyncConfigSettings::new("primary", "sync_config", "config_changes");
        assert_eq!(a.identity(), b.identity());

        let c = SyncConfigSettings::new("primary", "sync_config", "other_channel");
        assert_ne!(a.identity(), c.identity());
    }
}
