use lokstra_core::LokstraError;

/// SyncConfig error kinds (spec §4.I "Failure model"). `Listener` and
/// `Notify` failures are logged and retried by the background loops, never
/// returned to a caller; `Write`/`Connect` surface through `Result`.
#[derive(Debug, Clone)]
pub enum SyncError {
    Connect(String),
    Write(String),
    NotifyParse(String),
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncError::Connect(msg) => write!(f, "sync config: failed to connect: {msg}"),
            SyncError::Write(msg) => write!(f, "sync config: write failed: {msg}"),
            SyncError::NotifyParse(msg) => write!(f, "sync config: malformed notify payload: {msg}"),
        }
    }
}

impl std::error::Error for SyncError {}

impl From<SyncError> for LokstraError {
    fn from(err: SyncError) -> Self {
        LokstraError::Internal(err.to_string())
    }
}

impl From<sqlx::Error> for SyncError {
    fn from(err: sqlx::Error) -> Self {
        SyncError::Write(err.to_string())
    }
}
