//! `Server = {name, apps[], settings}` (spec §4.K): runs every app
//! concurrently, and tears the whole set down within one aggregate
//! shutdown timeout rather than one timeout per app.

use crate::app::App;
use lokstra_registry::ServiceRegistry;
use std::time::Duration;
use tokio::task::JoinSet;

/// Aggregate shutdown behaviour (spec §4.K: "waits up to `timeout` in
/// total, not per-app").
pub struct Server {
    pub name: String,
    apps: Vec<App>,
    registry: ServiceRegistry,
}

impl Server {
    pub fn new(name: impl Into<String>, apps: Vec<App>, registry: ServiceRegistry) -> Self {
        Server {
            name: name.into(),
            apps,
            registry,
        }
    }

    /// Start every app's listener concurrently. Returns once every
    /// listener has stopped (normally only after a shutdown is
    /// requested) - the first listener error is surfaced, after the rest
    /// have been given a chance to finish.
    pub async fn start(&self) -> Result<(), lokstra_core::LokstraError> {
        let mut set = JoinSet::new();
        for app in &self.apps {
            let listener = app.listener.clone();
            let name = app.name.clone();
            set.spawn(async move {
                tracing::info!(app = %name, "lokstra-server: app listener starting");
                let result = listener.listen_and_serve().await;
                if let Err(ref e) = result {
                    tracing::error!(app = %name, error = %e, "lokstra-server: app listener exited with an error");
                }
                result
            });
        }

        let mut first_err = None;
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Err(e)) if first_err.is_none() => first_err = Some(e),
                Ok(_) => {}
                Err(join_err) if first_err.is_none() => {
                    first_err = Some(lokstra_core::LokstraError::Internal(format!(
                        "app listener task panicked: {join_err}"
                    )));
                }
                Err(_) => {}
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Gracefully shut down every app's listener, waiting at most
    /// `timeout` in aggregate (spec §4.K).
    pub async fn shutdown(&self, timeout: Duration) {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut set = JoinSet::new();
        for app in &self.apps {
            let listener = app.listener.clone();
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            set.spawn(async move { listener.shutdown(remaining).await });
        }
        while set.join_next().await.is_some() {}

        self.registry.shutdown_all();
    }

    /// Start the server, installing a SIGINT/SIGTERM trap, and perform
    /// graceful shutdown across every app once a signal arrives (spec
    /// §4.K), grounded on `r2e_core::builder::shutdown_signal()`.
    pub async fn start_and_wait_for_shutdown(self, timeout: Duration) -> Result<(), lokstra_core::LokstraError> {
        let start = self.start();
        tokio::pin!(start);

        tokio::select! {
            result = &mut start => {
                result
            }
            _ = wait_for_shutdown_signal() => {
                tracing::info!(server = %self.name, "lokstra-server: shutdown signal received, draining");
                self.shutdown(timeout).await;
                // Give `start()`'s listeners a final moment to observe the
                // drain and return; ignore their result since shutdown was
                // operator-requested, not a failure.
                let _ = tokio::time::timeout(Duration::from_millis(200), start).await;
                Ok(())
            }
        }
    }
}

/// Wait for Ctrl-C or SIGTERM on Unix (`r2e_core::builder::
/// shutdown_signal`, same selection, generalised beyond Unix-only
/// SIGTERM with a `pending()` fallback elsewhere).
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to listen for SIGTERM")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ListenerKind;
    use lokstra_router::{engine::TreeMuxEngine, RouterEngine};
    use std::sync::Arc;

    fn free_addr() -> std::net::SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[tokio::test]
    async fn shutdown_completes_without_hanging_when_nothing_is_in_flight() {
        let engine: Arc<dyn RouterEngine> = Arc::new(TreeMuxEngine::new());
        let app = App::new("a", free_addr(), engine, ListenerKind::Http);
        let server = Server::new("s", vec![app], ServiceRegistry::new());

        let handle = tokio::spawn(async move { server.start().await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.abort();
    }
}
