//! Plain HTTP listener backend, built on `axum::serve` exactly as
//! `r2e_core::builder::AppBuilder::serve` drives its own (axum-native)
//! app - the difference is that the service being served is
//! [`crate::bridge::RouterService`] rather than an axum `Router`.

use crate::bridge::RouterService;
use crate::drain::DrainState;
use crate::supervisor::ListenerSupervisor;
use async_trait::async_trait;
use lokstra_core::LokstraError;
use lokstra_router::RouterEngine;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub struct NetHttpListener {
    addr: SocketAddr,
    engine: Arc<dyn RouterEngine>,
    drain: Arc<DrainState>,
    started: AtomicBool,
}

impl NetHttpListener {
    pub fn new(addr: SocketAddr, engine: Arc<dyn RouterEngine>) -> Self {
        NetHttpListener {
            addr,
            engine,
            drain: DrainState::new(),
            started: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl ListenerSupervisor for NetHttpListener {
    async fn listen_and_serve(&self) -> Result<(), LokstraError> {
        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| LokstraError::Internal(format!("bind {}: {e}", self.addr)))?;
        tracing::info!(addr = %self.addr, "lokstra-http: net/http listener bound");
        self.started.store(true, Ordering::Release);

        let service = RouterService::new(self.engine.clone(), self.drain.clone());
        let cancel = self.drain.accept_cancel_token();

        let result = axum::serve(listener, tower::make::Shared::new(service))
            .with_graceful_shutdown(async move { cancel.cancelled().await })
            .await;

        self.started.store(false, Ordering::Release);
        result.map_err(|e| LokstraError::Internal(format!("listener error: {e}")))
    }

    async fn shutdown(&self, timeout: Duration) {
        self.drain.begin_shutdown(timeout).await;
    }

    fn is_running(&self) -> bool {
        self.started.load(Ordering::Acquire) && !self.drain.is_shutting_down()
    }

    fn active_requests(&self) -> usize {
        self.drain.active_requests()
    }
}
