//! TLS listener backend. Grounded on `axum-server`'s `tls-rustls` feature
//! (the pattern used for the gateway's TLS-terminating listener elsewhere
//! in the retrieved examples) rather than hand-rolling a rustls accept
//! loop, since `axum-server` already gives us a `Handle`-driven graceful
//! shutdown on top of the same `tower::Service` we feed the other two
//! backends.

use crate::bridge::RouterService;
use crate::drain::DrainState;
use crate::supervisor::ListenerSupervisor;
use async_trait::async_trait;
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use lokstra_core::LokstraError;
use lokstra_router::RouterEngine;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub struct TlsListener {
    addr: SocketAddr,
    cert_path: PathBuf,
    key_path: PathBuf,
    engine: Arc<dyn RouterEngine>,
    drain: Arc<DrainState>,
    handle: Handle,
    started: AtomicBool,
}

impl TlsListener {
    pub fn new(addr: SocketAddr, cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>, engine: Arc<dyn RouterEngine>) -> Self {
        TlsListener {
            addr,
            cert_path: cert_path.into(),
            key_path: key_path.into(),
            engine,
            drain: DrainState::new(),
            handle: Handle::new(),
            started: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl ListenerSupervisor for TlsListener {
    async fn listen_and_serve(&self) -> Result<(), LokstraError> {
        let config = RustlsConfig::from_pem_file(&self.cert_path, &self.key_path)
            .await
            .map_err(|e| LokstraError::Config(format!("loading TLS cert/key: {e}")))?;

        tracing::info!(addr = %self.addr, "lokstra-http: TLS listener bound");
        self.started.store(true, Ordering::Release);

        let service = RouterService::new(self.engine.clone(), self.drain.clone());
        let result = axum_server::bind_rustls(self.addr, config)
            .handle(self.handle.clone())
            .serve(tower::make::Shared::new(service))
            .await;

        self.started.store(false, Ordering::Release);
        result.map_err(|e| LokstraError::Internal(format!("TLS listener error: {e}")))
    }

    async fn shutdown(&self, timeout: Duration) {
        self.drain.begin_shutdown(timeout).await;
        self.handle.graceful_shutdown(Some(timeout));
    }

    fn is_running(&self) -> bool {
        self.started.load(Ordering::Acquire) && !self.drain.is_shutting_down()
    }

    fn active_requests(&self) -> usize {
        self.drain.active_requests()
    }
}
