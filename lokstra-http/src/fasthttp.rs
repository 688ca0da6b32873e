//! The `fasthttp`-style backend (spec §4.J): a raw `hyper::server::conn`
//! accept loop rather than `axum::serve`, standing in for a
//! lower-overhead alternate transport. It shares
//! [`crate::bridge::RouterService`] and [`crate::drain::DrainState`] with
//! the other two backends, so request handling and shutdown semantics are
//! identical; only the accept loop is hand-rolled.

use crate::bridge::RouterService;
use crate::drain::DrainState;
use crate::supervisor::ListenerSupervisor;
use async_trait::async_trait;
use hyper_util::rt::{TokioExecutor, TokioIo};
use lokstra_core::LokstraError;
use lokstra_router::RouterEngine;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub struct FastHttpListener {
    addr: SocketAddr,
    engine: Arc<dyn RouterEngine>,
    drain: Arc<DrainState>,
    started: AtomicBool,
}

impl FastHttpListener {
    pub fn new(addr: SocketAddr, engine: Arc<dyn RouterEngine>) -> Self {
        FastHttpListener {
            addr,
            engine,
            drain: DrainState::new(),
            started: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl ListenerSupervisor for FastHttpListener {
    async fn listen_and_serve(&self) -> Result<(), LokstraError> {
        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| LokstraError::Internal(format!("bind {}: {e}", self.addr)))?;
        tracing::info!(addr = %self.addr, "lokstra-http: fasthttp listener bound");
        self.started.store(true, Ordering::Release);

        let cancel = self.drain.accept_cancel_token();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(pair) => pair,
                        Err(err) => {
                            tracing::warn!(error = %err, "fasthttp: accept failed");
                            continue;
                        }
                    };
                    let service = RouterService::new(self.engine.clone(), self.drain.clone());
                    tokio::spawn(async move {
                        let io = TokioIo::new(stream);
                        if let Err(err) = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
                            .serve_connection(io, service)
                            .await
                        {
                            tracing::debug!(error = %err, %peer, "fasthttp: connection ended");
                        }
                    });
                }
            }
        }

        self.started.store(false, Ordering::Release);
        Ok(())
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
