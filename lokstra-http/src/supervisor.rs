//! The shared listener interface (spec §4.J): `ListenAndServe`,
//! `Shutdown(timeout)`, `IsRunning`, `ActiveRequest`. Three backends
//! implement it - [`crate::net_http::NetHttpListener`],
//! [`crate::tls::TlsListener`] and [`crate::fasthttp::FastHttpListener`] -
//! differing only in how bytes reach [`crate::bridge::RouterService`].

use async_trait::async_trait;
use lokstra_core::LokstraError;
use std::time::Duration;

#[async_trait]
pub trait ListenerSupervisor: Send + Sync {
    /// Bind `addr` and serve until the listener is shut down or a fatal
    /// accept error occurs.
    async fn listen_and_serve(&self) -> Result<(), LokstraError>;

    /// (1) mark draining so new requests get 503+`Retry-After`, (2) stop
    /// accepting, (3) wait up to `timeout` for in-flight requests.
    async fn shutdown(&self, timeout: Duration);

    fn is_running(&self) -> bool;

    fn active_requests(&self) -> usize;
}
